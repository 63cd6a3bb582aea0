//! Mock I2C implementation for testing

use crate::platform::{
    error::{I2cError, PlatformError},
    traits::{I2cBus, I2cConfig},
    Result,
};
use std::vec::Vec;

/// I2C transaction type for logging
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum I2cTransaction {
    /// Write transaction
    Write { addr: u8, data: Vec<u8> },
    /// Read transaction
    Read { addr: u8, len: usize },
    /// Write-Read transaction
    WriteRead {
        addr: u8,
        write_data: Vec<u8>,
        read_len: usize,
    },
    /// Address-only probe
    Probe { addr: u8 },
}

/// Simulated register-file device
///
/// The first written byte selects the register pointer; further written bytes
/// are stored with auto-increment. Reads return bytes from the pointer, also
/// auto-incrementing, the way most sensor register files behave.
#[derive(Debug, Clone)]
pub struct MockI2cDevice {
    address: u8,
    registers: [u8; 256],
    read_only: [bool; 256],
    pointer: u8,
}

impl MockI2cDevice {
    /// Create a device at `address` with every register zero
    pub fn new(address: u8) -> Self {
        Self {
            address,
            registers: [0; 256],
            read_only: [false; 256],
            pointer: 0,
        }
    }

    /// Preset one register
    pub fn with_register(mut self, reg: u8, value: u8) -> Self {
        self.registers[reg as usize] = value;
        self
    }

    /// Preset consecutive registers starting at `reg`
    pub fn with_registers(mut self, reg: u8, values: &[u8]) -> Self {
        for (i, v) in values.iter().enumerate() {
            self.registers[(reg as usize + i) & 0xFF] = *v;
        }
        self
    }

    /// Make bus writes to `reg` have no effect
    pub fn with_read_only(mut self, reg: u8) -> Self {
        self.read_only[reg as usize] = true;
        self
    }

    /// Device address
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Current value of `reg`
    pub fn register(&self, reg: u8) -> u8 {
        self.registers[reg as usize]
    }

    /// Overwrite `reg` from the device side (ignores the read-only mask)
    pub fn set_register(&mut self, reg: u8, value: u8) {
        self.registers[reg as usize] = value;
    }

    fn bus_write(&mut self, data: &[u8]) {
        let Some((&reg, payload)) = data.split_first() else {
            return;
        };
        self.pointer = reg;
        for byte in payload {
            if !self.read_only[self.pointer as usize] {
                self.registers[self.pointer as usize] = *byte;
            }
            self.pointer = self.pointer.wrapping_add(1);
        }
    }

    fn bus_read(&mut self, buffer: &mut [u8]) {
        for byte in buffer.iter_mut() {
            *byte = self.registers[self.pointer as usize];
            self.pointer = self.pointer.wrapping_add(1);
        }
    }
}

/// Mock I2C bus
///
/// Routes transfers to attached [`MockI2cDevice`]s, records every transaction
/// and can inject faults. Absent addresses NACK.
#[derive(Debug)]
pub struct MockI2c {
    config: Option<I2cConfig>,
    devices: Vec<MockI2cDevice>,
    transactions: Vec<I2cTransaction>,
    pending_faults: u32,
    fault: I2cError,
    repeated_start: bool,
}

impl MockI2c {
    /// Create an empty bus
    pub fn new() -> Self {
        Self {
            config: None,
            devices: Vec::new(),
            transactions: Vec::new(),
            pending_faults: 0,
            fault: I2cError::BusError,
            repeated_start: true,
        }
    }

    /// Simulate a controller without repeated-start support
    pub fn without_repeated_start(mut self) -> Self {
        self.repeated_start = false;
        self
    }

    /// Attach a device (replacing any device at the same address)
    pub fn add_device(&mut self, device: MockI2cDevice) {
        self.remove_device(device.address);
        self.devices.push(device);
    }

    /// Detach the device at `address`
    pub fn remove_device(&mut self, address: u8) -> Option<MockI2cDevice> {
        let index = self.devices.iter().position(|d| d.address == address)?;
        Some(self.devices.remove(index))
    }

    /// Device at `address`
    pub fn device(&self, address: u8) -> Option<&MockI2cDevice> {
        self.devices.iter().find(|d| d.address == address)
    }

    /// Mutable device at `address`
    pub fn device_mut(&mut self, address: u8) -> Option<&mut MockI2cDevice> {
        self.devices.iter_mut().find(|d| d.address == address)
    }

    /// Fail the next `count` transfers with `error`
    pub fn fail_next(&mut self, count: u32, error: I2cError) {
        self.pending_faults = count;
        self.fault = error;
    }

    /// Get transaction log (for test verification)
    pub fn transactions(&self) -> &[I2cTransaction] {
        &self.transactions
    }

    /// Clear transaction log
    pub fn clear_transactions(&mut self) {
        self.transactions.clear();
    }

    /// Configuration applied by the transport
    pub fn config(&self) -> Option<&I2cConfig> {
        self.config.as_ref()
    }

    fn begin(&mut self, addr: u8) -> Result<&mut MockI2cDevice> {
        if self.config.is_none() {
            return Err(PlatformError::I2c(I2cError::BusError));
        }
        if self.pending_faults > 0 {
            self.pending_faults -= 1;
            return Err(PlatformError::I2c(self.fault));
        }
        self.devices
            .iter_mut()
            .find(|d| d.address == addr)
            .ok_or(PlatformError::I2c(I2cError::Nack))
    }
}

impl Default for MockI2c {
    fn default() -> Self {
        Self::new()
    }
}

impl I2cBus for MockI2c {
    fn configure(&mut self, config: &I2cConfig) -> Result<()> {
        self.config = Some(*config);
        Ok(())
    }

    fn release(&mut self) {
        self.config = None;
    }

    fn write(&mut self, addr: u8, data: &[u8]) -> Result<()> {
        self.transactions.push(I2cTransaction::Write {
            addr,
            data: data.to_vec(),
        });
        self.begin(addr)?.bus_write(data);
        Ok(())
    }

    fn read(&mut self, addr: u8, buffer: &mut [u8]) -> Result<()> {
        self.transactions.push(I2cTransaction::Read {
            addr,
            len: buffer.len(),
        });
        self.begin(addr)?.bus_read(buffer);
        Ok(())
    }

    fn write_read(&mut self, addr: u8, write_data: &[u8], read_buffer: &mut [u8]) -> Result<()> {
        self.transactions.push(I2cTransaction::WriteRead {
            addr,
            write_data: write_data.to_vec(),
            read_len: read_buffer.len(),
        });
        let device = self.begin(addr)?;
        device.bus_write(write_data);
        device.bus_read(read_buffer);
        Ok(())
    }

    fn probe(&mut self, addr: u8) -> bool {
        self.transactions.push(I2cTransaction::Probe { addr });
        self.begin(addr).is_ok()
    }

    fn supports_repeated_start(&self) -> bool {
        self.repeated_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> MockI2c {
        let mut i2c = MockI2c::new();
        i2c.configure(&I2cConfig::default()).unwrap();
        i2c
    }

    #[test]
    fn test_mock_i2c_register_file() {
        let mut i2c = configured();
        i2c.add_device(MockI2cDevice::new(0x50).with_registers(0x10, &[0xAA, 0xBB]));

        let mut buf = [0u8; 2];
        i2c.write_read(0x50, &[0x10], &mut buf).unwrap();
        assert_eq!(buf, [0xAA, 0xBB]);

        i2c.write(0x50, &[0x20, 0x01, 0x02]).unwrap();
        assert_eq!(i2c.device(0x50).unwrap().register(0x21), 0x02);

        assert_eq!(
            i2c.transactions()[0],
            I2cTransaction::WriteRead {
                addr: 0x50,
                write_data: vec![0x10],
                read_len: 2
            }
        );
    }

    #[test]
    fn test_mock_i2c_absent_device_nacks() {
        let mut i2c = configured();
        assert_eq!(
            i2c.write(0x51, &[0x00]),
            Err(PlatformError::I2c(I2cError::Nack))
        );
        assert!(!i2c.probe(0x51));
    }

    #[test]
    fn test_mock_i2c_read_only_register() {
        let mut i2c = configured();
        i2c.add_device(
            MockI2cDevice::new(0x20)
                .with_register(0x00, 0xFF)
                .with_read_only(0x00),
        );
        i2c.write(0x20, &[0x00, 0x12]).unwrap();
        assert_eq!(i2c.device(0x20).unwrap().register(0x00), 0xFF);
    }

    #[test]
    fn test_mock_i2c_fault_injection() {
        let mut i2c = configured();
        i2c.add_device(MockI2cDevice::new(0x68));
        i2c.fail_next(1, I2cError::Timeout);

        assert_eq!(
            i2c.write(0x68, &[0x00]),
            Err(PlatformError::I2c(I2cError::Timeout))
        );
        assert!(i2c.write(0x68, &[0x00]).is_ok());
    }

    #[test]
    fn test_mock_i2c_unconfigured_bus_errors() {
        let mut i2c = MockI2c::new();
        i2c.add_device(MockI2cDevice::new(0x68));
        assert_eq!(
            i2c.write(0x68, &[0x00]),
            Err(PlatformError::I2c(I2cError::BusError))
        );
    }
}
