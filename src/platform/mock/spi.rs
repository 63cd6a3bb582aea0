//! Mock SPI implementation for testing

use crate::platform::{
    error::{PlatformError, SpiError},
    traits::{SpiBus, SpiConfig},
    Result,
};
use std::vec::Vec;

#[derive(Debug, Clone, Copy)]
struct WriteTrigger {
    reg: u8,
    mask: u8,
    value: u8,
    target: u8,
    set_bits: u8,
}

#[derive(Debug, Clone)]
struct Fifo {
    reg: u8,
    ptr_reg: u8,
    data: [u8; 256],
}

/// Simulated SPI register-file device
///
/// Every frame starts with a command byte holding a 7-bit register address
/// and a direction flag in bit 7. By default bit 7 set means write (radio
/// style); [`with_read_flag`](Self::with_read_flag) flips it (sensor style).
/// Following bytes access consecutive registers.
#[derive(Debug, Clone)]
pub struct MockSpiDevice {
    cs_pin: u8,
    registers: [u8; 128],
    write_flag_high: bool,
    clear_on_write: [bool; 128],
    triggers: Vec<WriteTrigger>,
    fifo: Option<Fifo>,
    frame_reg: Option<u8>,
    frame_write: bool,
}

impl MockSpiDevice {
    /// Create a device selected by `cs_pin`
    pub fn new(cs_pin: u8) -> Self {
        Self {
            cs_pin,
            registers: [0; 128],
            write_flag_high: true,
            clear_on_write: [false; 128],
            triggers: Vec::new(),
            fifo: None,
            frame_reg: None,
            frame_write: false,
        }
    }

    /// Bit 7 of the command byte marks a read instead of a write
    pub fn with_read_flag(mut self) -> Self {
        self.write_flag_high = false;
        self
    }

    /// Preset one register
    pub fn with_register(mut self, reg: u8, value: u8) -> Self {
        self.registers[(reg & 0x7F) as usize] = value;
        self
    }

    /// Writing a 1 bit to `reg` clears that bit (interrupt flag style)
    pub fn with_clear_on_write(mut self, reg: u8) -> Self {
        self.clear_on_write[(reg & 0x7F) as usize] = true;
        self
    }

    /// When `reg` is written with `(value & mask) == match_value`, set
    /// `set_bits` in register `target`
    pub fn with_write_trigger(
        mut self,
        reg: u8,
        mask: u8,
        match_value: u8,
        target: u8,
        set_bits: u8,
    ) -> Self {
        self.triggers.push(WriteTrigger {
            reg: reg & 0x7F,
            mask,
            value: match_value,
            target: target & 0x7F,
            set_bits,
        });
        self
    }

    /// Treat `reg` as a FIFO window addressed by the pointer held in `ptr_reg`
    pub fn with_fifo(mut self, reg: u8, ptr_reg: u8) -> Self {
        self.fifo = Some(Fifo {
            reg: reg & 0x7F,
            ptr_reg: ptr_reg & 0x7F,
            data: [0; 256],
        });
        self
    }

    /// Chip-select pin
    pub fn cs_pin(&self) -> u8 {
        self.cs_pin
    }

    /// Current value of `reg`
    pub fn register(&self, reg: u8) -> u8 {
        self.registers[(reg & 0x7F) as usize]
    }

    /// Overwrite `reg` from the device side
    pub fn set_register(&mut self, reg: u8, value: u8) {
        self.registers[(reg & 0x7F) as usize] = value;
    }

    /// FIFO contents starting at `offset`
    pub fn fifo(&self, offset: u8, len: usize) -> Vec<u8> {
        match &self.fifo {
            Some(fifo) => (0..len)
                .map(|i| fifo.data[(offset as usize + i) & 0xFF])
                .collect(),
            None => Vec::new(),
        }
    }

    /// Load FIFO contents at `offset`
    pub fn load_fifo(&mut self, offset: u8, data: &[u8]) {
        if let Some(fifo) = self.fifo.as_mut() {
            for (i, b) in data.iter().enumerate() {
                fifo.data[(offset as usize + i) & 0xFF] = *b;
            }
        }
    }

    fn end_frame(&mut self) {
        self.frame_reg = None;
    }

    fn store(&mut self, reg: u8, value: u8) {
        let index = reg as usize;
        if self.clear_on_write[index] {
            self.registers[index] &= !value;
        } else {
            self.registers[index] = value;
        }
        for trigger in &self.triggers {
            if trigger.reg == reg && value & trigger.mask == trigger.value {
                self.registers[trigger.target as usize] |= trigger.set_bits;
            }
        }
    }

    fn exchange(&mut self, byte: u8) -> u8 {
        let Some(reg) = self.frame_reg else {
            let flag = byte & 0x80 != 0;
            self.frame_write = flag == self.write_flag_high;
            self.frame_reg = Some(byte & 0x7F);
            return 0x00;
        };

        if let Some(fifo) = self.fifo.as_mut() {
            if reg == fifo.reg {
                let ptr = self.registers[fifo.ptr_reg as usize];
                let out = fifo.data[ptr as usize];
                if self.frame_write {
                    fifo.data[ptr as usize] = byte;
                }
                self.registers[fifo.ptr_reg as usize] = ptr.wrapping_add(1);
                return if self.frame_write { 0x00 } else { out };
            }
        }

        self.frame_reg = Some((reg + 1) & 0x7F);
        if self.frame_write {
            self.store(reg, byte);
            0x00
        } else {
            self.registers[reg as usize]
        }
    }
}

/// Mock SPI bus
///
/// Routes frames to the device whose chip select is asserted. When no CS is
/// asserted through the bus (driver-managed CS) the first attached device
/// answers. Records CS activity and raw MOSI bytes for verification.
#[derive(Debug)]
pub struct MockSpi {
    config: Option<SpiConfig>,
    devices: Vec<MockSpiDevice>,
    selected: Option<u8>,
    in_frame: bool,
    frames: u32,
    cs_history: Vec<(u8, bool)>,
    sent: Vec<u8>,
    pending_faults: u32,
}

impl MockSpi {
    /// Create an empty bus
    pub fn new() -> Self {
        Self {
            config: None,
            devices: Vec::new(),
            selected: None,
            in_frame: false,
            frames: 0,
            cs_history: Vec::new(),
            sent: Vec::new(),
            pending_faults: 0,
        }
    }

    /// Attach a device
    pub fn add_device(&mut self, device: MockSpiDevice) {
        self.devices.push(device);
    }

    /// Device selected by `cs_pin`
    pub fn device(&self, cs_pin: u8) -> Option<&MockSpiDevice> {
        self.devices.iter().find(|d| d.cs_pin == cs_pin)
    }

    /// Mutable device selected by `cs_pin`
    pub fn device_mut(&mut self, cs_pin: u8) -> Option<&mut MockSpiDevice> {
        self.devices.iter_mut().find(|d| d.cs_pin == cs_pin)
    }

    /// Every `(pin, active)` chip-select change, in order
    pub fn cs_history(&self) -> &[(u8, bool)] {
        &self.cs_history
    }

    /// Raw MOSI bytes
    pub fn sent(&self) -> &[u8] {
        &self.sent
    }

    /// Number of completed `begin`/`end` frames
    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Whether a frame is open
    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    /// Fail the next `count` transfers
    pub fn fail_next(&mut self, count: u32) {
        self.pending_faults = count;
    }

    /// Configuration applied by the transport
    pub fn config(&self) -> Option<&SpiConfig> {
        self.config.as_ref()
    }

    fn reset_frames(&mut self) {
        for device in &mut self.devices {
            device.end_frame();
        }
    }

    fn route(&mut self, byte: u8) -> u8 {
        self.sent.push(byte);
        let device = match self.selected {
            Some(pin) => self.devices.iter_mut().find(|d| d.cs_pin == pin),
            None => self.devices.first_mut(),
        };
        match device {
            Some(device) => device.exchange(byte),
            // Floating MISO
            None => 0xFF,
        }
    }

    fn check(&mut self) -> Result<()> {
        if self.config.is_none() {
            return Err(PlatformError::Spi(SpiError::ModeFault));
        }
        if self.pending_faults > 0 {
            self.pending_faults -= 1;
            return Err(PlatformError::Spi(SpiError::TransferFailed));
        }
        Ok(())
    }
}

impl Default for MockSpi {
    fn default() -> Self {
        Self::new()
    }
}

impl SpiBus for MockSpi {
    fn configure(&mut self, config: &SpiConfig) -> Result<()> {
        self.config = Some(*config);
        Ok(())
    }

    fn release(&mut self) {
        self.config = None;
        self.selected = None;
    }

    fn begin(&mut self) {
        self.in_frame = true;
        self.reset_frames();
    }

    fn end(&mut self) {
        self.in_frame = false;
        self.frames += 1;
        self.reset_frames();
    }

    fn set_cs(&mut self, pin: u8, active: bool) -> Result<()> {
        self.cs_history.push((pin, active));
        self.selected = if active { Some(pin) } else { None };
        self.reset_frames();
        Ok(())
    }

    fn transfer_in_place(&mut self, data: &mut [u8]) -> Result<()> {
        self.check()?;
        for byte in data.iter_mut() {
            *byte = self.route(*byte);
        }
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.check()?;
        for byte in data {
            self.route(*byte);
        }
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<()> {
        self.check()?;
        for byte in buffer.iter_mut() {
            *byte = self.route(0xFF);
        }
        Ok(())
    }
}
