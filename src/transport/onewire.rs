//! OneWire transport
//!
//! Builds byte I/O, ROM addressing and the ROM search on the three line
//! primitives of [`OneWireLine`]. Bytes go out least significant bit first.
//!
//! The search walks the binary tree of 64-bit ROM codes one device per call:
//!
//! ```text
//! reset_search()
//! while let Some(rom) = search_next()? { ... }
//! ```
//!
//! DS18B20 helpers (`start_conversion`, `read_temperature`) address one device
//! by ROM.

use core::fmt;

use crate::core::traits::TimeSource;
use crate::platform::traits::{OneWireConfig, OneWireLine};

use super::status::TransportCore;
use super::{Result, Transport, TransportError, TransportState, TransportType};

const CMD_MATCH_ROM: u8 = 0x55;
const CMD_SKIP_ROM: u8 = 0xCC;
const CMD_SEARCH_ROM: u8 = 0xF0;
const CMD_CONVERT_T: u8 = 0x44;
const CMD_READ_SCRATCHPAD: u8 = 0xBE;

/// Longest DS18B20 conversion (12-bit)
const CONVERSION_TIMEOUT_MS: u32 = 750;
const CONVERSION_POLL_MS: u32 = 10;

/// Dallas/Maxim CRC-8 (polynomial x^8 + x^5 + x^4 + 1, reflected 0x8C, init 0)
///
/// A block followed by its CRC byte yields 0.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        let mut b = byte;
        for _ in 0..8 {
            let mix = (crc ^ b) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            b >>= 1;
        }
    }
    crc
}

/// 64-bit OneWire ROM code: family, 48-bit serial, CRC
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rom(pub [u8; 8]);

impl Rom {
    /// Family code
    pub fn family(&self) -> u8 {
        self.0[0]
    }

    /// 48-bit serial number, least significant byte first
    pub fn serial(&self) -> [u8; 6] {
        let mut serial = [0u8; 6];
        serial.copy_from_slice(&self.0[1..7]);
        serial
    }

    /// CRC byte
    pub fn crc(&self) -> u8 {
        self.0[7]
    }

    /// Whether the CRC byte matches and the code is not all zero
    pub fn is_valid(&self) -> bool {
        self.0 != [0u8; 8] && crc8(&self.0[..7]) == self.0[7]
    }

    /// Raw bytes in wire order
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    fn bit(&self, index: u8) -> bool {
        (self.0[(index / 8) as usize] >> (index % 8)) & 1 == 1
    }

    fn set_bit(&mut self, index: u8, value: bool) {
        let byte = &mut self.0[(index / 8) as usize];
        if value {
            *byte |= 1 << (index % 8);
        } else {
            *byte &= !(1 << (index % 8));
        }
    }
}

impl fmt::Display for Rom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SearchState {
    rom: Rom,
    /// 1-based bit index of the last branch taken towards 0 (0 = none)
    last_discrepancy: u8,
    last_device: bool,
}

/// OneWire transport over a [`OneWireLine`]
pub struct OneWireTransport<L, C> {
    core: TransportCore,
    line: L,
    clock: C,
    config: OneWireConfig,
    search: SearchState,
}

impl<L: OneWireLine, C: TimeSource> OneWireTransport<L, C> {
    /// Create a transport called `name` with the default configuration
    pub fn new(name: &str, line: L, clock: C) -> Self {
        let mut transport = Self {
            core: TransportCore::new(name, TransportType::OneWire),
            line,
            clock,
            config: OneWireConfig::default(),
            search: SearchState::default(),
        };
        transport.mirror_config();
        transport
    }

    /// Replace the configuration
    pub fn configure(&mut self, config: OneWireConfig) -> Result<()> {
        self.core.ensure_configurable()?;
        self.config = config;
        self.mirror_config();
        Ok(())
    }

    /// `configure` followed by `init`
    pub fn init_with(&mut self, config: OneWireConfig) -> Result<()> {
        self.configure(config)?;
        self.init()
    }

    /// Underlying line
    pub fn line(&self) -> &L {
        &self.line
    }

    /// Mutable underlying line
    pub fn line_mut(&mut self) -> &mut L {
        &mut self.line
    }

    fn mirror_config(&mut self) {
        let c = self.config;
        let map = self.core.config_mut();
        map.clear();
        let _ = map.set("pin", format_args!("{}", c.pin));
        let _ = map.set("parasite_power", format_args!("{}", c.parasite_power));
    }

    /// Run `f` as one counted operation
    fn op<T, F>(&mut self, op: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let now = self.clock.now_us();
        self.core.check_ready(now, op)?;
        let result = f(self);
        let now = self.clock.now_us();
        self.core.complete(result, now, op)
    }

    fn raw_write_byte(&mut self, byte: u8) -> Result<()> {
        for i in 0..8 {
            self.line.write_bit((byte >> i) & 1 == 1)?;
        }
        Ok(())
    }

    fn raw_read_byte(&mut self) -> Result<u8> {
        let mut byte = 0u8;
        for i in 0..8 {
            if self.line.read_bit()? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }

    /// Reset, require a presence pulse, then address `rom`
    fn address(&mut self, rom: &Rom) -> Result<()> {
        if !self.line.reset()? {
            return Err(TransportError::NoDevice);
        }
        self.raw_write_byte(CMD_MATCH_ROM)?;
        for &byte in rom.as_bytes() {
            self.raw_write_byte(byte)?;
        }
        Ok(())
    }

    /// Reset pulse; `true` if any device answered
    pub fn reset(&mut self) -> Result<bool> {
        self.op("reset", |ow| Ok(ow.line.reset()?))
    }

    /// Write one time slot
    pub fn write_bit(&mut self, bit: bool) -> Result<()> {
        self.op("write_bit", |ow| Ok(ow.line.write_bit(bit)?))
    }

    /// Read one time slot
    pub fn read_bit(&mut self) -> Result<bool> {
        self.op("read_bit", |ow| Ok(ow.line.read_bit()?))
    }

    /// Write one byte, LSB first
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.op("write_byte", |ow| ow.raw_write_byte(byte))
    }

    /// Read one byte, LSB first
    pub fn read_byte(&mut self) -> Result<u8> {
        self.op("read_byte", |ow| ow.raw_read_byte())
    }

    /// Write a block of bytes
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.op("write_bytes", |ow| data.iter().try_for_each(|&b| ow.raw_write_byte(b)))
    }

    /// Fill `buffer` from the line
    pub fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<()> {
        self.op("read_bytes", |ow| {
            for slot in buffer.iter_mut() {
                *slot = ow.raw_read_byte()?;
            }
            Ok(())
        })
    }

    /// Address one device (MATCH ROM); call after [`reset`](Self::reset)
    pub fn select(&mut self, rom: &Rom) -> Result<()> {
        self.op("select", |ow| {
            ow.raw_write_byte(CMD_MATCH_ROM)?;
            rom.as_bytes().iter().try_for_each(|&b| ow.raw_write_byte(b))
        })
    }

    /// Address every device (SKIP ROM); call after [`reset`](Self::reset)
    pub fn skip(&mut self) -> Result<()> {
        self.op("skip", |ow| ow.raw_write_byte(CMD_SKIP_ROM))
    }

    /// Restart the ROM search from the first device
    pub fn reset_search(&mut self) {
        self.search = SearchState::default();
    }

    /// Next ROM on the bus, `None` once every device has been returned
    ///
    /// # Errors
    ///
    /// `CrcMismatch` if the assembled ROM fails its CRC (the search is
    /// restarted).
    pub fn search_next(&mut self) -> Result<Option<Rom>> {
        if self.search.last_device {
            return Ok(None);
        }
        let found = self.op("search", |ow| ow.search_step());
        match found {
            Ok(Some(_)) => {}
            _ => self.reset_search(),
        }
        found
    }

    fn search_step(&mut self) -> Result<Option<Rom>> {
        if !self.line.reset()? {
            return Ok(None);
        }
        self.raw_write_byte(CMD_SEARCH_ROM)?;

        let mut rom = self.search.rom;
        let mut last_zero = 0u8;
        for index in 0..64u8 {
            let position = index + 1;
            let id_bit = self.line.read_bit()?;
            let complement = self.line.read_bit()?;
            let direction = match (id_bit, complement) {
                // No device took part in this bit
                (true, true) => return Ok(None),
                (false, false) => {
                    let direction = if position < self.search.last_discrepancy {
                        rom.bit(index)
                    } else {
                        position == self.search.last_discrepancy
                    };
                    if !direction {
                        last_zero = position;
                    }
                    direction
                }
                (bit, _) => bit,
            };
            rom.set_bit(index, direction);
            self.line.write_bit(direction)?;
        }

        if !rom.is_valid() {
            return Err(TransportError::CrcMismatch);
        }
        self.search = SearchState {
            rom,
            last_discrepancy: last_zero,
            last_device: last_zero == 0,
        };
        Ok(Some(rom))
    }

    /// Fill `roms` with every device on the bus, returning how many were found
    pub fn search_all(&mut self, roms: &mut [Rom]) -> Result<usize> {
        self.reset_search();
        let mut count = 0;
        while count < roms.len() {
            match self.search_next()? {
                Some(rom) => {
                    roms[count] = rom;
                    count += 1;
                }
                None => break,
            }
        }
        if count == roms.len() && !self.search.last_device {
            log_warn!("OneWire {}: search stopped at {} devices", self.core.name(), count);
        }
        log_debug!("OneWire {}: {} devices", self.core.name(), count);
        Ok(count)
    }

    /// Start a temperature conversion on `rom`
    pub fn start_conversion(&mut self, rom: &Rom) -> Result<()> {
        self.op("start_conversion", |ow| {
            ow.address(rom)?;
            ow.raw_write_byte(CMD_CONVERT_T)
        })
    }

    /// Whether the running conversion has finished (line released high)
    pub fn conversion_done(&mut self) -> Result<bool> {
        self.op("conversion_done", |ow| Ok(ow.line.read_bit()?))
    }

    /// Read and CRC-check the 9-byte scratchpad of `rom`
    pub fn read_scratchpad(&mut self, rom: &Rom) -> Result<[u8; 9]> {
        self.op("read_scratchpad", |ow| {
            ow.address(rom)?;
            ow.raw_write_byte(CMD_READ_SCRATCHPAD)?;
            let mut pad = [0u8; 9];
            for slot in pad.iter_mut() {
                *slot = ow.raw_read_byte()?;
            }
            if crc8(&pad) != 0 {
                return Err(TransportError::CrcMismatch);
            }
            Ok(pad)
        })
    }

    /// Convert and read the temperature of `rom` in degrees Celsius
    ///
    /// # Errors
    ///
    /// `Timeout` if the conversion does not finish within 750 ms.
    pub fn read_temperature(&mut self, rom: &Rom) -> Result<f32> {
        self.start_conversion(rom)?;
        let mut waited = 0;
        while !self.conversion_done()? {
            if waited >= CONVERSION_TIMEOUT_MS {
                let now = self.clock.now_us();
                self.core.record_failure(TransportError::Timeout, now, "read_temperature");
                return Err(TransportError::Timeout);
            }
            self.clock.delay_ms(CONVERSION_POLL_MS);
            waited += CONVERSION_POLL_MS;
        }
        let pad = self.read_scratchpad(rom)?;
        let raw = i16::from_le_bytes([pad[0], pad[1]]);
        Ok(f32::from(raw) / 16.0)
    }
}

impl<L: OneWireLine, C: TimeSource> Transport for OneWireTransport<L, C> {
    fn core(&self) -> &TransportCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TransportCore {
        &mut self.core
    }

    fn capabilities(&self) -> &'static str {
        "onewire:search,match_rom,skip_rom,ds18b20"
    }

    fn init(&mut self) -> Result<()> {
        if self.core.state() == TransportState::Error {
            self.deinit();
        }
        if self.core.begin_init()? {
            return Ok(());
        }
        self.reset_search();
        let result = self.line.configure(&self.config).map_err(TransportError::from);
        let now = self.clock.now_us();
        self.core.finish_init(result, now)
    }

    fn deinit(&mut self) {
        if self.core.state() != TransportState::Uninitialized {
            self.line.release();
        }
        self.core.deinit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::{MockClock, MockDs18b20, MockOneWire};

    fn ready(line: MockOneWire) -> OneWireTransport<MockOneWire, MockClock> {
        let mut ow = OneWireTransport::new("ow0", line, MockClock::new());
        ow.init().unwrap();
        ow
    }

    #[test]
    fn test_crc8_known_rom() {
        let crc = crc8(&[0x28, 0x61, 0x64, 0x02, 0x00, 0x00, 0x00]);
        assert_eq!(crc, 0xE3);
        let rom = Rom([0x28, 0x61, 0x64, 0x02, 0x00, 0x00, 0x00, crc]);
        assert!(rom.is_valid());
        assert_eq!(crc8(rom.as_bytes()), 0);
        assert_eq!(rom.to_string(), "28616402000000E3");
        assert_eq!(rom.family(), 0x28);
        assert_eq!(rom.serial(), [0x61, 0x64, 0x02, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_invalid_rom() {
        assert!(!Rom([0; 8]).is_valid());
        assert!(!Rom([0x28, 1, 2, 3, 4, 5, 6, 0]).is_valid());
    }

    #[test]
    fn test_presence() {
        let mut ow = ready(MockOneWire::new());
        assert_eq!(ow.reset(), Ok(false));
        ow.line_mut().add_device(MockDs18b20::new([1, 2, 3, 4, 5, 6]));
        assert_eq!(ow.reset(), Ok(true));
    }

    #[test]
    fn test_search_walks_every_device() {
        let serials = [
            [0x61, 0x64, 0x02, 0x00, 0x00, 0x00],
            [0x01, 0x00, 0x00, 0x00, 0x00, 0x00],
            [0xFF, 0x10, 0x00, 0x00, 0x00, 0x80],
        ];
        let mut line = MockOneWire::new();
        for serial in serials {
            line.add_device(MockDs18b20::new(serial));
        }
        let expected: std::vec::Vec<Rom> =
            (0..3).map(|i| Rom(line.device(i).unwrap().rom())).collect();
        let mut ow = ready(line);

        let mut found = [Rom::default(); 8];
        let count = ow.search_all(&mut found).unwrap();
        assert_eq!(count, 3);
        for rom in &expected {
            assert!(found[..count].contains(rom));
        }
        // Exhausted until restarted
        assert_eq!(ow.search_next(), Ok(None));
        ow.reset_search();
        assert!(ow.search_next().unwrap().is_some());
    }

    #[test]
    fn test_search_empty_bus() {
        let mut ow = ready(MockOneWire::new());
        let mut found = [Rom::default(); 2];
        assert_eq!(ow.search_all(&mut found), Ok(0));
    }

    #[test]
    fn test_read_temperature_by_rom() {
        let mut line = MockOneWire::new();
        line.add_device(MockDs18b20::new([1, 0, 0, 0, 0, 0]));
        line.add_device(MockDs18b20::new([2, 0, 0, 0, 0, 0]));
        line.device_mut(0).unwrap().set_temperature(25.0625);
        line.device_mut(1).unwrap().set_temperature(-10.5);
        let first = Rom(line.device(0).unwrap().rom());
        let second = Rom(line.device(1).unwrap().rom());
        let mut ow = ready(line);

        assert_eq!(ow.read_temperature(&first), Ok(25.0625));
        assert_eq!(ow.read_temperature(&second), Ok(-10.5));
        assert_eq!(ow.line().device(0).unwrap().conversions(), 1);
    }

    #[test]
    fn test_scratchpad_crc_checked() {
        let mut line = MockOneWire::new();
        line.add_device(MockDs18b20::new([3, 0, 0, 0, 0, 0]));
        line.device_mut(0).unwrap().set_corrupt_crc(true);
        let rom = Rom(line.device(0).unwrap().rom());
        let mut ow = ready(line);

        assert_eq!(ow.read_scratchpad(&rom), Err(TransportError::CrcMismatch));
        assert_eq!(ow.state(), TransportState::Error);
    }

    #[test]
    fn test_no_device_and_stuck_line() {
        let mut ow = ready(MockOneWire::new());
        let rom = Rom([0x28, 0x61, 0x64, 0x02, 0x00, 0x00, 0x00, 0xE3]);
        assert_eq!(ow.start_conversion(&rom), Err(TransportError::NoDevice));

        ow.line_mut().set_stuck_low(true);
        assert_eq!(ow.reset(), Err(TransportError::BusError));
    }

    #[test]
    fn test_skip_and_bytes() {
        let mut line = MockOneWire::new();
        line.add_device(MockDs18b20::new([4, 0, 0, 0, 0, 0]));
        let mut ow = ready(line);

        assert!(ow.reset().unwrap());
        ow.skip().unwrap();
        ow.write_byte(CMD_READ_SCRATCHPAD).unwrap();
        let mut pad = [0u8; 9];
        ow.read_bytes(&mut pad).unwrap();
        // Power-on value, 85 °C
        assert_eq!(&pad[..2], &[0x50, 0x05]);
        assert_eq!(crc8(&pad), 0);
    }
}
