//! Mock OneWire implementation for testing
//!
//! Simulates DS18B20 thermometers at the time-slot level so ROM search,
//! match/skip ROM and scratchpad transfers go through the same bit I/O a real
//! line would see.

use crate::platform::{
    error::{OneWireError, PlatformError},
    traits::OneWireLine,
    Result,
};
use crate::transport::onewire::crc8;
use std::vec::Vec;

const CMD_READ_ROM: u8 = 0x33;
const CMD_MATCH_ROM: u8 = 0x55;
const CMD_SKIP_ROM: u8 = 0xCC;
const CMD_SEARCH_ROM: u8 = 0xF0;
const CMD_CONVERT_T: u8 = 0x44;
const CMD_READ_SCRATCHPAD: u8 = 0xBE;
const CMD_WRITE_SCRATCHPAD: u8 = 0x4E;

/// Simulated DS18B20
#[derive(Debug, Clone)]
pub struct MockDs18b20 {
    rom: [u8; 8],
    pending_raw: i16,
    scratchpad: [u8; 9],
    corrupt_crc: bool,
    conversions: u32,
}

impl MockDs18b20 {
    /// Create a device with family code 0x28 and the given 48-bit serial
    pub fn new(serial: [u8; 6]) -> Self {
        let mut rom = [0u8; 8];
        rom[0] = 0x28;
        rom[1..7].copy_from_slice(&serial);
        rom[7] = crc8(&rom[..7]);

        // Power-on value is 85 °C
        let mut device = Self {
            rom,
            pending_raw: 0x0550,
            scratchpad: [0x50, 0x05, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10, 0x00],
            corrupt_crc: false,
            conversions: 0,
        };
        device.update_crc();
        device
    }

    /// 64-bit ROM, family code first
    pub fn rom(&self) -> [u8; 8] {
        self.rom
    }

    /// Temperature the next conversion will latch
    pub fn set_temperature(&mut self, celsius: f32) {
        let scaled = celsius * 16.0;
        let rounded = if scaled >= 0.0 { scaled + 0.5 } else { scaled - 0.5 };
        self.pending_raw = rounded as i16;
    }

    /// Transmit a scratchpad with a wrong CRC byte
    pub fn set_corrupt_crc(&mut self, corrupt: bool) {
        self.corrupt_crc = corrupt;
    }

    /// Scratchpad contents as the device would send them
    pub fn scratchpad(&self) -> [u8; 9] {
        let mut pad = self.scratchpad;
        if self.corrupt_crc {
            pad[8] ^= 0xFF;
        }
        pad
    }

    /// Number of temperature conversions performed
    pub fn conversions(&self) -> u32 {
        self.conversions
    }

    fn rom_bit(&self, index: u8) -> bool {
        (self.rom[(index / 8) as usize] >> (index % 8)) & 1 == 1
    }

    fn scratchpad_bit(&self, index: u16) -> bool {
        let pad = self.scratchpad();
        (pad[(index / 8) as usize % 9] >> (index % 8)) & 1 == 1
    }

    fn convert(&mut self) {
        let [lsb, msb] = self.pending_raw.to_le_bytes();
        self.scratchpad[0] = lsb;
        self.scratchpad[1] = msb;
        self.conversions += 1;
        self.update_crc();
    }

    fn write_scratchpad(&mut self, data: [u8; 3]) {
        self.scratchpad[2..5].copy_from_slice(&data);
        self.update_crc();
    }

    fn update_crc(&mut self) {
        self.scratchpad[8] = crc8(&self.scratchpad[..8]);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    RomCommand { bit: u8 },
    ReadRom { bit: u8 },
    MatchRom { bit: u8 },
    Search { bit: u8, step: u8 },
    FunctionCommand { bit: u8 },
    ReadScratchpad { bit: u16 },
    WriteScratchpad { bit: u8 },
}

/// Mock OneWire line
#[derive(Debug)]
pub struct MockOneWire {
    devices: Vec<MockDs18b20>,
    active: Vec<bool>,
    phase: Phase,
    shift: u64,
    resets: u32,
    stuck_low: bool,
}

impl MockOneWire {
    /// Create an empty line
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
            active: Vec::new(),
            phase: Phase::Idle,
            shift: 0,
            resets: 0,
            stuck_low: false,
        }
    }

    /// Attach a device
    pub fn add_device(&mut self, device: MockDs18b20) {
        self.devices.push(device);
        self.active.push(false);
    }

    /// Device at `index` in attach order
    pub fn device(&self, index: usize) -> Option<&MockDs18b20> {
        self.devices.get(index)
    }

    /// Mutable device at `index` in attach order
    pub fn device_mut(&mut self, index: usize) -> Option<&mut MockDs18b20> {
        self.devices.get_mut(index)
    }

    /// Number of reset pulses seen
    pub fn resets(&self) -> u32 {
        self.resets
    }

    /// Simulate a shorted line
    pub fn set_stuck_low(&mut self, stuck: bool) {
        self.stuck_low = stuck;
    }

    /// Wired-AND of the bit every active device drives
    fn wired_and<F: Fn(&MockDs18b20) -> bool>(&self, bit: F) -> bool {
        self.devices
            .iter()
            .zip(self.active.iter())
            .filter(|(_, active)| **active)
            .all(|(device, _)| bit(device))
    }

    fn on_rom_command(&mut self, cmd: u8) {
        self.phase = match cmd {
            CMD_READ_ROM => Phase::ReadRom { bit: 0 },
            CMD_MATCH_ROM => Phase::MatchRom { bit: 0 },
            CMD_SKIP_ROM => Phase::FunctionCommand { bit: 0 },
            CMD_SEARCH_ROM => Phase::Search { bit: 0, step: 0 },
            _ => Phase::Idle,
        };
    }

    fn on_function_command(&mut self, cmd: u8) {
        self.phase = match cmd {
            CMD_CONVERT_T => {
                for (device, active) in self.devices.iter_mut().zip(self.active.iter()) {
                    if *active {
                        device.convert();
                    }
                }
                Phase::Idle
            }
            CMD_READ_SCRATCHPAD => Phase::ReadScratchpad { bit: 0 },
            CMD_WRITE_SCRATCHPAD => Phase::WriteScratchpad { bit: 0 },
            _ => Phase::Idle,
        };
    }

    /// Shift `bit` into the accumulator and return the value once `width`
    /// bits have arrived
    fn accumulate(&mut self, bit: bool, index: u8, width: u8) -> Option<u64> {
        if index == 0 {
            self.shift = 0;
        }
        if bit {
            self.shift |= 1 << index;
        }
        (index + 1 == width).then_some(self.shift)
    }
}

impl Default for MockOneWire {
    fn default() -> Self {
        Self::new()
    }
}

impl OneWireLine for MockOneWire {
    fn reset(&mut self) -> Result<bool> {
        if self.stuck_low {
            return Err(PlatformError::OneWire(OneWireError::LineStuckLow));
        }
        self.resets += 1;
        self.active.iter_mut().for_each(|a| *a = true);
        self.phase = Phase::RomCommand { bit: 0 };
        Ok(!self.devices.is_empty())
    }

    fn write_bit(&mut self, bit: bool) -> Result<()> {
        match self.phase {
            Phase::RomCommand { bit: index } => match self.accumulate(bit, index, 8) {
                Some(cmd) => self.on_rom_command(cmd as u8),
                None => self.phase = Phase::RomCommand { bit: index + 1 },
            },
            Phase::FunctionCommand { bit: index } => match self.accumulate(bit, index, 8) {
                Some(cmd) => self.on_function_command(cmd as u8),
                None => self.phase = Phase::FunctionCommand { bit: index + 1 },
            },
            Phase::MatchRom { bit: index } => {
                if let Some(rom) = self.accumulate(bit, index, 64) {
                    let rom = rom.to_le_bytes();
                    for (device, active) in self.devices.iter().zip(self.active.iter_mut()) {
                        *active = device.rom == rom;
                    }
                    self.phase = Phase::FunctionCommand { bit: 0 };
                } else {
                    self.phase = Phase::MatchRom { bit: index + 1 };
                }
            }
            Phase::Search { bit: index, step: 2 } => {
                for (device, active) in self.devices.iter().zip(self.active.iter_mut()) {
                    if device.rom_bit(index) != bit {
                        *active = false;
                    }
                }
                self.phase = if index == 63 {
                    Phase::FunctionCommand { bit: 0 }
                } else {
                    Phase::Search {
                        bit: index + 1,
                        step: 0,
                    }
                };
            }
            Phase::WriteScratchpad { bit: index } => {
                if let Some(value) = self.accumulate(bit, index, 24) {
                    let bytes = value.to_le_bytes();
                    let data = [bytes[0], bytes[1], bytes[2]];
                    for (device, active) in self.devices.iter_mut().zip(self.active.iter()) {
                        if *active {
                            device.write_scratchpad(data);
                        }
                    }
                    self.phase = Phase::Idle;
                } else {
                    self.phase = Phase::WriteScratchpad { bit: index + 1 };
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn read_bit(&mut self) -> Result<bool> {
        let value = match self.phase {
            Phase::Search { bit, step: 0 } => {
                self.phase = Phase::Search { bit, step: 1 };
                self.wired_and(|d| d.rom_bit(bit))
            }
            Phase::Search { bit, step: 1 } => {
                self.phase = Phase::Search { bit, step: 2 };
                self.wired_and(|d| !d.rom_bit(bit))
            }
            Phase::ReadRom { bit } => {
                self.phase = if bit == 63 {
                    Phase::FunctionCommand { bit: 0 }
                } else {
                    Phase::ReadRom { bit: bit + 1 }
                };
                self.wired_and(|d| d.rom_bit(bit))
            }
            Phase::ReadScratchpad { bit } => {
                self.phase = Phase::ReadScratchpad { bit: bit + 1 };
                self.wired_and(|d| d.scratchpad_bit(bit))
            }
            // Released line reads high (also "conversion complete")
            _ => true,
        };
        Ok(value)
    }
}
