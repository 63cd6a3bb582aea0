//! SX1276 LoRa transceiver
//!
//! SPI device with a reset line and optional DIO interrupt lines, described
//! by an endpoint such as `spi0:cs=18,rst=14,dio0=26`. The driver claims its
//! GPIO pins in the resource table during `init` under the owner id
//! `sx1276@cs<N>` and releases them in `deinit`.
//!
//! Only the LoRa modem is supported. Packets go through the 256-byte FIFO,
//! with the upper half used for transmit and the lower half for receive.
//! Completion is detected by polling the IRQ flags register, so the DIO lines
//! are optional.

use heapless::Vec;

use crate::core::resources::{self, OwnerId, ResourceArbiter, ResourceKind};
use crate::transport::TransportError;

use super::bus::{ControlPins, RegisterBus};
use super::endpoint::{valid_endpoint, PinRole};
use super::identify::{claim_resources, expect_chip_id, owner_id, release_resources};
use super::registers::{Access, RegisterDescriptor};
use super::schema::{CapabilitySchema, Command, Setting, Signal, ValueType};
use super::{DeviceAddress, Driver, DriverError, DriverState, Sample, SampleValue, TIER1, TIER2};

#[cfg(feature = "tier1")]
use super::schema::{check_settable, ParamValue};
#[cfg(feature = "tier1")]
use super::Configurable;
#[cfg(feature = "tier2")]
use super::RegisterAccess;

const DRIVER_ID: &str = "sx1276";

/// Value of RegVersion
pub const CHIP_VERSION: u8 = 0x12;
/// Largest LoRa payload
pub const MAX_PAYLOAD: usize = 255;
/// Pins every endpoint must name
pub const REQUIRED_PINS: [PinRole; 2] = [PinRole::Cs, PinRole::Rst];

// ============================================================================
// Registers (LoRa page)
// ============================================================================

const REG_FIFO: u8 = 0x00;
const REG_OP_MODE: u8 = 0x01;
const REG_FRF: u8 = 0x06;
const REG_PA_CONFIG: u8 = 0x09;
const REG_OCP: u8 = 0x0B;
const REG_LNA: u8 = 0x0C;
const REG_FIFO_ADDR_PTR: u8 = 0x0D;
const REG_FIFO_TX_BASE: u8 = 0x0E;
const REG_FIFO_RX_BASE: u8 = 0x0F;
const REG_FIFO_RX_CURRENT: u8 = 0x10;
const REG_IRQ_FLAGS: u8 = 0x12;
const REG_RX_NB_BYTES: u8 = 0x13;
const REG_PKT_SNR: u8 = 0x19;
const REG_RSSI: u8 = 0x1B;
const REG_MODEM_CONFIG1: u8 = 0x1D;
const REG_MODEM_CONFIG2: u8 = 0x1E;
const REG_PREAMBLE: u8 = 0x20;
const REG_PAYLOAD_LENGTH: u8 = 0x22;
const REG_MODEM_CONFIG3: u8 = 0x26;
const REG_DETECT_OPTIMIZE: u8 = 0x31;
const REG_DETECTION_THRESHOLD: u8 = 0x37;
const REG_SYNC_WORD: u8 = 0x39;
const REG_DIO_MAPPING1: u8 = 0x40;
const REG_VERSION: u8 = 0x42;
const REG_PA_DAC: u8 = 0x4D;

const LONG_RANGE_MODE: u8 = 0x80;
const MODE_SLEEP: u8 = 0x00;
const MODE_STDBY: u8 = 0x01;
const MODE_TX: u8 = 0x03;
const MODE_RX_SINGLE: u8 = 0x06;

const IRQ_RX_TIMEOUT: u8 = 0x80;
const IRQ_RX_DONE: u8 = 0x40;
const IRQ_CRC_ERROR: u8 = 0x20;
const IRQ_TX_DONE: u8 = 0x08;

const DIO0_RX_DONE: u8 = 0x00;
const DIO0_TX_DONE: u8 = 0x40;

const FIFO_TX_BASE: u8 = 0x80;
const FIFO_RX_BASE: u8 = 0x00;

const PA_BOOST: u8 = 0x80;
const PA_DAC_DEFAULT: u8 = 0x84;
const PA_DAC_HIGH_POWER: u8 = 0x87;
const OCP_ON: u8 = 0x20;
const LNA_BOOST_HF: u8 = 0x03;
const AGC_AUTO_ON: u8 = 0x04;
const LOW_DATA_RATE_OPTIMIZE: u8 = 0x08;

const CRYSTAL_HZ: u64 = 32_000_000;
const MIN_FREQUENCY_HZ: u32 = 137_000_000;
const MAX_FREQUENCY_HZ: u32 = 1_020_000_000;
/// Bands below this use the low-frequency RSSI offset
const LF_BAND_LIMIT_HZ: u32 = 525_000_000;

/// Upper bound for one packet at SF12, 125 kHz
const TX_TIMEOUT_MS: u32 = 10_000;

pub static REGISTER_MAP: [RegisterDescriptor; 27] = [
    RegisterDescriptor::new(0x00, "FIFO", 1, Access::ReadWrite, 0x00),
    RegisterDescriptor::new(0x01, "OP_MODE", 1, Access::ReadWrite, 0x09),
    RegisterDescriptor::new(0x06, "FRF", 3, Access::ReadWrite, 0x6C_8000),
    RegisterDescriptor::new(0x09, "PA_CONFIG", 1, Access::ReadWrite, 0x4F),
    RegisterDescriptor::new(0x0B, "OCP", 1, Access::ReadWrite, 0x2B),
    RegisterDescriptor::new(0x0C, "LNA", 1, Access::ReadWrite, 0x20),
    RegisterDescriptor::new(0x0D, "FIFO_ADDR_PTR", 1, Access::ReadWrite, 0x08),
    RegisterDescriptor::new(0x0E, "FIFO_TX_BASE", 1, Access::ReadWrite, 0x80),
    RegisterDescriptor::new(0x0F, "FIFO_RX_BASE", 1, Access::ReadWrite, 0x00),
    RegisterDescriptor::new(0x10, "FIFO_RX_CURRENT", 1, Access::ReadOnly, 0x00),
    RegisterDescriptor::new(0x11, "IRQ_FLAGS_MASK", 1, Access::ReadWrite, 0x00),
    RegisterDescriptor::new(0x12, "IRQ_FLAGS", 1, Access::ReadWrite, 0x00),
    RegisterDescriptor::new(0x13, "RX_NB_BYTES", 1, Access::ReadOnly, 0x00),
    RegisterDescriptor::new(0x19, "PKT_SNR", 1, Access::ReadOnly, 0x00),
    RegisterDescriptor::new(0x1A, "PKT_RSSI", 1, Access::ReadOnly, 0x00),
    RegisterDescriptor::new(0x1B, "RSSI", 1, Access::ReadOnly, 0x00),
    RegisterDescriptor::new(0x1D, "MODEM_CONFIG1", 1, Access::ReadWrite, 0x72),
    RegisterDescriptor::new(0x1E, "MODEM_CONFIG2", 1, Access::ReadWrite, 0x70),
    RegisterDescriptor::new(0x20, "PREAMBLE", 2, Access::ReadWrite, 0x0008),
    RegisterDescriptor::new(0x22, "PAYLOAD_LENGTH", 1, Access::ReadWrite, 0x01),
    RegisterDescriptor::new(0x26, "MODEM_CONFIG3", 1, Access::ReadWrite, 0x00),
    RegisterDescriptor::new(0x31, "DETECT_OPTIMIZE", 1, Access::ReadWrite, 0xC3),
    RegisterDescriptor::new(0x37, "DETECTION_THRESHOLD", 1, Access::ReadWrite, 0x0A),
    RegisterDescriptor::new(0x39, "SYNC_WORD", 1, Access::ReadWrite, 0x12),
    RegisterDescriptor::new(0x40, "DIO_MAPPING1", 1, Access::ReadWrite, 0x00),
    RegisterDescriptor::new(0x42, "VERSION", 1, Access::ReadOnly, CHIP_VERSION as u32),
    RegisterDescriptor::new(0x4D, "PA_DAC", 1, Access::ReadWrite, 0x84),
];

static SCHEMA: CapabilitySchema = CapabilitySchema {
    settings: &[
        Setting::new("frequency", ValueType::Int)
            .writable()
            .range(137_000_000.0, 1_020_000_000.0, 1.0)
            .units("Hz")
            .active(TIER1),
        Setting::new("sf", ValueType::Int)
            .writable()
            .range(6.0, 12.0, 1.0)
            .active(TIER1),
        Setting::new("bandwidth", ValueType::Int)
            .writable()
            .range(7_800.0, 500_000.0, 1.0)
            .units("Hz")
            .active(TIER1),
        Setting::new("coding_rate", ValueType::Int)
            .writable()
            .range(5.0, 8.0, 1.0)
            .active(TIER1),
        Setting::new("tx_power", ValueType::Int)
            .writable()
            .range(2.0, 20.0, 1.0)
            .units("dBm")
            .active(TIER1),
        Setting::new("sync_word", ValueType::Int)
            .writable()
            .range(0.0, 255.0, 1.0)
            .active(TIER1),
        Setting::new("preamble", ValueType::Int)
            .writable()
            .range(6.0, 65_535.0, 1.0)
            .active(TIER1),
        Setting::new("crc", ValueType::Bool).writable().active(TIER1),
    ],
    signals: &[
        Signal::new("rssi", ValueType::Int).units("dBm"),
        Signal::new("snr", ValueType::Float).units("dB"),
        Signal::new("packets", ValueType::Counter),
    ],
    commands: &[
        Command::new("transmit", "payload:blob"),
        Command::new("receive", "timeout_ms:int"),
        Command::new("reg_read", "addr:int len:int").active(TIER2),
        Command::new("reg_write", "addr:int data:blob").active(TIER2),
    ],
};

// ============================================================================
// Configuration
// ============================================================================

/// Signal bandwidth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bandwidth {
    Bw7_8 = 0,
    Bw10_4 = 1,
    Bw15_6 = 2,
    Bw20_8 = 3,
    Bw31_25 = 4,
    Bw41_7 = 5,
    Bw62_5 = 6,
    Bw125 = 7,
    Bw250 = 8,
    Bw500 = 9,
}

impl Bandwidth {
    const ALL: [Bandwidth; 10] = [
        Bandwidth::Bw7_8,
        Bandwidth::Bw10_4,
        Bandwidth::Bw15_6,
        Bandwidth::Bw20_8,
        Bandwidth::Bw31_25,
        Bandwidth::Bw41_7,
        Bandwidth::Bw62_5,
        Bandwidth::Bw125,
        Bandwidth::Bw250,
        Bandwidth::Bw500,
    ];

    pub const fn hz(self) -> u32 {
        match self {
            Bandwidth::Bw7_8 => 7_800,
            Bandwidth::Bw10_4 => 10_400,
            Bandwidth::Bw15_6 => 15_600,
            Bandwidth::Bw20_8 => 20_800,
            Bandwidth::Bw31_25 => 31_250,
            Bandwidth::Bw41_7 => 41_700,
            Bandwidth::Bw62_5 => 62_500,
            Bandwidth::Bw125 => 125_000,
            Bandwidth::Bw250 => 250_000,
            Bandwidth::Bw500 => 500_000,
        }
    }

    /// Exact table entry for `hz`
    pub fn from_hz(hz: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.hz() == hz)
    }
}

/// Radio configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sx1276Config {
    pub frequency_hz: u32,
    /// 6..=12
    pub spreading_factor: u8,
    pub bandwidth: Bandwidth,
    /// Denominator of the 4/N coding rate, 5..=8
    pub coding_rate: u8,
    /// 2..=17, or 20 with the high-power DAC
    pub tx_power_dbm: u8,
    pub sync_word: u8,
    pub preamble_len: u16,
    pub crc: bool,
}

impl Default for Sx1276Config {
    fn default() -> Self {
        Self {
            frequency_hz: 915_000_000,
            spreading_factor: 7,
            bandwidth: Bandwidth::Bw125,
            coding_rate: 5,
            tx_power_dbm: 17,
            sync_word: 0x12,
            preamble_len: 8,
            crc: true,
        }
    }
}

impl Sx1276Config {
    fn validate(&self) -> Result<(), DriverError> {
        let ok = (MIN_FREQUENCY_HZ..=MAX_FREQUENCY_HZ).contains(&self.frequency_hz)
            && (6..=12).contains(&self.spreading_factor)
            && (5..=8).contains(&self.coding_rate)
            && ((2..=17).contains(&self.tx_power_dbm) || self.tx_power_dbm == 20)
            && self.preamble_len >= 6;
        if ok {
            Ok(())
        } else {
            Err(DriverError::InvalidArgument)
        }
    }

    /// RegFrf value, `f * 2^19 / f_xosc`
    pub fn frf(&self) -> u32 {
        ((u64::from(self.frequency_hz) << 19) / CRYSTAL_HZ) as u32
    }

    fn modem_config1(&self) -> u8 {
        let implicit_header = u8::from(self.spreading_factor == 6);
        ((self.bandwidth as u8) << 4) | ((self.coding_rate - 4) << 1) | implicit_header
    }

    fn modem_config2(&self) -> u8 {
        (self.spreading_factor << 4) | (u8::from(self.crc) << 2)
    }

    /// Symbols longer than 16 ms need the low data rate optimization
    fn modem_config3(&self) -> u8 {
        let symbol_ms = (1u32 << self.spreading_factor) * 1000 / self.bandwidth.hz();
        if symbol_ms > 16 {
            AGC_AUTO_ON | LOW_DATA_RATE_OPTIMIZE
        } else {
            AGC_AUTO_ON
        }
    }

    /// PA_CONFIG, PA_DAC and OCP values for the PA_BOOST output
    fn power_registers(&self) -> (u8, u8, u8) {
        if self.tx_power_dbm == 20 {
            // +20 dBm needs the high-power DAC and 140 mA OCP
            (PA_BOOST | (17 - 2), PA_DAC_HIGH_POWER, OCP_ON | 17)
        } else {
            // 100 mA OCP
            (PA_BOOST | (self.tx_power_dbm - 2), PA_DAC_DEFAULT, OCP_ON | 11)
        }
    }
}

/// Statistics of the last received packet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketStatus {
    pub rssi_dbm: i16,
    pub snr_db: f32,
}

// ============================================================================
// Driver
// ============================================================================

pub struct Sx1276<'r, R> {
    bus: R,
    arbiter: &'r dyn ResourceArbiter,
    owner: OwnerId,
    config: Sx1276Config,
    /// Last mode written to RegOpMode, without the LoRa bit
    mode: u8,
    packets: u32,
    last_packet: Option<PacketStatus>,
    state: DriverState,
}

impl<R: RegisterBus + ControlPins> Sx1276<'static, R> {
    /// Radio claiming its pins in the process-wide resource table
    pub fn new(bus: R) -> Self {
        Sx1276::with_arbiter(bus, resources::global(), Sx1276Config::default())
    }
}

impl<'r, R: RegisterBus + ControlPins> Sx1276<'r, R> {
    pub fn with_arbiter(bus: R, arbiter: &'r dyn ResourceArbiter, config: Sx1276Config) -> Self {
        let owner = owner_id(DRIVER_ID, bus.location());
        Self {
            bus,
            arbiter,
            owner,
            config,
            mode: MODE_SLEEP,
            packets: 0,
            last_packet: None,
            state: DriverState::new(),
        }
    }

    /// Whether `text` is a usable endpoint for this radio
    pub fn valid_endpoints(text: &str) -> bool {
        valid_endpoint(text, &REQUIRED_PINS)
    }

    /// Reset the chip and check RegVersion without claiming anything
    pub fn identify_probe(bus: &mut R) -> bool {
        if bus.setup_pins().is_err() || Self::reset(bus).is_err() {
            return false;
        }
        bus.read_reg(REG_VERSION) == Ok(CHIP_VERSION)
    }

    /// Pulse the reset line and wait for the chip to start
    fn reset(bus: &mut R) -> Result<(), TransportError> {
        bus.write_pin(PinRole::Rst, false)?;
        bus.delay_ms(1);
        bus.write_pin(PinRole::Rst, true)?;
        bus.delay_ms(6);
        Ok(())
    }

    pub fn config(&self) -> &Sx1276Config {
        &self.config
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    /// Resource owner id, `sx1276@cs<N>`
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Packets received since `init`
    pub fn packet_count(&self) -> u32 {
        self.packets
    }

    pub fn last_packet(&self) -> Option<PacketStatus> {
        self.last_packet
    }

    fn pin_claims(&self) -> Vec<(ResourceKind, u32), 6> {
        self.bus
            .endpoint()
            .assigned()
            .map(|(_, pin)| (ResourceKind::GpioPin, u32::from(pin)))
            .collect()
    }

    fn set_op_mode(&mut self, mode: u8) -> Result<(), TransportError> {
        self.bus.write_reg(REG_OP_MODE, LONG_RANGE_MODE | mode)?;
        self.mode = mode;
        Ok(())
    }

    fn rssi_offset(&self) -> i16 {
        if self.config.frequency_hz < LF_BAND_LIMIT_HZ {
            -164
        } else {
            -157
        }
    }

    /// Write every modem register derived from `config`
    fn write_config(&mut self, config: &Sx1276Config) -> Result<(), TransportError> {
        let frf = config.frf().to_be_bytes();
        self.bus.write_regs(REG_FRF, &frf[1..])?;

        let (pa_config, pa_dac, ocp) = config.power_registers();
        self.bus.write_reg(REG_PA_CONFIG, pa_config)?;
        self.bus.write_reg(REG_PA_DAC, pa_dac)?;
        self.bus.write_reg(REG_OCP, ocp)?;

        self.bus.write_reg(REG_MODEM_CONFIG1, config.modem_config1())?;
        self.bus.write_reg(REG_MODEM_CONFIG2, config.modem_config2())?;
        self.bus.write_reg(REG_MODEM_CONFIG3, config.modem_config3())?;

        let (optimize, threshold) = if config.spreading_factor == 6 {
            (0xC5, 0x0C)
        } else {
            (0xC3, 0x0A)
        };
        self.bus.write_reg(REG_DETECT_OPTIMIZE, optimize)?;
        self.bus.write_reg(REG_DETECTION_THRESHOLD, threshold)?;

        self.bus.write_regs(REG_PREAMBLE, &config.preamble_len.to_be_bytes())?;
        self.bus.write_reg(REG_SYNC_WORD, config.sync_word)
    }

    fn bring_up(&mut self) -> Result<(), DriverError> {
        self.bus.setup_pins()?;
        Self::reset(&mut self.bus)?;
        expect_chip_id(&mut self.bus, DRIVER_ID, REG_VERSION, CHIP_VERSION)?;

        // The LoRa bit only takes effect in sleep
        self.set_op_mode(MODE_SLEEP)?;
        self.bus.write_reg(REG_FIFO_TX_BASE, FIFO_TX_BASE)?;
        self.bus.write_reg(REG_FIFO_RX_BASE, FIFO_RX_BASE)?;
        self.bus.update_reg(REG_LNA, LNA_BOOST_HF, LNA_BOOST_HF)?;
        let config = self.config;
        self.write_config(&config)?;
        self.set_op_mode(MODE_STDBY)?;
        Ok(())
    }

    /// Poll RegIrqFlags until one of `mask` is set
    fn wait_irq(&mut self, mask: u8, timeout_ms: u32) -> Result<Option<u8>, TransportError> {
        for _ in 0..=timeout_ms {
            let flags = self.bus.read_reg(REG_IRQ_FLAGS)?;
            if flags & mask != 0 {
                return Ok(Some(flags));
            }
            self.bus.delay_ms(1);
        }
        Ok(None)
    }

    /// Send one packet and wait for TxDone
    pub fn transmit(&mut self, payload: &[u8]) -> Result<(), DriverError> {
        self.state.ensure_ready()?;
        if payload.is_empty() || payload.len() > MAX_PAYLOAD {
            return Err(DriverError::InvalidArgument);
        }
        let result = self.send(payload);
        self.state.record(result)
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), DriverError> {
        self.set_op_mode(MODE_STDBY)?;
        self.bus.write_reg(REG_DIO_MAPPING1, DIO0_TX_DONE)?;
        self.bus.write_reg(REG_FIFO_ADDR_PTR, FIFO_TX_BASE)?;
        self.bus.write_regs(REG_FIFO, payload)?;
        self.bus.write_reg(REG_PAYLOAD_LENGTH, payload.len() as u8)?;
        self.bus.write_reg(REG_IRQ_FLAGS, 0xFF)?;
        self.set_op_mode(MODE_TX)?;

        let done = self.wait_irq(IRQ_TX_DONE, TX_TIMEOUT_MS)?;
        // The chip falls back to standby after TxDone
        self.mode = MODE_STDBY;
        if done.is_none() {
            log_warn!("{}: no TxDone within {} ms", DRIVER_ID, TX_TIMEOUT_MS);
            self.set_op_mode(MODE_STDBY)?;
            return Err(DriverError::Bus(TransportError::Timeout));
        }
        self.bus.write_reg(REG_IRQ_FLAGS, IRQ_TX_DONE)?;
        log_debug!("{}: sent {} bytes", DRIVER_ID, payload.len());
        Ok(())
    }

    /// Listen for one packet for up to `timeout_ms`
    ///
    /// Returns the payload length, or `None` when nothing arrived.
    ///
    /// # Errors
    ///
    /// - `Bus(CrcMismatch)` for a packet with a bad CRC
    /// - `BufferOverflow` if the packet is longer than `buf`
    pub fn receive(
        &mut self,
        buf: &mut [u8],
        timeout_ms: u32,
    ) -> Result<Option<usize>, DriverError> {
        self.state.ensure_ready()?;
        let result = self.listen(buf, timeout_ms);
        self.state.record(result)
    }

    fn listen(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<Option<usize>, DriverError> {
        self.set_op_mode(MODE_STDBY)?;
        self.bus.write_reg(REG_DIO_MAPPING1, DIO0_RX_DONE)?;
        self.bus.write_reg(REG_FIFO_ADDR_PTR, FIFO_RX_BASE)?;
        self.bus.write_reg(REG_IRQ_FLAGS, 0xFF)?;
        self.set_op_mode(MODE_RX_SINGLE)?;

        let flags = self.wait_irq(IRQ_RX_DONE | IRQ_RX_TIMEOUT, timeout_ms)?;
        let Some(flags) = flags else {
            self.set_op_mode(MODE_STDBY)?;
            return Ok(None);
        };
        // Single receive ends in standby either way
        self.mode = MODE_STDBY;
        self.bus.write_reg(REG_IRQ_FLAGS, flags)?;

        if flags & IRQ_RX_DONE == 0 {
            return Ok(None);
        }
        if flags & IRQ_CRC_ERROR != 0 {
            log_warn!("{}: dropped packet with bad crc", DRIVER_ID);
            return Err(DriverError::Bus(TransportError::CrcMismatch));
        }

        let len = usize::from(self.bus.read_reg(REG_RX_NB_BYTES)?);
        if len > buf.len() {
            return Err(DriverError::BufferOverflow);
        }
        let start = self.bus.read_reg(REG_FIFO_RX_CURRENT)?;
        self.bus.write_reg(REG_FIFO_ADDR_PTR, start)?;
        self.bus.read_regs(REG_FIFO, &mut buf[..len])?;

        let status = self.read_packet_status()?;
        self.last_packet = Some(status);
        self.packets = self.packets.wrapping_add(1);
        log_debug!("{}: received {} bytes, rssi {}", DRIVER_ID, len, status.rssi_dbm);
        Ok(Some(len))
    }

    /// PktSnr and PktRssi of the last packet
    fn read_packet_status(&mut self) -> Result<PacketStatus, TransportError> {
        let mut raw = [0u8; 2];
        self.bus.read_regs(REG_PKT_SNR, &mut raw)?;
        let snr_quarters = raw[0] as i8;
        let mut rssi = self.rssi_offset() + i16::from(raw[1]);
        if snr_quarters < 0 {
            rssi += i16::from(snr_quarters) / 4;
        }
        Ok(PacketStatus {
            rssi_dbm: rssi,
            snr_db: f32::from(snr_quarters) / 4.0,
        })
    }

    /// Current channel RSSI
    pub fn channel_rssi(&mut self) -> Result<i16, DriverError> {
        self.state.ensure_ready()?;
        let result = self.bus.read_reg(REG_RSSI).map_err(DriverError::from);
        let raw = self.state.record(result)?;
        Ok(self.rssi_offset() + i16::from(raw))
    }

    fn sample(&mut self) -> Result<SampleValue, DriverError> {
        self.state.ensure_ready()?;
        // Packet registers hold power-on values until the first reception
        let status = self.last_packet.ok_or(DriverError::NotReady)?;
        Ok(SampleValue::Radio {
            rssi_dbm: status.rssi_dbm,
            snr_db: status.snr_db,
            packets: self.packets,
        })
    }
}

#[cfg(feature = "tier1")]
impl<R: RegisterBus + ControlPins> Sx1276<'_, R> {
    /// Apply `change` in standby and return to the previous mode
    fn reconfigure<F: FnOnce(&mut Sx1276Config)>(&mut self, change: F) -> Result<(), DriverError> {
        self.state.ensure_ready()?;
        let mut next = self.config;
        change(&mut next);
        next.validate()?;

        let previous = self.mode;
        let result = self
            .set_op_mode(MODE_STDBY)
            .and_then(|()| self.write_config(&next))
            .and_then(|()| {
                if previous == MODE_STDBY {
                    Ok(())
                } else {
                    self.set_op_mode(previous)
                }
            })
            .map_err(DriverError::from);
        if result.is_ok() {
            self.config = next;
            log_debug!(
                "{}: {} Hz sf{} bw {} cr 4/{}",
                DRIVER_ID,
                next.frequency_hz,
                next.spreading_factor,
                next.bandwidth.hz(),
                next.coding_rate
            );
        }
        self.state.record(result)
    }

    pub fn set_frequency(&mut self, hz: u32) -> Result<(), DriverError> {
        self.reconfigure(|c| c.frequency_hz = hz)
    }

    pub fn set_spreading_factor(&mut self, sf: u8) -> Result<(), DriverError> {
        self.reconfigure(|c| c.spreading_factor = sf)
    }

    pub fn set_bandwidth(&mut self, bandwidth: Bandwidth) -> Result<(), DriverError> {
        self.reconfigure(|c| c.bandwidth = bandwidth)
    }

    /// Coding rate 4/`denominator`
    pub fn set_coding_rate(&mut self, denominator: u8) -> Result<(), DriverError> {
        self.reconfigure(|c| c.coding_rate = denominator)
    }

    pub fn set_tx_power(&mut self, dbm: u8) -> Result<(), DriverError> {
        self.reconfigure(|c| c.tx_power_dbm = dbm)
    }

    pub fn set_sync_word(&mut self, sync_word: u8) -> Result<(), DriverError> {
        self.reconfigure(|c| c.sync_word = sync_word)
    }

    pub fn set_preamble_length(&mut self, symbols: u16) -> Result<(), DriverError> {
        self.reconfigure(|c| c.preamble_len = symbols)
    }

    pub fn set_crc(&mut self, enabled: bool) -> Result<(), DriverError> {
        self.reconfigure(|c| c.crc = enabled)
    }
}

impl<R: RegisterBus + ControlPins> Driver for Sx1276<'_, R> {
    fn driver_id(&self) -> &'static str {
        DRIVER_ID
    }

    fn address(&self) -> DeviceAddress {
        self.bus.location()
    }

    fn init(&mut self) -> Result<(), DriverError> {
        if self.state.is_initialized() {
            return Ok(());
        }
        if !self.bus.endpoint().has_all(&REQUIRED_PINS) {
            log_error!("{}: endpoint needs cs and rst", DRIVER_ID);
            return Err(DriverError::InvalidArgument);
        }
        self.config.validate()?;

        let pins = self.pin_claims();
        claim_resources(self.arbiter, &self.owner, &pins)?;
        self.bring_up()?;

        self.packets = 0;
        self.last_packet = None;
        self.state.set_initialized(true);
        log_info!("{}: ready on {}", DRIVER_ID, self.owner.as_str());
        Ok(())
    }

    fn deinit(&mut self) {
        if self.state.is_initialized() {
            let _ = self.set_op_mode(MODE_SLEEP);
        }
        let released = release_resources(self.arbiter, &self.owner);
        if released > 0 {
            log_debug!("{}: released {} pins", DRIVER_ID, released);
        }
        self.state.set_initialized(false);
    }

    fn is_initialized(&self) -> bool {
        self.state.is_initialized()
    }

    fn read_data(&mut self) -> Sample {
        self.sample().into()
    }

    fn schema(&self) -> &'static CapabilitySchema {
        &SCHEMA
    }
}

#[cfg(feature = "tier1")]
impl<R: RegisterBus + ControlPins> Configurable for Sx1276<'_, R> {
    fn get_parameter(&self, name: &str) -> Result<ParamValue<'static>, DriverError> {
        let c = &self.config;
        Ok(match name {
            // Band limits fit in i32
            "frequency" => ParamValue::Int(c.frequency_hz as i32),
            "sf" => ParamValue::Int(i32::from(c.spreading_factor)),
            "bandwidth" => ParamValue::Int(c.bandwidth.hz() as i32),
            "coding_rate" => ParamValue::Int(i32::from(c.coding_rate)),
            "tx_power" => ParamValue::Int(i32::from(c.tx_power_dbm)),
            "sync_word" => ParamValue::Int(i32::from(c.sync_word)),
            "preamble" => ParamValue::Int(i32::from(c.preamble_len)),
            "crc" => ParamValue::Bool(c.crc),
            _ => return Err(DriverError::InvalidArgument),
        })
    }

    fn set_parameter(&mut self, name: &str, value: &ParamValue<'_>) -> Result<(), DriverError> {
        check_settable(&SCHEMA, name, value)?;
        if name == "crc" {
            let enabled = value.as_bool().ok_or(DriverError::InvalidArgument)?;
            return self.set_crc(enabled);
        }
        let int = value.as_i32().ok_or(DriverError::InvalidArgument)?;
        let small = || u8::try_from(int).map_err(|_| DriverError::InvalidArgument);
        match name {
            "frequency" => self.set_frequency(int as u32),
            "sf" => self.set_spreading_factor(small()?),
            "bandwidth" => {
                let bandwidth = Bandwidth::from_hz(int as u32).ok_or(DriverError::InvalidArgument)?;
                self.set_bandwidth(bandwidth)
            }
            "coding_rate" => self.set_coding_rate(small()?),
            "tx_power" => self.set_tx_power(small()?),
            "sync_word" => self.set_sync_word(small()?),
            "preamble" => {
                let symbols = u16::try_from(int).map_err(|_| DriverError::InvalidArgument)?;
                self.set_preamble_length(symbols)
            }
            _ => Err(DriverError::InvalidArgument),
        }
    }
}

#[cfg(feature = "tier2")]
impl<R: RegisterBus + ControlPins> RegisterAccess for Sx1276<'_, R> {
    fn register_map(&self) -> &'static [RegisterDescriptor] {
        &REGISTER_MAP
    }

    fn register_bus(&mut self) -> &mut dyn RegisterBus {
        &mut self.bus
    }
}
