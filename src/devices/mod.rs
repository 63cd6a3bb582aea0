//! Device drivers
//!
//! Every driver implements [`Driver`], the Tier-0 contract: identify the chip
//! on `init`, produce [`Sample`]s and advertise a [`CapabilitySchema`].
//! Higher tiers are additive and compiled in by cargo feature:
//!
//! - `tier1`: [`Configurable`] plus chip-specific setters. Each
//!   reconfiguration first puts the chip in a safe state (standby, sleep,
//!   all-inputs) and restores the previous mode afterwards.
//! - `tier2`: [`RegisterAccess`] over the driver's static register map,
//!   enforcing the access class of each register and going through the same
//!   shared transport as the operational API.
//!
//! ## Modules
//!
//! - `registers`: register descriptors and access policy
//! - `schema`: capability schema, text form and typed parameter values
//! - `endpoint`: SPI endpoint strings (`spi0:cs=5,rst=16`)
//! - `bus`: register access over a shared I2C or SPI transport
//! - `identify`: chip identification and resource claims
//! - `bmp280`, `ds3231`, `tca9555`, `sx1276`: example drivers

use core::fmt;

use crate::core::resources::ResourceError;
use crate::transport::TransportError;

pub mod bmp280;
pub mod bus;
pub mod ds3231;
pub mod endpoint;
pub mod identify;
pub mod registers;
pub mod schema;
pub mod sx1276;
pub mod tca9555;

pub use bus::{ControlPins, I2cDevice, RegisterBus, SpiDevice};
pub use endpoint::{EndpointError, PinRole, SpiEndpoint};
pub use registers::{Access, RegisterDescriptor};
pub use schema::{CapabilitySchema, ParamValue, SchemaError, ValueType};

/// Driver feature level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverTier {
    /// Basic operation
    Tier0,
    /// Configuration
    Tier1,
    /// Register access
    Tier2,
}

impl DriverTier {
    /// Numeric tier
    pub const fn as_u8(self) -> u8 {
        match self {
            DriverTier::Tier0 => 0,
            DriverTier::Tier1 => 1,
            DriverTier::Tier2 => 2,
        }
    }
}

/// Tier selected by the enabled cargo features
#[cfg(feature = "tier2")]
pub const COMPILED_TIER: DriverTier = DriverTier::Tier2;
/// Tier selected by the enabled cargo features
#[cfg(all(feature = "tier1", not(feature = "tier2")))]
pub const COMPILED_TIER: DriverTier = DriverTier::Tier1;
/// Tier selected by the enabled cargo features
#[cfg(not(feature = "tier1"))]
pub const COMPILED_TIER: DriverTier = DriverTier::Tier0;

/// Activation flag for Tier-1 schema entries
pub(crate) const TIER1: bool = cfg!(feature = "tier1");
/// Activation flag for Tier-2 schema entries
pub(crate) const TIER2: bool = cfg!(feature = "tier2");

/// Driver error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverError {
    /// Transport failure (NACK, timeout, framing, ...)
    Bus(TransportError),
    /// Argument, name or value out of range
    InvalidArgument,
    /// Register access class forbids the operation
    AccessViolation,
    /// Resource held by another owner
    ConflictingOwnership,
    /// Driver is not initialized
    NotReady,
    /// Chip id or magic value mismatch
    IdentificationFailure,
    /// Transfer does not fit the buffer
    BufferOverflow,
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::Bus(e) => write!(f, "bus error: {}", e),
            DriverError::InvalidArgument => write!(f, "invalid argument"),
            DriverError::AccessViolation => write!(f, "access violation"),
            DriverError::ConflictingOwnership => write!(f, "resource owned by another driver"),
            DriverError::NotReady => write!(f, "driver not initialized"),
            DriverError::IdentificationFailure => write!(f, "identification failed"),
            DriverError::BufferOverflow => write!(f, "buffer overflow"),
        }
    }
}

impl From<TransportError> for DriverError {
    fn from(error: TransportError) -> Self {
        DriverError::Bus(error)
    }
}

impl From<ResourceError> for DriverError {
    fn from(error: ResourceError) -> Self {
        match error {
            ResourceError::Conflict | ResourceError::NotOwner => DriverError::ConflictingOwnership,
            ResourceError::NotClaimed | ResourceError::InvalidOwner => DriverError::InvalidArgument,
            ResourceError::TableFull => DriverError::BufferOverflow,
        }
    }
}

/// Where a device lives on its bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceAddress {
    /// 7-bit I2C address
    I2c(u8),
    /// SPI chip-select pin
    Spi { cs: u8 },
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceAddress::I2c(addr) => write!(f, "{:#04x}", addr),
            DeviceAddress::Spi { cs } => write!(f, "cs{}", cs),
        }
    }
}

/// Calendar date and time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DateTime {
    /// 2000..=2199
    pub year: u16,
    /// 1..=12
    pub month: u8,
    /// 1..=31
    pub day: u8,
    /// 1..=7
    pub weekday: u8,
    /// 0..=23
    pub hour: u8,
    /// 0..=59
    pub minute: u8,
    /// 0..=59
    pub second: u8,
}

/// Payload of a [`Sample`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleValue {
    /// No data
    Empty,
    /// Temperature and barometric pressure
    Environment { temperature_c: f32, pressure_pa: f32 },
    /// Real-time clock reading with die temperature
    Clock { time: DateTime, temperature_c: f32 },
    /// Input port levels, bit per pin
    Digital { inputs: u16 },
    /// Statistics of the last received packet
    Radio { rssi_dbm: i16, snr_db: f32, packets: u32 },
}

impl SampleValue {
    /// Pressure in hectopascals, for environment samples
    pub fn pressure_hpa(&self) -> Option<f32> {
        match self {
            SampleValue::Environment { pressure_pa, .. } => Some(pressure_pa / 100.0),
            _ => None,
        }
    }

    /// Temperature in degrees Celsius, where the sample carries one
    pub fn temperature_c(&self) -> Option<f32> {
        match *self {
            SampleValue::Environment { temperature_c, .. }
            | SampleValue::Clock { temperature_c, .. } => Some(temperature_c),
            _ => None,
        }
    }
}

/// Result of [`Driver::read_data`]
///
/// A failed read yields `valid = false`; the transport status holds the
/// cause.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub valid: bool,
    pub value: SampleValue,
}

impl Sample {
    /// Valid sample
    pub const fn new(value: SampleValue) -> Self {
        Self { valid: true, value }
    }

    /// Invalid, empty sample
    pub const fn invalid() -> Self {
        Self {
            valid: false,
            value: SampleValue::Empty,
        }
    }
}

impl<E> From<Result<SampleValue, E>> for Sample {
    fn from(result: Result<SampleValue, E>) -> Self {
        match result {
            Ok(value) => Sample::new(value),
            Err(_) => Sample::invalid(),
        }
    }
}

/// Per-instance driver bookkeeping
#[derive(Debug, Clone, Default)]
pub struct DriverState {
    initialized: bool,
    #[cfg(feature = "tier1")]
    operations: u32,
    #[cfg(feature = "tier1")]
    errors: u32,
}

impl DriverState {
    pub const fn new() -> Self {
        Self {
            initialized: false,
            #[cfg(feature = "tier1")]
            operations: 0,
            #[cfg(feature = "tier1")]
            errors: 0,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn set_initialized(&mut self, initialized: bool) {
        self.initialized = initialized;
    }

    /// `NotReady` unless initialized
    pub fn ensure_ready(&self) -> Result<(), DriverError> {
        if self.initialized {
            Ok(())
        } else {
            Err(DriverError::NotReady)
        }
    }

    /// Count the outcome of an operation and pass it through
    pub fn record<T, E>(&mut self, result: Result<T, E>) -> Result<T, E> {
        #[cfg(feature = "tier1")]
        match result {
            Ok(_) => self.operations = self.operations.wrapping_add(1),
            Err(_) => self.errors = self.errors.wrapping_add(1),
        }
        result
    }

    /// Successful operations since construction
    #[cfg(feature = "tier1")]
    pub fn operation_count(&self) -> u32 {
        self.operations
    }

    /// Failed operations since construction
    #[cfg(feature = "tier1")]
    pub fn error_count(&self) -> u32 {
        self.errors
    }
}

/// Tier-0 driver contract
///
/// Object safe, so heterogeneous drivers can sit behind `&mut dyn Driver`.
pub trait Driver {
    /// Short lowercase chip name, e.g. `"bmp280"`
    fn driver_id(&self) -> &'static str;

    /// Compiled tier
    fn driver_tier(&self) -> DriverTier {
        COMPILED_TIER
    }

    /// Bus location of the device
    fn address(&self) -> DeviceAddress;

    /// Identify the chip and bring it to its operating state
    ///
    /// On failure the driver stays uninitialized. Resource claims made
    /// before the failure are kept; the caller decides whether to release
    /// them.
    fn init(&mut self) -> Result<(), DriverError>;

    /// Stop the chip and release claims
    fn deinit(&mut self);

    fn is_initialized(&self) -> bool;

    /// Primary measurement; invalid when not initialized or the bus fails
    fn read_data(&mut self) -> Sample;

    /// Capability schema of the driver type
    fn schema(&self) -> &'static CapabilitySchema;
}

/// Drivers for chips at fixed I2C addresses
pub trait I2cAddressed {
    /// Addresses the chip can be strapped to
    fn valid_addresses() -> &'static [u8];

    fn supports_address(addr: u8) -> bool {
        Self::valid_addresses().contains(&addr)
    }
}

/// Tier-1 string-keyed parameter access
#[cfg(feature = "tier1")]
pub trait Configurable: Driver {
    /// Current value of a setting
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a name not in the schema.
    fn get_parameter(&self, name: &str) -> Result<ParamValue<'static>, DriverError>;

    /// Change a setting
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for unknown names or bad values, `AccessViolation`
    /// for read-only settings, `NotReady` before `init`.
    fn set_parameter(&mut self, name: &str, value: &ParamValue<'_>) -> Result<(), DriverError>;
}

/// Tier-2 register access
///
/// The default methods enforce the register map; drivers provide the map and
/// the bus the operational API already uses.
#[cfg(feature = "tier2")]
pub trait RegisterAccess: Driver {
    /// Static register map of the chip
    fn register_map(&self) -> &'static [RegisterDescriptor];

    /// Bus shared with the operational API
    fn register_bus(&mut self) -> &mut dyn RegisterBus;

    /// Descriptor by case-insensitive name
    fn find_register_by_name(&self, name: &str) -> Option<&'static RegisterDescriptor> {
        registers::find_by_name(self.register_map(), name)
    }

    /// Read `buf.len()` bytes starting at register `addr`
    fn reg_read(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), DriverError> {
        if !self.is_initialized() {
            return Err(DriverError::NotReady);
        }
        registers::check_access(self.register_map(), addr, buf.len(), registers::Direction::Read)?;
        let reg = u8::try_from(addr).map_err(|_| DriverError::InvalidArgument)?;
        self.register_bus().read_regs(reg, buf)?;
        Ok(())
    }

    /// Write `data` starting at register `addr`
    fn reg_write(&mut self, addr: u16, data: &[u8]) -> Result<(), DriverError> {
        if !self.is_initialized() {
            return Err(DriverError::NotReady);
        }
        registers::check_access(
            self.register_map(),
            addr,
            data.len(),
            registers::Direction::Write,
        )?;
        let reg = u8::try_from(addr).map_err(|_| DriverError::InvalidArgument)?;
        self.register_bus().write_regs(reg, data)?;
        log_debug!("{}: register {:#x} written", self.driver_id(), reg);
        Ok(())
    }
}
