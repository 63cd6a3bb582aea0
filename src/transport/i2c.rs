//! I2C transport
//!
//! Owns one I2C controller and serializes every transfer on it. Addresses are
//! 7-bit and must lie in `0x08..=0x77`; reserved addresses are refused before
//! touching the bus.
//!
//! `write_read` keeps both phases inside one call on `&mut self`: with a
//! repeated START when the controller supports it, otherwise as a STOP-separated
//! write then read. Wrapped in a [`SharedTransport`](super::SharedTransport),
//! the whole call runs in one critical section.

use crate::core::traits::TimeSource;
use crate::platform::traits::{I2cBus, I2cConfig, I2cMode};

use super::status::TransportCore;
use super::{Result, Transport, TransportError, TransportState, TransportType};

/// Lowest non-reserved 7-bit address
pub const I2C_ADDR_MIN: u8 = 0x08;
/// Highest non-reserved 7-bit address
pub const I2C_ADDR_MAX: u8 = 0x77;
/// Largest payload accepted by the register helpers
pub const MAX_REG_BURST: usize = 32;

/// Whether `addr` is a usable 7-bit device address
pub const fn is_valid_address(addr: u8) -> bool {
    addr >= I2C_ADDR_MIN && addr <= I2C_ADDR_MAX
}

/// I2C transport over an [`I2cBus`]
pub struct I2cTransport<B, C> {
    core: TransportCore,
    bus: B,
    clock: C,
    config: I2cConfig,
}

impl<B: I2cBus, C: TimeSource> I2cTransport<B, C> {
    /// Create a transport called `name` with the default configuration
    pub fn new(name: &str, bus: B, clock: C) -> Self {
        let mut transport = Self {
            core: TransportCore::new(name, TransportType::I2c),
            bus,
            clock,
            config: I2cConfig::default(),
        };
        transport.mirror_config();
        transport
    }

    /// Replace the configuration
    ///
    /// # Errors
    ///
    /// `ConfigFrozen` unless the transport is uninitialized or disabled.
    pub fn configure(&mut self, config: I2cConfig) -> Result<()> {
        self.core.ensure_configurable()?;
        self.config = config;
        self.mirror_config();
        Ok(())
    }

    /// `configure` followed by `init`
    pub fn init_with(&mut self, config: I2cConfig) -> Result<()> {
        self.configure(config)?;
        self.init()
    }

    /// Typed configuration
    pub fn i2c_config(&self) -> &I2cConfig {
        &self.config
    }

    /// Underlying bus
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Mutable underlying bus
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Clock used for timestamps and delays
    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn mirror_config(&mut self) {
        let c = self.config;
        let map = self.core.config_mut();
        map.clear();
        let _ = map.set("sda", format_args!("{}", c.sda_pin));
        let _ = map.set("scl", format_args!("{}", c.scl_pin));
        let _ = map.set("speed", format_args!("{}", c.speed_hz));
        let _ = map.set(
            "mode",
            format_args!(
                "{}",
                match c.mode {
                    I2cMode::Master => "master",
                    I2cMode::Slave => "slave",
                }
            ),
        );
        let _ = map.set("slave_address", format_args!("{:#x}", c.slave_address));
        let _ = map.set("timeout_us", format_args!("{}", c.timeout_us));
    }

    /// Common preconditions of master transfers
    fn begin_op(&mut self, op: &str) -> Result<u64> {
        let now = self.clock.now_us();
        self.core.check_ready(now, op)?;
        if self.config.mode != I2cMode::Master {
            return self.core.refuse(TransportError::Unsupported, now, op);
        }
        Ok(now)
    }

    fn begin_addressed(&mut self, addr: u8, op: &str) -> Result<u64> {
        let now = self.begin_op(op)?;
        if !is_valid_address(addr) {
            return self.core.refuse(TransportError::InvalidAddress, now, op);
        }
        Ok(now)
    }

    fn finish<T>(&mut self, result: crate::platform::Result<T>, op: &str) -> Result<T> {
        let now = self.clock.now_us();
        self.core.complete(result.map_err(TransportError::from), now, op)
    }

    /// Probe every valid address, storing responders in `found`
    ///
    /// Returns the number of responders stored. Responders beyond
    /// `found.len()` are counted in the log but not stored.
    pub fn scan(&mut self, found: &mut [u8]) -> Result<usize> {
        self.begin_op("scan")?;
        let mut stored = 0;
        let mut seen = 0usize;
        for addr in I2C_ADDR_MIN..=I2C_ADDR_MAX {
            if self.bus.probe(addr) {
                if let Some(slot) = found.get_mut(stored) {
                    *slot = addr;
                    stored += 1;
                }
                seen += 1;
            }
        }
        if seen > stored {
            log_warn!(
                "I2C {}: scan found {} devices, buffer holds {}",
                self.core.name(),
                seen,
                stored
            );
        } else {
            log_debug!("I2C {}: scan found {} devices", self.core.name(), seen);
        }
        self.core.record_success();
        Ok(stored)
    }

    /// Whether a device acknowledges `addr`
    ///
    /// A missing device is not a transport failure and is not counted.
    pub fn probe(&mut self, addr: u8) -> Result<bool> {
        self.begin_addressed(addr, "probe")?;
        Ok(self.bus.probe(addr))
    }

    /// Write `data` to `addr`
    pub fn write(&mut self, addr: u8, data: &[u8]) -> Result<()> {
        self.begin_addressed(addr, "write")?;
        let result = self.bus.write(addr, data);
        self.finish(result, "write")
    }

    /// Read `buffer.len()` bytes from `addr`
    pub fn read(&mut self, addr: u8, buffer: &mut [u8]) -> Result<()> {
        self.begin_addressed(addr, "read")?;
        let result = self.bus.read(addr, buffer);
        self.finish(result, "read")
    }

    /// Write `out` then read into `buffer` without releasing the bus to
    /// another user
    pub fn write_read(&mut self, addr: u8, out: &[u8], buffer: &mut [u8]) -> Result<()> {
        self.begin_addressed(addr, "write_read")?;
        let result = if self.bus.supports_repeated_start() {
            self.bus.write_read(addr, out, buffer)
        } else {
            self.bus
                .write(addr, out)
                .and_then(|()| self.bus.read(addr, buffer))
        };
        self.finish(result, "write_read")
    }

    /// Write one register
    pub fn write_reg(&mut self, addr: u8, reg: u8, value: u8) -> Result<()> {
        self.write(addr, &[reg, value])
    }

    /// Write consecutive registers starting at `reg`
    ///
    /// # Errors
    ///
    /// `BufferOverflow` if `values` is longer than [`MAX_REG_BURST`].
    pub fn write_regs(&mut self, addr: u8, reg: u8, values: &[u8]) -> Result<()> {
        if values.len() > MAX_REG_BURST {
            let now = self.clock.now_us();
            return self.core.refuse(TransportError::BufferOverflow, now, "write_regs");
        }
        let mut frame = [0u8; MAX_REG_BURST + 1];
        frame[0] = reg;
        frame[1..=values.len()].copy_from_slice(values);
        self.write(addr, &frame[..=values.len()])
    }

    /// Read one register
    pub fn read_reg(&mut self, addr: u8, reg: u8) -> Result<u8> {
        let mut value = [0u8; 1];
        self.write_read(addr, &[reg], &mut value)?;
        Ok(value[0])
    }

    /// Read consecutive registers starting at `reg`
    pub fn read_regs(&mut self, addr: u8, reg: u8, buffer: &mut [u8]) -> Result<()> {
        self.write_read(addr, &[reg], buffer)
    }
}

impl<B: I2cBus, C: TimeSource> Transport for I2cTransport<B, C> {
    fn core(&self) -> &TransportCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TransportCore {
        &mut self.core
    }

    fn capabilities(&self) -> &'static str {
        match (self.config.mode, self.bus.supports_repeated_start()) {
            (I2cMode::Slave, _) => "i2c:slave",
            (I2cMode::Master, true) => "i2c:master,scan,repeated_start",
            (I2cMode::Master, false) => "i2c:master,scan",
        }
    }

    fn init(&mut self) -> Result<()> {
        if self.core.state() == TransportState::Error {
            self.deinit();
        }
        if self.core.begin_init()? {
            return Ok(());
        }
        let result = if self.config.speed_hz == 0 {
            Err(TransportError::InvalidArgument)
        } else if self.config.mode == I2cMode::Slave
            && !is_valid_address(self.config.slave_address)
        {
            Err(TransportError::InvalidAddress)
        } else {
            self.bus.configure(&self.config).map_err(TransportError::from)
        };
        if result.is_ok() {
            log_debug!(
                "I2C {}: sda={} scl={} speed={}",
                self.core.name(),
                self.config.sda_pin,
                self.config.scl_pin,
                self.config.speed_hz
            );
        }
        let now = self.clock.now_us();
        self.core.finish_init(result, now)
    }

    fn deinit(&mut self) {
        if self.core.state() != TransportState::Uninitialized {
            self.bus.release();
        }
        self.core.deinit();
    }
}
