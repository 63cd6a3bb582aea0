//! SPI transport
//!
//! Transfers happen only inside an explicit transaction. When the configured
//! `cs_pin` is not [`CS_UNMANAGED`] the transport asserts chip select on
//! [`SpiTransport::begin_transaction`] and releases it on
//! [`SpiTransport::end_transaction`]; otherwise chip select belongs to the
//! driver. Transactions do not nest.

use crate::core::traits::TimeSource;
use crate::platform::traits::{SpiBitOrder, SpiBus, SpiConfig, CS_UNMANAGED};

use super::status::TransportCore;
use super::{Result, Transport, TransportError, TransportState, TransportType};

/// SPI transport over an [`SpiBus`]
pub struct SpiTransport<B, C> {
    core: TransportCore,
    bus: B,
    clock: C,
    config: SpiConfig,
    in_transaction: bool,
}

impl<B: SpiBus, C: TimeSource> SpiTransport<B, C> {
    /// Create a transport called `name` with the default configuration
    pub fn new(name: &str, bus: B, clock: C) -> Self {
        let mut transport = Self {
            core: TransportCore::new(name, TransportType::Spi),
            bus,
            clock,
            config: SpiConfig::default(),
            in_transaction: false,
        };
        transport.mirror_config();
        transport
    }

    /// Replace the configuration
    pub fn configure(&mut self, config: SpiConfig) -> Result<()> {
        self.core.ensure_configurable()?;
        self.config = config;
        self.mirror_config();
        Ok(())
    }

    /// `configure` followed by `init`
    pub fn init_with(&mut self, config: SpiConfig) -> Result<()> {
        self.configure(config)?;
        self.init()
    }

    /// Typed configuration
    pub fn spi_config(&self) -> &SpiConfig {
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

    /// Whether a transaction is open
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Whether the transport drives chip select itself
    pub fn manages_cs(&self) -> bool {
        self.config.cs_pin != CS_UNMANAGED
    }

    fn mirror_config(&mut self) {
        let c = self.config;
        let map = self.core.config_mut();
        map.clear();
        let _ = map.set("mosi", format_args!("{}", c.mosi_pin));
        let _ = map.set("miso", format_args!("{}", c.miso_pin));
        let _ = map.set("sclk", format_args!("{}", c.sclk_pin));
        let _ = map.set("cs", format_args!("{}", c.cs_pin));
        let _ = map.set("speed", format_args!("{}", c.frequency));
        let _ = map.set("mode", format_args!("{}", c.mode.number()));
        let _ = map.set(
            "bit_order",
            format_args!(
                "{}",
                match c.bit_order {
                    SpiBitOrder::MsbFirst => "msb",
                    SpiBitOrder::LsbFirst => "lsb",
                }
            ),
        );
    }

    /// Open a transaction, asserting chip select when managed
    ///
    /// # Errors
    ///
    /// - `TransactionActive` if a transaction is already open
    /// - the platform failure if chip select cannot be driven
    pub fn begin_transaction(&mut self) -> Result<()> {
        let now = self.clock.now_us();
        self.core.check_ready(now, "begin_transaction")?;
        if self.in_transaction {
            return self
                .core
                .refuse(TransportError::TransactionActive, now, "begin_transaction");
        }
        self.bus.begin();
        if self.manages_cs() {
            if let Err(e) = self.bus.set_cs(self.config.cs_pin, true) {
                self.bus.end();
                self.core.record_failure(e.into(), now, "begin_transaction");
                return Err(e.into());
            }
        }
        self.in_transaction = true;
        Ok(())
    }

    /// Close the open transaction, releasing chip select when managed
    ///
    /// The transaction is closed even if chip select cannot be released.
    pub fn end_transaction(&mut self) -> Result<()> {
        let now = self.clock.now_us();
        if !self.in_transaction {
            return self
                .core
                .refuse(TransportError::NoTransaction, now, "end_transaction");
        }
        self.close(now)
    }

    fn close(&mut self, now: u64) -> Result<()> {
        let result = if self.manages_cs() {
            self.bus.set_cs(self.config.cs_pin, false)
        } else {
            Ok(())
        };
        self.bus.end();
        self.in_transaction = false;
        if let Err(e) = result {
            self.core.record_failure(e.into(), now, "end_transaction");
            return Err(e.into());
        }
        Ok(())
    }

    /// Run `f` inside a transaction
    ///
    /// The transaction is always ended; an error from `f` takes precedence
    /// over one from ending it.
    pub fn transaction<F, R>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Self) -> Result<R>,
    {
        self.begin_transaction()?;
        let result = f(self);
        let ended = self.end_transaction();
        let value = result?;
        ended?;
        Ok(value)
    }

    fn check_open(&mut self, op: &str) -> Result<()> {
        let now = self.clock.now_us();
        self.core.check_ready(now, op)?;
        if !self.in_transaction {
            return self.core.refuse(TransportError::NoTransaction, now, op);
        }
        Ok(())
    }

    fn finish<T>(&mut self, result: crate::platform::Result<T>, op: &str) -> Result<T> {
        let now = self.clock.now_us();
        self.core.complete(result.map_err(TransportError::from), now, op)
    }

    /// Full-duplex transfer, replacing `data` with the received bytes
    pub fn transfer(&mut self, data: &mut [u8]) -> Result<()> {
        self.check_open("transfer")?;
        let result = self.bus.transfer_in_place(data);
        self.finish(result, "transfer")
    }

    /// Transmit `data`, discarding what comes back
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.check_open("write")?;
        let result = self.bus.write(data);
        self.finish(result, "write")
    }

    /// Receive into `buffer` while clocking out 0xFF
    pub fn read(&mut self, buffer: &mut [u8]) -> Result<()> {
        self.check_open("read")?;
        let result = self.bus.read(buffer);
        self.finish(result, "read")
    }

    /// Transmit `out`, then receive into `buffer`, in the same transaction
    pub fn write_read(&mut self, out: &[u8], buffer: &mut [u8]) -> Result<()> {
        self.check_open("write_read")?;
        let result = self.bus.write(out).and_then(|()| self.bus.read(buffer));
        self.finish(result, "write_read")
    }
}

impl<B: SpiBus, C: TimeSource> Transport for SpiTransport<B, C> {
    fn core(&self) -> &TransportCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TransportCore {
        &mut self.core
    }

    fn capabilities(&self) -> &'static str {
        if self.manages_cs() {
            "spi:full_duplex,transactions,managed_cs"
        } else {
            "spi:full_duplex,transactions"
        }
    }

    fn init(&mut self) -> Result<()> {
        if self.core.state() == TransportState::Error {
            self.deinit();
        }
        if self.core.begin_init()? {
            return Ok(());
        }
        let managed_cs = self.manages_cs().then_some(self.config.cs_pin);
        let result = if self.config.frequency == 0 {
            Err(TransportError::InvalidArgument)
        } else {
            self.bus
                .configure(&self.config)
                .and_then(|()| match managed_cs {
                    Some(pin) => self.bus.set_cs(pin, false),
                    None => Ok(()),
                })
                .map_err(TransportError::from)
        };
        let now = self.clock.now_us();
        self.core.finish_init(result, now)
    }

    fn deinit(&mut self) {
        if self.in_transaction {
            log_warn!("SPI {}: deinit inside a transaction", self.core.name());
            let now = self.clock.now_us();
            let _ = self.close(now);
        }
        if self.core.state() != TransportState::Uninitialized {
            self.bus.release();
        }
        self.core.deinit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::{MockClock, MockSpi, MockSpiDevice};

    fn ready(cs_pin: u8) -> SpiTransport<MockSpi, MockClock> {
        let mut bus = MockSpi::new();
        bus.add_device(MockSpiDevice::new(5).with_register(0x42, 0x12));
        let mut spi = SpiTransport::new("spi0", bus, MockClock::new());
        spi.init_with(SpiConfig {
            cs_pin,
            ..SpiConfig::default()
        })
        .unwrap();
        spi
    }

    #[test]
    fn test_managed_cs_brackets_transaction() {
        let mut spi = ready(5);
        assert_eq!(spi.bus().cs_history(), &[(5, false)]);

        spi.begin_transaction().unwrap();
        assert_eq!(spi.bus().cs_history().last(), Some(&(5, true)));
        let mut frame = [0x42, 0x00];
        spi.transfer(&mut frame).unwrap();
        spi.end_transaction().unwrap();

        assert_eq!(frame[1], 0x12);
        assert_eq!(spi.bus().cs_history().last(), Some(&(5, false)));
        assert_eq!(spi.bus().frames(), 1);
    }

    #[test]
    fn test_transactions_do_not_nest() {
        let mut spi = ready(5);
        spi.begin_transaction().unwrap();
        assert_eq!(spi.begin_transaction(), Err(TransportError::TransactionActive));
        assert!(spi.in_transaction());
        spi.end_transaction().unwrap();
        assert_eq!(spi.end_transaction(), Err(TransportError::NoTransaction));
        // Refusals do not change state
        assert_eq!(spi.state(), TransportState::Ready);
    }

    #[test]
    fn test_transfer_requires_transaction() {
        let mut spi = ready(CS_UNMANAGED);
        let mut buf = [0u8; 2];
        assert_eq!(spi.transfer(&mut buf), Err(TransportError::NoTransaction));
        assert_eq!(spi.write(&[1]), Err(TransportError::NoTransaction));
        assert_eq!(spi.read(&mut buf), Err(TransportError::NoTransaction));
    }

    #[test]
    fn test_unmanaged_cs_leaves_pin_alone() {
        let mut spi = ready(CS_UNMANAGED);
        let value = spi
            .transaction(|spi| {
                let mut byte = [0u8];
                spi.write_read(&[0x42], &mut byte)?;
                Ok(byte[0])
            })
            .unwrap();
        assert_eq!(value, 0x12);
        assert!(spi.bus().cs_history().is_empty());
        assert_eq!(spi.capabilities(), "spi:full_duplex,transactions");
    }

    #[test]
    fn test_transaction_closure_always_ends() {
        let mut spi = ready(5);
        spi.bus_mut().fail_next(1);
        let result: Result<()> = spi.transaction(|spi| spi.write(&[0x80, 0x01]));
        assert_eq!(result, Err(TransportError::BusError));
        assert!(!spi.in_transaction());
        assert!(!spi.bus().in_frame());
        assert_eq!(spi.bus().cs_history().last(), Some(&(5, false)));
        assert_eq!(spi.state(), TransportState::Error);
    }

    #[test]
    fn test_deinit_force_ends_transaction() {
        let mut spi = ready(5);
        spi.begin_transaction().unwrap();
        spi.deinit();
        assert!(!spi.in_transaction());
        assert_eq!(spi.bus().cs_history().last(), Some(&(5, false)));
        assert!(spi.bus().config().is_none());
    }

    #[test]
    fn test_config_mirror_and_zero_frequency() {
        let mut spi = SpiTransport::new("spi1", MockSpi::new(), MockClock::new());
        assert_eq!(spi.config().get("cs"), Some("255"));
        assert_eq!(spi.config().get("mode"), Some("0"));
        let result = spi.init_with(SpiConfig {
            frequency: 0,
            ..SpiConfig::default()
        });
        assert_eq!(result, Err(TransportError::InvalidArgument));
        assert_eq!(spi.state(), TransportState::Error);
    }
}
