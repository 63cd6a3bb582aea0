//! Transport registry
//!
//! Ordered, name-keyed collection of transport handles. Enumeration follows
//! insertion order so tier-based initialization is deterministic.
//!
//! The registry never deinitializes anything on its own; shutdown belongs to
//! whoever owns the transports.
//!
//! A process-wide instance is available through [`with_global`]; tests and
//! multi-board hosts can build their own [`TransportRegistry`].

use core::cell::RefCell;
use core::fmt;
use critical_section::Mutex;

use super::status::TransportState;
use super::{ManagedTransport, TransportTier, TransportType};

/// Maximum number of registered transports
pub const MAX_TRANSPORTS: usize = 16;

/// Registry errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistryError {
    /// A transport with the same name is already registered
    Duplicate,
    /// No free registry slot
    Full,
    /// No transport with that name
    NotFound,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Duplicate => write!(f, "transport name already registered"),
            RegistryError::Full => write!(f, "transport registry full"),
            RegistryError::NotFound => write!(f, "transport not found"),
        }
    }
}

/// Ordered transport registry
pub struct TransportRegistry<'a, const N: usize = MAX_TRANSPORTS> {
    entries: heapless::Vec<&'a dyn ManagedTransport, N>,
}

impl<'a, const N: usize> TransportRegistry<'a, N> {
    /// Create an empty registry (const for static initialization)
    pub const fn new() -> Self {
        Self {
            entries: heapless::Vec::new(),
        }
    }

    /// Register `transport` under its name
    ///
    /// # Errors
    ///
    /// - `Duplicate` if the name is taken
    /// - `Full` if `N` transports are registered
    pub fn register(&mut self, transport: &'a dyn ManagedTransport) -> Result<(), RegistryError> {
        if self.lookup(transport.name()).is_some() {
            log_warn!("Registry: duplicate transport {}", transport.name());
            return Err(RegistryError::Duplicate);
        }
        self.entries
            .push(transport)
            .map_err(|_| RegistryError::Full)?;
        log_debug!(
            "Registry: {} ({}) registered",
            transport.name(),
            transport.transport_type().as_str()
        );
        Ok(())
    }

    /// Remove the transport called `name`, keeping the order of the others
    pub fn unregister(&mut self, name: &str) -> Result<&'a dyn ManagedTransport, RegistryError> {
        let index = self
            .entries
            .iter()
            .position(|t| t.name() == name)
            .ok_or(RegistryError::NotFound)?;
        Ok(self.entries.remove(index))
    }

    /// Transport called `name`
    pub fn lookup(&self, name: &str) -> Option<&'a dyn ManagedTransport> {
        self.entries.iter().copied().find(|t| t.name() == name)
    }

    /// First registered transport of `kind`
    pub fn first_of_type(&self, kind: TransportType) -> Option<&'a dyn ManagedTransport> {
        self.entries
            .iter()
            .copied()
            .find(|t| t.transport_type() == kind)
    }

    /// All transports in registration order
    pub fn iter(&self) -> impl Iterator<Item = &'a dyn ManagedTransport> + '_ {
        self.entries.iter().copied()
    }

    /// Transports of one tier
    pub fn iter_tier(
        &self,
        tier: TransportTier,
    ) -> impl Iterator<Item = &'a dyn ManagedTransport> + '_ {
        self.iter().filter(move |t| t.tier() == tier)
    }

    /// Transports currently `Ready`
    pub fn iter_ready(&self) -> impl Iterator<Item = &'a dyn ManagedTransport> + '_ {
        self.iter().filter(|t| t.state() == TransportState::Ready)
    }

    /// Number of transports per tier, indexed by tier number
    pub fn counts_by_tier(&self) -> [usize; 3] {
        let mut counts = [0usize; 3];
        for t in self.iter() {
            counts[t.tier().index()] += 1;
        }
        counts
    }

    /// Number of registered transports
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Initialize every transport that is not yet ready
    ///
    /// Returns `true` only if every attempted init succeeded. Disabled
    /// transports are skipped.
    pub fn init_all(&self) -> bool {
        init_each(self.iter())
    }

    /// Initialize every not-yet-ready transport of `tier`
    pub fn init_tier(&self, tier: TransportTier) -> bool {
        init_each(self.iter_tier(tier))
    }

    /// Write one `<name> <type> tier<N> <state> ok=<n> err=<n>` line per transport
    pub fn dump<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        for t in self.iter() {
            let status = t.status();
            writeln!(
                out,
                "{} {} tier{} {} ok={} err={}",
                t.name(),
                t.transport_type().as_str(),
                t.tier().as_u8(),
                t.state().as_str(),
                status.success_count,
                status.error_count
            )?;
        }
        Ok(())
    }

    /// Drop every registration
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

fn init_each<'t>(transports: impl Iterator<Item = &'t dyn ManagedTransport>) -> bool {
    let mut all_ok = true;
    for t in transports {
        if matches!(t.state(), TransportState::Ready | TransportState::Disabled) {
            continue;
        }
        if t.init().is_err() {
            log_error!("Registry: init of {} failed", t.name());
            all_ok = false;
        }
    }
    all_ok
}

impl<const N: usize> Default for TransportRegistry<'_, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide registry
static REGISTRY: Mutex<RefCell<TransportRegistry<'static, MAX_TRANSPORTS>>> =
    Mutex::new(RefCell::new(TransportRegistry::new()));

/// Run `f` with exclusive access to the process-wide registry
///
/// Transports registered here must live for `'static` (typically statics or
/// leaked board-support singletons).
pub fn with_global<F, R>(f: F) -> R
where
    F: FnOnce(&mut TransportRegistry<'static, MAX_TRANSPORTS>) -> R,
{
    critical_section::with(|cs| f(&mut REGISTRY.borrow(cs).borrow_mut()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::{MockClock, MockGpio, MockI2c, MockSpi};
    use crate::transport::{
        GpioTransport, I2cTransport, SharedTransport, SpiTransport, Transport,
    };
    use serial_test::serial;
    use std::boxed::Box;
    use std::string::String;

    type I2c = SharedTransport<I2cTransport<MockI2c, MockClock>>;

    fn i2c(name: &str) -> I2c {
        SharedTransport::new(I2cTransport::new(name, MockI2c::new(), MockClock::new()))
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let a = i2c("i2c0");
        let b = i2c("i2c0");
        let mut reg: TransportRegistry<'_, 4> = TransportRegistry::new();

        assert_eq!(reg.register(&a), Ok(()));
        assert_eq!(reg.register(&b), Err(RegistryError::Duplicate));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_full_registry() {
        let a = i2c("i2c0");
        let b = i2c("i2c1");
        let mut reg: TransportRegistry<'_, 1> = TransportRegistry::new();
        reg.register(&a).unwrap();
        assert_eq!(reg.register(&b), Err(RegistryError::Full));
    }

    #[test]
    fn test_lookup_order_and_unregister() {
        let gpio =
            SharedTransport::new(GpioTransport::new("gpio", MockGpio::new(30), MockClock::new()));
        let i2c0 = i2c("i2c0");
        let spi0 =
            SharedTransport::new(SpiTransport::new("spi0", MockSpi::new(), MockClock::new()));
        let mut reg: TransportRegistry<'_, 4> = TransportRegistry::new();
        reg.register(&gpio).unwrap();
        reg.register(&i2c0).unwrap();
        reg.register(&spi0).unwrap();

        let names: std::vec::Vec<&str> = reg.iter().map(|t| t.name()).collect();
        assert_eq!(names, ["gpio", "i2c0", "spi0"]);
        assert_eq!(
            reg.first_of_type(TransportType::Spi).map(|t| t.name()),
            Some("spi0")
        );
        assert_eq!(reg.counts_by_tier(), [1, 2, 0]);

        assert!(reg.unregister("i2c0").is_ok());
        assert!(reg.unregister("i2c0").is_err());
        assert!(reg.lookup("i2c0").is_none());
        let names: std::vec::Vec<&str> = reg.iter().map(|t| t.name()).collect();
        assert_eq!(names, ["gpio", "spi0"]);
    }

    #[test]
    fn test_init_all_and_tier() {
        let gpio =
            SharedTransport::new(GpioTransport::new("gpio", MockGpio::new(30), MockClock::new()));
        let i2c0 = i2c("i2c0");
        let i2c1 = i2c("i2c1");
        i2c1.lock(|t| t.disable());

        let mut reg: TransportRegistry<'_, 4> = TransportRegistry::new();
        reg.register(&gpio).unwrap();
        reg.register(&i2c0).unwrap();
        reg.register(&i2c1).unwrap();

        assert!(reg.init_tier(TransportTier::Tier0));
        assert_eq!(reg.iter_ready().count(), 1);

        assert!(reg.init_all());
        assert_eq!(reg.iter_ready().count(), 2);
        assert_eq!(i2c1.lock(|t| t.state()), TransportState::Disabled);
    }

    #[test]
    fn test_init_all_reports_failure() {
        let bad = SharedTransport::new(I2cTransport::new("i2c0", MockI2c::new(), MockClock::new()));
        bad.lock(|t| {
            let mut config = *t.i2c_config();
            config.speed_hz = 0;
            t.configure(config)
        })
        .unwrap();
        let good = i2c("i2c1");

        let mut reg: TransportRegistry<'_, 4> = TransportRegistry::new();
        reg.register(&bad).unwrap();
        reg.register(&good).unwrap();

        assert!(!reg.init_all());
        assert_eq!(good.lock(|t| t.state()), TransportState::Ready);
        assert_eq!(bad.lock(|t| t.state()), TransportState::Error);
    }

    #[test]
    fn test_dump() {
        let i2c0 = i2c("i2c0");
        let mut reg: TransportRegistry<'_, 2> = TransportRegistry::new();
        reg.register(&i2c0).unwrap();
        reg.init_all();

        let mut out = String::new();
        reg.dump(&mut out).unwrap();
        assert_eq!(out, "i2c0 i2c tier1 ready ok=0 err=0\n");
    }

    #[test]
    #[serial]
    fn test_global_registry() {
        let leaked: &'static I2c = Box::leak(Box::new(i2c("i2c-global")));
        with_global(|reg| {
            reg.clear();
            reg.register(leaked).unwrap();
        });

        let found = with_global(|reg| reg.lookup("i2c-global").map(|t| t.transport_type()));
        assert_eq!(found, Some(TransportType::I2c));
        with_global(|reg| reg.clear());
    }
}
