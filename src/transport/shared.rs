//! Critical-section guarded transport
//!
//! Same pattern as the process-wide singletons: a
//! `critical_section::Mutex<RefCell<T>>` whose closure-based access holds the
//! critical section for the whole call. Name and type are copied out at
//! construction so the registry can inspect them without locking.

use core::cell::RefCell;
use critical_section::Mutex;

use super::status::{Status, TransportName, TransportState};
use super::{ManagedTransport, Result, Transport, TransportType};

/// Transport shared between drivers
pub struct SharedTransport<T> {
    name: TransportName,
    kind: TransportType,
    inner: Mutex<RefCell<T>>,
}

impl<T: Transport> SharedTransport<T> {
    /// Wrap `transport`
    pub fn new(transport: T) -> Self {
        let mut name = TransportName::new();
        // Core names are already bounded to the same capacity
        let _ = name.push_str(transport.name());
        Self {
            name,
            kind: transport.transport_type(),
            inner: Mutex::new(RefCell::new(transport)),
        }
    }

    /// Run `f` with exclusive access to the transport
    ///
    /// The critical section covers the whole closure, so every bus operation
    /// issued inside it is atomic with respect to other users. Do not call
    /// `lock` again on the same transport from inside `f`.
    pub fn lock<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        critical_section::with(|cs| f(&mut self.inner.borrow(cs).borrow_mut()))
    }

    /// Unwrap the transport
    pub fn into_inner(self) -> T {
        self.inner.into_inner().into_inner()
    }
}

impl<T: Transport + Send> ManagedTransport for SharedTransport<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn transport_type(&self) -> TransportType {
        self.kind
    }

    fn state(&self) -> TransportState {
        self.lock(|t| t.state())
    }

    fn status(&self) -> Status {
        self.lock(|t| t.status().clone())
    }

    fn capabilities(&self) -> &'static str {
        self.lock(|t| t.capabilities())
    }

    fn init(&self) -> Result<()> {
        self.lock(|t| t.init())
    }

    fn deinit(&self) {
        self.lock(|t| t.deinit())
    }

    fn reset(&self) -> Result<()> {
        self.lock(|t| t.reset())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::{MockClock, MockI2c, MockI2cDevice};
    use crate::transport::I2cTransport;

    #[test]
    fn test_shared_transport_lock_and_managed_view() {
        let mut bus = MockI2c::new();
        bus.add_device(MockI2cDevice::new(0x68).with_register(0x0F, 0x88));
        let shared = SharedTransport::new(I2cTransport::new("i2c0", bus, MockClock::new()));

        let managed: &dyn ManagedTransport = &shared;
        assert_eq!(managed.name(), "i2c0");
        assert_eq!(managed.state(), TransportState::Uninitialized);

        managed.init().unwrap();
        assert_eq!(managed.state(), TransportState::Ready);

        let value = shared.lock(|i2c| i2c.read_reg(0x68, 0x0F)).unwrap();
        assert_eq!(value, 0x88);
        assert_eq!(managed.status().success_count, 1);
    }
}
