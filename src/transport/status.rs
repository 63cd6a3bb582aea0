//! Transport lifecycle state and health statistics
//!
//! [`TransportCore`] carries the bookkeeping shared by every transport: name,
//! type, state machine, configuration map and [`Status`] counters. Concrete
//! transports embed one and route every operation outcome through it.
//!
//! ```text
//! Uninitialized ──init()──▶ Initializing ──ok──▶ Ready
//!                                    └─fail──▶ Error
//! Ready ──op/fail──▶ Error     Error ──reset()──▶ Uninitialized
//! Any   ──deinit()─▶ Uninitialized
//! ```

use core::fmt::{self, Write};
use heapless::String;

use super::config::TransportConfig;
use super::{TransportError, TransportTier, TransportType};

/// Maximum transport name length
pub const NAME_LEN: usize = 16;
/// Maximum length of the last-error breadcrumb
pub const ERROR_MSG_LEN: usize = 48;

/// Transport name
pub type TransportName = String<NAME_LEN>;

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportState {
    /// Constructed or deinitialized
    Uninitialized,
    /// `init()` in progress
    Initializing,
    /// Operational
    Ready,
    /// Last operation failed; operations are still permitted
    Error,
    /// Administratively disabled; skipped by the registry
    Disabled,
}

impl TransportState {
    /// Lowercase name used in dumps
    pub const fn as_str(self) -> &'static str {
        match self {
            TransportState::Uninitialized => "uninitialized",
            TransportState::Initializing => "initializing",
            TransportState::Ready => "ready",
            TransportState::Error => "error",
            TransportState::Disabled => "disabled",
        }
    }
}

/// Health snapshot
///
/// Counters are monotonic for the lifetime of the transport (they survive
/// `deinit`/`reset`). `init_time_us` is the first successful init and is never
/// zero once set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Status {
    /// Successful transactions
    pub success_count: u32,
    /// Failed transactions and refused requests
    pub error_count: u32,
    /// Timestamp of the first successful init (0 = never)
    pub init_time_us: u64,
    /// Timestamp of the last error (0 = never)
    pub last_error_time_us: u64,
    /// Last error kind
    pub last_error: Option<TransportError>,
    /// Last error breadcrumb (`"<operation>: <error>"`)
    pub last_error_msg: String<ERROR_MSG_LEN>,
}

/// Writer that silently truncates at capacity
struct Truncating<'a, const N: usize>(&'a mut String<N>);

impl<const N: usize> Write for Truncating<'_, N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}

/// Shared transport bookkeeping
#[derive(Debug, Clone)]
pub struct TransportCore {
    name: TransportName,
    kind: TransportType,
    state: TransportState,
    config: TransportConfig,
    status: Status,
}

impl TransportCore {
    /// Create the core for a transport called `name` (truncated to 16 bytes)
    pub fn new(name: &str, kind: TransportType) -> Self {
        let mut owned = TransportName::new();
        let _ = Truncating(&mut owned).write_str(name);
        Self {
            name: owned,
            kind,
            state: TransportState::Uninitialized,
            config: TransportConfig::new(),
            status: Status::default(),
        }
    }

    /// Transport name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transport type
    pub fn kind(&self) -> TransportType {
        self.kind
    }

    /// Transport tier
    pub fn tier(&self) -> TransportTier {
        self.kind.tier()
    }

    /// Current state
    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Health snapshot
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Configuration map
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Mutable configuration map
    ///
    /// Transports rebuild the map from their typed configuration in
    /// `configure`; callers go through [`ensure_configurable`](Self::ensure_configurable) first.
    pub fn config_mut(&mut self) -> &mut TransportConfig {
        &mut self.config
    }

    /// Refuse reconfiguration while the configuration is frozen
    pub fn ensure_configurable(&self) -> Result<(), TransportError> {
        match self.state {
            TransportState::Uninitialized | TransportState::Disabled => Ok(()),
            TransportState::Initializing | TransportState::Ready | TransportState::Error => {
                Err(TransportError::ConfigFrozen)
            }
        }
    }

    /// Enter `Initializing`
    ///
    /// Returns `Ok(true)` when the transport is already `Ready` and init can
    /// be skipped.
    pub fn begin_init(&mut self) -> Result<bool, TransportError> {
        match self.state {
            TransportState::Ready => Ok(true),
            TransportState::Disabled => Err(TransportError::Disabled),
            _ => {
                self.state = TransportState::Initializing;
                Ok(false)
            }
        }
    }

    /// Leave `Initializing` with the outcome of the platform setup
    pub fn finish_init(
        &mut self,
        result: Result<(), TransportError>,
        now_us: u64,
    ) -> Result<(), TransportError> {
        match result {
            Ok(()) => {
                if self.status.init_time_us == 0 {
                    self.status.init_time_us = now_us.max(1);
                }
                self.state = TransportState::Ready;
                log_info!("Transport {} ready", self.name.as_str());
                Ok(())
            }
            Err(e) => {
                self.record_failure(e, now_us, "init");
                log_error!("Transport {} init failed", self.name.as_str());
                Err(e)
            }
        }
    }

    /// Return to `Uninitialized`
    pub fn deinit(&mut self) {
        if self.state != TransportState::Uninitialized {
            log_debug!("Transport {} deinit", self.name.as_str());
        }
        self.state = TransportState::Uninitialized;
    }

    /// Enter `Disabled`
    pub fn disable(&mut self) {
        self.state = TransportState::Disabled;
    }

    /// Refuse operations unless `Ready` or `Error`
    pub fn check_ready(&mut self, now_us: u64, op: &str) -> Result<(), TransportError> {
        match self.state {
            TransportState::Ready | TransportState::Error => Ok(()),
            TransportState::Disabled => self.refuse(TransportError::Disabled, now_us, op),
            TransportState::Uninitialized | TransportState::Initializing => {
                self.refuse(TransportError::NotInitialized, now_us, op)
            }
        }
    }

    /// Count a successful transaction
    pub fn record_success(&mut self) {
        self.status.success_count = self.status.success_count.saturating_add(1);
    }

    /// Count a failed transaction and enter `Error`
    pub fn record_failure(&mut self, error: TransportError, now_us: u64, op: &str) {
        self.note_error(error, now_us, op);
        if matches!(
            self.state,
            TransportState::Ready | TransportState::Initializing
        ) {
            log_warn!(
                "Transport {} -> error ({}: {})",
                self.name.as_str(),
                op,
                error.as_str()
            );
            self.state = TransportState::Error;
        }
    }

    /// Count a refused request without changing state
    pub fn refuse<T>(
        &mut self,
        error: TransportError,
        now_us: u64,
        op: &str,
    ) -> Result<T, TransportError> {
        self.note_error(error, now_us, op);
        Err(error)
    }

    /// Record the outcome of a transaction and pass it through
    pub fn complete<T>(
        &mut self,
        result: Result<T, TransportError>,
        now_us: u64,
        op: &str,
    ) -> Result<T, TransportError> {
        match result {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => {
                self.record_failure(error, now_us, op);
                Err(error)
            }
        }
    }

    fn note_error(&mut self, error: TransportError, now_us: u64, op: &str) {
        self.status.error_count = self.status.error_count.saturating_add(1);
        self.status.last_error_time_us = now_us.max(1);
        self.status.last_error = Some(error);
        self.status.last_error_msg.clear();
        let _ = write!(
            Truncating(&mut self.status.last_error_msg),
            "{}: {}",
            op,
            error
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core() -> TransportCore {
        TransportCore::new("i2c0", TransportType::I2c)
    }

    #[test]
    fn test_init_success_sets_timestamp() {
        let mut c = core();
        assert_eq!(c.begin_init(), Ok(false));
        assert_eq!(c.state(), TransportState::Initializing);
        c.finish_init(Ok(()), 0).unwrap();
        assert_eq!(c.state(), TransportState::Ready);
        assert_eq!(c.status().init_time_us, 1);

        // First-init timestamp is kept across reinit
        c.deinit();
        c.begin_init().unwrap();
        c.finish_init(Ok(()), 5_000).unwrap();
        assert_eq!(c.status().init_time_us, 1);
    }

    #[test]
    fn test_init_failure_enters_error_with_message() {
        let mut c = core();
        c.begin_init().unwrap();
        assert!(c.finish_init(Err(TransportError::BusError), 42).is_err());
        assert_eq!(c.state(), TransportState::Error);
        assert_eq!(c.status().error_count, 1);
        assert_eq!(c.status().last_error_msg.as_str(), "init: bus error");
        assert_eq!(c.status().last_error_time_us, 42);
    }

    #[test]
    fn test_refusal_counts_without_state_change() {
        let mut c = core();
        c.begin_init().unwrap();
        c.finish_init(Ok(()), 10).unwrap();

        let r: Result<(), _> = c.refuse(TransportError::InvalidAddress, 20, "write");
        assert_eq!(r, Err(TransportError::InvalidAddress));
        assert_eq!(c.state(), TransportState::Ready);
        assert_eq!(c.status().error_count, 1);
        assert_eq!(c.status().last_error, Some(TransportError::InvalidAddress));
    }

    #[test]
    fn test_complete_counts_and_transitions() {
        let mut c = core();
        c.begin_init().unwrap();
        c.finish_init(Ok(()), 10).unwrap();

        assert_eq!(c.complete(Ok(7u8), 11, "read"), Ok(7));
        assert_eq!(c.status().success_count, 1);

        assert!(c.complete::<()>(Err(TransportError::Nack), 12, "read").is_err());
        assert_eq!(c.state(), TransportState::Error);

        // Operations keep working while in Error
        assert!(c.check_ready(13, "read").is_ok());
        assert_eq!(c.complete(Ok(()), 14, "read"), Ok(()));
        assert_eq!(c.status().success_count, 2);
    }

    #[test]
    fn test_check_ready_and_frozen_config() {
        let mut c = core();
        assert_eq!(
            c.check_ready(1, "scan"),
            Err(TransportError::NotInitialized)
        );
        assert!(c.ensure_configurable().is_ok());

        c.begin_init().unwrap();
        c.finish_init(Ok(()), 2).unwrap();
        assert_eq!(c.ensure_configurable(), Err(TransportError::ConfigFrozen));

        c.disable();
        assert_eq!(c.begin_init(), Err(TransportError::Disabled));
        assert_eq!(c.check_ready(3, "scan"), Err(TransportError::Disabled));
    }

    #[test]
    fn test_long_names_and_messages_truncate() {
        let mut c = TransportCore::new("a-very-long-transport-name", TransportType::Spi);
        assert_eq!(c.name().len(), NAME_LEN);

        c.note_error(
            TransportError::BufferOverflow,
            5,
            "an-operation-with-a-rather-long-descriptive-name",
        );
        assert_eq!(c.status().last_error_msg.len(), ERROR_MSG_LEN);
    }
}
