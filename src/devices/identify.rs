//! Chip identification and resource claims shared by drivers

use core::fmt::Write;

use heapless::Vec;

use crate::core::resources::{OwnerId, ResourceArbiter, ResourceKind, MAX_RESOURCES};

use super::bus::RegisterBus;
use super::{DeviceAddress, DriverError};

/// Read `reg` and compare it with `expected`
///
/// # Errors
///
/// - `Bus` if the register cannot be read
/// - `IdentificationFailure` on a mismatch
pub fn expect_chip_id<R: RegisterBus + ?Sized>(
    bus: &mut R,
    driver: &str,
    reg: u8,
    expected: u8,
) -> Result<(), DriverError> {
    match bus.read_reg(reg) {
        Ok(id) if id == expected => {
            log_info!("{}: chip id {:#x} at register {:#x}", driver, id, reg);
            Ok(())
        }
        Ok(id) => {
            log_error!(
                "{}: chip id {:#x} at register {:#x}, expected {:#x}",
                driver,
                id,
                reg,
                expected
            );
            Err(DriverError::IdentificationFailure)
        }
        Err(e) => {
            log_error!("{}: identification read failed: {}", driver, e.as_str());
            Err(DriverError::Bus(e))
        }
    }
}

/// `"<driver>@<address>"`, truncated to the owner id capacity
pub fn owner_id(driver: &str, address: DeviceAddress) -> OwnerId {
    let mut owner = OwnerId::new();
    // Overlong ids are truncated by the bounded string
    let _ = write!(owner, "{}@{}", driver, address);
    owner
}

/// Claim every `(kind, id)` for `owner`
///
/// All or nothing: on a conflict the claims made by this call are released
/// again. Entries `owner` already held before the call stay claimed.
pub fn claim_resources(
    arbiter: &dyn ResourceArbiter,
    owner: &str,
    resources: &[(ResourceKind, u32)],
) -> Result<(), DriverError> {
    let mut made: Vec<(ResourceKind, u32), MAX_RESOURCES> = Vec::new();
    let mut outcome = Ok(());
    for &(kind, id) in resources {
        let held = arbiter
            .owner_of(kind, id)
            .is_some_and(|current| current.as_str() == owner);
        if let Err(e) = arbiter.claim(kind, id, owner) {
            outcome = Err(e.into());
            break;
        }
        if !held && made.push((kind, id)).is_err() {
            let _ = arbiter.release(kind, id, owner);
            outcome = Err(DriverError::BufferOverflow);
            break;
        }
    }
    if outcome.is_err() {
        for &(kind, id) in &made {
            let _ = arbiter.release(kind, id, owner);
        }
    }
    outcome
}

/// Release everything held by `owner`
pub fn release_resources(arbiter: &dyn ResourceArbiter, owner: &str) -> usize {
    arbiter.release_all(owner)
}
