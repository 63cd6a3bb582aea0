//! Resource manager for exclusive ownership of physical resources
//!
//! The resource manager is the only authority that arbitrates between
//! components wanting the same GPIO pin, ADC/PWM channel, bus instance or
//! UART line. Claims are recorded in a fixed table of `MAX_RESOURCES` slots so
//! no heap allocation is needed.
//!
//! # Ownership rules
//!
//! - At most one active claim per `(kind, id)`
//! - Re-claiming with the same owner is idempotent
//! - Only the owner may release a claim
//!
//! # Example
//!
//! ```ignore
//! use pico_drivers::core::resources::{self, ResourceArbiter, ResourceKind};
//!
//! let arbiter = resources::global();
//! arbiter.claim(ResourceKind::GpioPin, 5, "bmp280@76")?;
//! assert!(arbiter.is_claimed(ResourceKind::GpioPin, 5));
//! arbiter.release(ResourceKind::GpioPin, 5, "bmp280@76")?;
//! ```

use core::cell::RefCell;
use core::fmt;
use critical_section::Mutex;
use heapless::String;

/// Maximum number of simultaneous claims
pub const MAX_RESOURCES: usize = 64;

/// Maximum length of an owner identifier
pub const OWNER_ID_LEN: usize = 16;

/// Owner identifier (opaque short string chosen by the claimant)
pub type OwnerId = String<OWNER_ID_LEN>;

/// Kind of physical resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResourceKind {
    /// GPIO pin
    GpioPin,
    /// ADC input channel
    AdcChannel,
    /// PWM output channel
    PwmChannel,
    /// I2C bus instance
    I2cBus,
    /// SPI bus instance
    SpiBus,
    /// UART line
    Uart,
}

impl ResourceKind {
    /// Short lowercase name used in diagnostic dumps
    pub const fn as_str(self) -> &'static str {
        match self {
            ResourceKind::GpioPin => "gpio",
            ResourceKind::AdcChannel => "adc",
            ResourceKind::PwmChannel => "pwm",
            ResourceKind::I2cBus => "i2c",
            ResourceKind::SpiBus => "spi",
            ResourceKind::Uart => "uart",
        }
    }
}

/// Resource manager errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResourceError {
    /// Resource already claimed by a different owner
    Conflict,
    /// Release attempted by a component that does not own the claim
    NotOwner,
    /// Resource is not claimed
    NotClaimed,
    /// No free claim slot
    TableFull,
    /// Owner identifier is empty or longer than `OWNER_ID_LEN`
    InvalidOwner,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Conflict => write!(f, "resource claimed by another owner"),
            ResourceError::NotOwner => write!(f, "release refused: caller is not the owner"),
            ResourceError::NotClaimed => write!(f, "resource is not claimed"),
            ResourceError::TableFull => write!(f, "resource table full"),
            ResourceError::InvalidOwner => write!(f, "invalid owner identifier"),
        }
    }
}

/// Read-only view of an active claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claim<'a> {
    /// Resource kind
    pub kind: ResourceKind,
    /// Platform-specific resource number
    pub id: u32,
    /// Owner identifier
    pub owner: &'a str,
}

#[derive(Debug, Clone)]
struct ClaimSlot {
    kind: ResourceKind,
    id: u32,
    owner: OwnerId,
    claimed: bool,
}

const EMPTY_SLOT: ClaimSlot = ClaimSlot {
    kind: ResourceKind::GpioPin,
    id: 0,
    owner: String::new(),
    claimed: false,
};

/// Claim table with `N` slots
///
/// The number of active claims is always derived from the table, so it can
/// never drift from the slots that are actually occupied.
#[derive(Debug)]
pub struct ResourceManager<const N: usize = MAX_RESOURCES> {
    slots: [ClaimSlot; N],
}

impl<const N: usize> ResourceManager<N> {
    /// Create an empty table (const for static initialization)
    pub const fn new() -> Self {
        Self {
            slots: [EMPTY_SLOT; N],
        }
    }

    fn find(&self, kind: ResourceKind, id: u32) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.claimed && s.kind == kind && s.id == id)
    }

    /// Claim `(kind, id)` for `owner`
    ///
    /// # Errors
    ///
    /// - `Conflict` if another owner holds the resource
    /// - `TableFull` if every slot is occupied
    /// - `InvalidOwner` if `owner` is empty or too long
    pub fn claim(&mut self, kind: ResourceKind, id: u32, owner: &str) -> Result<(), ResourceError> {
        if owner.is_empty() || owner.len() > OWNER_ID_LEN {
            return Err(ResourceError::InvalidOwner);
        }

        if let Some(index) = self.find(kind, id) {
            let slot = &self.slots[index];
            if slot.owner.as_str() == owner {
                return Ok(());
            }
            log_warn!(
                "Claim refused: {}:{} owned by {}, requested by {}",
                kind.as_str(),
                id,
                slot.owner.as_str(),
                owner
            );
            return Err(ResourceError::Conflict);
        }

        let slot = self
            .slots
            .iter_mut()
            .find(|s| !s.claimed)
            .ok_or(ResourceError::TableFull)?;

        let mut owner_id = OwnerId::new();
        owner_id
            .push_str(owner)
            .map_err(|_| ResourceError::InvalidOwner)?;

        slot.kind = kind;
        slot.id = id;
        slot.owner = owner_id;
        slot.claimed = true;
        Ok(())
    }

    /// Release `(kind, id)` held by `owner`
    ///
    /// # Errors
    ///
    /// - `NotClaimed` if the resource has no active claim
    /// - `NotOwner` if the claim belongs to someone else (table unchanged)
    pub fn release(
        &mut self,
        kind: ResourceKind,
        id: u32,
        owner: &str,
    ) -> Result<(), ResourceError> {
        let index = self.find(kind, id).ok_or(ResourceError::NotClaimed)?;
        let slot = &mut self.slots[index];
        if slot.owner.as_str() != owner {
            log_warn!(
                "Release refused: {}:{} owned by {}, not {}",
                kind.as_str(),
                id,
                slot.owner.as_str(),
                owner
            );
            return Err(ResourceError::NotOwner);
        }
        slot.claimed = false;
        slot.owner.clear();
        Ok(())
    }

    /// Release every claim held by `owner`, returning how many were released
    pub fn release_all(&mut self, owner: &str) -> usize {
        let mut released = 0;
        for slot in self
            .slots
            .iter_mut()
            .filter(|s| s.claimed && s.owner.as_str() == owner)
        {
            slot.claimed = false;
            slot.owner.clear();
            released += 1;
        }
        released
    }

    /// Check whether `(kind, id)` has an active claim
    pub fn is_claimed(&self, kind: ResourceKind, id: u32) -> bool {
        self.find(kind, id).is_some()
    }

    /// Owner of `(kind, id)`, if claimed
    pub fn owner_of(&self, kind: ResourceKind, id: u32) -> Option<&str> {
        self.find(kind, id).map(|i| self.slots[i].owner.as_str())
    }

    /// Number of active claims
    pub fn claimed_count(&self) -> usize {
        self.slots.iter().filter(|s| s.claimed).count()
    }

    /// Table capacity
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Iterate over active claims in slot order
    pub fn iter(&self) -> impl Iterator<Item = Claim<'_>> {
        self.slots.iter().filter(|s| s.claimed).map(|s| Claim {
            kind: s.kind,
            id: s.id,
            owner: s.owner.as_str(),
        })
    }

    /// Write one `<kind>:<id> -> <owner>` line per active claim
    pub fn dump<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        for claim in self.iter() {
            writeln!(out, "{}:{} -> {}", claim.kind.as_str(), claim.id, claim.owner)?;
        }
        Ok(())
    }

    /// Drop every claim
    pub fn clear(&mut self) {
        self.slots = [EMPTY_SLOT; N];
    }
}

impl<const N: usize> Default for ResourceManager<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Injectable resource arbitration handle
///
/// Drivers depend on this trait instead of the process-wide table so tests
/// can hand them an isolated [`SharedResources`].
pub trait ResourceArbiter {
    /// Claim `(kind, id)` for `owner`
    fn claim(&self, kind: ResourceKind, id: u32, owner: &str) -> Result<(), ResourceError>;

    /// Release `(kind, id)` held by `owner`
    fn release(&self, kind: ResourceKind, id: u32, owner: &str) -> Result<(), ResourceError>;

    /// Check whether `(kind, id)` has an active claim
    fn is_claimed(&self, kind: ResourceKind, id: u32) -> bool;

    /// Copy of the owner of `(kind, id)`, if claimed
    fn owner_of(&self, kind: ResourceKind, id: u32) -> Option<OwnerId>;

    /// Release every claim held by `owner`
    fn release_all(&self, owner: &str) -> usize;
}

/// Claim table guarded by a critical-section mutex
///
/// Every operation is point-in-time atomic from the caller's perspective.
pub struct SharedResources<const N: usize = MAX_RESOURCES> {
    inner: Mutex<RefCell<ResourceManager<N>>>,
}

impl<const N: usize> SharedResources<N> {
    /// Create an empty shared table (const for static initialization)
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(ResourceManager::new())),
        }
    }

    /// Run `f` with exclusive access to the table
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut ResourceManager<N>) -> R,
    {
        critical_section::with(|cs| f(&mut self.inner.borrow(cs).borrow_mut()))
    }

    /// Number of active claims
    pub fn claimed_count(&self) -> usize {
        self.with(|rm| rm.claimed_count())
    }

    /// Write the claim table in diagnostic form
    pub fn dump<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        self.with(|rm| rm.dump(out))
    }
}

impl<const N: usize> Default for SharedResources<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ResourceArbiter for SharedResources<N> {
    fn claim(&self, kind: ResourceKind, id: u32, owner: &str) -> Result<(), ResourceError> {
        self.with(|rm| rm.claim(kind, id, owner))
    }

    fn release(&self, kind: ResourceKind, id: u32, owner: &str) -> Result<(), ResourceError> {
        self.with(|rm| rm.release(kind, id, owner))
    }

    fn is_claimed(&self, kind: ResourceKind, id: u32) -> bool {
        self.with(|rm| rm.is_claimed(kind, id))
    }

    fn owner_of(&self, kind: ResourceKind, id: u32) -> Option<OwnerId> {
        self.with(|rm| {
            rm.owner_of(kind, id).map(|owner| {
                let mut copy = OwnerId::new();
                // Stored owners always fit
                let _ = copy.push_str(owner);
                copy
            })
        })
    }

    fn release_all(&self, owner: &str) -> usize {
        self.with(|rm| rm.release_all(owner))
    }
}

/// Process-wide claim table
static RESOURCES: SharedResources<MAX_RESOURCES> = SharedResources::new();

/// Process-wide resource arbiter (the default handle)
pub fn global() -> &'static SharedResources<MAX_RESOURCES> {
    &RESOURCES
}
