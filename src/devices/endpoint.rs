//! SPI endpoint descriptors
//!
//! An endpoint names the bus and the pins of one SPI device:
//! `"spi0:cs=5,dc=17,rst=16"`. `cs` is always required; drivers list the
//! other roles they need.

use core::fmt;
use core::str::FromStr;

/// Known SPI bus names
pub const SPI_BUSES: [&str; 2] = ["spi0", "spi1"];

/// Auxiliary pin role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinRole {
    /// Chip select
    Cs,
    /// Data/command select
    Dc,
    /// Reset
    Rst,
    /// Busy indicator
    Busy,
    /// Interrupt line 0
    Dio0,
    /// Interrupt line 1
    Dio1,
}

impl PinRole {
    /// All roles in rendering order
    pub const ALL: [PinRole; 6] = [
        PinRole::Cs,
        PinRole::Dc,
        PinRole::Rst,
        PinRole::Busy,
        PinRole::Dio0,
        PinRole::Dio1,
    ];

    /// Endpoint key
    pub const fn key(self) -> &'static str {
        match self {
            PinRole::Cs => "cs",
            PinRole::Dc => "dc",
            PinRole::Rst => "rst",
            PinRole::Busy => "busy",
            PinRole::Dio0 => "dio0",
            PinRole::Dio1 => "dio1",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.key() == key)
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Endpoint parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EndpointError {
    /// Missing `<bus>:` prefix or empty entry
    Malformed,
    /// Bus prefix is not a known bus
    UnknownBus,
    /// Key is not a pin role
    UnknownKey,
    /// Same key given twice
    DuplicateKey,
    /// Pin value is not a decimal `u8`
    InvalidPin,
    /// `cs` not given
    MissingCs,
}

impl fmt::Display for EndpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            EndpointError::Malformed => "malformed endpoint",
            EndpointError::UnknownBus => "unknown bus",
            EndpointError::UnknownKey => "unknown pin key",
            EndpointError::DuplicateKey => "duplicate pin key",
            EndpointError::InvalidPin => "invalid pin number",
            EndpointError::MissingCs => "cs pin required",
        };
        f.write_str(msg)
    }
}

/// Parsed endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiEndpoint {
    bus: u8,
    pins: [Option<u8>; 6],
}

impl SpiEndpoint {
    /// Endpoint on bus `spiN` selected by `cs`
    pub const fn new(bus: u8, cs: u8) -> Self {
        let mut pins = [None; 6];
        pins[PinRole::Cs.index()] = Some(cs);
        Self { bus, pins }
    }

    /// Add or replace a pin
    pub const fn with_pin(mut self, role: PinRole, pin: u8) -> Self {
        self.pins[role.index()] = Some(pin);
        self
    }

    /// Parse `"<bus>:<key>=<pin>,..."`
    pub fn parse(text: &str) -> Result<Self, EndpointError> {
        let (bus_name, pins) = text.trim().split_once(':').ok_or(EndpointError::Malformed)?;
        let bus = SPI_BUSES
            .iter()
            .position(|b| *b == bus_name)
            .ok_or(EndpointError::UnknownBus)? as u8;

        let mut endpoint = Self { bus, pins: [None; 6] };
        for entry in pins.split(',') {
            let (key, value) = entry.trim().split_once('=').ok_or(EndpointError::Malformed)?;
            let role = PinRole::from_key(key.trim()).ok_or(EndpointError::UnknownKey)?;
            let pin = value.trim().parse::<u8>().map_err(|_| EndpointError::InvalidPin)?;
            let slot = &mut endpoint.pins[role.index()];
            if slot.is_some() {
                return Err(EndpointError::DuplicateKey);
            }
            *slot = Some(pin);
        }
        if endpoint.pins[PinRole::Cs.index()].is_none() {
            return Err(EndpointError::MissingCs);
        }
        Ok(endpoint)
    }

    /// Bus index (`spi0` is 0)
    pub fn bus(&self) -> u8 {
        self.bus
    }

    /// Chip-select pin
    pub fn cs(&self) -> u8 {
        // Every constructor sets cs
        self.pins[PinRole::Cs.index()].unwrap_or(0)
    }

    /// Pin assigned to `role`
    pub fn pin(&self, role: PinRole) -> Option<u8> {
        self.pins[role.index()]
    }

    /// Whether every role in `roles` has a pin
    pub fn has_all(&self, roles: &[PinRole]) -> bool {
        roles.iter().all(|r| self.pin(*r).is_some())
    }

    /// Assigned `(role, pin)` pairs in rendering order
    pub fn assigned(&self) -> impl Iterator<Item = (PinRole, u8)> + '_ {
        PinRole::ALL
            .into_iter()
            .filter_map(|r| self.pin(r).map(|p| (r, p)))
    }
}

impl FromStr for SpiEndpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SpiEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bus = SPI_BUSES.get(self.bus as usize).copied().unwrap_or("spi?");
        write!(f, "{}:", bus)?;
        for (i, (role, pin)) in self.assigned().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", role.key(), pin)?;
        }
        Ok(())
    }
}

/// Syntactic check of `text` for a driver that needs `required` pins
pub fn valid_endpoint(text: &str, required: &[PinRole]) -> bool {
    SpiEndpoint::parse(text).is_ok_and(|e| e.has_all(required))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    #[test]
    fn test_parse_display_pins() {
        let ep = SpiEndpoint::parse("spi0:cs=5,dc=17,rst=16").unwrap();
        assert_eq!(ep.bus(), 0);
        assert_eq!(ep.cs(), 5);
        assert_eq!(ep.pin(PinRole::Dc), Some(17));
        assert_eq!(ep.pin(PinRole::Rst), Some(16));
        assert_eq!(ep.pin(PinRole::Busy), None);
        assert_eq!(ep.to_string(), "spi0:cs=5,dc=17,rst=16");

        let ep: SpiEndpoint = " spi1: rst = 14 , cs = 9 ".parse().unwrap();
        assert_eq!(ep.to_string(), "spi1:cs=9,rst=14");
        assert_eq!(ep, SpiEndpoint::new(1, 9).with_pin(PinRole::Rst, 14));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(SpiEndpoint::parse("cs=5"), Err(EndpointError::Malformed));
        assert_eq!(SpiEndpoint::parse("spi7:cs=5"), Err(EndpointError::UnknownBus));
        assert_eq!(SpiEndpoint::parse("spi0:cs=5,led=3"), Err(EndpointError::UnknownKey));
        assert_eq!(SpiEndpoint::parse("spi0:cs=5,cs=6"), Err(EndpointError::DuplicateKey));
        assert_eq!(SpiEndpoint::parse("spi0:cs=300"), Err(EndpointError::InvalidPin));
        assert_eq!(SpiEndpoint::parse("spi0:dc=4"), Err(EndpointError::MissingCs));
        assert_eq!(SpiEndpoint::parse("spi0:"), Err(EndpointError::Malformed));
    }

    #[test]
    fn test_required_roles() {
        let radio = [PinRole::Cs, PinRole::Rst, PinRole::Dio0];
        assert!(valid_endpoint("spi0:cs=18,rst=14,dio0=26", &radio));
        assert!(!valid_endpoint("spi0:cs=18,rst=14", &radio));
        assert!(!valid_endpoint("spi2:cs=18,rst=14,dio0=26", &radio));
        assert_eq!(EndpointError::MissingCs.to_string(), "cs pin required");
    }
}
