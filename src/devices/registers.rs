//! Register descriptors
//!
//! A register map is an ordered `&'static [RegisterDescriptor]` owned by the
//! driver type. Addresses and (case-insensitive) names are unique within a
//! map and widths are 1 to 4 bytes; [`validate_map`] checks both.
//!
//! These helpers allocate nothing; they back the Tier-2 register path and
//! diagnostic shells.

use core::fmt;

use super::DriverError;

/// Register access class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Access {
    /// Read-only
    ReadOnly,
    /// Write-only
    WriteOnly,
    /// Read-write
    ReadWrite,
    /// Read-only, cleared by the device or by a side-channel write
    ReadClear,
}

impl Access {
    /// `RO`, `WO`, `RW` or `RC`
    pub const fn as_str(self) -> &'static str {
        match self {
            Access::ReadOnly => "RO",
            Access::WriteOnly => "WO",
            Access::ReadWrite => "RW",
            Access::ReadClear => "RC",
        }
    }

    /// RO, RW and RC registers can be read
    pub const fn is_readable(self) -> bool {
        matches!(self, Access::ReadOnly | Access::ReadWrite | Access::ReadClear)
    }

    /// WO and RW registers can be written
    pub const fn is_writable(self) -> bool {
        matches!(self, Access::WriteOnly | Access::ReadWrite)
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a register map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterDescriptor {
    /// Register address
    pub addr: u16,
    /// Symbolic name
    pub name: &'static str,
    /// Width in bytes (1..=4)
    pub width: u8,
    /// Access class
    pub access: Access,
    /// Value after reset
    pub reset: u32,
}

impl RegisterDescriptor {
    /// Descriptor literal
    pub const fn new(addr: u16, name: &'static str, width: u8, access: Access, reset: u32) -> Self {
        Self {
            addr,
            name,
            width,
            access,
            reset,
        }
    }

    /// See [`Access::is_readable`]
    pub const fn is_readable(&self) -> bool {
        self.access.is_readable()
    }

    /// See [`Access::is_writable`]
    pub const fn is_writable(&self) -> bool {
        self.access.is_writable()
    }
}

/// Descriptor at `addr`
pub fn find_by_addr(
    map: &'static [RegisterDescriptor],
    addr: u16,
) -> Option<&'static RegisterDescriptor> {
    map.iter().find(|d| d.addr == addr)
}

/// Descriptor called `name`, ignoring ASCII case
pub fn find_by_name(
    map: &'static [RegisterDescriptor],
    name: &str,
) -> Option<&'static RegisterDescriptor> {
    map.iter().find(|d| d.name.eq_ignore_ascii_case(name))
}

/// Register map consistency error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    /// Two descriptors share an address
    DuplicateAddress(u16),
    /// Two descriptors share a name (case-insensitive); carries the second address
    DuplicateName(u16),
    /// Width outside 1..=4
    InvalidWidth(u16),
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::DuplicateAddress(a) => write!(f, "duplicate register address {:#06x}", a),
            MapError::DuplicateName(a) => write!(f, "duplicate register name at {:#06x}", a),
            MapError::InvalidWidth(a) => write!(f, "invalid register width at {:#06x}", a),
        }
    }
}

/// Check address uniqueness, name uniqueness and widths
pub fn validate_map(map: &[RegisterDescriptor]) -> Result<(), MapError> {
    for (i, d) in map.iter().enumerate() {
        if !(1..=4).contains(&d.width) {
            return Err(MapError::InvalidWidth(d.addr));
        }
        for earlier in &map[..i] {
            if earlier.addr == d.addr {
                return Err(MapError::DuplicateAddress(d.addr));
            }
            if earlier.name.eq_ignore_ascii_case(d.name) {
                return Err(MapError::DuplicateName(d.addr));
            }
        }
    }
    Ok(())
}

/// Write one `<0xAAAA> <name> <width> <access> <reset>` line per descriptor
pub fn dump_map<W: fmt::Write>(map: &[RegisterDescriptor], out: &mut W) -> fmt::Result {
    for d in map {
        writeln!(
            out,
            "{:#06x} {} {} {} {:#0w$x}",
            d.addr,
            d.name,
            d.width,
            d.access,
            d.reset,
            w = 2 + 2 * d.width as usize
        )?;
    }
    Ok(())
}

/// Direction of a Tier-2 register access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Register read
    Read,
    /// Register write
    Write,
}

/// Validate a Tier-2 access of `len` bytes at `addr`
///
/// # Errors
///
/// - `InvalidArgument` if `addr` is not in the map or `len` is zero
/// - `BufferOverflow` if `len` exceeds the register width
/// - `AccessViolation` if the access class forbids the direction
pub fn check_access(
    map: &'static [RegisterDescriptor],
    addr: u16,
    len: usize,
    direction: Direction,
) -> Result<&'static RegisterDescriptor, DriverError> {
    let desc = find_by_addr(map, addr).ok_or(DriverError::InvalidArgument)?;
    if len == 0 {
        return Err(DriverError::InvalidArgument);
    }
    if len > desc.width as usize {
        return Err(DriverError::BufferOverflow);
    }
    let allowed = match direction {
        Direction::Read => desc.is_readable(),
        Direction::Write => desc.is_writable(),
    };
    if !allowed {
        return Err(DriverError::AccessViolation);
    }
    Ok(desc)
}

/// Register contents decoded from a 1 to 4 byte burst
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterValue(pub u32);

impl RegisterValue {
    /// Decode most significant byte first (bytes beyond 4 are ignored)
    pub fn from_be(bytes: &[u8]) -> Self {
        Self(bytes.iter().take(4).fold(0u32, |acc, &b| (acc << 8) | u32::from(b)))
    }

    /// Decode least significant byte first (bytes beyond 4 are ignored)
    pub fn from_le(bytes: &[u8]) -> Self {
        Self(
            bytes
                .iter()
                .take(4)
                .rev()
                .fold(0u32, |acc, &b| (acc << 8) | u32::from(b)),
        )
    }

    /// Encode into `out`, most significant byte first
    pub fn write_be(self, out: &mut [u8]) {
        let n = out.len().min(4);
        for (i, slot) in out[..n].iter_mut().enumerate() {
            *slot = (self.0 >> (8 * (n - 1 - i))) as u8;
        }
    }

    /// Encode into `out`, least significant byte first
    pub fn write_le(self, out: &mut [u8]) {
        for (i, slot) in out.iter_mut().take(4).enumerate() {
            *slot = (self.0 >> (8 * i)) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::String;

    static EXPANDER: [RegisterDescriptor; 3] = [
        RegisterDescriptor::new(0x00, "INPUT", 1, Access::ReadOnly, 0xFF),
        RegisterDescriptor::new(0x02, "OUTPUT", 1, Access::ReadWrite, 0xFF),
        RegisterDescriptor::new(0x10, "TIMESTAMP", 3, Access::ReadClear, 0),
    ];

    #[test]
    fn test_access_predicates() {
        assert!(Access::ReadClear.is_readable());
        assert!(!Access::ReadClear.is_writable());
        assert!(Access::WriteOnly.is_writable());
        assert!(!Access::WriteOnly.is_readable());
        assert_eq!(Access::ReadWrite.as_str(), "RW");
    }

    #[test]
    fn test_lookup() {
        assert_eq!(find_by_addr(&EXPANDER, 0x02).map(|d| d.name), Some("OUTPUT"));
        assert_eq!(find_by_name(&EXPANDER, "output").map(|d| d.addr), Some(0x02));
        assert!(find_by_addr(&EXPANDER, 0x01).is_none());
        assert!(find_by_name(&EXPANDER, "OUT").is_none());
    }

    #[test]
    fn test_check_access_policy() {
        assert_eq!(
            check_access(&EXPANDER, 0x00, 1, Direction::Write),
            Err(DriverError::AccessViolation)
        );
        assert!(check_access(&EXPANDER, 0x02, 1, Direction::Write).is_ok());
        assert_eq!(
            check_access(&EXPANDER, 0x02, 2, Direction::Read),
            Err(DriverError::BufferOverflow)
        );
        assert_eq!(
            check_access(&EXPANDER, 0x04, 1, Direction::Read),
            Err(DriverError::InvalidArgument)
        );
        assert_eq!(
            check_access(&EXPANDER, 0x10, 0, Direction::Read),
            Err(DriverError::InvalidArgument)
        );
        assert_eq!(
            check_access(&EXPANDER, 0x10, 3, Direction::Write),
            Err(DriverError::AccessViolation)
        );
    }

    #[test]
    fn test_validate_map() {
        assert_eq!(validate_map(&EXPANDER), Ok(()));

        let dup_addr = [
            RegisterDescriptor::new(0x00, "A", 1, Access::ReadOnly, 0),
            RegisterDescriptor::new(0x00, "B", 1, Access::ReadOnly, 0),
        ];
        assert_eq!(validate_map(&dup_addr), Err(MapError::DuplicateAddress(0)));

        let dup_name = [
            RegisterDescriptor::new(0x00, "Ctrl", 1, Access::ReadOnly, 0),
            RegisterDescriptor::new(0x01, "CTRL", 1, Access::ReadOnly, 0),
        ];
        assert_eq!(validate_map(&dup_name), Err(MapError::DuplicateName(1)));

        let wide = [RegisterDescriptor::new(0x00, "W", 5, Access::ReadOnly, 0)];
        assert_eq!(validate_map(&wide), Err(MapError::InvalidWidth(0)));
    }

    #[test]
    fn test_dump_format() {
        let mut out = String::new();
        dump_map(&EXPANDER, &mut out).unwrap();
        assert_eq!(
            out,
            "0x0000 INPUT 1 RO 0xff\n0x0002 OUTPUT 1 RW 0xff\n0x0010 TIMESTAMP 3 RC 0x000000\n"
        );
    }

    #[test]
    fn test_register_value_endianness() {
        assert_eq!(RegisterValue::from_be(&[0x12, 0x34, 0x56]).0, 0x123456);
        assert_eq!(RegisterValue::from_le(&[0x12, 0x34]).0, 0x3412);

        let mut be = [0u8; 2];
        RegisterValue(0xBEEF).write_be(&mut be);
        assert_eq!(be, [0xBE, 0xEF]);
        let mut le = [0u8; 3];
        RegisterValue(0x0A0B0C).write_le(&mut le);
        assert_eq!(le, [0x0C, 0x0B, 0x0A]);
    }
}
