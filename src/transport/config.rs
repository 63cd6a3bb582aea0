//! Key/value view of a transport's configuration
//!
//! Every transport mirrors its typed configuration struct into a
//! [`TransportConfig`] so diagnostics can enumerate settings without knowing
//! the concrete transport type. Entries keep insertion order.

use core::fmt::{self, Write};
use heapless::{FnvIndexMap, String};

/// Maximum key length
pub const CONFIG_KEY_LEN: usize = 16;
/// Maximum value length
pub const CONFIG_VALUE_LEN: usize = 24;
/// Maximum number of entries (power of two for the index map)
pub const CONFIG_ENTRIES: usize = 16;

/// Configuration map error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Key longer than `CONFIG_KEY_LEN`
    KeyTooLong,
    /// Value longer than `CONFIG_VALUE_LEN`
    ValueTooLong,
    /// No free entry
    Full,
}

/// Ordered configuration map
#[derive(Debug, Clone, Default)]
pub struct TransportConfig {
    entries: FnvIndexMap<String<CONFIG_KEY_LEN>, String<CONFIG_VALUE_LEN>, CONFIG_ENTRIES>,
}

impl TransportConfig {
    /// Create an empty map
    pub fn new() -> Self {
        Self {
            entries: FnvIndexMap::new(),
        }
    }

    /// Insert or replace `key` with a formatted value
    pub fn set(&mut self, key: &str, value: fmt::Arguments<'_>) -> Result<(), ConfigError> {
        let mut k = String::new();
        k.push_str(key).map_err(|_| ConfigError::KeyTooLong)?;
        let mut v = String::new();
        v.write_fmt(value).map_err(|_| ConfigError::ValueTooLong)?;
        self.entries
            .insert(k, v)
            .map(|_| ())
            .map_err(|_| ConfigError::Full)
    }

    /// Value stored under `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate `(key, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl fmt::Display for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_and_order() {
        let mut cfg = TransportConfig::new();
        cfg.set("sda", format_args!("{}", 21)).unwrap();
        cfg.set("scl", format_args!("{}", 22)).unwrap();
        cfg.set("speed", format_args!("{}", 400_000)).unwrap();
        cfg.set("sda", format_args!("{}", 4)).unwrap();

        assert_eq!(cfg.get("sda"), Some("4"));
        assert_eq!(cfg.len(), 3);
        assert_eq!(cfg.to_string(), "sda=4,scl=22,speed=400000");
    }

    #[test]
    fn test_limits() {
        let mut cfg = TransportConfig::new();
        assert_eq!(
            cfg.set("a-key-that-is-way-too-long", format_args!("x")),
            Err(ConfigError::KeyTooLong)
        );
        assert_eq!(
            cfg.set("k", format_args!("{}", "a value that does not fit in 24")),
            Err(ConfigError::ValueTooLong)
        );
        assert!(cfg.is_empty());
    }
}
