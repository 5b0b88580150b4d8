//! Target memory addresses as they travel over the bus.
//!
//! Clients send addresses as hex strings in whatever casing and padding they
//! like (`"0x2000ABCD"`, `"2000abcd"`, `"0x00002000abcd"`). Everything that keys
//! on an address (the watch set, the correlation gate and the memory map) needs
//! a single canonical form, otherwise a read for `0x0000abcd` would never be
//! matched with the backend's answer for `0xabcd`.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A normalized target memory address.
///
/// Displays and serializes as lowercase hex with a `0x` prefix and no leading
/// zeros, e.g. `0x20000000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(u64);

impl Address {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

/// The address string was not valid hex: `{input}`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, docsplay::Display)]
pub struct AddressParseError {
    pub input: String,
    #[source]
    pub source: ParseIntError,
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        u64::from_str_radix(digits, 16)
            .map(Address)
            .map_err(|source| AddressParseError {
                input: s.to_string(),
                source,
            })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Parses a hex value the way addresses are parsed, prefix optional.
pub fn parse_hex(input: &str) -> Result<u64, AddressParseError> {
    input.parse::<Address>().map(Address::value)
}
