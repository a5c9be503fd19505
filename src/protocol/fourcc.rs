use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Four-character media-type code carried in every packet header.
///
/// The four characters are stored in order. [`as_u32`](Self::as_u32) packs
/// them little-endian, first character in the lowest byte, so writing that
/// integer in little-endian order yields the characters in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC([u8; 4]);

impl FourCC {
    /// Build a code from raw bytes.
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Build a code from its little-endian packed integer form.
    pub const fn from_u32(value: u32) -> Self {
        Self(value.to_le_bytes())
    }

    /// Parse a code from a string of exactly four ASCII characters.
    pub fn parse(code: &str) -> Result<Self, ConfigError> {
        let bytes: [u8; 4] = code
            .as_bytes()
            .try_into()
            .map_err(|_| ConfigError::InvalidFourCC(code.to_string()))?;

        if !bytes.is_ascii() {
            return Err(ConfigError::InvalidFourCC(code.to_string()));
        }

        Ok(Self(bytes))
    }

    /// Raw bytes in wire order.
    pub const fn as_bytes(&self) -> [u8; 4] {
        self.0
    }

    /// Little-endian packed integer form.
    pub const fn as_u32(&self) -> u32 {
        u32::from_le_bytes(self.0)
    }
}

impl FromStr for FourCC {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}
