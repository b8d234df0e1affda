//! Chip identity and geometry
//!
//! The programmer targets a single device family. The constants here
//! describe the part fitted to the cartridge boards (Winbond W25Q80DV,
//! 8 Mbit) and can be overridden through the session configuration.

use core::fmt;

/// Largest number of bytes one PAGE_PROGRAM may carry, and the read chunk size
pub const PAGE_SIZE: usize = 256;

/// JEDEC identification bytes as returned by READ_ID (9Fh)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JedecId {
    /// Manufacturer ID (0xEF for Winbond)
    pub manufacturer: u8,
    /// Memory type / device ID
    pub device: u8,
    /// Capacity / unique byte
    pub unique: u8,
}

impl JedecId {
    /// Create an identity from its three bytes
    pub const fn new(manufacturer: u8, device: u8, unique: u8) -> Self {
        Self {
            manufacturer,
            device,
            unique,
        }
    }

    /// Create an identity from the raw READ_ID response
    pub const fn from_bytes(bytes: [u8; 3]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2])
    }

    /// The identity in wire order
    pub const fn to_bytes(self) -> [u8; 3] {
        [self.manufacturer, self.device, self.unique]
    }

    /// Parse an identity written as six hex digits
    ///
    /// Accepts `EF4014`, `0xEF4014`, `EF 40 14` and `EF:40:14`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let s = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        let mut bytes = [0u8; 3];
        let mut nibbles = 0usize;
        for c in s.chars() {
            if c == ' ' || c == ':' || c == '_' {
                continue;
            }
            let digit = c.to_digit(16)? as u8;
            if nibbles >= 6 {
                return None;
            }
            let byte = &mut bytes[nibbles / 2];
            *byte = (*byte << 4) | digit;
            nibbles += 1;
        }

        if nibbles == 6 {
            Some(Self::from_bytes(bytes))
        } else {
            None
        }
    }
}

impl fmt::Display for JedecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "manufacturer 0x{:02X}, device 0x{:02X}, unique 0x{:02X}",
            self.manufacturer, self.device, self.unique
        )
    }
}

/// Identity and size of the part a session expects to find
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipProfile {
    /// Marketing name, used in log output
    pub name: &'static str,
    /// Expected READ_ID response
    pub id: JedecId,
    /// Total size in bytes
    pub total_size: u32,
}

/// Winbond W25Q80DV (1 MiB), the flash on the cartridge boards
pub const W25Q80DV: ChipProfile = ChipProfile {
    name: "W25Q80DV",
    id: JedecId::new(0xEF, 0x40, 0x14),
    total_size: 1024 * 1024,
};
