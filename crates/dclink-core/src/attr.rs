//! Two-character attribute codes
//!
//! Hub protocols describe a user as a set of `code → value` pairs where every
//! code is exactly two characters (`NI` for the nick, `I4` for the IPv4
//! address and so on). The code is kept as a fixed two-byte value so that it
//! hashes cheaply and re-serializes to the exact wire form.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Attribute code (exactly two ASCII characters)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttrCode([u8; 2]);

impl AttrCode {
    /// Nick
    pub const NICK: Self = Self(*b"NI");
    /// Description
    pub const DESCRIPTION: Self = Self(*b"DE");
    /// E-mail
    pub const EMAIL: Self = Self(*b"EM");
    /// Share size in bytes
    pub const SHARE_SIZE: Self = Self(*b"SS");
    /// Real share size in bytes
    pub const REAL_SHARE_SIZE: Self = Self(*b"RS");
    /// Upload slots
    pub const SLOTS: Self = Self(*b"SL");
    /// Client version string
    pub const VERSION: Self = Self(*b"VE");
    /// Application name (extension of `VE`)
    pub const APPLICATION: Self = Self(*b"AP");
    /// Hubs where the user is a normal user
    pub const HUBS_NORMAL: Self = Self(*b"HN");
    /// Hubs where the user is registered
    pub const HUBS_REGISTERED: Self = Self(*b"HR");
    /// Hubs where the user is an operator
    pub const HUBS_OPERATOR: Self = Self(*b"HO");
    /// IPv4 address
    pub const IP4: Self = Self(*b"I4");
    /// IPv6 address
    pub const IP6: Self = Self(*b"I6");
    /// IPv4 UDP port
    pub const UDP4_PORT: Self = Self(*b"U4");
    /// IPv6 UDP port
    pub const UDP6_PORT: Self = Self(*b"U6");
    /// Supported features (comma separated)
    pub const SUPPORTS: Self = Self(*b"SU");
    /// Upload speed in bytes per second
    pub const UPLOAD_SPEED: Self = Self(*b"US");
    /// Download speed in bytes per second
    pub const DOWNLOAD_SPEED: Self = Self(*b"DS");
    /// Client type bitmask
    pub const CLIENT_TYPE: Self = Self(*b"CT");
    /// Legacy connection description
    pub const CONNECTION: Self = Self(*b"CO");

    /// Create a code from two raw bytes
    #[must_use]
    pub const fn new(code: [u8; 2]) -> Self {
        Self(code)
    }

    /// Raw bytes, as sent on the wire
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 2] {
        &self.0
    }

    /// Text form of the code
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Constructed only from ASCII
        std::str::from_utf8(&self.0).unwrap_or("??")
    }

    /// True for codes whose update changes the connectivity inputs
    /// (supports, IPv4 and IPv6 addresses).
    #[must_use]
    pub fn affects_connect_mode(&self) -> bool {
        matches!(&self.0, b"SU" | b"I4" | b"I6")
    }
}

impl FromStr for AttrCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.as_bytes() {
            [a, b] if a.is_ascii() && b.is_ascii() => Ok(Self([*a, *b])),
            _ => Err(Error::InvalidAttrCode(s.to_string())),
        }
    }
}

impl fmt::Display for AttrCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for AttrCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttrCode({})", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exactly_two_chars() {
        assert_eq!("NI".parse::<AttrCode>().unwrap(), AttrCode::NICK);
        assert!("N".parse::<AttrCode>().is_err());
        assert!("NIC".parse::<AttrCode>().is_err());
        assert!("Nä".parse::<AttrCode>().is_err());
    }

    #[test]
    fn test_wire_form() {
        assert_eq!(AttrCode::IP6.as_bytes(), b"I6");
        assert_eq!(AttrCode::IP6.to_string(), "I6");
        assert_eq!(format!("{:?}", AttrCode::SLOTS), "AttrCode(SL)");
    }

    #[test]
    fn test_connect_mode_codes() {
        assert!(AttrCode::SUPPORTS.affects_connect_mode());
        assert!(AttrCode::IP4.affects_connect_mode());
        assert!(AttrCode::IP6.affects_connect_mode());
        assert!(!AttrCode::NICK.affects_connect_mode());
        assert!(!AttrCode::UDP4_PORT.affects_connect_mode());
    }
}
