//! Four-character feature support codes

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Feature code a peer advertises in its support list
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Feature([u8; 4]);

impl Feature {
    /// Base ADC protocol
    pub const ADC0: Self = Self(*b"ADC0");
    /// Active TCP over IPv4
    pub const TCP4: Self = Self(*b"TCP4");
    /// Active TCP over IPv6
    pub const TCP6: Self = Self(*b"TCP6");
    /// UDP searches over IPv4
    pub const UDP4: Self = Self(*b"UDP4");
    /// UDP searches over IPv6
    pub const UDP6: Self = Self(*b"UDP6");
    /// NAT traversal for passive-passive connections
    pub const NAT_TRAVERSAL: Self = Self(*b"NAT0");
    /// Grouped search extensions
    pub const SEGA: Self = Self(*b"SEGA");
    /// Encrypted UDP search results
    pub const SUD1: Self = Self(*b"SUD1");
    /// Extended search result information
    pub const ASCH: Self = Self(*b"ASCH");
    /// Client-to-client private messages
    pub const CCPM: Self = Self(*b"CCPM");

    /// Create a feature from four raw bytes
    #[must_use]
    pub const fn new(code: [u8; 4]) -> Self {
        Self(code)
    }

    /// Text form of the code
    #[must_use]
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl FromStr for Feature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.as_bytes() {
            &[a, b, c, d] if s.is_ascii() => Ok(Self([a, b, c, d])),
            _ => Err(Error::InvalidFeature(s.to_string())),
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Feature({})", self.as_str())
    }
}
