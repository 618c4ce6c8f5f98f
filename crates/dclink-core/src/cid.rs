//! Peer identifiers
//!
//! A [`Cid`] identifies a peer across every hub and session. A [`Sid`] is the
//! short session id a hub hands out, only unique inside that hub connection.
//! Both travel on the wire in RFC 4648 base-32 form.

use crate::error::{Error, Result};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// CID size in bytes (192 bits)
pub const CID_SIZE: usize = 24;

/// Length of a CID in base-32 text form
pub const CID_BASE32_LEN: usize = 39;

/// Number of significant bits in a SID
const SID_BITS: u32 = 20;

const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

fn base32_value(c: u8) -> Option<u8> {
    match c {
        b'A'..=b'Z' => Some(c - b'A'),
        b'a'..=b'z' => Some(c - b'a'),
        b'2'..=b'7' => Some(c - b'2' + 26),
        _ => None,
    }
}

/// Encode bytes as unpadded base-32, most significant bit first.
pub(crate) fn encode_base32(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8).div_ceil(5));
    let mut buffer: u32 = 0;
    let mut bits = 0u32;

    for &byte in data {
        buffer = ((buffer << 8) | u32::from(byte)) & 0xFFFF;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((buffer >> bits) & 0x1F) as usize] as char);
        }
    }

    if bits > 0 {
        out.push(ALPHABET[((buffer << (5 - bits)) & 0x1F) as usize] as char);
    }

    out
}

/// Decode unpadded base-32 into `out`, which must be filled exactly.
pub(crate) fn decode_base32(text: &str, out: &mut [u8]) -> Option<()> {
    if text.len() != (out.len() * 8).div_ceil(5) {
        return None;
    }

    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    let mut idx = 0;

    for c in text.bytes() {
        buffer = ((buffer << 5) | u32::from(base32_value(c)?)) & 0xFFFF;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            if idx < out.len() {
                out[idx] = (buffer >> bits) as u8;
                idx += 1;
            }
        }
    }

    (idx == out.len()).then_some(())
}

/// Client identifier
///
/// Stable for the lifetime of a peer and shared by every hub the peer is
/// connected to. Immutable once assigned.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cid([u8; CID_SIZE]);

impl Cid {
    /// Create a CID from raw bytes
    #[must_use]
    pub const fn from_bytes(bytes: [u8; CID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Generate a random CID
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; CID_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Raw bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; CID_SIZE] {
        &self.0
    }

    /// True for the all-zero CID, which no real peer carries
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Base-32 text form
    #[must_use]
    pub fn to_base32(&self) -> String {
        encode_base32(&self.0)
    }
}

impl FromStr for Cid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut bytes = [0u8; CID_SIZE];
        decode_base32(s, &mut bytes).ok_or_else(|| Error::InvalidCid(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Cid {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Cid> for String {
    fn from(cid: Cid) -> Self {
        cid.to_base32()
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base32())
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({})", self.to_base32())
    }
}

/// Hub session identifier
///
/// Assigned by the hub on login. Only unique within one hub connection and
/// not stable across reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Sid(u32);

impl Sid {
    /// Create a SID from its numeric value
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSid`] if the value does not fit in 20 bits.
    pub fn new(value: u32) -> Result<Self> {
        if value >> SID_BITS != 0 {
            return Err(Error::InvalidSid(format!("{value:#x} exceeds 20 bits")));
        }
        Ok(Self(value))
    }

    /// Numeric value
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl From<u16> for Sid {
    fn from(value: u16) -> Self {
        Self(u32::from(value))
    }
}

impl FromStr for Sid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != 4 {
            return Err(Error::InvalidSid(s.to_string()));
        }
        let mut value = 0u32;
        for c in s.bytes() {
            let v = base32_value(c).ok_or_else(|| Error::InvalidSid(s.to_string()))?;
            value = (value << 5) | u32::from(v);
        }
        Ok(Self(value))
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for shift in [15u32, 10, 5, 0] {
            let idx = ((self.0 >> shift) & 0x1F) as usize;
            write!(f, "{}", ALPHABET[idx] as char)?;
        }
        Ok(())
    }
}
