//! Blob references
//!
//! `sha256:<52 base32hex chars>-<decimal size>`

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, StoreError};

pub const REF_PREFIX: &str = "sha256:";

/// Length of a base32hex-encoded SHA-256 digest (no padding)
pub const HASH_LEN: usize = 52;

/// Length of the fan-out directory name taken from the front of the hash
pub const FANOUT_LEN: usize = 2;

/// Base32 "extended hex" alphabet; ASCII-ordered and uppercase only
const BASE32HEX: &[u8; 32] = b"0123456789ABCDEFGHIJKLMNOPQRSTUV";

/// SHA-256 of zero bytes
const EMPTY_HASH: &str = "SEOC8GKOVGE196NRUJ49IRTP4GJQSGF4CIDP6J54IMCHMU2IN1AG";

/// Content-addressed reference to stored bytes
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlobRef {
    text: String,
    size: u64,
}

impl BlobRef {
    /// Parse and validate the text form
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || StoreError::InvalidBlobRef(s.to_string());

        let rest = s.strip_prefix(REF_PREFIX).ok_or_else(invalid)?;
        if rest.len() < HASH_LEN + 2 || rest.as_bytes()[HASH_LEN] != b'-' {
            return Err(invalid());
        }
        let (hash, size) = (&rest[..HASH_LEN], &rest[HASH_LEN + 1..]);
        if !hash.bytes().all(is_base32hex) {
            return Err(invalid());
        }
        // Canonical decimal only, so equal content always has equal text
        if !size.bytes().all(|c| c.is_ascii_digit()) || (size.len() > 1 && size.starts_with('0')) {
            return Err(invalid());
        }
        let size: u64 = size.parse().map_err(|_| invalid())?;
        if size == 0 && hash != EMPTY_HASH {
            return Err(invalid());
        }

        Ok(Self {
            text: s.to_string(),
            size,
        })
    }

    /// Build a reference from a finished SHA-256 digest
    pub(crate) fn from_digest(digest: &[u8], size: u64) -> Self {
        Self {
            text: format!("{}{}-{}", REF_PREFIX, base32hex(digest), size),
            size,
        }
    }

    /// The reference of zero-length content (never backed by a file)
    pub fn empty() -> Self {
        Self {
            text: format!("{}{}-0", REF_PREFIX, EMPTY_HASH),
            size: 0,
        }
    }

    /// The 52-character encoded hash
    pub fn hash(&self) -> &str {
        &self.text[REF_PREFIX.len()..REF_PREFIX.len() + HASH_LEN]
    }

    /// Fan-out directory name
    pub fn fanout(&self) -> &str {
        &self.hash()[..FANOUT_LEN]
    }

    /// File name inside the fan-out directory
    pub fn file_name(&self) -> &str {
        &self.hash()[FANOUT_LEN..]
    }

    /// Content length in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

pub(crate) fn is_base32hex(c: u8) -> bool {
    c.is_ascii_digit() || (b'A'..=b'V').contains(&c)
}

/// Unpadded base32hex encoding
fn base32hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() * 8 + 4) / 5);
    let mut buffer: u32 = 0;
    let mut bits = 0;

    for &b in bytes {
        buffer = (buffer << 8) | u32::from(b);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32HEX[((buffer >> bits) & 0x1F) as usize] as char);
        }
        buffer &= (1 << bits) - 1;
    }
    if bits > 0 {
        out.push(BASE32HEX[((buffer << (5 - bits)) & 0x1F) as usize] as char);
    }
    out
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl fmt::Debug for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobRef({})", self.text)
    }
}

impl FromStr for BlobRef {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for BlobRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for BlobRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct BlobRefVisitor;

        impl<'de> Visitor<'de> for BlobRefVisitor {
            type Value = BlobRef;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a blob reference string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<BlobRef, E> {
                BlobRef::parse(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(BlobRefVisitor)
    }
}
