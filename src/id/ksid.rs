//! KSID value type and text codec

use std::fmt::{self, Write as _};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, StoreError};

/// Width of the slice field in bits
pub const SLICE_BITS: u32 = 12;

/// Largest slice value
pub const SLICE_MASK: u64 = (1 << SLICE_BITS) - 1;

/// Largest tick value (51 bits, keeps the ID positive as an i64)
pub const TIME_MASK: u64 = (1 << (63 - SLICE_BITS)) - 1;

/// 2026-01-01T00:00:00Z in microseconds since the Unix epoch
pub const EPOCH_MICROS: i64 = 1_767_225_600_000_000;

/// Encoded length of every non-zero ID
pub const ENCODED_LEN: usize = 13;

const TICK_MICROS: i64 = 10;

/// Crockford base32, in ASCII order so encoded IDs sort like their values
const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

const INVALID: u8 = 0xFF;

const DECODE_MAP: [u8; 128] = build_decode_map();

const fn build_decode_map() -> [u8; 128] {
    let mut map = [INVALID; 128];
    let mut i = 0;
    while i < ALPHABET.len() {
        map[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    map
}

/// A time-sortable 64-bit row identifier
///
/// Integer order equals generation order, and the text form preserves it
/// lexicographically. `Ksid::ZERO` means "unset".
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ksid(u64);

impl Ksid {
    /// The reserved "absent" ID
    pub const ZERO: Ksid = Ksid(0);

    /// Largest representable ID
    pub const MAX: Ksid = Ksid(i64::MAX as u64);

    /// Pack a tick count and slice into an ID
    ///
    /// Bits outside `TIME_MASK` / `SLICE_MASK` are discarded.
    pub const fn from_parts(time10us: u64, slice: u64) -> Self {
        Ksid(((time10us & TIME_MASK) << SLICE_BITS) | (slice & SLICE_MASK))
    }

    /// Build an ID for a given instant, e.g. when migrating old records
    ///
    /// Returns `None` if the instant precedes the epoch, lies beyond the
    /// representable range, or `slice` does not fit the slice field.
    pub fn from_time(instant: DateTime<Utc>, slice: u64) -> Option<Self> {
        if slice > SLICE_MASK {
            return None;
        }
        tick_at(instant)
            .filter(|&tick| tick <= TIME_MASK)
            .map(|tick| Self::from_parts(tick, slice))
    }

    /// Number of 10µs ticks since the epoch
    pub const fn time10us(self) -> u64 {
        self.0 >> SLICE_BITS
    }

    /// Sub-tick / instance partition field
    pub const fn slice(self) -> u64 {
        self.0 & SLICE_MASK
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Wall-clock instant encoded in the ID (the zero ID maps to the epoch)
    pub fn time(self) -> DateTime<Utc> {
        let micros = EPOCH_MICROS + self.time10us() as i64 * TICK_MICROS;
        DateTime::from_timestamp_micros(micros).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Parse the text form
    ///
    /// Empty input decodes to `Ksid::ZERO`. Shorter inputs are read as if
    /// left-padded with `'0'`.
    pub fn decode(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        if bytes.len() > ENCODED_LEN {
            return Err(StoreError::Decode(format!(
                "ID {:?} has {} characters, at most {} allowed",
                s,
                bytes.len(),
                ENCODED_LEN
            )));
        }

        let mut value: u64 = 0;
        for (pos, &c) in bytes.iter().enumerate() {
            let digit = if c < 0x80 { DECODE_MAP[c as usize] } else { INVALID };
            if digit == INVALID {
                return Err(StoreError::Decode(format!(
                    "invalid ID character 0x{:02x} at position {}",
                    c, pos
                )));
            }
            if value > Self::MAX.0 >> 5 {
                return Err(StoreError::Decode(format!("ID {:?} exceeds 63 bits", s)));
            }
            value = (value << 5) | digit as u64;
        }
        Ok(Ksid(value))
    }

    fn encode(self) -> [u8; ENCODED_LEN] {
        let mut buf = [b'0'; ENCODED_LEN];
        let mut v = self.0;
        for slot in buf.iter_mut().rev() {
            *slot = ALPHABET[(v & 0x1F) as usize];
            v >>= 5;
        }
        buf
    }
}

/// Ticks elapsed between the epoch and `instant`, or `None` before the epoch
pub(crate) fn tick_at(instant: DateTime<Utc>) -> Option<u64> {
    let micros = instant.timestamp_micros() - EPOCH_MICROS;
    if micros < 0 {
        return None;
    }
    Some((micros / TICK_MICROS) as u64)
}

// =============================================================================
// Conversions
// =============================================================================

impl From<Ksid> for u64 {
    fn from(id: Ksid) -> u64 {
        id.0
    }
}

impl TryFrom<u64> for Ksid {
    type Error = StoreError;

    fn try_from(value: u64) -> Result<Self> {
        if value > Self::MAX.0 {
            return Err(StoreError::Decode(format!("{} exceeds 63 bits", value)));
        }
        Ok(Ksid(value))
    }
}

impl FromStr for Ksid {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

impl fmt::Display for Ksid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_char('0');
        }
        for b in self.encode() {
            f.write_char(b as char)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Ksid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ksid({})", self)
    }
}

// =============================================================================
// Serde (string form only)
// =============================================================================

impl Serialize for Ksid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ksid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_str(KsidVisitor)
    }
}

struct KsidVisitor;

impl<'de> Visitor<'de> for KsidVisitor {
    type Value = Ksid;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a base32 ID string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Ksid, E> {
        Ksid::decode(v).map_err(E::custom)
    }
}
