//! Store-generated record identity.
//!
//! [`RecordId`] is a 12-byte object id: a 4-byte big-endian Unix timestamp
//! (seconds), a 5-byte per-process random value, and a 3-byte big-endian
//! counter. The rendered form is 24 lowercase hex characters, so lexicographic
//! order of the hex string equals byte order, and ids generated later sort
//! after ids generated earlier.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Length of a rendered [`RecordId`] in hex characters.
pub const RECORD_ID_HEX_LEN: usize = 24;

/// Error returned when a string is not a valid 24-char hex object id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid record id: {input:?}")]
pub struct IdError {
    /// The rejected input, kept for diagnostics.
    pub input: String,
}

/// Stable identity of a stored record.
///
/// Ordering compares the raw bytes, which puts newer ids after older ones.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId([u8; 12]);

static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();
static COUNTER: OnceLock<AtomicU32> = OnceLock::new();

impl RecordId {
    /// Generates a fresh id stamped with the current wall-clock second.
    #[must_use]
    pub fn new() -> Self {
        // Seconds since epoch fit in u32 until 2106.
        #[allow(clippy::cast_possible_truncation)]
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as u32;
        Self::with_timestamp(secs)
    }

    /// Generates an id with the given timestamp prefix (seconds since epoch).
    #[must_use]
    pub fn with_timestamp(secs: u32) -> Self {
        let unique = PROCESS_UNIQUE.get_or_init(rand::random::<[u8; 5]>);
        let counter = COUNTER
            .get_or_init(|| AtomicU32::new(rand::random::<u32>() & 0x00FF_FFFF))
            .fetch_add(1, Ordering::Relaxed)
            & 0x00FF_FFFF;

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(unique);
        bytes[9..].copy_from_slice(&counter.to_be_bytes()[1..]);
        Self(bytes)
    }

    /// Builds an id from its raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Parses a 24-char hex string.
    ///
    /// # Errors
    ///
    /// Returns [`IdError`] if the input is not exactly 24 hex characters.
    pub fn parse_hex(input: &str) -> Result<Self, IdError> {
        if input.len() != RECORD_ID_HEX_LEN {
            return Err(IdError {
                input: input.to_string(),
            });
        }
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(input, &mut bytes).map_err(|_| IdError {
            input: input.to_string(),
        })?;
        Ok(Self(bytes))
    }

    /// Renders the id as 24 lowercase hex characters.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw bytes of the id.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.to_hex())
    }
}

impl FromStr for RecordId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_hex(s)
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse_hex(&s).map_err(serde::de::Error::custom)
    }
}
