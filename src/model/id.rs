//! Document identifiers.
//!
//! Identifiers are BSON object ids: 12 bytes rendered as 24 lowercase hex
//! characters, with a leading creation timestamp. They serialize as the hex
//! string in JSON and YAML.

use std::fmt;
use std::str::FromStr;

use bson::oid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Reserved identifier of the implicit local host.
pub const LOCAL_HOST_ID: ObjectId = ObjectId(oid::ObjectId::from_bytes([0; 12]));

/// Returned when a string is not a 24-character hex identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid identifier: '{0}'")]
pub struct InvalidIdError(pub String);

/// A 12-byte document identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(oid::ObjectId);

impl ObjectId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(oid::ObjectId::new())
    }

    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(oid::ObjectId::from_bytes(bytes))
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0.bytes()
    }

    /// Parse a 24-character hex string (either case).
    ///
    /// # Errors
    /// Returns [`InvalidIdError`] for any other input.
    pub fn parse_str(s: &str) -> Result<Self, InvalidIdError> {
        oid::ObjectId::parse_str(s)
            .map(Self)
            .map_err(|_| InvalidIdError(s.to_string()))
    }

    pub fn is_valid(s: &str) -> bool {
        Self::parse_str(s).is_ok()
    }

    /// Lowercase hex representation.
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    /// Creation time embedded in the identifier.
    pub fn timestamp(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.0.timestamp().timestamp_millis())
            .unwrap_or(DateTime::UNIX_EPOCH)
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({self})")
    }
}

impl FromStr for ObjectId {
    type Err = InvalidIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse_str(&s).map_err(serde::de::Error::custom)
    }
}
