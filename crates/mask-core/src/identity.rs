//! # Identity Newtypes
//!
//! Each identifier is a distinct type: a [`ProviderId`] cannot be passed
//! where a [`RequesterId`] is expected, even though both wrap an `i64`.
//!
//! Party and proxy identifiers are provisioned out-of-band as database
//! row ids, so they are integers with a total order. The allocator relies
//! on that order to scan the pool deterministically. Transaction ids are
//! minted by the ledger and are opaque UUIDs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Maximum accepted length of a contact address, in bytes.
pub const MAX_ADDRESS_LEN: usize = 64;

/// Defines an integer-backed row identifier newtype.
macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw row id.
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// The raw row id.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }
    };
}

row_id!(
    /// Row id of a requester (the party asking for the service, e.g. a rider).
    RequesterId
);

row_id!(
    /// Row id of a provider (the party performing the service, e.g. a driver).
    ProviderId
);

row_id!(
    /// Row id of a proxy number in the shared pool.
    ProxyId
);

/// Opaque identifier of a ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Mint a new random transaction identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a transaction identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A real or proxy contact address, typically an MSISDN such as `31970123456`.
///
/// Addresses are compared byte-for-byte after trimming surrounding
/// whitespace. No further normalization happens: the messaging provider
/// reports originators in the same format the numbers were provisioned in.
///
/// # Validation
///
/// - Must be non-empty after trimming
/// - Must not exceed [`MAX_ADDRESS_LEN`] bytes
/// - Must not contain whitespace or control characters
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Create an address, trimming and validating it.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidAddress`] if the value is empty,
    /// too long, or contains whitespace or control characters.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::InvalidAddress {
                value: raw,
                reason: "must not be empty",
            });
        }
        if trimmed.len() > MAX_ADDRESS_LEN {
            return Err(ValidationError::InvalidAddress {
                value: raw,
                reason: "too long",
            });
        }
        if trimmed
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(ValidationError::InvalidAddress {
                value: raw,
                reason: "must not contain whitespace or control characters",
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Access the address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

impl std::str::FromStr for Address {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
