//! Strongly-typed identifiers used across the domain.

use serde::{Deserialize, Serialize};

/// Stock-keeping unit: the unique identifier of an inventory item.
///
/// A `Sku` is an opaque, caller-supplied label. The engine treats it as a
/// pure key; syntactic rules (length, character set) belong to the boundary
/// layer that parses requests.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Sku {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<&str> for Sku {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Sku {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of a committed transaction record.
///
/// Assigned by the ledger at write time, monotonically increasing within a
/// ledger, never reused. The first record of a ledger gets id 1.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(u64);

impl TransactionId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<u64> for TransactionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
