use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockbook_core::{Sku, TransactionId};

/// Direction of a quantity change. The sign lives here, not in the
/// transaction's `quantity`, which is always a positive magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Decreases stock.
    Sale,
    /// Increases stock.
    Restock,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Sale => "sale",
            TransactionKind::Restock => "restock",
        }
    }

    /// Signed delta this kind applies for a given magnitude.
    pub fn signed_delta(&self, quantity: u32) -> i64 {
        match self {
            TransactionKind::Sale => -i64::from(quantity),
            TransactionKind::Restock => i64::from(quantity),
        }
    }
}

impl core::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One committed, immutable quantity change.
///
/// `id` and `timestamp` are assigned by the ledger at commit time, never by
/// the caller. Once written a record is never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub sku: Sku,
    pub quantity: u32,
    pub kind: TransactionKind,
    pub timestamp: DateTime<Utc>,
}
