//! Transaction ledger domain module.
//!
//! Pure types for the append-only audit trail: every committed quantity
//! change is a `TransactionRecord`. There are deliberately no update or
//! delete concepts anywhere in this crate.

pub mod transaction;

pub use transaction::{TransactionKind, TransactionRecord};
