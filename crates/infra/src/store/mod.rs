//! Storage boundary for inventory state and the transaction ledger.
//!
//! This module defines the two storage abstractions without making any
//! backend assumptions, plus an in-memory backend for tests/dev and a
//! journaled backend that survives process restarts.

pub mod in_memory;
pub mod journal;
pub mod r#trait;

pub use in_memory::{InMemoryInventoryStore, InMemoryTransactionLedger};
pub use journal::{
    recover, FileJournal, JournalEntry, JournaledInventoryStore, JournaledTransactionLedger,
};
pub use r#trait::{InventoryStore, TransactionLedger};
