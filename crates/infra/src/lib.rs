//! Infrastructure layer: storage backends and the ledger engine.
//!
//! Contains the `InventoryStore` and `TransactionLedger` traits with their
//! in-memory (tests/dev) and journaled (durable) implementations, the
//! `AdjustmentEngine` that pairs a quantity write with a ledger append, and
//! the `BatchReconciler` for bulk imports.

pub mod adjustment;
pub mod reconcile;
pub mod store;


pub use adjustment::AdjustmentEngine;
pub use reconcile::{BatchReconciler, BatchResult, BatchRow};
