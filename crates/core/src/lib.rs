//! `stockbook-core` — shared domain foundation.
//!
//! This crate contains the identifiers and the closed error taxonomy used by
//! every other crate in the workspace. It has no IO and no storage concerns.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult, StorageError, StoreError, StoreResult};
pub use id::{Sku, TransactionId};
