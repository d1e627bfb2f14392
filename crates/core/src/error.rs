//! Error taxonomy.
//!
//! Two layers, kept separate on purpose: `DomainError` covers deterministic
//! business failures the caller can fix by correcting input, `StorageError`
//! covers infrastructure failures the caller may retry with backoff.
//! `StoreError` is the sum returned by storage traits and engine operations.

use thiserror::Error;

use crate::id::Sku;

/// Result type for pure domain decisions.
pub type DomainResult<T> = Result<T, DomainError>;

/// Result type for store/ledger/engine operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Deterministic domain failure. Never retried automatically.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An inventory record already exists for this SKU.
    #[error("duplicate sku: {0}")]
    DuplicateSku(Sku),

    /// No inventory record exists for this SKU.
    #[error("sku not found: {0}")]
    NotFound(Sku),

    /// A quantity was zero where a positive magnitude is required, did not
    /// parse, or overflowed the stored range.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// A sale would drive stock below zero.
    #[error("insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: Sku,
        available: u32,
        requested: u32,
    },
}

impl DomainError {
    pub fn duplicate_sku(sku: &Sku) -> Self {
        Self::DuplicateSku(sku.clone())
    }

    pub fn not_found(sku: &Sku) -> Self {
        Self::NotFound(sku.clone())
    }

    pub fn invalid_quantity(msg: impl Into<String>) -> Self {
        Self::InvalidQuantity(msg.into())
    }

    pub fn insufficient_stock(sku: &Sku, available: u32, requested: u32) -> Self {
        Self::InsufficientStock {
            sku: sku.clone(),
            available,
            requested,
        }
    }
}

/// Infrastructure failure. May be retried by the caller; never swallowed.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing store is unusable (e.g. a poisoned lock after a panic).
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// The durable medium failed (journal write, fsync, read).
    #[error("storage io failure: {0}")]
    Io(String),

    /// A journal record could not be encoded or decoded.
    #[error("storage encoding failure: {0}")]
    Encode(String),
}

impl StorageError {
    /// A poisoned lock means a writer panicked mid-update.
    pub fn lock_poisoned() -> Self {
        Self::Unavailable("lock poisoned".to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

/// Unified failure surface for store and engine operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl StoreError {
    pub fn is_domain(&self) -> bool {
        matches!(self, Self::Domain(_))
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
