//! Adjustment execution pipeline (application-level orchestration).
//!
//! `AdjustmentEngine` coordinates one quantity change end to end: validate
//! the magnitude, serialize on the SKU, decide the candidate quantity with
//! the pure domain logic, then commit the ledger append and the quantity
//! write as a pair.
//!
//! ## Execution guarantees
//!
//! - **Linearizable per SKU**: a lazily populated registry of per-SKU
//!   mutexes is held across lookup, decision and both writes, so two
//!   concurrent sales that would jointly overdraw stock cannot both succeed.
//!   Different SKUs proceed fully in parallel.
//! - **Atomic pairing**: the ledger append happens first (write-ahead
//!   order); the quantity write follows under the same lock. The journaled
//!   backend derives a missing quantity write from the trailing ledger line
//!   during startup recovery, so the pair is both-or-neither across
//!   restarts.
//! - **No retained partial state**: every validation runs before the first
//!   write; a validation failure leaves both stores untouched.
//!
//! The engine holds no persistent state of its own. Store and ledger are
//! injected by the caller, which owns their lifecycle; there is no global
//! database handle anywhere in the workspace.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, error, instrument};

use stockbook_core::{DomainError, Sku, StorageError, StoreResult};
use stockbook_inventory::InventoryRecord;
use stockbook_ledger::{TransactionKind, TransactionRecord};

use crate::store::{InventoryStore, TransactionLedger};

/// Lazily populated registry of per-SKU mutexes.
///
/// The registry itself is only locked long enough to clone the per-SKU
/// handle; the per-SKU mutex is then held for the duration of the operation.
/// Paths that leave a SKU without a record (unknown-SKU lookups, deletion)
/// evict the entry afterwards, so the registry tracks live inventory plus
/// in-flight operations rather than every SKU string ever requested.
#[derive(Debug, Default)]
struct SkuLocks {
    inner: Mutex<HashMap<Sku, Arc<Mutex<()>>>>,
}

impl SkuLocks {
    fn handle(&self, sku: &Sku) -> Result<Arc<Mutex<()>>, StorageError> {
        let mut map = self.inner.lock().map_err(|_| StorageError::lock_poisoned())?;
        Ok(map.entry(sku.clone()).or_default().clone())
    }

    /// Drop the registry entry unless another operation still holds a clone
    /// of the handle. Callers must release their own guard and handle first;
    /// any concurrent holder keeps the strong count above one, and its own
    /// eviction attempt runs once it finishes.
    fn evict_if_unused(&self, sku: &Sku) {
        if let Ok(mut map) = self.inner.lock() {
            if map.get(sku).is_some_and(|handle| Arc::strong_count(handle) == 1) {
                map.remove(sku);
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().map(|map| map.len()).unwrap_or(0)
    }
}

/// Coordinates single quantity changes against an injected store and ledger.
#[derive(Debug)]
pub struct AdjustmentEngine<S, L> {
    store: S,
    ledger: L,
    locks: SkuLocks,
}

impl<S, L> AdjustmentEngine<S, L> {
    pub fn new(store: S, ledger: L) -> Self {
        Self {
            store,
            ledger,
            locks: SkuLocks::default(),
        }
    }
}

impl<S, L> AdjustmentEngine<S, L>
where
    S: InventoryStore,
    L: TransactionLedger,
{
    /// Apply one sale or restock to a SKU, appending the audit record.
    ///
    /// Fails with `InvalidQuantity` for a zero magnitude, `NotFound` for an
    /// unknown SKU and `InsufficientStock` when a sale would overdraw; none
    /// of those leave any write behind.
    #[instrument(skip(self), fields(sku = %sku, kind = %kind), err)]
    pub fn adjust(
        &self,
        sku: &Sku,
        kind: TransactionKind,
        quantity: u32,
    ) -> StoreResult<TransactionRecord> {
        if quantity == 0 {
            return Err(
                DomainError::invalid_quantity("adjustment quantity must be > 0").into(),
            );
        }

        let handle = self.locks.handle(sku)?;
        let guard = handle.lock().map_err(|_| StorageError::lock_poisoned())?;

        let Some(record) = self.store.find_by_sku(sku)? else {
            drop(guard);
            drop(handle);
            self.locks.evict_if_unused(sku);
            return Err(DomainError::not_found(sku).into());
        };
        let candidate = record.quantity_after(kind.signed_delta(quantity))?;

        // Write-ahead order: ledger first, quantity second. The quantity
        // write cannot fail validation here (the record exists and the
        // candidate is in range), so a failure is a storage fault; recovery
        // resolves it in favor of the ledger line.
        let transaction = self.ledger.append(sku, quantity, kind)?;
        if let Err(e) = self.store.set_quantity(sku, candidate) {
            error!(sku = %sku, error = %e, "quantity write failed after ledger append");
            return Err(e);
        }

        debug!(sku = %sku, quantity = candidate, transaction = %transaction.id, "adjustment committed");
        Ok(transaction)
    }

    /// Create a new inventory record. Initial stock is not a transaction;
    /// nothing is appended to the ledger.
    ///
    /// The existence pre-check surfaces a clean `DuplicateSku` instead of a
    /// low-level uniqueness violation; the store enforces uniqueness again
    /// underneath.
    #[instrument(skip(self, name), fields(sku = %sku), err)]
    pub fn create_item(
        &self,
        name: &str,
        sku: &Sku,
        quantity: u32,
    ) -> StoreResult<InventoryRecord> {
        let handle = self.locks.handle(sku)?;
        let _guard = handle.lock().map_err(|_| StorageError::lock_poisoned())?;

        if self.store.find_by_sku(sku)?.is_some() {
            return Err(DomainError::duplicate_sku(sku).into());
        }
        self.store.create(name, sku, quantity)
    }

    /// Delete an inventory record. Past transactions referencing the SKU are
    /// kept untouched; deletion never rewrites history.
    #[instrument(skip(self), fields(sku = %sku), err)]
    pub fn delete_item(&self, sku: &Sku) -> StoreResult<()> {
        let handle = self.locks.handle(sku)?;
        let guard = handle.lock().map_err(|_| StorageError::lock_poisoned())?;

        let result = self.store.remove(sku);
        drop(guard);
        drop(handle);
        self.locks.evict_if_unused(sku);
        result
    }

    /// Merge one bulk-import row: additive update of an existing record, or
    /// creation of a new one. This is the out-of-band corrective path used
    /// by `BatchReconciler`; it produces no ledger entry.
    #[instrument(skip(self, name), fields(sku = %sku), err)]
    pub fn merge(&self, name: &str, sku: &Sku, quantity: u32) -> StoreResult<InventoryRecord> {
        let handle = self.locks.handle(sku)?;
        let _guard = handle.lock().map_err(|_| StorageError::lock_poisoned())?;

        match self.store.find_by_sku(sku)? {
            Some(record) => {
                let merged = record.quantity_after(i64::from(quantity))?;
                self.store.set_quantity(sku, merged)
            }
            None => self.store.create(name, sku, quantity),
        }
    }

    /// All inventory records, ascending SKU order.
    pub fn list_inventory(&self) -> StoreResult<Vec<InventoryRecord>> {
        self.store.list_all()
    }

    /// All transactions, newest first.
    pub fn list_transactions(&self) -> StoreResult<Vec<TransactionRecord>> {
        self.ledger.list_all()
    }
}
