use std::sync::Arc;

use stockbook_core::{Sku, StoreResult};
use stockbook_inventory::InventoryRecord;
use stockbook_ledger::{TransactionKind, TransactionRecord};

/// Keyed storage for inventory records.
///
/// Implementations must:
/// - enforce SKU uniqueness (at most one record per SKU at any time)
/// - evaluate every validation before any durable write
/// - return records from `list_all` in a deterministic order for a given
///   store state (this crate's backends use ascending SKU order)
///
/// All mutation goes through the `AdjustmentEngine` or its merge path; no
/// other component writes to a store directly.
pub trait InventoryStore: Send + Sync {
    /// Look up a record by SKU. Absence is `None`, not an error.
    fn find_by_sku(&self, sku: &Sku) -> StoreResult<Option<InventoryRecord>>;

    /// Create a record for a new SKU. Fails with `DuplicateSku` if one exists.
    fn create(&self, name: &str, sku: &Sku, quantity: u32) -> StoreResult<InventoryRecord>;

    /// Replace the stored quantity. Fails with `NotFound` if the SKU is absent.
    fn set_quantity(&self, sku: &Sku, quantity: u32) -> StoreResult<InventoryRecord>;

    /// Delete a record. Fails with `NotFound` if the SKU is absent; removal
    /// is not idempotent, a second call fails too.
    fn remove(&self, sku: &Sku) -> StoreResult<()>;

    /// All records, ascending SKU order.
    fn list_all(&self) -> StoreResult<Vec<InventoryRecord>>;
}

/// Append-only ledger of committed quantity changes.
///
/// There are no update or delete operations; this is a deliberate design
/// constraint enforcing auditability. Implementations assign `id`
/// (monotonically increasing, never reused) and `timestamp` at append time.
pub trait TransactionLedger: Send + Sync {
    /// Append one record. `quantity` must be > 0, else `InvalidQuantity`.
    /// Duplicate content is legitimate (two identical restocks are two
    /// distinct records).
    fn append(
        &self,
        sku: &Sku,
        quantity: u32,
        kind: TransactionKind,
    ) -> StoreResult<TransactionRecord>;

    /// All records, newest first (descending id, which is assignment order).
    fn list_all(&self) -> StoreResult<Vec<TransactionRecord>>;
}

impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    fn find_by_sku(&self, sku: &Sku) -> StoreResult<Option<InventoryRecord>> {
        (**self).find_by_sku(sku)
    }

    fn create(&self, name: &str, sku: &Sku, quantity: u32) -> StoreResult<InventoryRecord> {
        (**self).create(name, sku, quantity)
    }

    fn set_quantity(&self, sku: &Sku, quantity: u32) -> StoreResult<InventoryRecord> {
        (**self).set_quantity(sku, quantity)
    }

    fn remove(&self, sku: &Sku) -> StoreResult<()> {
        (**self).remove(sku)
    }

    fn list_all(&self) -> StoreResult<Vec<InventoryRecord>> {
        (**self).list_all()
    }
}

impl<L> TransactionLedger for Arc<L>
where
    L: TransactionLedger + ?Sized,
{
    fn append(
        &self,
        sku: &Sku,
        quantity: u32,
        kind: TransactionKind,
    ) -> StoreResult<TransactionRecord> {
        (**self).append(sku, quantity, kind)
    }

    fn list_all(&self) -> StoreResult<Vec<TransactionRecord>> {
        (**self).list_all()
    }
}
