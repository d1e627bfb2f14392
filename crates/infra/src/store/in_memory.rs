use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::Utc;

use stockbook_core::{DomainError, Sku, StorageError, StoreResult, TransactionId};
use stockbook_inventory::InventoryRecord;
use stockbook_ledger::{TransactionKind, TransactionRecord};

use super::r#trait::{InventoryStore, TransactionLedger};

/// In-memory inventory store.
///
/// Intended for tests/dev; state does not survive the process. The journaled
/// backend in `store::journal` provides the durable counterpart.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    items: RwLock<BTreeMap<Sku, InventoryRecord>>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InventoryStore for InMemoryInventoryStore {
    fn find_by_sku(&self, sku: &Sku) -> StoreResult<Option<InventoryRecord>> {
        let items = self.items.read().map_err(|_| StorageError::lock_poisoned())?;
        Ok(items.get(sku).cloned())
    }

    fn create(&self, name: &str, sku: &Sku, quantity: u32) -> StoreResult<InventoryRecord> {
        let mut items = self
            .items
            .write()
            .map_err(|_| StorageError::lock_poisoned())?;
        if items.contains_key(sku) {
            return Err(DomainError::duplicate_sku(sku).into());
        }
        let record = InventoryRecord::new(sku.clone(), name, quantity);
        items.insert(sku.clone(), record.clone());
        Ok(record)
    }

    fn set_quantity(&self, sku: &Sku, quantity: u32) -> StoreResult<InventoryRecord> {
        let mut items = self
            .items
            .write()
            .map_err(|_| StorageError::lock_poisoned())?;
        let record = items
            .get_mut(sku)
            .ok_or_else(|| DomainError::not_found(sku))?;
        record.quantity = quantity;
        Ok(record.clone())
    }

    fn remove(&self, sku: &Sku) -> StoreResult<()> {
        let mut items = self
            .items
            .write()
            .map_err(|_| StorageError::lock_poisoned())?;
        items
            .remove(sku)
            .map(|_| ())
            .ok_or_else(|| DomainError::not_found(sku).into())
    }

    fn list_all(&self) -> StoreResult<Vec<InventoryRecord>> {
        let items = self.items.read().map_err(|_| StorageError::lock_poisoned())?;
        Ok(items.values().cloned().collect())
    }
}

/// In-memory append-only transaction ledger.
///
/// Ids are assigned from the number of records already committed, so they
/// are monotonically increasing starting at 1 and never reused (records are
/// never removed).
#[derive(Debug, Default)]
pub struct InMemoryTransactionLedger {
    entries: RwLock<Vec<TransactionRecord>>,
}

impl InMemoryTransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransactionLedger for InMemoryTransactionLedger {
    fn append(
        &self,
        sku: &Sku,
        quantity: u32,
        kind: TransactionKind,
    ) -> StoreResult<TransactionRecord> {
        if quantity == 0 {
            return Err(
                DomainError::invalid_quantity("transaction quantity must be > 0").into(),
            );
        }
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::lock_poisoned())?;
        let record = TransactionRecord {
            id: TransactionId::new(entries.len() as u64 + 1),
            sku: sku.clone(),
            quantity,
            kind,
            timestamp: Utc::now(),
        };
        entries.push(record.clone());
        Ok(record)
    }

    fn list_all(&self) -> StoreResult<Vec<TransactionRecord>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StorageError::lock_poisoned())?;
        Ok(entries.iter().rev().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockbook_core::StoreError;

    #[test]
    fn create_rejects_duplicate_sku() {
        let store = InMemoryInventoryStore::new();
        let sku = Sku::new("W1");
        store.create("Widget", &sku, 10).unwrap();

        let err = store.create("Widget again", &sku, 3).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(DomainError::DuplicateSku(_))
        ));

        // The existing record is untouched.
        let rec = store.find_by_sku(&sku).unwrap().unwrap();
        assert_eq!(rec.name, "Widget");
        assert_eq!(rec.quantity, 10);
    }

    #[test]
    fn set_quantity_requires_an_existing_record() {
        let store = InMemoryInventoryStore::new();
        let err = store.set_quantity(&Sku::new("missing"), 5).unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::NotFound(_))));
    }

    #[test]
    fn remove_is_not_idempotent() {
        let store = InMemoryInventoryStore::new();
        let sku = Sku::new("W1");
        store.create("Widget", &sku, 0).unwrap();

        store.remove(&sku).unwrap();
        let err = store.remove(&sku).unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::NotFound(_))));
    }

    #[test]
    fn list_all_is_in_sku_order() {
        let store = InMemoryInventoryStore::new();
        store.create("b", &Sku::new("B"), 1).unwrap();
        store.create("a", &Sku::new("A"), 2).unwrap();
        store.create("c", &Sku::new("C"), 3).unwrap();

        let skus: Vec<_> = store
            .list_all()
            .unwrap()
            .into_iter()
            .map(|r| r.sku.as_str().to_string())
            .collect();
        assert_eq!(skus, vec!["A", "B", "C"]);
    }

    #[test]
    fn ledger_assigns_monotonic_ids_and_lists_newest_first() {
        let ledger = InMemoryTransactionLedger::new();
        let sku = Sku::new("W1");
        let first = ledger.append(&sku, 5, TransactionKind::Restock).unwrap();
        let second = ledger.append(&sku, 5, TransactionKind::Restock).unwrap();

        // Identical content is legitimate; ids still differ.
        assert_eq!(first.id.as_u64(), 1);
        assert_eq!(second.id.as_u64(), 2);

        let listed = ledger.list_all().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[test]
    fn ledger_rejects_zero_quantity() {
        let ledger = InMemoryTransactionLedger::new();
        let err = ledger
            .append(&Sku::new("W1"), 0, TransactionKind::Sale)
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(DomainError::InvalidQuantity(_))
        ));
        assert!(ledger.list_all().unwrap().is_empty());
    }
}
