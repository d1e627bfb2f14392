//! Durable journaled backend.
//!
//! Durability follows a write-ahead pattern: every state change is appended
//! to a line-oriented journal (one JSON object per line, fsynced) before the
//! in-memory state is mutated. `recover` replays the journal on startup and
//! runs a reconciliation pass: an adjustment whose ledger line was committed
//! but whose paired quantity line is missing (crash between the two writes)
//! has its quantity update derived from the ledger line, so the pair is
//! observed both-or-neither across restarts. Each derivation is journaled
//! before it becomes visible, so the ledger line is paired on disk and a
//! later crash cannot drop or double-apply it.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write as _};
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use stockbook_core::{DomainError, Sku, StorageError, StoreResult, TransactionId};
use stockbook_inventory::InventoryRecord;
use stockbook_ledger::{TransactionKind, TransactionRecord};

use super::r#trait::{InventoryStore, TransactionLedger};

/// One durable journal line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JournalEntry {
    Created {
        sku: Sku,
        name: String,
        quantity: u32,
    },
    QuantitySet {
        sku: Sku,
        quantity: u32,
    },
    Removed {
        sku: Sku,
    },
    Appended {
        id: TransactionId,
        sku: Sku,
        quantity: u32,
        kind: TransactionKind,
        at: DateTime<Utc>,
    },
}

/// Append-only journal file shared by the journaled store and ledger.
///
/// A single handle (and its mutex) is shared so that lines from concurrent
/// writers never interleave mid-line.
#[derive(Debug)]
pub struct FileJournal {
    file: Mutex<File>,
}

impl FileJournal {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(StorageError::from)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Durably append one entry. Returns only after the line reached disk.
    pub fn record(&self, entry: &JournalEntry) -> Result<(), StorageError> {
        let mut line = serde_json::to_string(entry)
            .map_err(|e| StorageError::Encode(e.to_string()))?;
        line.push('\n');

        let mut file = self.file.lock().map_err(|_| StorageError::lock_poisoned())?;
        file.write_all(line.as_bytes()).map_err(StorageError::from)?;
        file.sync_data().map_err(StorageError::from)?;
        Ok(())
    }
}

fn read_entries(path: &Path) -> Result<Vec<JournalEntry>, StorageError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StorageError::from(e)),
    };

    let mut entries = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(StorageError::from)?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: JournalEntry = serde_json::from_str(&line).map_err(|e| {
            StorageError::Encode(format!("journal line {}: {e}", lineno + 1))
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Journaled inventory store: in-memory state with every mutation written
/// ahead to the shared journal. Memory changes only after the journal line
/// is durable, so a failed write leaves the pre-call state intact.
#[derive(Debug)]
pub struct JournaledInventoryStore {
    items: RwLock<BTreeMap<Sku, InventoryRecord>>,
    journal: Arc<FileJournal>,
}

impl JournaledInventoryStore {
    pub fn new(journal: Arc<FileJournal>) -> Self {
        Self::with_state(BTreeMap::new(), journal)
    }

    fn with_state(items: BTreeMap<Sku, InventoryRecord>, journal: Arc<FileJournal>) -> Self {
        Self {
            items: RwLock::new(items),
            journal,
        }
    }
}

impl InventoryStore for JournaledInventoryStore {
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
        self.journal.record(&JournalEntry::Created {
            sku: sku.clone(),
            name: name.to_string(),
            quantity,
        })?;
        let record = InventoryRecord::new(sku.clone(), name, quantity);
        items.insert(sku.clone(), record.clone());
        Ok(record)
    }

    fn set_quantity(&self, sku: &Sku, quantity: u32) -> StoreResult<InventoryRecord> {
        let mut items = self
            .items
            .write()
            .map_err(|_| StorageError::lock_poisoned())?;
        if !items.contains_key(sku) {
            return Err(DomainError::not_found(sku).into());
        }
        self.journal.record(&JournalEntry::QuantitySet {
            sku: sku.clone(),
            quantity,
        })?;
        let record = items.get_mut(sku).ok_or_else(|| DomainError::not_found(sku))?;
        record.quantity = quantity;
        Ok(record.clone())
    }

    fn remove(&self, sku: &Sku) -> StoreResult<()> {
        let mut items = self
            .items
            .write()
            .map_err(|_| StorageError::lock_poisoned())?;
        if !items.contains_key(sku) {
            return Err(DomainError::not_found(sku).into());
        }
        self.journal.record(&JournalEntry::Removed { sku: sku.clone() })?;
        items.remove(sku);
        Ok(())
    }

    fn list_all(&self) -> StoreResult<Vec<InventoryRecord>> {
        let items = self.items.read().map_err(|_| StorageError::lock_poisoned())?;
        Ok(items.values().cloned().collect())
    }
}

/// Journaled append-only ledger. The journal line carries the assigned `id`
/// and `timestamp`, so recovery restores records verbatim.
#[derive(Debug)]
pub struct JournaledTransactionLedger {
    entries: RwLock<Vec<TransactionRecord>>,
    journal: Arc<FileJournal>,
}

impl JournaledTransactionLedger {
    pub fn new(journal: Arc<FileJournal>) -> Self {
        Self::with_state(Vec::new(), journal)
    }

    fn with_state(entries: Vec<TransactionRecord>, journal: Arc<FileJournal>) -> Self {
        Self {
            entries: RwLock::new(entries),
            journal,
        }
    }
}

impl TransactionLedger for JournaledTransactionLedger {
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
        self.journal.record(&JournalEntry::Appended {
            id: record.id,
            sku: record.sku.clone(),
            quantity: record.quantity,
            kind: record.kind,
            at: record.timestamp,
        })?;
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

/// Rebuild a store/ledger pair from a journal file.
///
/// Replays entries in order, then runs the reconciliation pass: every
/// ledger line not followed by its paired quantity line has its inventory
/// update derived and applied, in journal order. Derived quantities are
/// journaled before they are applied, so an interrupted recovery (or a
/// crash right after one) replays to the same state.
pub fn recover(
    path: impl AsRef<Path>,
) -> StoreResult<(JournaledInventoryStore, JournaledTransactionLedger)> {
    let path = path.as_ref();
    let journal_entries = read_entries(path)?;

    let mut items: BTreeMap<Sku, InventoryRecord> = BTreeMap::new();
    let mut ledger: Vec<TransactionRecord> = Vec::new();
    // Ledger lines awaiting their paired quantity line, in journal order.
    // The engine writes the pair under the per-SKU lock, so a quantity line
    // pairs with the oldest pending ledger line for its SKU.
    let mut pending: Vec<(Sku, TransactionKind, u32)> = Vec::new();

    for entry in journal_entries {
        match entry {
            JournalEntry::Created {
                sku,
                name,
                quantity,
            } => {
                items.insert(sku.clone(), InventoryRecord::new(sku, name, quantity));
            }
            JournalEntry::QuantitySet { sku, quantity } => {
                if let Some(pos) = pending.iter().position(|(s, _, _)| s == &sku) {
                    pending.remove(pos);
                }
                match items.get_mut(&sku) {
                    Some(record) => record.quantity = quantity,
                    None => warn!(sku = %sku, "journal sets quantity for unknown sku; line ignored"),
                }
            }
            JournalEntry::Removed { sku } => {
                pending.retain(|(s, _, _)| s != &sku);
                if items.remove(&sku).is_none() {
                    warn!(sku = %sku, "journal removes unknown sku; line ignored");
                }
            }
            JournalEntry::Appended {
                id,
                sku,
                quantity,
                kind,
                at,
            } => {
                ledger.push(TransactionRecord {
                    id,
                    sku: sku.clone(),
                    quantity,
                    kind,
                    timestamp: at,
                });
                pending.push((sku, kind, quantity));
            }
        }
    }

    let journal = Arc::new(FileJournal::open(path)?);

    // Reconciliation pass: derive the missing half of each interrupted
    // pair. The derivation is journaled first, which pairs the ledger line
    // on disk; only then does it become visible in memory.
    for (sku, kind, quantity) in pending {
        match items.get_mut(&sku) {
            Some(record) => match record.quantity_after(kind.signed_delta(quantity)) {
                Ok(derived) => {
                    journal.record(&JournalEntry::QuantitySet {
                        sku: sku.clone(),
                        quantity: derived,
                    })?;
                    warn!(sku = %sku, derived, "derived quantity from unpaired ledger line");
                    record.quantity = derived;
                }
                Err(e) => {
                    warn!(sku = %sku, error = %e, "unpaired ledger line not applicable; skipped")
                }
            },
            None => warn!(sku = %sku, "unpaired ledger line for unknown sku; skipped"),
        }
    }

    Ok((
        JournaledInventoryStore::with_state(items, journal.clone()),
        JournaledTransactionLedger::with_state(ledger, journal),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_journal() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stockbook.journal");
        (dir, path)
    }

    #[test]
    fn recover_from_missing_file_is_empty() {
        let (_dir, path) = temp_journal();
        let (store, ledger) = recover(&path).unwrap();
        assert!(store.list_all().unwrap().is_empty());
        assert!(ledger.list_all().unwrap().is_empty());
    }

    #[test]
    fn recover_restores_state_verbatim() {
        let (_dir, path) = temp_journal();
        let sku = Sku::new("W1");

        let committed = {
            let journal = Arc::new(FileJournal::open(&path).unwrap());
            let store = JournaledInventoryStore::new(journal.clone());
            let ledger = JournaledTransactionLedger::new(journal);

            store.create("Widget", &sku, 10).unwrap();
            let tx = ledger.append(&sku, 5, TransactionKind::Restock).unwrap();
            store.set_quantity(&sku, 15).unwrap();
            store.create("Other", &Sku::new("W2"), 3).unwrap();
            store.remove(&Sku::new("W2")).unwrap();
            tx
        };

        let (store, ledger) = recover(&path).unwrap();
        let records = store.list_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].quantity, 15);

        // Ids and timestamps survive a restart unchanged.
        let entries = ledger.list_all().unwrap();
        assert_eq!(entries, vec![committed]);
    }

    #[test]
    fn ledger_ids_stay_monotonic_across_recovery() {
        let (_dir, path) = temp_journal();
        let sku = Sku::new("W1");

        {
            let journal = Arc::new(FileJournal::open(&path).unwrap());
            let store = JournaledInventoryStore::new(journal.clone());
            let ledger = JournaledTransactionLedger::new(journal);
            store.create("Widget", &sku, 0).unwrap();
            ledger.append(&sku, 1, TransactionKind::Restock).unwrap();
            ledger.append(&sku, 2, TransactionKind::Restock).unwrap();
        }

        let (_store, ledger) = recover(&path).unwrap();
        let tx = ledger.append(&sku, 3, TransactionKind::Restock).unwrap();
        assert_eq!(tx.id.as_u64(), 3);
    }

    #[test]
    fn reconciliation_derives_the_missing_quantity_write() {
        let (_dir, path) = temp_journal();
        let sku = Sku::new("W1");

        {
            let journal = Arc::new(FileJournal::open(&path).unwrap());
            let store = JournaledInventoryStore::new(journal.clone());
            let ledger = JournaledTransactionLedger::new(journal.clone());
            store.create("Widget", &sku, 10).unwrap();

            // Simulate a crash between the ledger append and the quantity
            // write: the ledger line reaches the journal, the paired
            // quantity line does not.
            ledger.append(&sku, 4, TransactionKind::Sale).unwrap();
        }

        let (store, ledger) = recover(&path).unwrap();
        let record = store.find_by_sku(&sku).unwrap().unwrap();
        assert_eq!(record.quantity, 6);
        assert_eq!(ledger.list_all().unwrap().len(), 1);
    }

    #[test]
    fn derived_quantities_survive_repeated_interrupted_restarts() {
        let (_dir, path) = temp_journal();
        let sku = Sku::new("W1");

        {
            let journal = Arc::new(FileJournal::open(&path).unwrap());
            let store = JournaledInventoryStore::new(journal.clone());
            let ledger = JournaledTransactionLedger::new(journal);
            store.create("Widget", &sku, 10).unwrap();

            // Crash #1: ledger line committed, quantity line missing.
            ledger.append(&sku, 4, TransactionKind::Sale).unwrap();
        }

        {
            let (store, ledger) = recover(&path).unwrap();
            assert_eq!(store.find_by_sku(&sku).unwrap().unwrap().quantity, 6);

            // Crash #2: same SKU, again between the pair. The earlier
            // derivation must already be on disk, or this sale's recovery
            // would overwrite it.
            ledger.append(&sku, 2, TransactionKind::Sale).unwrap();
        }

        let (store, ledger) = recover(&path).unwrap();
        assert_eq!(store.find_by_sku(&sku).unwrap().unwrap().quantity, 4);
        assert_eq!(ledger.list_all().unwrap().len(), 2);
    }

    #[test]
    fn multiple_unpaired_ledger_lines_apply_in_order() {
        let (_dir, path) = temp_journal();
        let sku = Sku::new("W1");

        // Raw journal with two unpaired ledger lines for one SKU; both
        // committed sales must survive recovery.
        {
            let journal = FileJournal::open(&path).unwrap();
            journal
                .record(&JournalEntry::Created {
                    sku: sku.clone(),
                    name: "Widget".to_string(),
                    quantity: 10,
                })
                .unwrap();
            journal
                .record(&JournalEntry::Appended {
                    id: TransactionId::new(1),
                    sku: sku.clone(),
                    quantity: 4,
                    kind: TransactionKind::Sale,
                    at: Utc::now(),
                })
                .unwrap();
            journal
                .record(&JournalEntry::Appended {
                    id: TransactionId::new(2),
                    sku: sku.clone(),
                    quantity: 2,
                    kind: TransactionKind::Sale,
                    at: Utc::now(),
                })
                .unwrap();
        }

        let (store, ledger) = recover(&path).unwrap();
        assert_eq!(store.find_by_sku(&sku).unwrap().unwrap().quantity, 4);
        assert_eq!(ledger.list_all().unwrap().len(), 2);
    }

    #[test]
    fn a_paired_quantity_line_is_not_derived_twice() {
        let (_dir, path) = temp_journal();
        let sku = Sku::new("W1");

        {
            let journal = Arc::new(FileJournal::open(&path).unwrap());
            let store = JournaledInventoryStore::new(journal.clone());
            let ledger = JournaledTransactionLedger::new(journal);
            store.create("Widget", &sku, 10).unwrap();
            ledger.append(&sku, 4, TransactionKind::Sale).unwrap();
            store.set_quantity(&sku, 6).unwrap();
        }

        let (store, _ledger) = recover(&path).unwrap();
        assert_eq!(store.find_by_sku(&sku).unwrap().unwrap().quantity, 6);
    }
}
