//! Bulk-import reconciliation.
//!
//! Merges externally supplied rows (e.g. a parsed tabular upload) into
//! current inventory state. Parsing the upload into rows is a boundary
//! concern; this module receives rows whose fields may be missing or
//! malformed and must tolerate them without failing the batch.

use tracing::{debug, instrument, warn};

use stockbook_core::{Sku, StoreError, StoreResult};

use crate::adjustment::AdjustmentEngine;
use crate::store::{InventoryStore, TransactionLedger};

/// One candidate row from a bulk import. Fields are optional because the
/// upstream format does not guarantee them; `quantity` arrives as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchRow {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub quantity: Option<String>,
}

impl BatchRow {
    pub fn new(
        name: impl Into<String>,
        sku: impl Into<String>,
        quantity: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            sku: Some(sku.into()),
            quantity: Some(quantity.into()),
        }
    }
}

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    /// Rows merged or created.
    pub processed: usize,
    /// Indices of rows that were skipped (missing fields, unparseable
    /// quantity, or a per-row domain failure).
    pub skipped: Vec<usize>,
    /// Whether every storage write of the batch durably succeeded. A
    /// storage failure aborts the run instead, so a returned result is
    /// always committed.
    pub committed: bool,
}

/// Merges batches of rows through an `AdjustmentEngine`'s merge path.
///
/// Row outcomes never abort the batch; only a storage-layer failure does.
/// Merges are out-of-band corrective updates and produce no ledger entries.
pub struct BatchReconciler<'a, S, L> {
    engine: &'a AdjustmentEngine<S, L>,
}

impl<'a, S, L> BatchReconciler<'a, S, L>
where
    S: InventoryStore,
    L: TransactionLedger,
{
    pub fn new(engine: &'a AdjustmentEngine<S, L>) -> Self {
        Self { engine }
    }

    /// Reconcile rows in order. Returns the per-row accounting, or
    /// `StoreError::Storage` if the underlying storage failed mid-batch.
    #[instrument(skip_all, fields(rows = rows.len()), err)]
    pub fn reconcile(&self, rows: &[BatchRow]) -> StoreResult<BatchResult> {
        let mut processed = 0usize;
        let mut skipped = Vec::new();

        for (index, row) in rows.iter().enumerate() {
            let Some((name, sku, quantity)) = parse_row(row) else {
                debug!(index, "row skipped: missing or malformed fields");
                skipped.push(index);
                continue;
            };

            match self.engine.merge(&name, &sku, quantity) {
                Ok(record) => {
                    debug!(index, sku = %sku, quantity = record.quantity, "row merged");
                    processed += 1;
                }
                Err(StoreError::Domain(e)) => {
                    warn!(index, sku = %sku, error = %e, "row skipped: domain failure");
                    skipped.push(index);
                }
                // Fatal: the store itself is failing; abort the batch.
                Err(e @ StoreError::Storage(_)) => return Err(e),
            }
        }

        Ok(BatchResult {
            processed,
            skipped,
            committed: true,
        })
    }
}

/// Extract the usable fields of a row. `None` means the row is skipped:
/// a field is missing or blank, or the quantity is not a non-negative
/// integer in range.
fn parse_row(row: &BatchRow) -> Option<(String, Sku, u32)> {
    let name = non_blank(row.name.as_deref())?;
    let sku = non_blank(row.sku.as_deref())?;
    let quantity: u32 = non_blank(row.quantity.as_deref())?.parse().ok()?;
    Some((name.to_string(), Sku::new(sku), quantity))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
