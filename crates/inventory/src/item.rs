use serde::{Deserialize, Serialize};

use stockbook_core::{DomainError, DomainResult, Sku};

/// Current state of one stock-keeping unit.
///
/// `quantity` is a `u32`, so the non-negative invariant is carried by the
/// type; the only way to change it is through the adjustment and merge paths
/// in `stockbook-infra`, which validate every candidate value here first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub sku: Sku,
    pub name: String,
    pub quantity: u32,
}

impl InventoryRecord {
    pub fn new(sku: Sku, name: impl Into<String>, quantity: u32) -> Self {
        Self {
            sku,
            name: name.into(),
            quantity,
        }
    }

    /// Decide the quantity that would result from applying a signed delta.
    ///
    /// Pure decision logic: no mutation. A negative candidate is the
    /// sale-exceeds-stock case and fails with `InsufficientStock`; a
    /// candidate above `u32::MAX` fails with `InvalidQuantity`.
    pub fn quantity_after(&self, delta: i64) -> DomainResult<u32> {
        let candidate = i64::from(self.quantity) + delta;
        if candidate < 0 {
            return Err(DomainError::insufficient_stock(
                &self.sku,
                self.quantity,
                delta.unsigned_abs().min(u64::from(u32::MAX)) as u32,
            ));
        }
        u32::try_from(candidate)
            .map_err(|_| DomainError::invalid_quantity(format!("quantity overflow: {candidate}")))
    }
}
