//! Inventory domain module.
//!
//! This crate contains the inventory record and the stock-delta decision
//! logic, implemented purely as deterministic domain code (no IO, no
//! storage). Stores and engines live in `stockbook-infra`.

pub mod item;

pub use item::InventoryRecord;
