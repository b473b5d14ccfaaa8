//! Asset lifecycle domain: components, maintenance records and stock lines.
//!
//! This crate contains business rules only, implemented as deterministic
//! domain logic (no IO, no HTTP, no storage). Stores call into it to validate
//! transitions before persisting them.

pub mod component;
pub mod inventory;
pub mod maintenance;
pub mod replacement;

pub use component::{Component, ComponentFilter, ComponentPatch, ComponentStatus, NewComponent};
pub use inventory::{InventoryLine, MAX_UNIT_COST, Restock, weighted_average_cost};
pub use maintenance::{
    Frequency, MaintenanceRecord, MaintenanceStatus, NewMaintenance, append_note,
};
pub use replacement::{Promotion, ReplacementOptions, SpareMatch, cancellation_note, pick_oldest};
