//! Transactional store for components, maintenance records and stock.
//!
//! Every operation runs inside a [`FacilityTx`] obtained from
//! [`FacilityStore::begin`]. Dropping a transaction without calling
//! [`FacilityTx::commit`] discards its changes, so early returns and panics
//! never leave partial state behind.
//!
//! `lock_*` methods take a row lock (`SELECT … FOR UPDATE`) that is held until
//! the transaction ends; plain reads do not.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use facilities_assets::{
    Component, ComponentFilter, InventoryLine, MaintenanceRecord, NewComponent, NewMaintenance,
    Promotion, SpareMatch,
};
use facilities_core::{ComponentId, ItemId, MaintenanceId};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryFacilityStore;
pub use postgres::PgFacilityStore;

/// Store operation error.
///
/// Infrastructure failures, as opposed to domain errors (validation,
/// invariants). Callers decide whether a failure aborts their transaction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Unique violation or a guarded update that lost a race.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Foreign key or check constraint violation.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// A row that the transaction expected to exist is gone.
    #[error("row missing: {0}")]
    Missing(String),

    /// Connection, protocol or any other database failure.
    #[error("database error: {0}")]
    Database(String),
}

/// Opens transactions against the backing store.
#[async_trait]
pub trait FacilityStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn FacilityTx>, StoreError>;
}

/// One open transaction.
#[async_trait]
pub trait FacilityTx: Send {
    // ── components ──────────────────────────────────────────────────────────

    async fn component(&mut self, id: ComponentId) -> Result<Option<Component>, StoreError>;

    async fn lock_component(&mut self, id: ComponentId) -> Result<Option<Component>, StoreError>;

    async fn list_components(&mut self, filter: &ComponentFilter) -> Result<Vec<Component>, StoreError>;

    async fn insert_component(
        &mut self,
        new: &NewComponent,
        created_at: DateTime<Utc>,
    ) -> Result<Component, StoreError>;

    /// Persist every mutable field of a non-retired component.
    async fn save_component(&mut self, component: &Component) -> Result<Component, StoreError>;

    /// `estado = baja`, `fecha_ultima_revision = on`.
    async fn mark_decommissioned(&mut self, id: ComponentId, on: NaiveDate) -> Result<Component, StoreError>;

    /// Lock the oldest spare accepted by `rule`, skipping rows locked by
    /// concurrent transactions.
    async fn lock_spare(
        &mut self,
        target: ComponentId,
        rule: &SpareMatch,
    ) -> Result<Option<Component>, StoreError>;

    /// Move an `operativo` spare into the retired component's position.
    /// Fails with `Conflict` when the spare is no longer `operativo`.
    async fn promote_spare(
        &mut self,
        spare: ComponentId,
        promotion: &Promotion,
    ) -> Result<Component, StoreError>;

    // ── maintenance ─────────────────────────────────────────────────────────

    /// Cancel every open record of `component`, appending `note`.
    /// Returns the number of records cancelled.
    async fn cancel_open_maintenance(
        &mut self,
        component: ComponentId,
        note: &str,
    ) -> Result<u64, StoreError>;

    async fn insert_maintenance(&mut self, new: &NewMaintenance) -> Result<MaintenanceRecord, StoreError>;

    async fn lock_maintenance(&mut self, id: MaintenanceId) -> Result<Option<MaintenanceRecord>, StoreError>;

    /// Persist status and comments.
    async fn save_maintenance(&mut self, record: &MaintenanceRecord) -> Result<MaintenanceRecord, StoreError>;

    async fn list_maintenance(&mut self, component: ComponentId) -> Result<Vec<MaintenanceRecord>, StoreError>;

    // ── inventory ───────────────────────────────────────────────────────────

    async fn inventory_line(&mut self, item: ItemId) -> Result<Option<InventoryLine>, StoreError>;

    async fn lock_inventory_line(&mut self, item: ItemId) -> Result<Option<InventoryLine>, StoreError>;

    async fn upsert_inventory_line(&mut self, line: &InventoryLine) -> Result<InventoryLine, StoreError>;

    async fn list_inventory(&mut self) -> Result<Vec<InventoryLine>, StoreError>;

    // ── lifecycle ───────────────────────────────────────────────────────────

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
