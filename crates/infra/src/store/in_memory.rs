//! In-memory facility store for tests/dev.
//!
//! A transaction holds the store-wide lock for its whole lifetime and works
//! on a private copy of the state; `commit` swaps the copy in. Transactions
//! are therefore fully serialized, which subsumes row locking.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use facilities_assets::{
    Component, ComponentFilter, InventoryLine, MaintenanceRecord, NewComponent, NewMaintenance,
    Promotion, SpareMatch, pick_oldest,
};
use facilities_core::{ComponentId, ItemId, MaintenanceId};

use super::{FacilityStore, FacilityTx, StoreError};

#[derive(Debug, Clone, Default)]
struct State {
    components: BTreeMap<ComponentId, Component>,
    maintenance: BTreeMap<MaintenanceId, MaintenanceRecord>,
    inventory: BTreeMap<ItemId, InventoryLine>,
    last_component_id: i64,
    last_maintenance_id: i64,
}

/// In-memory store. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFacilityStore {
    state: Arc<AsyncMutex<State>>,
    fail_on: Arc<Mutex<Option<&'static str>>>,
}

impl InMemoryFacilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of the named transaction operation fail with a
    /// `StoreError::Database` (e.g. `"insert_maintenance"`). Used to exercise
    /// rollback paths.
    pub fn fail_on(&self, operation: &'static str) {
        *self.fail_on.lock().unwrap() = Some(operation);
    }
}

#[async_trait]
impl FacilityStore for InMemoryFacilityStore {
    async fn begin(&self) -> Result<Box<dyn FacilityTx>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryFacilityTx {
            guard,
            working,
            fail_on: self.fail_on.clone(),
        }))
    }
}

struct InMemoryFacilityTx {
    guard: OwnedMutexGuard<State>,
    working: State,
    fail_on: Arc<Mutex<Option<&'static str>>>,
}

impl InMemoryFacilityTx {
    fn check(&self, operation: &'static str) -> Result<(), StoreError> {
        let mut fail_on = self.fail_on.lock().unwrap();
        if *fail_on == Some(operation) {
            *fail_on = None;
            return Err(StoreError::Database(format!("injected failure in {operation}")));
        }
        Ok(())
    }

    fn ensure_unique_serial(&self, serial: &str, except: Option<ComponentId>) -> Result<(), StoreError> {
        let taken = self
            .working
            .components
            .values()
            .any(|c| c.serial_number == serial && Some(c.id) != except);
        if taken {
            return Err(StoreError::Conflict(format!(
                "numero_serie '{serial}' already exists"
            )));
        }
        Ok(())
    }

    fn component_mut(&mut self, id: ComponentId) -> Result<&mut Component, StoreError> {
        self.working
            .components
            .get_mut(&id)
            .ok_or_else(|| StoreError::Missing(format!("component {id}")))
    }
}

#[async_trait]
impl FacilityTx for InMemoryFacilityTx {
    async fn component(&mut self, id: ComponentId) -> Result<Option<Component>, StoreError> {
        self.check("select_component")?;
        Ok(self.working.components.get(&id).cloned())
    }

    async fn lock_component(&mut self, id: ComponentId) -> Result<Option<Component>, StoreError> {
        self.check("lock_component")?;
        Ok(self.working.components.get(&id).cloned())
    }

    async fn list_components(&mut self, filter: &ComponentFilter) -> Result<Vec<Component>, StoreError> {
        self.check("list_components")?;
        Ok(self
            .working
            .components
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect())
    }

    async fn insert_component(
        &mut self,
        new: &NewComponent,
        created_at: DateTime<Utc>,
    ) -> Result<Component, StoreError> {
        self.check("insert_component")?;
        let serial = new.serial_number.trim();
        self.ensure_unique_serial(serial, None)?;

        self.working.last_component_id += 1;
        let component = Component {
            id: ComponentId::new(self.working.last_component_id),
            name: new.name.trim().to_string(),
            serial_number: serial.to_string(),
            status: new.status,
            location_id: new.location_id,
            maintainer_id: new.maintainer_id,
            item_id: new.item_id,
            installed_on: new.installed_on,
            last_reviewed_on: None,
            service_life_months: new.service_life_months,
            created_at,
        };
        self.working.components.insert(component.id, component.clone());
        Ok(component)
    }

    async fn save_component(&mut self, component: &Component) -> Result<Component, StoreError> {
        self.check("update_component")?;
        self.ensure_unique_serial(&component.serial_number, Some(component.id))?;
        let stored = self.component_mut(component.id)?;
        if stored.is_decommissioned() {
            return Err(StoreError::Missing(format!(
                "component {} (or it is already baja)",
                component.id
            )));
        }
        let created_at = stored.created_at;
        *stored = Component {
            created_at,
            ..component.clone()
        };
        Ok(stored.clone())
    }

    async fn mark_decommissioned(&mut self, id: ComponentId, on: NaiveDate) -> Result<Component, StoreError> {
        self.check("update_status")?;
        let stored = self.component_mut(id)?;
        stored
            .decommission(on)
            .map_err(|_| StoreError::Conflict(format!("component {id} is already baja")))?;
        Ok(stored.clone())
    }

    async fn lock_spare(
        &mut self,
        target: ComponentId,
        rule: &SpareMatch,
    ) -> Result<Option<Component>, StoreError> {
        self.check("select_candidate_spare")?;
        let candidates = self
            .working
            .components
            .values()
            .filter(|c| rule.accepts(target, c));
        Ok(pick_oldest(candidates).cloned())
    }

    async fn promote_spare(
        &mut self,
        spare: ComponentId,
        promotion: &Promotion,
    ) -> Result<Component, StoreError> {
        self.check("update_promote_spare")?;
        let stored = self.component_mut(spare)?;
        if stored.status != facilities_assets::ComponentStatus::Operational {
            return Err(StoreError::Conflict(format!("spare {spare} is no longer operativo")));
        }
        promotion.apply(stored);
        Ok(stored.clone())
    }

    async fn cancel_open_maintenance(
        &mut self,
        component: ComponentId,
        note: &str,
    ) -> Result<u64, StoreError> {
        self.check("bulk_cancel_maintenance")?;
        let mut cancelled = 0;
        for record in self.working.maintenance.values_mut() {
            if record.component_id == Some(component) && record.cancel_with_note(note) {
                cancelled += 1;
            }
        }
        Ok(cancelled)
    }

    async fn insert_maintenance(&mut self, new: &NewMaintenance) -> Result<MaintenanceRecord, StoreError> {
        self.check("insert_maintenance")?;
        if let Some(component) = new.component_id {
            if !self.working.components.contains_key(&component) {
                return Err(StoreError::Constraint(format!(
                    "componente_id {component} does not exist"
                )));
            }
        }

        self.working.last_maintenance_id += 1;
        let record = MaintenanceRecord {
            id: MaintenanceId::new(self.working.last_maintenance_id),
            name: new.name.trim().to_string(),
            description: new.description.clone(),
            frequency: new.frequency,
            scheduled_for: new.scheduled_for,
            status: new.status,
            component_id: new.component_id,
            operator_id: new.operator_id,
            location_id: new.location_id,
            comments: new.comments.clone(),
        };
        self.working.maintenance.insert(record.id, record.clone());
        Ok(record)
    }

    async fn lock_maintenance(&mut self, id: MaintenanceId) -> Result<Option<MaintenanceRecord>, StoreError> {
        self.check("lock_maintenance")?;
        Ok(self.working.maintenance.get(&id).cloned())
    }

    async fn save_maintenance(&mut self, record: &MaintenanceRecord) -> Result<MaintenanceRecord, StoreError> {
        self.check("update_maintenance")?;
        let stored = self
            .working
            .maintenance
            .get_mut(&record.id)
            .ok_or_else(|| StoreError::Missing(format!("maintenance {}", record.id)))?;
        stored.status = record.status;
        stored.comments = record.comments.clone();
        Ok(stored.clone())
    }

    async fn list_maintenance(&mut self, component: ComponentId) -> Result<Vec<MaintenanceRecord>, StoreError> {
        self.check("list_maintenance")?;
        let mut records: Vec<MaintenanceRecord> = self
            .working
            .maintenance
            .values()
            .filter(|r| r.component_id == Some(component))
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.scheduled_for, r.id));
        Ok(records)
    }

    async fn inventory_line(&mut self, item: ItemId) -> Result<Option<InventoryLine>, StoreError> {
        self.check("select_inventory")?;
        Ok(self.working.inventory.get(&item).cloned())
    }

    async fn lock_inventory_line(&mut self, item: ItemId) -> Result<Option<InventoryLine>, StoreError> {
        self.check("lock_inventory")?;
        Ok(self.working.inventory.get(&item).cloned())
    }

    async fn upsert_inventory_line(&mut self, line: &InventoryLine) -> Result<InventoryLine, StoreError> {
        self.check("upsert_inventory")?;
        self.working.inventory.insert(line.item_id, line.clone());
        Ok(line.clone())
    }

    async fn list_inventory(&mut self) -> Result<Vec<InventoryLine>, StoreError> {
        self.check("list_inventory")?;
        Ok(self.working.inventory.values().cloned().collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryFacilityTx {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.check("rollback")?;
        Ok(())
    }
}
