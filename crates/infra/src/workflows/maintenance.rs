use tracing::instrument;

use facilities_assets::{MaintenanceRecord, MaintenanceStatus, NewMaintenance};
use facilities_core::{ComponentId, DomainError, MaintenanceId};

use super::{FacilityService, WorkflowError, finish};
use crate::store::FacilityTx;

impl FacilityService {
    /// Schedule upkeep work. The record always starts `pendiente`; a linked
    /// component must exist and be live, and lends its location when none is given.
    #[instrument(skip(self, new), fields(component_id = ?new.component_id), err)]
    pub async fn schedule_maintenance(
        &self,
        mut new: NewMaintenance,
    ) -> Result<MaintenanceRecord, WorkflowError> {
        new.status = MaintenanceStatus::Pending;
        new.validate()?;

        let mut tx = self.begin().await?;
        let result = insert_scheduled(tx.as_mut(), new).await;
        finish(tx, "schedule_maintenance", result).await
    }

    #[instrument(skip(self), fields(component_id = %component), err)]
    pub async fn list_maintenance(
        &self,
        component: ComponentId,
    ) -> Result<Vec<MaintenanceRecord>, WorkflowError> {
        let mut tx = self.begin().await?;
        let result = list_for_component(tx.as_mut(), component).await;
        finish(tx, "list_maintenance", result).await
    }

    #[instrument(skip(self, note), fields(maintenance_id = %id), err)]
    pub async fn transition_maintenance(
        &self,
        id: MaintenanceId,
        target: MaintenanceStatus,
        note: Option<String>,
    ) -> Result<MaintenanceRecord, WorkflowError> {
        let mut tx = self.begin().await?;
        let result = apply_transition(tx.as_mut(), id, target, note.as_deref()).await;
        finish(tx, "transition_maintenance", result).await
    }
}

async fn insert_scheduled(
    tx: &mut dyn FacilityTx,
    mut new: NewMaintenance,
) -> Result<MaintenanceRecord, WorkflowError> {
    if let Some(id) = new.component_id {
        // Row lock: a concurrent decommission must either see this record or
        // reject it, never commit around it.
        let component = tx.lock_component(id).await?.ok_or(DomainError::NotFound)?;
        if component.is_decommissioned() {
            return Err(DomainError::invariant(format!(
                "component {id} is decommissioned; maintenance cannot be scheduled"
            ))
            .into());
        }
        new.location_id = new.location_id.or(component.location_id);
    }
    Ok(tx.insert_maintenance(&new).await?)
}

async fn list_for_component(
    tx: &mut dyn FacilityTx,
    component: ComponentId,
) -> Result<Vec<MaintenanceRecord>, WorkflowError> {
    tx.component(component).await?.ok_or(DomainError::NotFound)?;
    Ok(tx.list_maintenance(component).await?)
}

async fn apply_transition(
    tx: &mut dyn FacilityTx,
    id: MaintenanceId,
    target: MaintenanceStatus,
    note: Option<&str>,
) -> Result<MaintenanceRecord, WorkflowError> {
    let mut record = tx.lock_maintenance(id).await?.ok_or(DomainError::NotFound)?;
    record.transition(target, note)?;
    Ok(tx.save_maintenance(&record).await?)
}
