use chrono::Utc;
use tracing::instrument;

use facilities_assets::{Component, ComponentFilter, ComponentPatch, NewComponent};
use facilities_core::{ComponentId, DomainError};

use super::{FacilityService, WorkflowError, finish};
use crate::store::FacilityTx;

impl FacilityService {
    /// Register a component. With `from_stock`, one unit of its `item_id` is
    /// taken from inventory in the same transaction.
    #[instrument(skip(self, new), fields(serial = %new.serial_number), err)]
    pub async fn create_component(
        &self,
        new: NewComponent,
        from_stock: bool,
    ) -> Result<Component, WorkflowError> {
        new.validate()?;
        if from_stock && new.item_id.is_none() {
            return Err(DomainError::validation("installing from stock requires an item_id").into());
        }

        let mut tx = self.begin().await?;
        let result = insert_component(tx.as_mut(), &new, from_stock).await;
        let created = finish(tx, "create_component", result).await?;

        tracing::info!(component_id = %created.id, "component created");
        Ok(created)
    }

    #[instrument(skip(self), fields(component_id = %id), err)]
    pub async fn get_component(&self, id: ComponentId) -> Result<Component, WorkflowError> {
        let mut tx = self.begin().await?;
        let result = tx
            .component(id)
            .await
            .map_err(WorkflowError::from)
            .and_then(|c| c.ok_or_else(|| DomainError::not_found().into()));
        finish(tx, "get_component", result).await
    }

    #[instrument(skip(self), err)]
    pub async fn list_components(&self, filter: ComponentFilter) -> Result<Vec<Component>, WorkflowError> {
        let mut tx = self.begin().await?;
        let result = tx.list_components(&filter).await.map_err(WorkflowError::from);
        finish(tx, "list_components", result).await
    }

    /// Partial update under a row lock. Retired rows are read-only.
    #[instrument(skip(self, patch), fields(component_id = %id), err)]
    pub async fn update_component(
        &self,
        id: ComponentId,
        patch: ComponentPatch,
    ) -> Result<Component, WorkflowError> {
        patch.validate()?;

        let mut tx = self.begin().await?;
        let result = apply_update(tx.as_mut(), id, &patch).await;
        finish(tx, "update_component", result).await
    }
}

async fn insert_component(
    tx: &mut dyn FacilityTx,
    new: &NewComponent,
    from_stock: bool,
) -> Result<Component, WorkflowError> {
    let now = Utc::now();
    if let Some(item) = new.item_id.filter(|_| from_stock) {
        let mut line = tx
            .lock_inventory_line(item)
            .await?
            .ok_or(WorkflowError::InsufficientStock(item))?;
        line.take_one(now)
            .map_err(|_| WorkflowError::InsufficientStock(item))?;
        tx.upsert_inventory_line(&line).await?;
    }
    Ok(tx.insert_component(new, now).await?)
}

async fn apply_update(
    tx: &mut dyn FacilityTx,
    id: ComponentId,
    patch: &ComponentPatch,
) -> Result<Component, WorkflowError> {
    let mut component = tx.lock_component(id).await?.ok_or(DomainError::NotFound)?;
    component.apply_patch(patch)?;
    Ok(tx.save_component(&component).await?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use facilities_assets::{ComponentStatus, Frequency, Restock};
    use facilities_core::{ItemId, LocationId};

    use super::*;
    use crate::store::{FacilityStore, InMemoryFacilityStore, StoreError};
    use crate::workflows::DecommissionRequest;

    fn service() -> (InMemoryFacilityStore, FacilityService) {
        let store = InMemoryFacilityStore::new();
        let service = FacilityService::new(Arc::new(store.clone()), Frequency::Monthly);
        (store, service)
    }

    fn new_component(serial: &str, item: Option<i64>) -> NewComponent {
        NewComponent {
            name: "Ventilador".to_string(),
            serial_number: serial.to_string(),
            status: ComponentStatus::Operational,
            location_id: Some(LocationId::new(2)),
            maintainer_id: None,
            item_id: item.map(ItemId::new),
            installed_on: None,
            service_life_months: None,
        }
    }

    #[tokio::test]
    async fn create_get_and_list() {
        let (_, service) = service();
        let a = service.create_component(new_component("V-1", Some(1)), false).await.unwrap();
        service.create_component(new_component("V-2", Some(2)), false).await.unwrap();

        assert_eq!(service.get_component(a.id).await.unwrap(), a);

        let by_item = service
            .list_components(ComponentFilter {
                item_id: Some(ItemId::new(1)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_item, vec![a]);
        assert_eq!(service.list_components(ComponentFilter::default()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_component_is_not_found() {
        let (_, service) = service();
        let err = service.get_component(ComponentId::new(9)).await.unwrap_err();
        assert_eq!(err, WorkflowError::Domain(DomainError::NotFound));
    }

    #[tokio::test]
    async fn duplicate_serial_conflicts() {
        let (_, service) = service();
        service.create_component(new_component("V-1", None), false).await.unwrap();
        let err = service.create_component(new_component("V-1", None), false).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Store(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn baja_cannot_be_created_or_patched_in() {
        let (_, service) = service();
        let mut new = new_component("V-1", None);
        new.status = ComponentStatus::Decommissioned;
        assert!(matches!(
            service.create_component(new, false).await,
            Err(WorkflowError::Domain(DomainError::Validation(_)))
        ));

        let c = service.create_component(new_component("V-2", None), false).await.unwrap();
        let patch = ComponentPatch {
            status: Some(ComponentStatus::Decommissioned),
            ..Default::default()
        };
        assert!(matches!(
            service.update_component(c.id, patch).await,
            Err(WorkflowError::Domain(DomainError::Validation(_)))
        ));
    }

    #[tokio::test]
    async fn retired_component_is_read_only() {
        let (_, service) = service();
        let c = service.create_component(new_component("V-1", None), false).await.unwrap();
        service
            .decommission(DecommissionRequest {
                component_id: c.id,
                options: Default::default(),
                acting_user: None,
                on: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            })
            .await
            .unwrap();

        let patch = ComponentPatch {
            status: Some(ComponentStatus::Operational),
            ..Default::default()
        };
        assert!(matches!(
            service.update_component(c.id, patch).await,
            Err(WorkflowError::Domain(DomainError::InvariantViolation(_)))
        ));
    }

    #[tokio::test]
    async fn update_moves_between_live_states() {
        let (_, service) = service();
        let c = service.create_component(new_component("V-1", None), false).await.unwrap();
        let updated = service
            .update_component(
                c.id,
                ComponentPatch {
                    status: Some(ComponentStatus::InProgress),
                    name: Some("  Ventilador axial ".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, ComponentStatus::InProgress);
        assert_eq!(updated.name, "Ventilador axial");
        assert_eq!(updated.created_at, c.created_at);
    }

    #[tokio::test]
    async fn installing_from_stock_takes_one_unit() {
        let (store, service) = service();
        service
            .restock(
                ItemId::new(5),
                Restock {
                    quantity: 1,
                    unit_cost: Decimal::new(1000, 2),
                    location: None,
                },
            )
            .await
            .unwrap();

        service.create_component(new_component("V-1", Some(5)), true).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.inventory_line(ItemId::new(5)).await.unwrap().unwrap().quantity, 0);
        drop(tx);

        let err = service
            .create_component(new_component("V-2", Some(5)), true)
            .await
            .unwrap_err();
        assert_eq!(err, WorkflowError::InsufficientStock(ItemId::new(5)));
        assert_eq!(service.list_components(ComponentFilter::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stock_install_without_item_is_rejected() {
        let (_, service) = service();
        assert!(matches!(
            service.create_component(new_component("V-1", None), true).await,
            Err(WorkflowError::Domain(DomainError::Validation(_)))
        ));
    }
}
