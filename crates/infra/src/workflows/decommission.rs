//! Decommission-and-replace workflow.
//!
//! One transaction:
//! 1. lock the target component (`NotFound` if absent)
//! 2. mark it `baja`
//! 3. cancel its open maintenance records, appending a note
//! 4. lock the oldest compatible `operativo` spare
//! 5. without a spare: commit and report it
//! 6. promote the spare into the target's position (`progreso`)
//! 7. insert one follow-up maintenance record for the spare
//! 8. commit, then re-read the promoted row
//!
//! Any store error from step 2 on rolls back everything, including the `baja`.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use facilities_assets::{
    Component, MaintenanceRecord, Promotion, ReplacementOptions, SpareMatch, cancellation_note,
};
use facilities_core::{ComponentId, UserId};

use super::{FacilityService, abort};
use crate::store::{FacilityTx, StoreError};

/// Input of a decommission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecommissionRequest {
    pub component_id: ComponentId,
    pub options: ReplacementOptions,
    /// Authenticated caller, used when the retired component has no maintainer.
    pub acting_user: Option<UserId>,
    /// Business date stamped on the rows ("today").
    pub on: NaiveDate,
}

/// A spare that took over the retired component's position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Replacement {
    pub promoted: Component,
    pub maintenance: MaintenanceRecord,
}

/// Committed result of a decommission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecommissionOutcome {
    pub decommissioned: Component,
    pub cancelled_maintenance: u64,
    pub replacement: Option<Replacement>,
}

impl DecommissionOutcome {
    pub fn message(&self) -> String {
        match &self.replacement {
            Some(r) => format!(
                "Componente {} dado de baja; reemplazado por {}",
                self.decommissioned.serial_number, r.promoted.serial_number
            ),
            None => format!(
                "Componente {} dado de baja; no hay repuesto disponible",
                self.decommissioned.serial_number
            ),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecommissionError {
    #[error("component {0} not found")]
    NotFound(ComponentId),

    /// The component is already `baja`; nothing was changed.
    #[error("component {0} is already decommissioned")]
    AlreadyDecommissioned(ComponentId),

    /// A store failure; the whole transaction was rolled back.
    #[error("decommission transaction failed: {0}")]
    TransactionFailure(#[from] StoreError),
}

impl FacilityService {
    #[instrument(
        skip(self, request),
        fields(component_id = %request.component_id, on = %request.on),
        err
    )]
    pub async fn decommission(
        &self,
        request: DecommissionRequest,
    ) -> Result<DecommissionOutcome, DecommissionError> {
        let mut tx = self.begin().await?;

        let staged = match self.stage_decommission(tx.as_mut(), &request).await {
            Ok(staged) => staged,
            Err(err) => return Err(abort(tx, "decommission", err).await),
        };
        tx.commit().await?;

        let DecommissionOutcome {
            decommissioned,
            cancelled_maintenance,
            replacement,
        } = staged;

        let replacement = match replacement {
            Some(Replacement {
                promoted,
                maintenance,
            }) => {
                let promoted = self.reload_promoted(promoted).await;
                tracing::info!(
                    spare_id = %promoted.id,
                    maintenance_id = %maintenance.id,
                    cancelled = cancelled_maintenance,
                    "spare promoted"
                );
                Some(Replacement {
                    promoted,
                    maintenance,
                })
            }
            None => {
                tracing::info!(cancelled = cancelled_maintenance, "no spare available");
                None
            }
        };

        let outcome = DecommissionOutcome {
            decommissioned,
            cancelled_maintenance,
            replacement,
        };
        Ok(outcome)
    }

    /// Steps 1–7, all against the open transaction.
    async fn stage_decommission(
        &self,
        tx: &mut dyn FacilityTx,
        request: &DecommissionRequest,
    ) -> Result<DecommissionOutcome, DecommissionError> {
        let id = request.component_id;
        let target = tx
            .lock_component(id)
            .await?
            .ok_or(DecommissionError::NotFound(id))?;

        if target.is_decommissioned() {
            return Err(DecommissionError::AlreadyDecommissioned(id));
        }

        let retired = tx.mark_decommissioned(id, request.on).await?;

        let note = cancellation_note(&retired, request.on);
        let cancelled_maintenance = tx.cancel_open_maintenance(id, &note).await?;

        let rule = SpareMatch::for_target(&retired);
        let Some(spare) = tx.lock_spare(id, &rule).await? else {
            return Ok(DecommissionOutcome {
                decommissioned: retired,
                cancelled_maintenance,
                replacement: None,
            });
        };

        let promotion = Promotion::from_target(&retired, request.on);
        let promoted = tx.promote_spare(spare.id, &promotion).await?;

        let follow_up = request.options.follow_up_record(
            &retired,
            &spare,
            self.default_frequency(),
            request.acting_user,
            request.on,
        );
        let maintenance = tx.insert_maintenance(&follow_up).await?;

        Ok(DecommissionOutcome {
            decommissioned: retired,
            cancelled_maintenance,
            replacement: Some(Replacement {
                promoted,
                maintenance,
            }),
        })
    }

    /// Post-commit view of the promoted spare. Falls back to the row returned
    /// inside the transaction if the re-read fails; the commit already happened.
    async fn reload_promoted(&self, staged: Component) -> Component {
        let reread = async {
            let mut tx = self.begin().await?;
            let row = tx.component(staged.id).await?;
            tx.commit().await?;
            Ok::<_, StoreError>(row)
        };
        match reread.await {
            Ok(Some(row)) => row,
            Ok(None) => staged,
            Err(e) => {
                tracing::warn!(spare_id = %staged.id, error = %e, "re-reading promoted spare failed");
                staged
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};

    use facilities_assets::{
        ComponentFilter, ComponentStatus, Frequency, MaintenanceStatus, NewComponent, NewMaintenance,
    };
    use facilities_core::{ItemId, LocationId, MaintenanceId};

    use super::*;
    use crate::store::{FacilityStore, InMemoryFacilityStore};

    fn on() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 2).unwrap()
    }

    fn setup() -> (InMemoryFacilityStore, FacilityService) {
        let store = InMemoryFacilityStore::new();
        let service = FacilityService::new(Arc::new(store.clone()), Frequency::Monthly);
        (store, service)
    }

    async fn seed_component(
        store: &InMemoryFacilityStore,
        name: &str,
        serial: &str,
        status: ComponentStatus,
        item: Option<i64>,
        created_days_ago: i64,
    ) -> Component {
        let base = Utc.with_ymd_and_hms(2024, 8, 1, 8, 0, 0).unwrap();
        let mut tx = store.begin().await.unwrap();
        let c = tx
            .insert_component(
                &NewComponent {
                    name: name.to_string(),
                    serial_number: serial.to_string(),
                    status,
                    location_id: Some(LocationId::new(4)),
                    maintainer_id: Some(UserId::new(21)),
                    item_id: item.map(ItemId::new),
                    installed_on: None,
                    service_life_months: Some(36),
                },
                base - Duration::days(created_days_ago),
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();
        c
    }

    async fn seed_maintenance(
        store: &InMemoryFacilityStore,
        component: ComponentId,
        status: MaintenanceStatus,
        comments: Option<&str>,
    ) -> MaintenanceRecord {
        let mut tx = store.begin().await.unwrap();
        let mut rec = tx
            .insert_maintenance(&NewMaintenance {
                name: format!("Tarea {status}"),
                description: None,
                frequency: Frequency::Weekly,
                scheduled_for: NaiveDate::from_ymd_opt(2024, 8, 15).unwrap(),
                status: MaintenanceStatus::Pending,
                component_id: Some(component),
                operator_id: None,
                location_id: None,
                comments: comments.map(str::to_string),
            })
            .await
            .unwrap();
        if status != MaintenanceStatus::Pending {
            rec.status = status;
            rec = tx.save_maintenance(&rec).await.unwrap();
        }
        tx.commit().await.unwrap();
        rec
    }

    async fn snapshot(store: &InMemoryFacilityStore) -> (Vec<Component>, Vec<MaintenanceRecord>) {
        let mut tx = store.begin().await.unwrap();
        let components = tx.list_components(&ComponentFilter::default()).await.unwrap();
        let mut maintenance = Vec::new();
        for c in &components {
            maintenance.extend(tx.list_maintenance(c.id).await.unwrap());
        }
        (components, maintenance)
    }

    fn request(id: ComponentId) -> DecommissionRequest {
        DecommissionRequest {
            component_id: id,
            options: ReplacementOptions::default(),
            acting_user: Some(UserId::new(99)),
            on: on(),
        }
    }

    #[tokio::test]
    async fn unknown_component_is_not_found_and_changes_nothing() {
        let (store, service) = setup();
        seed_component(&store, "Bomba", "B-1", ComponentStatus::Operational, Some(7), 3).await;
        let before = snapshot(&store).await;

        let err = service.decommission(request(ComponentId::new(404))).await.unwrap_err();
        assert_eq!(err, DecommissionError::NotFound(ComponentId::new(404)));
        assert_eq!(snapshot(&store).await, before);
    }

    #[tokio::test]
    async fn oldest_spare_is_promoted_and_open_work_cancelled() {
        let (store, service) = setup();
        let a = seed_component(&store, "Bomba", "A-1", ComponentStatus::Active, Some(7), 1).await;
        let b = seed_component(&store, "Bomba", "B-1", ComponentStatus::Operational, Some(7), 20).await;
        let c = seed_component(&store, "Bomba", "C-1", ComponentStatus::Operational, Some(7), 5).await;

        let pending = seed_maintenance(&store, a.id, MaintenanceStatus::Pending, Some("revisar sellos")).await;
        let running = seed_maintenance(&store, a.id, MaintenanceStatus::InProgress, None).await;
        let done = seed_maintenance(&store, a.id, MaintenanceStatus::Completed, Some("ok")).await;

        let outcome = service.decommission(request(a.id)).await.unwrap();

        assert_eq!(outcome.decommissioned.id, a.id);
        assert_eq!(outcome.decommissioned.status, ComponentStatus::Decommissioned);
        assert_eq!(outcome.decommissioned.last_reviewed_on, Some(on()));
        assert_eq!(outcome.cancelled_maintenance, 2);

        let replacement = outcome.replacement.expect("spare should be promoted");
        assert_eq!(replacement.promoted.id, b.id);
        assert_eq!(replacement.promoted.status, ComponentStatus::InProgress);
        assert_eq!(replacement.promoted.location_id, a.location_id);
        assert_eq!(replacement.promoted.maintainer_id, a.maintainer_id);
        assert_eq!(replacement.promoted.installed_on, Some(on()));
        assert_eq!(replacement.maintenance.component_id, Some(b.id));
        assert_eq!(replacement.maintenance.status, MaintenanceStatus::InProgress);
        assert_eq!(replacement.maintenance.scheduled_for, on());
        assert_eq!(replacement.maintenance.frequency, Frequency::Monthly);
        assert_eq!(replacement.maintenance.operator_id, a.maintainer_id);

        let mut tx = store.begin().await.unwrap();
        let a_records = tx.list_maintenance(a.id).await.unwrap();
        let find = |id: MaintenanceId| a_records.iter().find(|r| r.id == id).unwrap();

        let pending_after = find(pending.id);
        assert_eq!(pending_after.status, MaintenanceStatus::Cancelled);
        assert!(pending_after.comments.as_deref().unwrap().starts_with("revisar sellos\n"));
        assert!(pending_after.comments.as_deref().unwrap().contains("A-1"));

        assert_eq!(find(running.id).status, MaintenanceStatus::Cancelled);
        assert_eq!(find(done.id), &done);

        assert_eq!(
            tx.component(c.id).await.unwrap().unwrap().status,
            ComponentStatus::Operational
        );
        let b_records = tx.list_maintenance(b.id).await.unwrap();
        assert_eq!(b_records.len(), 1);
    }

    #[tokio::test]
    async fn without_spare_only_the_target_changes() {
        let (store, service) = setup();
        let d = seed_component(&store, "Caldera", "D-1", ComponentStatus::Active, Some(3), 2).await;
        let other = seed_component(&store, "Caldera", "E-1", ComponentStatus::Operational, Some(4), 9).await;
        let busy = seed_component(&store, "Caldera", "F-1", ComponentStatus::InProgress, Some(3), 9).await;

        let outcome = service.decommission(request(d.id)).await.unwrap();
        assert!(outcome.replacement.is_none());
        assert!(outcome.message().contains("no hay repuesto"));

        let (components, maintenance) = snapshot(&store).await;
        assert!(maintenance.is_empty());
        let status_of = |id: ComponentId| components.iter().find(|c| c.id == id).unwrap().status;
        assert_eq!(status_of(d.id), ComponentStatus::Decommissioned);
        assert_eq!(status_of(other.id), ComponentStatus::Operational);
        assert_eq!(status_of(busy.id), ComponentStatus::InProgress);
    }

    #[tokio::test]
    async fn name_fallback_when_no_item() {
        let (store, service) = setup();
        let target = seed_component(&store, "Extintor CO2", "X-1", ComponentStatus::Operational, None, 1).await;
        seed_component(&store, "Extintor co2", "X-2", ComponentStatus::Operational, None, 30).await;
        let spare = seed_component(&store, "Extintor CO2", "X-3", ComponentStatus::Operational, None, 10).await;

        let outcome = service.decommission(request(target.id)).await.unwrap();
        assert_eq!(outcome.replacement.unwrap().promoted.id, spare.id);
    }

    #[tokio::test]
    async fn second_decommission_is_rejected_without_side_effects() {
        let (store, service) = setup();
        let a = seed_component(&store, "Bomba", "A-1", ComponentStatus::Active, Some(7), 1).await;
        seed_component(&store, "Bomba", "B-1", ComponentStatus::Operational, Some(7), 20).await;
        let c = seed_component(&store, "Bomba", "C-1", ComponentStatus::Operational, Some(7), 5).await;

        service.decommission(request(a.id)).await.unwrap();
        let after_first = snapshot(&store).await;

        let err = service.decommission(request(a.id)).await.unwrap_err();
        assert_eq!(err, DecommissionError::AlreadyDecommissioned(a.id));
        assert_eq!(snapshot(&store).await, after_first);

        let mut tx = store.begin().await.unwrap();
        assert_eq!(
            tx.component(c.id).await.unwrap().unwrap().status,
            ComponentStatus::Operational
        );
    }

    #[tokio::test]
    async fn failure_after_promotion_rolls_everything_back() {
        let (store, service) = setup();
        let a = seed_component(&store, "Bomba", "A-1", ComponentStatus::Active, Some(7), 1).await;
        seed_component(&store, "Bomba", "B-1", ComponentStatus::Operational, Some(7), 20).await;
        seed_maintenance(&store, a.id, MaintenanceStatus::Pending, Some("previo")).await;
        let before = snapshot(&store).await;

        store.fail_on("insert_maintenance");
        let err = service.decommission(request(a.id)).await.unwrap_err();
        assert!(matches!(err, DecommissionError::TransactionFailure(StoreError::Database(_))));
        assert_eq!(snapshot(&store).await, before);
    }

    #[tokio::test]
    async fn failure_while_cancelling_restores_the_target() {
        let (store, service) = setup();
        let a = seed_component(&store, "Bomba", "A-1", ComponentStatus::Active, None, 1).await;
        let before = snapshot(&store).await;

        store.fail_on("bulk_cancel_maintenance");
        let err = service.decommission(request(a.id)).await.unwrap_err();
        assert!(
            matches!(&err, DecommissionError::TransactionFailure(StoreError::Database(msg)) if msg.contains("bulk_cancel_maintenance"))
        );
        assert_eq!(snapshot(&store).await, before);
    }

    #[tokio::test]
    async fn overrides_reach_the_follow_up_record() {
        let (store, service) = setup();
        let a = seed_component(&store, "Bomba", "A-1", ComponentStatus::Active, Some(7), 1).await;
        seed_component(&store, "Bomba", "B-1", ComponentStatus::Operational, Some(7), 20).await;

        let mut req = request(a.id);
        req.options = ReplacementOptions {
            frequency: Some(Frequency::Quarterly),
            new_serial: Some("B-1-R".to_string()),
        };
        let outcome = service.decommission(req).await.unwrap();
        let maintenance = outcome.replacement.unwrap().maintenance;
        assert_eq!(maintenance.frequency, Frequency::Quarterly);
        assert!(maintenance.name.contains("A-1") && maintenance.name.contains("B-1-R"));
    }
}
