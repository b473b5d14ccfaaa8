//! Replacement planning for the decommission workflow.
//!
//! Everything here is pure: which spares qualify, which one wins, what the
//! promoted spare inherits, and the content of the generated records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use facilities_core::{ComponentId, ItemId, LocationId, UserId};

use crate::component::{Component, ComponentStatus};
use crate::maintenance::{Frequency, MaintenanceStatus, NewMaintenance};

/// How a spare is matched against the component being retired.
///
/// `Name` is the fallback for components without a catalog item. It is an
/// exact string comparison, so names that differ in whitespace or spelling
/// will not match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpareMatch {
    Item(ItemId),
    Name(String),
}

impl SpareMatch {
    pub fn for_target(target: &Component) -> Self {
        match target.item_id {
            Some(item) => SpareMatch::Item(item),
            None => SpareMatch::Name(target.name.clone()),
        }
    }

    /// Candidate rule: same item (or name), `operativo`, and not the target itself.
    pub fn accepts(&self, target: ComponentId, candidate: &Component) -> bool {
        if candidate.id == target || candidate.status != ComponentStatus::Operational {
            return false;
        }
        match self {
            SpareMatch::Item(item) => candidate.item_id == Some(*item),
            SpareMatch::Name(name) => candidate.name == *name,
        }
    }
}

/// First-created, first-used: oldest `fecha_creacion`, ties broken by id.
pub fn pick_oldest<'a, I>(candidates: I) -> Option<&'a Component>
where
    I: IntoIterator<Item = &'a Component>,
{
    candidates
        .into_iter()
        .min_by_key(|c| (c.created_at, c.id))
}

/// What a promoted spare inherits from the retired component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    pub location_id: Option<LocationId>,
    pub maintainer_id: Option<UserId>,
    pub installed_on: NaiveDate,
}

impl Promotion {
    pub fn from_target(target: &Component, on: NaiveDate) -> Self {
        Self {
            location_id: target.location_id,
            maintainer_id: target.maintainer_id,
            installed_on: on,
        }
    }

    /// Apply to an in-memory spare row.
    pub fn apply(&self, spare: &mut Component) {
        spare.location_id = self.location_id;
        spare.maintainer_id = self.maintainer_id;
        spare.installed_on = Some(self.installed_on);
        spare.last_reviewed_on = Some(self.installed_on);
        spare.status = ComponentStatus::InProgress;
    }
}

/// Caller overrides for a decommission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementOptions {
    #[serde(rename = "frecuencia", default)]
    pub frequency: Option<Frequency>,
    #[serde(rename = "nuevo_serial", default)]
    pub new_serial: Option<String>,
}

impl ReplacementOptions {
    /// Build the follow-up maintenance record for a promoted spare.
    ///
    /// `operario_id` falls back from the retired component's maintainer to the
    /// acting user; `ubicacion_id` from the retired component to the spare.
    pub fn follow_up_record(
        &self,
        retired: &Component,
        spare: &Component,
        default_frequency: Frequency,
        acting_user: Option<UserId>,
        on: NaiveDate,
    ) -> NewMaintenance {
        let new_serial = self
            .new_serial
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&spare.serial_number);

        NewMaintenance {
            name: format!(
                "Reemplazo {}: {} → {}",
                retired.name, retired.serial_number, new_serial
            ),
            description: Some(format!(
                "Sustitución del componente {} (dado de baja) por {}",
                retired.serial_number, new_serial
            )),
            frequency: self.frequency.unwrap_or(default_frequency),
            scheduled_for: on,
            status: MaintenanceStatus::InProgress,
            component_id: Some(spare.id),
            operator_id: retired.maintainer_id.or(acting_user),
            location_id: retired.location_id.or(spare.location_id),
            comments: Some(format!(
                "Generado automáticamente por la baja del componente #{}",
                retired.id
            )),
        }
    }
}

/// Note appended to every open maintenance record of a retired component.
pub fn cancellation_note(retired: &Component, on: NaiveDate) -> String {
    format!(
        "Cancelado automáticamente: componente {} dado de baja el {}",
        retired.serial_number,
        on.format("%Y-%m-%d")
    )
}
