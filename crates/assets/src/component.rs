use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use facilities_core::{ComponentId, DomainError, DomainResult, ItemId, LocationId, UserId};

/// Component lifecycle status.
///
/// `Decommissioned` (`baja`) is terminal: a retired row is never reactivated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentStatus {
    #[serde(rename = "activo")]
    Active,
    #[serde(rename = "operativo")]
    Operational,
    #[serde(rename = "progreso")]
    InProgress,
    #[serde(rename = "baja")]
    Decommissioned,
}

impl ComponentStatus {
    /// Value stored in the `estado` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentStatus::Active => "activo",
            ComponentStatus::Operational => "operativo",
            ComponentStatus::InProgress => "progreso",
            ComponentStatus::Decommissioned => "baja",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ComponentStatus::Decommissioned)
    }
}

impl core::fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for ComponentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "activo" => Ok(ComponentStatus::Active),
            "operativo" => Ok(ComponentStatus::Operational),
            "progreso" => Ok(ComponentStatus::InProgress),
            "baja" => Ok(ComponentStatus::Decommissioned),
            other => Err(DomainError::validation(format!(
                "unknown component status '{other}' (expected activo, operativo, progreso or baja)"
            ))),
        }
    }
}

/// A physical asset instance tracked by the facilities system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "numero_serie")]
    pub serial_number: String,
    #[serde(rename = "estado")]
    pub status: ComponentStatus,
    #[serde(rename = "ubicacion_id")]
    pub location_id: Option<LocationId>,
    #[serde(rename = "responsable_mantenimiento")]
    pub maintainer_id: Option<UserId>,
    pub item_id: Option<ItemId>,
    #[serde(rename = "fecha_instalacion")]
    pub installed_on: Option<NaiveDate>,
    #[serde(rename = "fecha_ultima_revision")]
    pub last_reviewed_on: Option<NaiveDate>,
    #[serde(rename = "vida_util_meses")]
    pub service_life_months: Option<i32>,
    #[serde(rename = "fecha_creacion")]
    pub created_at: DateTime<Utc>,
}

impl Component {
    pub fn is_decommissioned(&self) -> bool {
        self.status.is_terminal()
    }

    /// Fails when the row is already retired.
    pub fn ensure_mutable(&self) -> DomainResult<()> {
        if self.is_decommissioned() {
            return Err(DomainError::invariant(format!(
                "component {} is decommissioned (baja) and cannot change",
                self.id
            )));
        }
        Ok(())
    }

    /// Retire the component: `estado = baja`, review date stamped.
    pub fn decommission(&mut self, on: NaiveDate) -> DomainResult<()> {
        self.ensure_mutable()?;
        self.status = ComponentStatus::Decommissioned;
        self.last_reviewed_on = Some(on);
        Ok(())
    }

    /// Apply a partial update. Decommissioning is not reachable through here.
    pub fn apply_patch(&mut self, patch: &ComponentPatch) -> DomainResult<()> {
        self.ensure_mutable()?;
        patch.validate()?;

        if let Some(name) = &patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(serial) = &patch.serial_number {
            self.serial_number = serial.trim().to_string();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(location) = patch.location_id {
            self.location_id = Some(location);
        }
        if let Some(maintainer) = patch.maintainer_id {
            self.maintainer_id = Some(maintainer);
        }
        if let Some(item) = patch.item_id {
            self.item_id = Some(item);
        }
        if let Some(date) = patch.installed_on {
            self.installed_on = Some(date);
        }
        if let Some(date) = patch.last_reviewed_on {
            self.last_reviewed_on = Some(date);
        }
        if let Some(months) = patch.service_life_months {
            self.service_life_months = Some(months);
        }
        Ok(())
    }
}

/// Input for creating a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComponent {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "numero_serie")]
    pub serial_number: String,
    #[serde(rename = "estado", default = "NewComponent::default_status")]
    pub status: ComponentStatus,
    #[serde(rename = "ubicacion_id", default)]
    pub location_id: Option<LocationId>,
    #[serde(rename = "responsable_mantenimiento", default)]
    pub maintainer_id: Option<UserId>,
    #[serde(default)]
    pub item_id: Option<ItemId>,
    #[serde(rename = "fecha_instalacion", default)]
    pub installed_on: Option<NaiveDate>,
    #[serde(rename = "vida_util_meses", default)]
    pub service_life_months: Option<i32>,
}

impl NewComponent {
    fn default_status() -> ComponentStatus {
        ComponentStatus::Active
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("nombre cannot be empty"));
        }
        if self.serial_number.trim().is_empty() {
            return Err(DomainError::validation("numero_serie cannot be empty"));
        }
        if self.status.is_terminal() {
            return Err(DomainError::validation(
                "a component cannot be created in estado 'baja'",
            ));
        }
        if matches!(self.service_life_months, Some(m) if m <= 0) {
            return Err(DomainError::validation("vida_util_meses must be positive"));
        }
        Ok(())
    }
}

/// Partial update of a component. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentPatch {
    #[serde(rename = "nombre", default)]
    pub name: Option<String>,
    #[serde(rename = "numero_serie", default)]
    pub serial_number: Option<String>,
    #[serde(rename = "estado", default)]
    pub status: Option<ComponentStatus>,
    #[serde(rename = "ubicacion_id", default)]
    pub location_id: Option<LocationId>,
    #[serde(rename = "responsable_mantenimiento", default)]
    pub maintainer_id: Option<UserId>,
    #[serde(default)]
    pub item_id: Option<ItemId>,
    #[serde(rename = "fecha_instalacion", default)]
    pub installed_on: Option<NaiveDate>,
    #[serde(rename = "fecha_ultima_revision", default)]
    pub last_reviewed_on: Option<NaiveDate>,
    #[serde(rename = "vida_util_meses", default)]
    pub service_life_months: Option<i32>,
}

impl ComponentPatch {
    pub fn validate(&self) -> DomainResult<()> {
        if matches!(&self.name, Some(n) if n.trim().is_empty()) {
            return Err(DomainError::validation("nombre cannot be empty"));
        }
        if matches!(&self.serial_number, Some(s) if s.trim().is_empty()) {
            return Err(DomainError::validation("numero_serie cannot be empty"));
        }
        if matches!(self.status, Some(ComponentStatus::Decommissioned)) {
            return Err(DomainError::validation(
                "use the decommission operation to set estado 'baja'",
            ));
        }
        if matches!(self.service_life_months, Some(m) if m <= 0) {
            return Err(DomainError::validation("vida_util_meses must be positive"));
        }
        Ok(())
    }
}

/// Listing filter. Every set field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentFilter {
    #[serde(rename = "estado", default)]
    pub status: Option<ComponentStatus>,
    #[serde(rename = "ubicacion_id", default)]
    pub location_id: Option<LocationId>,
    #[serde(default)]
    pub item_id: Option<ItemId>,
}

impl ComponentFilter {
    pub fn matches(&self, component: &Component) -> bool {
        self.status.is_none_or(|s| component.status == s)
            && self.location_id.is_none_or(|l| component.location_id == Some(l))
            && self.item_id.is_none_or(|i| component.item_id == Some(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn component(status: ComponentStatus) -> Component {
        Component {
            id: ComponentId::new(1),
            name: "Bomba de agua".to_string(),
            serial_number: "BA-001".to_string(),
            status,
            location_id: Some(LocationId::new(3)),
            maintainer_id: Some(UserId::new(9)),
            item_id: Some(ItemId::new(7)),
            installed_on: None,
            last_reviewed_on: None,
            service_life_months: Some(24),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn decommission_is_terminal() {
        let mut c = component(ComponentStatus::Active);
        c.decommission(test_date()).unwrap();
        assert_eq!(c.status, ComponentStatus::Decommissioned);
        assert_eq!(c.last_reviewed_on, Some(test_date()));

        let err = c.decommission(test_date()).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));

        let patch = ComponentPatch {
            status: Some(ComponentStatus::Active),
            ..ComponentPatch::default()
        };
        assert!(matches!(c.apply_patch(&patch), Err(DomainError::InvariantViolation(_))));
        assert_eq!(c.status, ComponentStatus::Decommissioned);
    }

    #[test]
    fn patch_cannot_decommission() {
        let mut c = component(ComponentStatus::Operational);
        let patch = ComponentPatch {
            status: Some(ComponentStatus::Decommissioned),
            ..ComponentPatch::default()
        };
        assert!(matches!(c.apply_patch(&patch), Err(DomainError::Validation(_))));
        assert_eq!(c.status, ComponentStatus::Operational);
    }

    #[test]
    fn patch_updates_only_given_fields() {
        let mut c = component(ComponentStatus::Active);
        let patch = ComponentPatch {
            name: Some("  Bomba principal ".to_string()),
            status: Some(ComponentStatus::InProgress),
            ..ComponentPatch::default()
        };
        c.apply_patch(&patch).unwrap();
        assert_eq!(c.name, "Bomba principal");
        assert_eq!(c.status, ComponentStatus::InProgress);
        assert_eq!(c.serial_number, "BA-001");
        assert_eq!(c.location_id, Some(LocationId::new(3)));
    }

    #[test]
    fn new_component_validation() {
        let mut input = NewComponent {
            name: "Filtro".to_string(),
            serial_number: "F-1".to_string(),
            status: ComponentStatus::Operational,
            location_id: None,
            maintainer_id: None,
            item_id: None,
            installed_on: None,
            service_life_months: None,
        };
        assert!(input.validate().is_ok());

        input.status = ComponentStatus::Decommissioned;
        assert!(matches!(input.validate(), Err(DomainError::Validation(_))));

        input.status = ComponentStatus::Active;
        input.serial_number = "   ".to_string();
        assert!(matches!(input.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn status_wire_values() {
        assert_eq!(
            serde_json::to_string(&ComponentStatus::Decommissioned).unwrap(),
            "\"baja\""
        );
        let parsed: ComponentStatus = serde_json::from_str("\"operativo\"").unwrap();
        assert_eq!(parsed, ComponentStatus::Operational);
        assert_eq!("Progreso".parse::<ComponentStatus>().unwrap(), ComponentStatus::InProgress);
        assert!("retirado".parse::<ComponentStatus>().is_err());
    }

    #[test]
    fn filter_matches_all_set_fields() {
        let c = component(ComponentStatus::Operational);
        assert!(ComponentFilter::default().matches(&c));

        let by_item = ComponentFilter {
            status: Some(ComponentStatus::Operational),
            item_id: Some(ItemId::new(7)),
            ..ComponentFilter::default()
        };
        assert!(by_item.matches(&c));

        let wrong_location = ComponentFilter {
            location_id: Some(LocationId::new(99)),
            ..ComponentFilter::default()
        };
        assert!(!wrong_location.matches(&c));
    }
}
