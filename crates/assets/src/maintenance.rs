use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use facilities_core::{ComponentId, DomainError, DomainResult, LocationId, MaintenanceId, UserId};

/// Maintenance record status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaintenanceStatus {
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "progreso")]
    InProgress,
    #[serde(rename = "completado")]
    Completed,
    #[serde(rename = "cancelado")]
    Cancelled,
}

impl MaintenanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceStatus::Pending => "pendiente",
            MaintenanceStatus::InProgress => "progreso",
            MaintenanceStatus::Completed => "completado",
            MaintenanceStatus::Cancelled => "cancelado",
        }
    }

    /// Work that a decommission must cancel.
    pub fn is_open(&self) -> bool {
        matches!(self, MaintenanceStatus::Pending | MaintenanceStatus::InProgress)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_open()
    }

    pub fn can_transition_to(&self, target: MaintenanceStatus) -> bool {
        use MaintenanceStatus::*;
        matches!(
            (self, target),
            (Pending, InProgress)
                | (Pending, Completed)
                | (Pending, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Cancelled)
        )
    }
}

impl core::fmt::Display for MaintenanceStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for MaintenanceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pendiente" => Ok(MaintenanceStatus::Pending),
            "progreso" => Ok(MaintenanceStatus::InProgress),
            "completado" => Ok(MaintenanceStatus::Completed),
            "cancelado" => Ok(MaintenanceStatus::Cancelled),
            other => Err(DomainError::validation(format!(
                "unknown maintenance status '{other}'"
            ))),
        }
    }
}

/// How often a maintenance task recurs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    #[serde(rename = "diaria")]
    Daily,
    #[serde(rename = "semanal")]
    Weekly,
    #[default]
    #[serde(rename = "mensual")]
    Monthly,
    #[serde(rename = "trimestral")]
    Quarterly,
    #[serde(rename = "semestral")]
    SemiAnnual,
    #[serde(rename = "anual")]
    Annual,
    #[serde(rename = "unica")]
    Once,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "diaria",
            Frequency::Weekly => "semanal",
            Frequency::Monthly => "mensual",
            Frequency::Quarterly => "trimestral",
            Frequency::SemiAnnual => "semestral",
            Frequency::Annual => "anual",
            Frequency::Once => "unica",
        }
    }
}

impl core::fmt::Display for Frequency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Frequency {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "diaria" => Ok(Frequency::Daily),
            "semanal" => Ok(Frequency::Weekly),
            "mensual" => Ok(Frequency::Monthly),
            "trimestral" => Ok(Frequency::Quarterly),
            "semestral" => Ok(Frequency::SemiAnnual),
            "anual" => Ok(Frequency::Annual),
            "unica" | "única" => Ok(Frequency::Once),
            other => Err(DomainError::validation(format!("unknown frequency '{other}'"))),
        }
    }
}

/// A scheduled or generated unit of upkeep work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceRecord {
    pub id: MaintenanceId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion")]
    pub description: Option<String>,
    #[serde(rename = "frecuencia")]
    pub frequency: Frequency,
    #[serde(rename = "fecha_programada")]
    pub scheduled_for: NaiveDate,
    #[serde(rename = "estado")]
    pub status: MaintenanceStatus,
    #[serde(rename = "componente_id")]
    pub component_id: Option<ComponentId>,
    #[serde(rename = "operario_id")]
    pub operator_id: Option<UserId>,
    #[serde(rename = "ubicacion_id")]
    pub location_id: Option<LocationId>,
    #[serde(rename = "comentarios")]
    pub comments: Option<String>,
}

impl MaintenanceRecord {
    /// Move to `target`, appending `note` to the existing comments.
    pub fn transition(&mut self, target: MaintenanceStatus, note: Option<&str>) -> DomainResult<()> {
        if !self.status.can_transition_to(target) {
            return Err(DomainError::invariant(format!(
                "maintenance {} cannot move from '{}' to '{}'",
                self.id, self.status, target
            )));
        }
        self.status = target;
        if let Some(note) = note.filter(|n| !n.trim().is_empty()) {
            self.comments = Some(append_note(self.comments.as_deref(), note));
        }
        Ok(())
    }

    /// Cancel open work because the owning component was retired.
    pub fn cancel_with_note(&mut self, note: &str) -> bool {
        if !self.status.is_open() {
            return false;
        }
        self.status = MaintenanceStatus::Cancelled;
        self.comments = Some(append_note(self.comments.as_deref(), note));
        true
    }
}

/// Input for inserting a maintenance record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMaintenance {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion", default)]
    pub description: Option<String>,
    #[serde(rename = "frecuencia", default)]
    pub frequency: Frequency,
    #[serde(rename = "fecha_programada")]
    pub scheduled_for: NaiveDate,
    #[serde(rename = "estado", default = "NewMaintenance::default_status")]
    pub status: MaintenanceStatus,
    #[serde(rename = "componente_id", default)]
    pub component_id: Option<ComponentId>,
    #[serde(rename = "operario_id", default)]
    pub operator_id: Option<UserId>,
    #[serde(rename = "ubicacion_id", default)]
    pub location_id: Option<LocationId>,
    #[serde(rename = "comentarios", default)]
    pub comments: Option<String>,
}

impl NewMaintenance {
    fn default_status() -> MaintenanceStatus {
        MaintenanceStatus::Pending
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("nombre cannot be empty"));
        }
        if self.status.is_terminal() {
            return Err(DomainError::validation(
                "new maintenance must start as 'pendiente' or 'progreso'",
            ));
        }
        Ok(())
    }
}

/// Concatenate `note` after `existing`; prior text is kept verbatim as a prefix.
pub fn append_note(existing: Option<&str>, note: &str) -> String {
    match existing {
        Some(prev) if !prev.is_empty() => format!("{prev}\n{note}"),
        _ => note.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(status: MaintenanceStatus, comments: Option<&str>) -> MaintenanceRecord {
        MaintenanceRecord {
            id: MaintenanceId::new(1),
            name: "Revisión".to_string(),
            description: None,
            frequency: Frequency::Monthly,
            scheduled_for: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            status,
            component_id: Some(ComponentId::new(5)),
            operator_id: None,
            location_id: None,
            comments: comments.map(str::to_string),
        }
    }

    #[test]
    fn transitions_follow_lifecycle() {
        let mut r = record(MaintenanceStatus::Pending, None);
        r.transition(MaintenanceStatus::InProgress, Some("iniciado")).unwrap();
        r.transition(MaintenanceStatus::Completed, None).unwrap();
        assert_eq!(r.status, MaintenanceStatus::Completed);
        assert_eq!(r.comments.as_deref(), Some("iniciado"));

        let err = r.transition(MaintenanceStatus::Pending, None).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn cancel_only_touches_open_work() {
        let mut done = record(MaintenanceStatus::Completed, Some("ok"));
        assert!(!done.cancel_with_note("baja"));
        assert_eq!(done.status, MaintenanceStatus::Completed);
        assert_eq!(done.comments.as_deref(), Some("ok"));

        let mut open = record(MaintenanceStatus::InProgress, Some("previo"));
        assert!(open.cancel_with_note("baja"));
        assert_eq!(open.status, MaintenanceStatus::Cancelled);
        assert_eq!(open.comments.as_deref(), Some("previo\nbaja"));
    }

    #[test]
    fn frequency_parsing() {
        assert_eq!("Mensual".parse::<Frequency>().unwrap(), Frequency::Monthly);
        assert_eq!("única".parse::<Frequency>().unwrap(), Frequency::Once);
        assert!("cada rato".parse::<Frequency>().is_err());
        assert_eq!(Frequency::default(), Frequency::Monthly);
    }

    #[test]
    fn new_maintenance_rejects_terminal_start() {
        let input = NewMaintenance {
            name: "Lubricación".to_string(),
            description: None,
            frequency: Frequency::Weekly,
            scheduled_for: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            status: MaintenanceStatus::Cancelled,
            component_id: None,
            operator_id: None,
            location_id: None,
            comments: None,
        };
        assert!(matches!(input.validate(), Err(DomainError::Validation(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: appending a note never loses the earlier comments.
        #[test]
        fn append_keeps_prefix(prev in "[a-zA-Z0-9 .,]{1,80}", note in "[a-zA-Z0-9 .,]{1,80}") {
            let joined = append_note(Some(&prev), &note);
            prop_assert!(joined.starts_with(&prev));
            prop_assert!(joined.ends_with(&note));
        }
    }
}
