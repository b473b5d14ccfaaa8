use serde::{Deserialize, Serialize};

use facilities_assets::{Component, MaintenanceRecord, MaintenanceStatus, NewComponent};
use facilities_infra::DecommissionOutcome;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateComponentRequest {
    #[serde(flatten)]
    pub component: NewComponent,
    /// Take one unit of `item_id` from inventory.
    #[serde(rename = "desde_inventario", default)]
    pub from_stock: bool,
}

#[derive(Debug, Deserialize)]
pub struct TransitionMaintenanceRequest {
    #[serde(rename = "estado")]
    pub status: MaintenanceStatus,
    #[serde(rename = "nota", default)]
    pub note: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct DecommissionResponse {
    pub message: String,
    pub componente_baja: Component,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub componente_reemplazo: Option<Component>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mantenimiento: Option<MaintenanceRecord>,
    pub mantenimientos_cancelados: u64,
}

impl From<DecommissionOutcome> for DecommissionResponse {
    fn from(outcome: DecommissionOutcome) -> Self {
        let message = outcome.message();
        let (componente_reemplazo, mantenimiento) = match outcome.replacement {
            Some(r) => (Some(r.promoted), Some(r.maintenance)),
            None => (None, None),
        };
        Self {
            message,
            componente_baja: outcome.decommissioned,
            componente_reemplazo,
            mantenimiento,
            mantenimientos_cancelados: outcome.cancelled_maintenance,
        }
    }
}
