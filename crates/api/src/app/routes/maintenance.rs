use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{post, put},
    Json, Router,
};

use facilities_assets::NewMaintenance;
use facilities_auth::permissions;
use facilities_core::{ComponentId, MaintenanceId};

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(schedule_maintenance))
        .route("/:id/status", put(transition_maintenance))
}

pub async fn schedule_maintenance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewMaintenance>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, permissions::MAINTENANCE_WRITE) {
        return resp;
    }

    match services.facility.schedule_maintenance(body).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

/// Mounted at `GET /components/:id/maintenance`.
pub async fn list_for_component(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, permissions::MAINTENANCE_READ) {
        return resp;
    }
    let id: ComponentId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.facility.list_maintenance(id).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn transition_maintenance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::TransitionMaintenanceRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, permissions::MAINTENANCE_WRITE) {
        return resp;
    }
    let id: MaintenanceId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .facility
        .transition_maintenance(id, body.status, body.note)
        .await
    {
        Ok(record) => Json(record).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}
