use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use chrono::Utc;

use facilities_assets::{ComponentFilter, ComponentPatch, ReplacementOptions};
use facilities_auth::permissions;
use facilities_core::ComponentId;
use facilities_infra::DecommissionRequest;

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_components).post(create_component))
        .route("/:id", get(get_component).put(update_component))
        .route("/:id/baja", put(decommission_component))
        .route("/:id/maintenance", get(super::maintenance::list_for_component))
}

pub async fn create_component(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateComponentRequest>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, permissions::COMPONENTS_WRITE) {
        return resp;
    }

    match services
        .facility
        .create_component(body.component, body.from_stock)
        .await
    {
        Ok(component) => (StatusCode::CREATED, Json(component)).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn list_components(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(filter): Query<ComponentFilter>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, permissions::COMPONENTS_READ) {
        return resp;
    }

    match services.facility.list_components(filter).await {
        Ok(components) => Json(components).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn get_component(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, permissions::COMPONENTS_READ) {
        return resp;
    }
    let id: ComponentId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.facility.get_component(id).await {
        Ok(component) => Json(component).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn update_component(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(patch): Json<ComponentPatch>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, permissions::COMPONENTS_WRITE) {
        return resp;
    }
    let id: ComponentId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.facility.update_component(id, patch).await {
        Ok(component) => Json(component).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

/// `PUT /components/:id/baja`. The body is optional: `{"frecuencia"?, "nuevo_serial"?}`.
pub async fn decommission_component(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Bytes,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, permissions::COMPONENTS_DECOMMISSION) {
        return resp;
    }
    let id: ComponentId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let options = if body.iter().all(u8::is_ascii_whitespace) {
        ReplacementOptions::default()
    } else {
        match serde_json::from_slice::<ReplacementOptions>(&body) {
            Ok(options) => options,
            Err(e) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string());
            }
        }
    };

    let request = DecommissionRequest {
        component_id: id,
        options,
        acting_user: Some(principal.user_id()),
        on: Utc::now().date_naive(),
    };

    match services.facility.decommission(request).await {
        Ok(outcome) => Json(dto::DecommissionResponse::from(outcome)).into_response(),
        Err(e) => errors::decommission_error_to_response(e),
    }
}
