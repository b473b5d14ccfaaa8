use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use facilities_assets::Restock;
use facilities_auth::permissions;
use facilities_core::ItemId;

use crate::app::errors;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_inventory))
        .route("/:item_id", get(get_inventory_line))
        .route("/:item_id/restock", post(restock))
}

pub async fn list_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, permissions::INVENTORY_READ) {
        return resp;
    }

    match services.facility.list_inventory().await {
        Ok(lines) => Json(lines).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn get_inventory_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(item_id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, permissions::INVENTORY_READ) {
        return resp;
    }
    let item: ItemId = match errors::parse_id(&item_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.facility.get_inventory_line(item).await {
        Ok(line) => Json(line).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn restock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(item_id): Path<String>,
    Json(body): Json<Restock>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, permissions::INVENTORY_WRITE) {
        return resp;
    }
    let item: ItemId = match errors::parse_id(&item_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.facility.restock(item, body).await {
        Ok(line) => Json(line).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}
