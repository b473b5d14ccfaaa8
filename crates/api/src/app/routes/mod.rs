use axum::{Router, routing::get};

pub mod components;
pub mod inventory;
pub mod maintenance;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/components", components::router())
        .nest("/maintenance", maintenance::router())
        .nest("/inventory", inventory::router())
}
