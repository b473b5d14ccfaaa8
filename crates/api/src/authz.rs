//! API-side authorization guard.
//!
//! Handlers call [`require`] before touching the service layer; the policy
//! itself lives in `facilities-auth`.

use axum::http::StatusCode;
use axum::response::Response;

use facilities_auth::{Permission, authorize};

use crate::app::errors::json_error;
use crate::context::PrincipalContext;

/// `Err` carries a ready 403 response.
pub fn require(principal: &PrincipalContext, permission: &'static str) -> Result<(), Response> {
    authorize(principal.principal(), &Permission::new(permission))
        .map_err(|e| json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()))
}
