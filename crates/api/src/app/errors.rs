use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use facilities_core::DomainError;
use facilities_infra::{DecommissionError, StoreError, WorkflowError};

pub fn workflow_error_to_response(err: WorkflowError) -> axum::response::Response {
    match err {
        WorkflowError::Domain(e) => domain_error_to_response(e),
        WorkflowError::InsufficientStock(item) => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "insufficient_stock",
            format!("no stock available for item {item}"),
        ),
        WorkflowError::Store(e) => store_error_to_response(e, "operation failed; no changes were applied"),
    }
}

pub fn decommission_error_to_response(err: DecommissionError) -> axum::response::Response {
    match err {
        DecommissionError::NotFound(id) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("component {id} not found"))
        }
        DecommissionError::AlreadyDecommissioned(id) => json_error(
            StatusCode::CONFLICT,
            "already_decommissioned",
            format!("component {id} is already decommissioned"),
        ),
        DecommissionError::TransactionFailure(e) => {
            store_error_to_response(e, "decommission failed; no changes were applied")
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
    }
}

/// Database text only ever travels in `detail`; `message` is fixed.
fn store_error_to_response(err: StoreError, message: &'static str) -> axum::response::Response {
    match err {
        StoreError::Conflict(msg) | StoreError::Constraint(msg) => {
            tracing::warn!(error = %msg, "store conflict");
            json_error_with_detail(
                StatusCode::CONFLICT,
                "conflict",
                "conflicting change; no changes were applied",
                msg,
            )
        }
        other => {
            tracing::error!(error = %other, "store failure");
            json_error_with_detail(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                message,
                other.to_string(),
            )
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn json_error_with_detail(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    detail: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
            "detail": detail.into(),
        })),
    )
        .into_response()
}

/// Parse a path id, answering 400 when it is not a positive integer.
pub fn parse_id<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: std::str::FromStr<Err = DomainError>,
{
    raw.parse::<T>().map_err(domain_error_to_response)
}

#[cfg(test)]
mod tests {
    use facilities_core::ComponentId;

    use super::*;

    #[test]
    fn error_codes_map_to_statuses() {
        let cases = [
            (workflow_error_to_response(DomainError::NotFound.into()), StatusCode::NOT_FOUND),
            (
                workflow_error_to_response(DomainError::validation("x").into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                workflow_error_to_response(DomainError::invariant("x").into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                workflow_error_to_response(StoreError::Conflict("dup".into()).into()),
                StatusCode::CONFLICT,
            ),
            (
                workflow_error_to_response(StoreError::Database("down".into()).into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                decommission_error_to_response(DecommissionError::AlreadyDecommissioned(ComponentId::new(1))),
                StatusCode::CONFLICT,
            ),
            (
                decommission_error_to_response(DecommissionError::NotFound(ComponentId::new(1))),
                StatusCode::NOT_FOUND,
            ),
        ];
        for (response, status) in cases {
            assert_eq!(response.status(), status);
        }
    }

    async fn body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn database_text_stays_out_of_the_message() {
        let raw = "database error in insert_component: duplicate key value violates unique \
                   constraint \"componentes_numero_serie_key\"";

        let json = body(workflow_error_to_response(StoreError::Conflict(raw.into()).into())).await;
        assert_eq!(json["error"], "conflict");
        assert_eq!(json["message"], "conflicting change; no changes were applied");
        assert_eq!(json["detail"], raw);

        let json = body(decommission_error_to_response(DecommissionError::TransactionFailure(
            StoreError::Constraint(raw.into()),
        )))
        .await;
        assert!(!json["message"].as_str().unwrap().contains("duplicate key"));
        assert_eq!(json["detail"], raw);

        let json = body(workflow_error_to_response(StoreError::Database(raw.into()).into())).await;
        assert_eq!(json["error"], "store_error");
        assert!(!json["message"].as_str().unwrap().contains("duplicate key"));
        assert!(json["detail"].as_str().unwrap().contains("duplicate key"));
    }

    #[test]
    fn ids_must_be_positive_integers() {
        assert!(parse_id::<ComponentId>("12").is_ok());
        for bad in ["0", "-3", "abc"] {
            let response = parse_id::<ComponentId>(bad).unwrap_err();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }
}
