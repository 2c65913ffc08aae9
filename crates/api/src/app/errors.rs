use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use freshly_infra::WorkflowError;

pub fn workflow_error_to_response(err: WorkflowError) -> axum::response::Response {
    match err {
        WorkflowError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        WorkflowError::NotFound { entity, id } => json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("{entity} {id} not found"),
        ),
        WorkflowError::InsufficientStock {
            product_id,
            requested,
            available,
        } => (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({
                "error": "insufficient_stock",
                "message": format!(
                    "insufficient stock for product {product_id}: requested {requested}, available {available}"
                ),
                "product_id": product_id,
                "requested": requested,
                "available": available,
            })),
        )
            .into_response(),
        WorkflowError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
        WorkflowError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        WorkflowError::InvariantViolation(msg) => {
            tracing::error!(error = %msg, "invariant violation");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "invariant_violation",
                "internal error",
            )
        }
        WorkflowError::Store(e) => {
            tracing::error!(error = %e, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "internal error")
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
