use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::context::{PrincipalContext, RequestId};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn welcome() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Welcome to the Freshly grocery API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn whoami(
    Extension(principal): Extension<PrincipalContext>,
    Extension(request_id): Extension<RequestId>,
) -> impl IntoResponse {
    Json(serde_json::json!({
        "user_id": principal.user_id().as_i64(),
        "is_admin": principal.is_admin(),
        "request_id": request_id.as_str(),
    }))
}
