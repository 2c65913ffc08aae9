//! Request body extraction with the API's error shape.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    Json,
};
use serde::de::DeserializeOwned;

use crate::app::errors;

/// `Json<T>` whose rejections are `{"error","message"}` bodies instead of
/// axum's plain-text 422.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = axum::response::Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(rejection_to_response(rejection)),
        }
    }
}

pub fn rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    match rejection {
        JsonRejection::JsonDataError(e) => errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!(
                "{}; money amounts are integer cents (200 means 2.00)",
                e.body_text()
            ),
        ),
        JsonRejection::MissingJsonContentType(e) => errors::json_error(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "unsupported_media_type",
            e.body_text(),
        ),
        other => errors::json_error(StatusCode::BAD_REQUEST, "validation_error", other.body_text()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Line {
        unit_price: u64,
    }

    async fn extract(content_type: Option<&str>, body: &'static str) -> Result<JsonBody<Line>, axum::response::Response> {
        let mut builder = Request::builder().method("POST").uri("/");
        if let Some(ct) = content_type {
            builder = builder.header("content-type", ct);
        }
        let req = builder.body(Body::from(body)).unwrap();
        JsonBody::<Line>::from_request(req, &()).await
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn well_formed_bodies_pass_through() {
        let JsonBody(line) = extract(Some("application/json"), r#"{"unit_price": 200}"#)
            .await
            .unwrap();
        assert_eq!(line.unit_price, 200);
    }

    #[tokio::test]
    async fn decimal_prices_are_a_400_that_explains_cents() {
        let resp = extract(Some("application/json"), r#"{"unit_price": 2.00}"#)
            .await
            .unwrap_err();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "validation_error");
        assert!(body["message"].as_str().unwrap().contains("integer cents"));
    }

    #[tokio::test]
    async fn syntax_errors_are_a_400() {
        let resp = extract(Some("application/json"), "{").await.unwrap_err();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_content_type_is_a_415() {
        let resp = extract(None, r#"{"unit_price": 200}"#).await.unwrap_err();
        assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body_json(resp).await["error"], "unsupported_media_type");
    }
}
