use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use freshly_orders::{OrderId, PlaceOrder};

use crate::app::{dto, errors, extract::JsonBody, services::AppServices};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/", post(create_order).get(list_orders))
        .route("/orders/:id", get(get_order).put(update_order).delete(cancel_order))
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    JsonBody(body): JsonBody<dto::CreateOrderRequest>,
) -> axum::response::Response {
    let cmd = PlaceOrder::from(body);
    match services.orders.place_order(principal.principal(), cmd).await {
        Ok(order) => (StatusCode::CREATED, Json(dto::order_to_json(&order))).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::ListQuery>,
) -> axum::response::Response {
    match services
        .orders
        .list_orders(principal.principal(), query.page())
        .await
    {
        Ok(orders) => Json(orders.iter().map(dto::order_to_json).collect::<Vec<_>>()).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match dto::parse_id(&id, "order") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.orders.get_order(principal.principal(), order_id).await {
        Ok(order) => Json(dto::order_to_json(&order)).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn update_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<dto::UpdateOrderRequest>,
) -> axum::response::Response {
    let order_id: OrderId = match dto::parse_id(&id, "order") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let patch = match body.into_patch() {
        Ok(p) => p,
        Err(e) => return errors::workflow_error_to_response(e.into()),
    };

    match services
        .orders
        .update_order(principal.principal(), order_id, patch)
        .await
    {
        Ok(order) => Json(dto::order_to_json(&order)).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

/// Cancels the order and puts its stock back.
pub async fn cancel_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match dto::parse_id(&id, "order") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.orders.cancel_order(principal.principal(), order_id).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}
