use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use freshly_products::{NewProduct, ProductId, ProductPatch};

use crate::app::{dto, errors, extract::JsonBody, services::AppServices};
use crate::context::PrincipalContext;

/// Catalogue reads; mounted without authentication.
///
/// Collection paths answer with and without the trailing slash.
pub fn public_router() -> Router {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/", get(list_products))
        .route("/products/:id", get(get_product))
}

/// Catalogue writes; administrators only.
pub fn router() -> Router {
    Router::new()
        .route("/products", post(create_product))
        .route("/products/", post(create_product))
        .route("/products/:id", put(update_product).delete(delete_product))
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ProductListQuery>,
) -> axum::response::Response {
    match services
        .products
        .list_products(query.page(), query.available_only)
        .await
    {
        Ok(products) => {
            Json(products.iter().map(dto::product_to_json).collect::<Vec<_>>()).into_response()
        }
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match dto::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.products.get_product(product_id).await {
        Ok(product) => Json(dto::product_to_json(&product)).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    JsonBody(body): JsonBody<dto::CreateProductRequest>,
) -> axum::response::Response {
    match services
        .products
        .create_product(principal.principal(), NewProduct::from(body))
        .await
    {
        Ok(product) => (StatusCode::CREATED, Json(dto::product_to_json(&product))).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<dto::UpdateProductRequest>,
) -> axum::response::Response {
    let product_id: ProductId = match dto::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .products
        .update_product(principal.principal(), product_id, ProductPatch::from(body))
        .await
    {
        Ok(product) => Json(dto::product_to_json(&product)).into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match dto::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .products
        .delete_product(principal.principal(), product_id)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::workflow_error_to_response(e),
    }
}
