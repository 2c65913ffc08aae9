use axum::{routing::get, Router};

pub mod admin;
pub mod orders;
pub mod products;
pub mod system;

/// Router for all authenticated endpoints.
///
/// Sub-routers carry full paths and are merged: public and protected
/// product routes share paths and differ only by method.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .merge(orders::router())
        .merge(products::router())
        .merge(admin::router())
}

/// Endpoints reachable without a bearer token.
pub fn public_router() -> Router {
    Router::new()
        .route("/", get(system::welcome))
        .route("/health", get(system::health))
        .merge(products::public_router())
}
