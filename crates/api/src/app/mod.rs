//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and the application services
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses
//! - `extract.rs`: JSON body extractor that answers with the error shape

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use freshly_infra::AppConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod extract;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: &AppConfig) -> Result<Router, services::ServicesError> {
    let services = services::build_services(config).await?;
    Ok(build_app_with_services(&config.jwt_secret, services))
}

/// Router over already-built services.
pub fn build_app_with_services(jwt_secret: &str, services: services::AppServices) -> Router {
    let jwt = Arc::new(freshly_auth::Hs256JwtValidator::new(jwt_secret.as_bytes()));
    let auth_state = middleware::AuthState { jwt };

    // Protected routes: require a valid bearer token.
    let protected = routes::router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    routes::public_router().merge(protected).layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn(middleware::request_id_middleware))
            .layer(Extension(Arc::new(services))),
    )
}
