//! Application-service error.
//!
//! One enum for everything the workflows can report, so the HTTP layer has a
//! single place to map outcomes onto status codes. Domain, authorization and
//! storage errors all convert into it through `From`, which lets the services
//! use `?` across layers.

use thiserror::Error;

use freshly_auth::AuthzError;
use freshly_core::DomainError;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Input failed validation (deterministic, caller's fault).
    #[error("{0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: i64,
        requested: i64,
        available: i64,
    },

    #[error("{0}")]
    Forbidden(String),

    /// The record's current state does not allow the operation.
    #[error("{0}")]
    Conflict(String),

    /// Stored data contradicts a domain invariant.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<DomainError> for WorkflowError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => WorkflowError::Validation(msg),
            DomainError::InvariantViolation(msg) => WorkflowError::InvariantViolation(msg),
            DomainError::NotFound { entity, id } => WorkflowError::NotFound { entity, id },
            DomainError::InsufficientStock {
                product_id,
                requested,
                available,
            } => WorkflowError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            DomainError::Conflict(msg) => WorkflowError::Conflict(msg),
        }
    }
}

impl From<AuthzError> for WorkflowError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::Forbidden(msg) => WorkflowError::Forbidden(msg),
        }
    }
}

impl From<StoreError> for WorkflowError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => WorkflowError::Conflict(msg),
            other => WorkflowError::Store(other),
        }
    }
}
