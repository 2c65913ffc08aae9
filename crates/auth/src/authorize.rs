//! Pure authorization checks (no IO, no panics).

use thiserror::Error;

use freshly_core::UserId;

use crate::Principal;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: {0}")]
    Forbidden(String),
}

impl AuthzError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
}

/// Require store administration rights for `action`.
pub fn ensure_admin(principal: &Principal, action: &str) -> Result<(), AuthzError> {
    if principal.is_admin() {
        Ok(())
    } else {
        tracing::debug!(user_id = %principal.user_id(), action, "admin check denied");
        Err(AuthzError::forbidden(format!("only administrators may {action}")))
    }
}

/// Require that the principal owns the record or is an administrator.
pub fn ensure_owner_or_admin(
    principal: &Principal,
    owner: UserId,
    action: &str,
) -> Result<(), AuthzError> {
    if principal.is_admin() || principal.owns(owner) {
        Ok(())
    } else {
        tracing::debug!(user_id = %principal.user_id(), %owner, action, "ownership check denied");
        Err(AuthzError::forbidden(format!("not authorized to {action}")))
    }
}
