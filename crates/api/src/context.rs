use freshly_auth::Principal;
use freshly_core::UserId;

/// Principal context for a request (authenticated identity + admin flag).
///
/// Inserted by the auth middleware; must be present for all protected routes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn user_id(&self) -> UserId {
        self.principal.user_id()
    }

    pub fn is_admin(&self) -> bool {
        self.principal.is_admin()
    }
}

/// Correlation id for a request, echoed back in the `x-request-id` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
