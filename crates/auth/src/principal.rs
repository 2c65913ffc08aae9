use serde::Serialize;

use freshly_core::UserId;

use crate::JwtClaims;

/// The authenticated identity behind a request.
///
/// Everything the order workflow needs to know about the caller: who they are
/// and whether they administer the store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    user_id: UserId,
    is_admin: bool,
}

impl Principal {
    pub const fn new(user_id: UserId, is_admin: bool) -> Self {
        Self { user_id, is_admin }
    }

    pub const fn customer(user_id: UserId) -> Self {
        Self::new(user_id, false)
    }

    pub const fn admin(user_id: UserId) -> Self {
        Self::new(user_id, true)
    }

    /// Convention: the "admin" role grants store administration.
    pub fn from_claims(claims: &JwtClaims) -> Self {
        Self::new(claims.sub, claims.roles.iter().any(|r| r.is_admin()))
    }

    pub const fn user_id(&self) -> UserId {
        self.user_id
    }

    pub const fn is_admin(&self) -> bool {
        self.is_admin
    }

    pub fn owns(&self, owner: UserId) -> bool {
        self.user_id == owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::Role;

    #[test]
    fn admin_flag_comes_from_roles() {
        let now = Utc::now();
        let mut claims = JwtClaims {
            sub: UserId::new(4),
            roles: vec![Role::new("shopper")],
            issued_at: now,
            expires_at: now,
        };
        assert!(!Principal::from_claims(&claims).is_admin());

        claims.roles.push(Role::new("admin"));
        let principal = Principal::from_claims(&claims);
        assert!(principal.is_admin());
        assert_eq!(principal.user_id(), UserId::new(4));
    }
}
