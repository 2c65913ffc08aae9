//! `freshly-auth`: authentication/authorization boundary.
//!
//! Decoupled from HTTP and storage: token validation yields a [`Principal`],
//! and the policy helpers answer "may this principal do that" without IO.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, ensure_admin, ensure_owner_or_admin};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use principal::Principal;
pub use roles::Role;
