//! `freshly-core`: domain building blocks shared by every Freshly crate.
//!
//! Pure types only: identifiers, money and the domain error model. No IO.

pub mod error;
pub mod id;
pub mod money;

pub use error::{DomainError, DomainResult, ensure_non_empty};
pub use id::{RecordId, UserId};
pub use money::Money;
