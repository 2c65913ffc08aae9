//! Products domain module (inventory ledger).
//!
//! Business rules for catalogue products and their stock levels, implemented
//! as deterministic domain logic (no IO, no HTTP, no storage).

pub mod product;

pub use product::{NewProduct, Product, ProductId, ProductPatch};
