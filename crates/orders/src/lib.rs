//! Orders domain module.
//!
//! Order aggregate, the placement command and its stock reservation plan,
//! typed partial updates and the ownership policy. Deterministic domain logic
//! only: persistence and transactions live in `freshly-infra`.

pub mod order;
pub mod patch;
pub mod place;
pub mod policy;

pub use order::{Order, OrderId, OrderItem, OrderItemId, OrderStatus, Restock, ShippingInfo};
pub use patch::OrderPatch;
pub use place::{LineItem, NewOrder, PlaceOrder, StockReservation, reserve_stock};
