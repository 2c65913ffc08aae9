//! Transactional storage boundary.
//!
//! The workflows talk to storage only through a [`UnitOfWork`]: one
//! transaction-scoped handle obtained from a [`Store`]. Everything staged on a
//! unit of work becomes visible atomically on [`UnitOfWork::commit`]; dropping
//! the handle without committing rolls it back on every exit path.
//!
//! ## Serialization of stock changes
//!
//! Stock check-and-decrement must not interleave between concurrent orders.
//! Adapters guarantee this in two layers:
//!
//! - [`UnitOfWork::lock_products`] locks the referenced product rows in
//!   ascending id order for the rest of the unit of work
//! - [`UnitOfWork::adjust_stock`] is a conditional update that refuses to take
//!   `stock_quantity` below zero and reports what it found instead

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use freshly_core::UserId;
use freshly_orders::{LineItem, NewOrder, Order, OrderId, OrderItem};
use freshly_products::{NewProduct, Product, ProductId};

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Storage adapter error.
///
/// Infrastructure failures, as opposed to domain errors. `Conflict` covers
/// constraint violations the caller can act on (duplicate slug, a row still
/// referenced elsewhere); everything else is `Database` or `Corrupt`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(String),

    /// A stored row could not be mapped back into the domain model.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Outcome of a conditional stock update.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StockUpdate {
    Applied { remaining: i64 },
    Missing,
    /// Nothing was changed; `available` is the stock found.
    Insufficient { available: i64 },
}

/// Offset/limit window for listings.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Page {
    pub skip: u64,
    pub limit: u64,
}

impl Page {
    pub const DEFAULT_LIMIT: u64 = 100;
    pub const MAX_LIMIT: u64 = 1000;

    pub fn new(skip: Option<u64>, limit: Option<u64>) -> Self {
        Self {
            skip: skip.unwrap_or(0),
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).min(Self::MAX_LIMIT),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Opens units of work.
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;
}

/// A transaction-scoped storage handle.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Lock the given products (ascending id order) and return those that
    /// exist. Locks are held until commit or rollback.
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError>;

    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;

    async fn list_products(
        &mut self,
        page: Page,
        available_only: bool,
    ) -> Result<Vec<Product>, StoreError>;

    async fn insert_product(
        &mut self,
        draft: NewProduct,
        now: DateTime<Utc>,
    ) -> Result<Product, StoreError>;

    /// Overwrite every column of an existing product.
    async fn save_product(&mut self, product: &Product) -> Result<(), StoreError>;

    /// Returns `false` when no such product existed.
    async fn delete_product(&mut self, id: ProductId) -> Result<bool, StoreError>;

    /// Whether any order item points at the product.
    async fn product_is_referenced(&mut self, id: ProductId) -> Result<bool, StoreError>;

    /// Add `delta` (negative to reserve, positive to restock) to a product's
    /// stock unless that would take it below zero.
    async fn adjust_stock(
        &mut self,
        id: ProductId,
        delta: i64,
        now: DateTime<Utc>,
    ) -> Result<StockUpdate, StoreError>;

    /// Insert the order header. The returned order has no items yet.
    async fn insert_order(&mut self, order: &NewOrder, now: DateTime<Utc>) -> Result<Order, StoreError>;

    /// Insert one item per line, in line order.
    async fn insert_order_items(
        &mut self,
        order_id: OrderId,
        lines: &[LineItem],
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderItem>, StoreError>;

    async fn load_order_with_items(&mut self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Like [`UnitOfWork::load_order_with_items`], but the order row stays
    /// locked until the unit of work ends.
    async fn lock_order_with_items(&mut self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Persist the order header (status, shipping, `updated_at`). Items are
    /// immutable once created.
    async fn save_order(&mut self, order: &Order) -> Result<(), StoreError>;

    /// Orders ordered by id ascending; `owner` restricts to one user.
    async fn list_orders(
        &mut self,
        owner: Option<UserId>,
        page: Page,
    ) -> Result<Vec<Order>, StoreError>;

    /// Returns the number of items removed.
    async fn delete_order_items(&mut self, order_id: OrderId) -> Result<u64, StoreError>;

    /// Returns `false` when no such order existed. Items are not removed
    /// implicitly: an order that still has items is a `Conflict`.
    async fn delete_order(&mut self, id: OrderId) -> Result<bool, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
