//! Infrastructure layer: storage adapters, application services, config.

pub mod config;
pub mod error;
pub mod order_workflow;
pub mod product_catalog;
pub mod store;


pub use config::{AppConfig, ConfigError, Persistence};
pub use error::WorkflowError;
pub use order_workflow::OrderWorkflow;
pub use product_catalog::ProductCatalog;
pub use store::{InMemoryStore, Page, PgStore, StockUpdate, Store, StoreError, UnitOfWork};
