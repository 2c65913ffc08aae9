use std::sync::Arc;

use thiserror::Error;

use freshly_infra::{
    AppConfig, InMemoryStore, OrderWorkflow, Persistence, PgStore, ProductCatalog, Store, StoreError,
};

/// Application services shared by every handler.
#[derive(Clone)]
pub struct AppServices {
    pub orders: OrderWorkflow,
    pub products: ProductCatalog,
}

impl AppServices {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            orders: OrderWorkflow::new(store.clone()),
            products: ProductCatalog::new(store),
        }
    }

    /// Services over a fresh in-memory store (dev and tests).
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }
}

#[derive(Debug, Error)]
pub enum ServicesError {
    #[error("failed to connect to postgres: {0}")]
    Connect(#[source] StoreError),

    #[error("failed to apply schema: {0}")]
    Migrate(#[source] StoreError),
}

pub async fn build_services(config: &AppConfig) -> Result<AppServices, ServicesError> {
    match &config.persistence {
        Persistence::InMemory => {
            tracing::info!("using in-memory store");
            Ok(AppServices::in_memory())
        }
        Persistence::Postgres {
            database_url,
            max_connections,
        } => {
            let store = PgStore::connect(database_url, *max_connections)
                .await
                .map_err(ServicesError::Connect)?;
            store.migrate().await.map_err(ServicesError::Migrate)?;
            tracing::info!(max_connections, "using postgres store");
            Ok(AppServices::new(Arc::new(store)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_config_builds_without_a_database() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        let services = build_services(&config).await.unwrap();
        let listed = services
            .products
            .list_products(freshly_infra::Page::default(), false)
            .await
            .unwrap();
        assert!(listed.is_empty());
    }
}
