//! Product catalogue service. Reads are public; writes need an administrator.

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use freshly_auth::{Principal, ensure_admin};
use freshly_core::DomainError;
use freshly_products::{NewProduct, Product, ProductId, ProductPatch};

use crate::error::WorkflowError;
use crate::store::{Page, Store};

#[derive(Clone)]
pub struct ProductCatalog {
    store: Arc<dyn Store>,
}

impl ProductCatalog {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, principal, draft), fields(user_id = %principal.user_id(), slug = %draft.slug), err)]
    pub async fn create_product(
        &self,
        principal: &Principal,
        draft: NewProduct,
    ) -> Result<Product, WorkflowError> {
        ensure_admin(principal, "create products")?;
        draft.validate()?;

        let mut uow = self.store.begin().await?;
        let product = uow.insert_product(draft, Utc::now()).await?;
        uow.commit().await?;

        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }

    #[instrument(skip(self), err)]
    pub async fn get_product(&self, product_id: ProductId) -> Result<Product, WorkflowError> {
        let mut uow = self.store.begin().await?;
        let product = uow
            .find_product(product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", product_id))?;
        Ok(product)
    }

    #[instrument(skip(self), err)]
    pub async fn list_products(
        &self,
        page: Page,
        available_only: bool,
    ) -> Result<Vec<Product>, WorkflowError> {
        let mut uow = self.store.begin().await?;
        Ok(uow.list_products(page, available_only).await?)
    }

    #[instrument(skip(self, principal, patch), fields(user_id = %principal.user_id()), err)]
    pub async fn update_product(
        &self,
        principal: &Principal,
        product_id: ProductId,
        patch: ProductPatch,
    ) -> Result<Product, WorkflowError> {
        ensure_admin(principal, "update products")?;
        patch.validate()?;

        let mut uow = self.store.begin().await?;
        let mut product = uow
            .lock_products(&[product_id])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::not_found("product", product_id))?;

        product.apply_patch(patch, Utc::now())?;
        uow.save_product(&product).await?;
        uow.commit().await?;
        Ok(product)
    }

    /// Products that appear on any order stay, so order history keeps its
    /// references.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id()), err)]
    pub async fn delete_product(
        &self,
        principal: &Principal,
        product_id: ProductId,
    ) -> Result<(), WorkflowError> {
        ensure_admin(principal, "delete products")?;

        let mut uow = self.store.begin().await?;
        if uow.lock_products(&[product_id]).await?.is_empty() {
            return Err(DomainError::not_found("product", product_id).into());
        }
        if uow.product_is_referenced(product_id).await? {
            return Err(DomainError::conflict(format!(
                "product {product_id} is referenced by existing orders"
            ))
            .into());
        }
        uow.delete_product(product_id).await?;
        uow.commit().await?;

        tracing::info!(product_id = %product_id, "product deleted");
        Ok(())
    }
}
