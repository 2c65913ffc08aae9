//! Order workflow: placement, cancellation, updates and reads.
//!
//! Every operation follows the same pipeline:
//!
//! ```text
//! Command
//!   ↓
//! 1. Validate input (no storage touched yet)
//!   ↓
//! 2. Begin a unit of work
//!   ↓
//! 3. Lock what will change (products ascending by id, then the order row)
//!   ↓
//! 4. Authorize and decide (pure domain logic in freshly-orders)
//!   ↓
//! 5. Stage stock changes and rows
//!   ↓
//! 6. Commit
//! ```
//!
//! Any error between 2 and 6 drops the unit of work, which rolls back every
//! staged change: a rejected order leaves stock untouched and persists nothing.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use freshly_auth::Principal;
use freshly_core::DomainError;
use freshly_orders::policy;
use freshly_orders::{NewOrder, Order, OrderId, OrderPatch, PlaceOrder, Restock, reserve_stock};
use freshly_products::ProductId;

use crate::error::WorkflowError;
use crate::store::{Page, StockUpdate, Store, UnitOfWork};

#[derive(Clone)]
pub struct OrderWorkflow {
    store: Arc<dyn Store>,
}

impl OrderWorkflow {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Reserve stock for every line and create the order with its items.
    #[instrument(
        skip(self, principal, command),
        fields(user_id = %principal.user_id(), lines = command.items.len()),
        err
    )]
    pub async fn place_order(
        &self,
        principal: &Principal,
        command: PlaceOrder,
    ) -> Result<Order, WorkflowError> {
        command.validate()?;
        let now = Utc::now();

        let mut uow = self.store.begin().await?;

        let products = uow.lock_products(&command.product_ids()).await?;
        let stock: HashMap<ProductId, i64> = products
            .iter()
            .map(|p| (p.id, p.stock_quantity))
            .collect();

        let plan = match reserve_stock(&command.items, |id| stock.get(&id).copied()) {
            Ok(plan) => plan,
            Err(err) => {
                tracing::warn!(error = %err, "order rejected");
                return Err(err.into());
            }
        };

        for (product_id, quantity) in &plan.decrements {
            match uow.adjust_stock(*product_id, -quantity, now).await? {
                StockUpdate::Applied { .. } => {}
                StockUpdate::Missing => {
                    return Err(DomainError::not_found("product", *product_id).into());
                }
                StockUpdate::Insufficient { available } => {
                    return Err(DomainError::InsufficientStock {
                        product_id: product_id.as_i64(),
                        requested: *quantity,
                        available,
                    }
                    .into());
                }
            }
        }

        let header = NewOrder::pending(principal.user_id(), plan.total_amount, command.shipping);
        let mut order = uow.insert_order(&header, now).await?;
        order.items = uow.insert_order_items(order.id, &command.items, now).await?;
        if order.items_total() != Some(order.total_amount) {
            return Err(DomainError::invariant(format!(
                "order {} total does not match its items",
                order.id
            ))
            .into());
        }

        uow.commit().await?;

        tracing::info!(
            order_id = %order.id,
            total_amount = %order.total_amount,
            "order placed"
        );
        Ok(order)
    }

    /// Cancel the order and put its stock back.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id()), err)]
    pub async fn cancel_order(
        &self,
        principal: &Principal,
        order_id: OrderId,
    ) -> Result<Order, WorkflowError> {
        let now = Utc::now();
        let mut uow = self.store.begin().await?;

        let mut order = uow
            .lock_order_with_items(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("order", order_id))?;

        policy::ensure_can_cancel(principal, &order)?;
        let restocks = order.cancel(now)?;

        restock(uow.as_mut(), &restocks, now).await?;
        uow.save_order(&order).await?;
        uow.commit().await?;

        tracing::info!(order_id = %order.id, items = restocks.len(), "order cancelled");
        Ok(order)
    }

    /// Apply a partial update. A status change to `cancelled` restocks.
    #[instrument(skip(self, principal, patch), fields(user_id = %principal.user_id()), err)]
    pub async fn update_order(
        &self,
        principal: &Principal,
        order_id: OrderId,
        patch: OrderPatch,
    ) -> Result<Order, WorkflowError> {
        patch.validate()?;
        let now = Utc::now();
        let mut uow = self.store.begin().await?;

        let mut order = uow
            .lock_order_with_items(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("order", order_id))?;

        policy::ensure_can_update(principal, &order, &patch)?;
        let previous = order.status;
        let released = order.apply_patch(patch, now)?;

        restock(uow.as_mut(), &released, now).await?;
        uow.save_order(&order).await?;
        uow.commit().await?;

        if previous != order.status {
            tracing::info!(order_id = %order.id, from = %previous, to = %order.status, "order status changed");
        }
        Ok(order)
    }

    #[instrument(skip(self, principal), fields(user_id = %principal.user_id()), err)]
    pub async fn get_order(
        &self,
        principal: &Principal,
        order_id: OrderId,
    ) -> Result<Order, WorkflowError> {
        let mut uow = self.store.begin().await?;
        let order = uow
            .load_order_with_items(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("order", order_id))?;
        policy::ensure_can_view(principal, &order)?;
        Ok(order)
    }

    /// Administrators see every order, everyone else only their own.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id()), err)]
    pub async fn list_orders(
        &self,
        principal: &Principal,
        page: Page,
    ) -> Result<Vec<Order>, WorkflowError> {
        let mut uow = self.store.begin().await?;
        let orders = uow.list_orders(policy::list_scope(principal), page).await?;
        Ok(orders)
    }

    /// Remove a cancelled order and its items for good.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id()), err)]
    pub async fn purge_order(
        &self,
        principal: &Principal,
        order_id: OrderId,
    ) -> Result<(), WorkflowError> {
        policy::ensure_can_purge(principal)?;
        let mut uow = self.store.begin().await?;

        let order = uow
            .lock_order_with_items(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("order", order_id))?;
        if !order.is_cancelled() {
            return Err(DomainError::conflict(format!(
                "order {order_id} must be cancelled before it can be purged"
            ))
            .into());
        }

        let removed = uow.delete_order_items(order_id).await?;
        uow.delete_order(order_id).await?;
        uow.commit().await?;

        tracing::info!(order_id = %order_id, items = removed, "order purged");
        Ok(())
    }
}

/// Hand reserved stock back, locking the products in ascending id order.
async fn restock(
    uow: &mut dyn UnitOfWork,
    restocks: &[Restock],
    now: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    if restocks.is_empty() {
        return Ok(());
    }

    let mut totals: Vec<(ProductId, i64)> = Vec::new();
    for r in restocks {
        match totals.iter_mut().find(|(id, _)| *id == r.product_id) {
            Some((_, qty)) => *qty += r.quantity,
            None => totals.push((r.product_id, r.quantity)),
        }
    }
    totals.sort_unstable_by_key(|(id, _)| *id);

    let ids: Vec<ProductId> = totals.iter().map(|(id, _)| *id).collect();
    uow.lock_products(&ids).await?;

    for (product_id, quantity) in totals {
        match uow.adjust_stock(product_id, quantity, now).await? {
            StockUpdate::Applied { .. } => {}
            StockUpdate::Missing => {
                return Err(DomainError::invariant(format!(
                    "product {product_id} referenced by an order no longer exists"
                ))
                .into());
            }
            StockUpdate::Insufficient { available } => {
                return Err(DomainError::invariant(format!(
                    "restocking {quantity} units of product {product_id} overflowed stock {available}"
                ))
                .into());
            }
        }
    }
    Ok(())
}
