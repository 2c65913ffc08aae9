//! Order placement: command validation and stock reservation planning.
//!
//! Placement runs in two halves. [`PlaceOrder::validate`] rejects malformed
//! input before any storage is touched; [`reserve_stock`] then walks the line
//! items in input order against the (locked) stock levels and produces the
//! decrements and total that the store commits as one unit.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use freshly_core::{DomainError, DomainResult, Money, UserId};
use freshly_products::ProductId;

use crate::order::{OrderStatus, ShippingInfo};

/// A requested `(product, quantity, unit_price)` tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
}

/// Command: place an order for the requesting user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub shipping: ShippingInfo,
    pub items: Vec<LineItem>,
}

impl PlaceOrder {
    pub fn validate(&self) -> DomainResult<()> {
        self.shipping.validate()?;

        if self.items.is_empty() {
            return Err(DomainError::validation("items must contain at least one line item"));
        }

        for (idx, item) in self.items.iter().enumerate() {
            if item.quantity <= 0 {
                return Err(DomainError::validation(format!(
                    "items[{idx}].quantity must be positive"
                )));
            }
            if item.unit_price.is_zero() {
                return Err(DomainError::validation(format!(
                    "items[{idx}].unit_price must be positive"
                )));
            }
            if !item.unit_price.in_range() {
                return Err(DomainError::validation(format!(
                    "items[{idx}].unit_price is out of range"
                )));
            }
        }
        self.total_amount().map(|_| ())
    }

    /// Σ quantity × unit_price, bounded by [`Money::MAX`].
    pub fn total_amount(&self) -> DomainResult<Money> {
        self.items
            .iter()
            .try_fold(Money::ZERO, |total, item| {
                item.unit_price
                    .checked_mul(item.quantity)
                    .and_then(|line| total.checked_add(line))
            })
            .ok_or_else(|| DomainError::validation("order total overflows"))
    }

    /// Distinct product ids in ascending order (the row-lock order).
    pub fn product_ids(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = self.items.iter().map(|i| i.product_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// The stock decrements and total for an accepted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockReservation {
    pub total_amount: Money,
    /// One entry per distinct product, in first-appearance order.
    pub decrements: Vec<(ProductId, i64)>,
}

/// Walk `items` in input order against the available stock.
///
/// `available` reports a product's current stock, or `None` when the product
/// does not exist. Repeated products are checked against the stock left after
/// earlier lines of the same order. The first failing line aborts the plan.
pub fn reserve_stock<F>(items: &[LineItem], mut available: F) -> DomainResult<StockReservation>
where
    F: FnMut(ProductId) -> Option<i64>,
{
    let mut remaining: HashMap<ProductId, i64> = HashMap::new();
    let mut decrements: Vec<(ProductId, i64)> = Vec::new();
    let mut total_amount = Money::ZERO;

    for item in items {
        let stock = match remaining.get(&item.product_id) {
            Some(stock) => *stock,
            None => available(item.product_id)
                .ok_or_else(|| DomainError::not_found("product", item.product_id))?,
        };

        if stock < item.quantity {
            return Err(DomainError::InsufficientStock {
                product_id: item.product_id.as_i64(),
                requested: item.quantity,
                available: stock,
            });
        }

        total_amount = item
            .unit_price
            .checked_mul(item.quantity)
            .and_then(|line| total_amount.checked_add(line))
            .ok_or_else(|| DomainError::validation("order total overflows"))?;

        remaining.insert(item.product_id, stock - item.quantity);
        match decrements.iter_mut().find(|(id, _)| *id == item.product_id) {
            Some((_, qty)) => *qty += item.quantity,
            None => decrements.push((item.product_id, item.quantity)),
        }
    }

    Ok(StockReservation {
        total_amount,
        decrements,
    })
}

/// Header of an order about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub shipping: ShippingInfo,
}

impl NewOrder {
    pub fn pending(user_id: UserId, total_amount: Money, shipping: ShippingInfo) -> Self {
        Self {
            user_id,
            status: OrderStatus::Pending,
            total_amount,
            shipping,
        }
    }
}
