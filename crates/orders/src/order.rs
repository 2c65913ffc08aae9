use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use freshly_core::{DomainError, DomainResult, Money, RecordId, UserId, ensure_non_empty};
use freshly_products::ProductId;

use crate::patch::OrderPatch;

macro_rules! record_id_newtype {
    ($t:ident) => {
        #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(pub RecordId);

        impl $t {
            pub fn new(id: RecordId) -> Self {
                Self(id)
            }

            pub fn as_i64(&self) -> i64 {
                self.0.as_i64()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $t {
            fn from(value: i64) -> Self {
                Self(RecordId::new(value))
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.as_i64()
            }
        }

        impl core::str::FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map(Self)
            }
        }
    };
}

record_id_newtype!(OrderId);
record_id_newtype!(OrderItemId);

/// Order status lifecycle.
///
/// Orders start `Pending`. Owners may only move a pending order to
/// `Cancelled`; every other transition is an administrator's call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| {
                DomainError::validation(
                    "status must be one of: pending, processing, shipped, delivered, cancelled",
                )
            })
    }
}

/// Where an order is delivered. Every field is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: String,
}

impl ShippingInfo {
    pub fn validate(&self) -> DomainResult<()> {
        ensure_non_empty("address", &self.address)?;
        ensure_non_empty("city", &self.city)?;
        ensure_non_empty("state", &self.state)?;
        ensure_non_empty("postal_code", &self.postal_code)?;
        ensure_non_empty("country", &self.country)?;
        ensure_non_empty("phone", &self.phone)
    }
}

/// A stored order line. `unit_price` is the price agreed at order time and
/// does not follow later catalogue changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// Stock to hand back to a product when an order is cancelled.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Restock {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Order aggregate: header plus the items it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub shipping: ShippingInfo,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == OrderStatus::Cancelled
    }

    /// Sum of the item line totals; `None` on overflow.
    pub fn items_total(&self) -> Option<Money> {
        self.items
            .iter()
            .try_fold(Money::ZERO, |acc, item| acc.checked_add(item.line_total()?))
    }

    /// One restock per item, reversing the original reservation exactly.
    pub fn restocks(&self) -> Vec<Restock> {
        self.items
            .iter()
            .map(|item| Restock {
                product_id: item.product_id,
                quantity: item.quantity,
            })
            .collect()
    }

    /// Mark the order cancelled and return the stock to put back.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> DomainResult<Vec<Restock>> {
        if self.is_cancelled() {
            return Err(DomainError::conflict(format!("order {} is already cancelled", self.id)));
        }
        self.status = OrderStatus::Cancelled;
        self.updated_at = now;
        Ok(self.restocks())
    }

    /// Apply a partial update and return any stock released by it.
    ///
    /// Setting the status to `cancelled` releases the reservation just like
    /// [`Order::cancel`]; moving a cancelled order to any other status is
    /// refused because its stock has already been returned.
    pub fn apply_patch(&mut self, patch: OrderPatch, now: DateTime<Utc>) -> DomainResult<Vec<Restock>> {
        patch.validate()?;

        let mut released = Vec::new();
        if let Some(next) = patch.status {
            match (self.status, next) {
                (OrderStatus::Cancelled, OrderStatus::Cancelled) => {}
                (OrderStatus::Cancelled, _) => {
                    return Err(DomainError::conflict(format!(
                        "order {} is cancelled and cannot be moved to {next}",
                        self.id
                    )));
                }
                (_, OrderStatus::Cancelled) => released = self.restocks(),
                _ => {}
            }
            self.status = next;
        }

        if let Some(address) = patch.address {
            self.shipping.address = address;
        }
        if let Some(city) = patch.city {
            self.shipping.city = city;
        }
        if let Some(state) = patch.state {
            self.shipping.state = state;
        }
        if let Some(postal_code) = patch.postal_code {
            self.shipping.postal_code = postal_code;
        }
        if let Some(country) = patch.country {
            self.shipping.country = country;
        }
        if let Some(phone) = patch.phone {
            self.shipping.phone = phone;
        }

        self.updated_at = now;
        Ok(released)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn shipping() -> ShippingInfo {
        ShippingInfo {
            address: "1 Market Street".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            postal_code: "62701".to_string(),
            country: "US".to_string(),
            phone: "555-0100".to_string(),
        }
    }

    pub(crate) fn order_with_items(status: OrderStatus, owner: i64) -> Order {
        let now = Utc::now();
        let id = OrderId::from(1);
        let item = |n: i64, product: i64, quantity: i64, cents: u64| OrderItem {
            id: OrderItemId::from(n),
            order_id: id,
            product_id: ProductId::from(product),
            quantity,
            unit_price: Money::from_cents(cents),
            created_at: now,
            updated_at: now,
        };
        Order {
            id,
            user_id: UserId::new(owner),
            status,
            total_amount: Money::from_cents(7 * 200 + 2 * 150),
            shipping: shipping(),
            items: vec![item(1, 10, 7, 200), item(2, 11, 2, 150)],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Shipped".parse::<OrderStatus>(), Ok(OrderStatus::Shipped));
        assert!("lost".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn status_display_round_trips_through_parse() {
        for status in OrderStatus::ALL {
            assert_eq!(status.to_string().parse::<OrderStatus>(), Ok(status));
        }
    }

    #[test]
    fn shipping_requires_every_field() {
        let mut s = shipping();
        assert_eq!(s.validate(), Ok(()));
        s.postal_code = String::new();
        assert_eq!(
            s.validate(),
            Err(DomainError::validation("postal_code must not be empty"))
        );
    }

    #[test]
    fn items_total_matches_header_total() {
        let order = order_with_items(OrderStatus::Pending, 1);
        assert_eq!(order.items_total(), Some(order.total_amount));
    }

    #[test]
    fn cancel_returns_one_restock_per_item() {
        let mut order = order_with_items(OrderStatus::Pending, 1);
        let restocks = order.cancel(Utc::now()).unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(
            restocks,
            vec![
                Restock { product_id: ProductId::from(10), quantity: 7 },
                Restock { product_id: ProductId::from(11), quantity: 2 },
            ]
        );
    }

    #[test]
    fn cancelling_twice_is_a_conflict() {
        let mut order = order_with_items(OrderStatus::Pending, 1);
        order.cancel(Utc::now()).unwrap();
        assert!(matches!(order.cancel(Utc::now()), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn patch_to_cancelled_releases_stock() {
        let mut order = order_with_items(OrderStatus::Shipped, 1);
        let patch = OrderPatch {
            status: Some(OrderStatus::Cancelled),
            ..OrderPatch::default()
        };
        let released = order.apply_patch(patch, Utc::now()).unwrap();
        assert_eq!(released.len(), 2);
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[test]
    fn cancelled_orders_cannot_be_reopened() {
        let mut order = order_with_items(OrderStatus::Cancelled, 1);
        let before = order.clone();
        let patch = OrderPatch {
            status: Some(OrderStatus::Processing),
            city: Some("Shelbyville".to_string()),
            ..OrderPatch::default()
        };
        assert!(matches!(order.apply_patch(patch, Utc::now()), Err(DomainError::Conflict(_))));
        assert_eq!(order, before);
    }

    #[test]
    fn shipping_patch_touches_only_named_fields() {
        let mut order = order_with_items(OrderStatus::Pending, 1);
        let patch = OrderPatch {
            phone: Some("555-0199".to_string()),
            ..OrderPatch::default()
        };
        let released = order.apply_patch(patch, Utc::now()).unwrap();
        assert!(released.is_empty());
        assert_eq!(order.shipping.phone, "555-0199");
        assert_eq!(order.shipping.city, "Springfield");
        assert_eq!(order.status, OrderStatus::Pending);
    }
}
