use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use freshly_core::{DomainError, DomainResult, Money, RecordId, ensure_non_empty};

/// Product identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub RecordId);

impl ProductId {
    pub fn new(id: RecordId) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0.as_i64()
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for ProductId {
    fn from(value: i64) -> Self {
        Self(RecordId::new(value))
    }
}

impl From<ProductId> for i64 {
    fn from(value: ProductId) -> Self {
        value.as_i64()
    }
}

impl core::str::FromStr for ProductId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// A catalogue product and its stock level.
///
/// `stock_quantity` is the inventory ledger: it is only ever changed through
/// the store's conditional stock update, which refuses to take it below zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub price: Money,
    /// Zero means "no discount".
    pub discounted_price: Money,
    pub stock_quantity: i64,
    pub availability: bool,
    pub category_id: Option<i64>,
    pub image_url: Option<String>,
    pub unit: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whole-percent discount, truncated toward zero; 0 without a discount.
    pub fn discount_percentage(&self) -> i64 {
        if self.discounted_price.is_zero() || self.price.is_zero() {
            return 0;
        }
        let price = i128::from(self.price.cents());
        let discounted = i128::from(self.discounted_price.cents());
        i64::try_from(100 * (price - discounted) / price).unwrap_or(0)
    }

    /// Apply a partial update. Validates the whole patch before touching any
    /// field, so a rejected patch leaves the product unchanged.
    pub fn apply_patch(&mut self, patch: ProductPatch, now: DateTime<Utc>) -> DomainResult<()> {
        patch.validate()?;

        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(slug) = patch.slug {
            self.slug = slug;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(short_description) = patch.short_description {
            self.short_description = Some(short_description);
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(discounted_price) = patch.discounted_price {
            self.discounted_price = discounted_price;
        }
        if let Some(stock_quantity) = patch.stock_quantity {
            self.stock_quantity = stock_quantity;
        }
        if let Some(availability) = patch.availability {
            self.availability = availability;
        }
        if let Some(category_id) = patch.category_id {
            self.category_id = Some(category_id);
        }
        if let Some(image_url) = patch.image_url {
            self.image_url = Some(image_url);
        }
        if let Some(unit) = patch.unit {
            self.unit = Some(unit);
        }
        self.updated_at = now;
        Ok(())
    }
}

/// A product that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub price: Money,
    pub discounted_price: Money,
    pub stock_quantity: i64,
    pub availability: bool,
    pub category_id: Option<i64>,
    pub image_url: Option<String>,
    pub unit: Option<String>,
}

impl NewProduct {
    pub fn validate(&self) -> DomainResult<()> {
        ensure_non_empty("name", &self.name)?;
        ensure_non_empty("slug", &self.slug)?;
        ensure_positive_price(self.price)?;
        ensure_discount_in_range(self.discounted_price)?;
        ensure_stock(self.stock_quantity)
    }

    /// Materialize the stored product once the store has assigned an id.
    pub fn into_product(self, id: ProductId, now: DateTime<Utc>) -> Product {
        Product {
            id,
            name: self.name,
            slug: self.slug,
            description: self.description,
            short_description: self.short_description,
            price: self.price,
            discounted_price: self.discounted_price,
            stock_quantity: self.stock_quantity,
            availability: self.availability,
            category_id: self.category_id,
            image_url: self.image_url,
            unit: self.unit,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Typed partial update for a product: `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub price: Option<Money>,
    pub discounted_price: Option<Money>,
    pub stock_quantity: Option<i64>,
    pub availability: Option<bool>,
    pub category_id: Option<i64>,
    pub image_url: Option<String>,
    pub unit: Option<String>,
}

impl ProductPatch {
    pub fn validate(&self) -> DomainResult<()> {
        if let Some(name) = &self.name {
            ensure_non_empty("name", name)?;
        }
        if let Some(slug) = &self.slug {
            ensure_non_empty("slug", slug)?;
        }
        if let Some(price) = self.price {
            ensure_positive_price(price)?;
        }
        if let Some(discounted_price) = self.discounted_price {
            ensure_discount_in_range(discounted_price)?;
        }
        if let Some(stock) = self.stock_quantity {
            ensure_stock(stock)?;
        }
        Ok(())
    }
}

fn ensure_positive_price(price: Money) -> DomainResult<()> {
    if price.is_zero() {
        return Err(DomainError::validation("price must be positive"));
    }
    if !price.in_range() {
        return Err(DomainError::validation("price is out of range"));
    }
    Ok(())
}

fn ensure_discount_in_range(discounted_price: Money) -> DomainResult<()> {
    if !discounted_price.in_range() {
        return Err(DomainError::validation("discounted_price is out of range"));
    }
    Ok(())
}

fn ensure_stock(stock_quantity: i64) -> DomainResult<()> {
    if stock_quantity < 0 {
        return Err(DomainError::validation("stock_quantity cannot be negative"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> NewProduct {
        NewProduct {
            name: "Organic Apples".to_string(),
            slug: "organic-apples".to_string(),
            description: None,
            short_description: None,
            price: Money::from_cents(300),
            discounted_price: Money::ZERO,
            stock_quantity: 10,
            availability: true,
            category_id: None,
            image_url: None,
            unit: Some("kg".to_string()),
        }
    }

    fn stored() -> Product {
        draft().into_product(ProductId::from(1), Utc::now())
    }

    #[test]
    fn valid_draft_passes() {
        assert_eq!(draft().validate(), Ok(()));
    }

    #[test]
    fn draft_rejects_zero_price_negative_stock_and_blank_name() {
        let mut d = draft();
        d.price = Money::ZERO;
        assert_eq!(d.validate(), Err(DomainError::validation("price must be positive")));

        let mut d = draft();
        d.stock_quantity = -1;
        assert_eq!(
            d.validate(),
            Err(DomainError::validation("stock_quantity cannot be negative"))
        );

        let mut d = draft();
        d.price = Money::from_cents(u64::MAX);
        assert_eq!(d.validate(), Err(DomainError::validation("price is out of range")));

        let mut d = draft();
        d.discounted_price = Money::from_cents(u64::MAX);
        assert_eq!(
            d.validate(),
            Err(DomainError::validation("discounted_price is out of range"))
        );

        let mut d = draft();
        d.name = " ".to_string();
        assert_eq!(d.validate(), Err(DomainError::validation("name must not be empty")));
    }

    #[test]
    fn discount_percentage_truncates() {
        let mut p = stored();
        assert_eq!(p.discount_percentage(), 0);

        p.discounted_price = Money::from_cents(200);
        assert_eq!(p.discount_percentage(), 33);

        p.discounted_price = Money::from_cents(150);
        assert_eq!(p.discount_percentage(), 50);
    }

    #[test]
    fn patch_updates_only_present_fields() {
        let mut p = stored();
        let before = p.clone();
        let later = before.updated_at + chrono::Duration::seconds(1);

        let patch = ProductPatch {
            stock_quantity: Some(4),
            availability: Some(false),
            ..ProductPatch::default()
        };
        p.apply_patch(patch, later).unwrap();

        assert_eq!(p.stock_quantity, 4);
        assert!(!p.availability);
        assert_eq!(p.name, before.name);
        assert_eq!(p.price, before.price);
        assert_eq!(p.updated_at, later);
    }

    #[test]
    fn patch_rejects_prices_past_the_storable_range() {
        let patch = ProductPatch {
            price: Some(Money::from_cents(i64::MAX as u64 + 1)),
            ..ProductPatch::default()
        };
        assert_eq!(patch.validate(), Err(DomainError::validation("price is out of range")));
    }

    #[test]
    fn rejected_patch_leaves_product_untouched() {
        let mut p = stored();
        let before = p.clone();

        let patch = ProductPatch {
            name: Some("Pears".to_string()),
            price: Some(Money::ZERO),
            ..ProductPatch::default()
        };
        assert!(p.apply_patch(patch, Utc::now()).is_err());
        assert_eq!(p, before);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: the discount is always within 0..=100 when the
            /// discounted price does not exceed the list price.
            #[test]
            fn discount_percentage_is_bounded(price in 1u64..1_000_000, ratio in 0u64..=100) {
                let mut p = stored();
                p.price = Money::from_cents(price);
                p.discounted_price = Money::from_cents(price * ratio / 100);
                let pct = p.discount_percentage();
                prop_assert!((0..=100).contains(&pct));
            }
        }
    }
}
