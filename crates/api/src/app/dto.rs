use axum::http::StatusCode;
use serde::Deserialize;

use freshly_core::{DomainError, Money};
use freshly_infra::Page;
use freshly_orders::{LineItem, Order, OrderItem, OrderPatch, OrderStatus, PlaceOrder, ShippingInfo};
use freshly_products::{NewProduct, Product, ProductPatch};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

/// Money fields travel as integer cents.
#[derive(Debug, Deserialize)]
pub struct LineItemRequest {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: u64,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: String,
    pub items: Vec<LineItemRequest>,
}

impl From<CreateOrderRequest> for PlaceOrder {
    fn from(req: CreateOrderRequest) -> Self {
        PlaceOrder {
            shipping: ShippingInfo {
                address: req.address,
                city: req.city,
                state: req.state,
                postal_code: req.postal_code,
                country: req.country,
                phone: req.phone,
            },
            items: req
                .items
                .into_iter()
                .map(|item| LineItem {
                    product_id: item.product_id.into(),
                    quantity: item.quantity,
                    unit_price: Money::from_cents(item.unit_price),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateOrderRequest {
    pub status: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
}

impl UpdateOrderRequest {
    pub fn into_patch(self) -> Result<OrderPatch, DomainError> {
        let status = self
            .status
            .map(|raw| raw.parse::<OrderStatus>())
            .transpose()?;
        Ok(OrderPatch {
            status,
            address: self.address,
            city: self.city,
            state: self.state,
            postal_code: self.postal_code,
            country: self.country,
            phone: self.phone,
        })
    }
}

fn default_unit() -> Option<String> {
    Some("piece".to_string())
}

fn default_availability() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub price: u64,
    #[serde(default)]
    pub discounted_price: u64,
    #[serde(default)]
    pub stock_quantity: i64,
    #[serde(default = "default_availability")]
    pub availability: bool,
    pub category_id: Option<i64>,
    pub image_url: Option<String>,
    #[serde(default = "default_unit")]
    pub unit: Option<String>,
}

impl From<CreateProductRequest> for NewProduct {
    fn from(req: CreateProductRequest) -> Self {
        NewProduct {
            name: req.name,
            slug: req.slug,
            description: req.description,
            short_description: req.short_description,
            price: Money::from_cents(req.price),
            discounted_price: Money::from_cents(req.discounted_price),
            stock_quantity: req.stock_quantity,
            availability: req.availability,
            category_id: req.category_id,
            image_url: req.image_url,
            unit: req.unit,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub price: Option<u64>,
    pub discounted_price: Option<u64>,
    pub stock_quantity: Option<i64>,
    pub availability: Option<bool>,
    pub category_id: Option<i64>,
    pub image_url: Option<String>,
    pub unit: Option<String>,
}

impl From<UpdateProductRequest> for ProductPatch {
    fn from(req: UpdateProductRequest) -> Self {
        ProductPatch {
            name: req.name,
            slug: req.slug,
            description: req.description,
            short_description: req.short_description,
            price: req.price.map(Money::from_cents),
            discounted_price: req.discounted_price.map(Money::from_cents),
            stock_quantity: req.stock_quantity,
            availability: req.availability,
            category_id: req.category_id,
            image_url: req.image_url,
            unit: req.unit,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl ListQuery {
    pub fn page(&self) -> Page {
        Page::new(self.skip, self.limit)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    #[serde(default)]
    pub available_only: bool,
}

impl ProductListQuery {
    pub fn page(&self) -> Page {
        Page::new(self.skip, self.limit)
    }
}

/// Parse a path id, or build the 400 response for it.
pub fn parse_id<T>(raw: &str, entity: &str) -> Result<T, axum::response::Response>
where
    T: core::str::FromStr<Err = DomainError>,
{
    raw.parse().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {entity} id"),
        )
    })
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn order_item_to_json(item: &OrderItem) -> serde_json::Value {
    serde_json::json!({
        "id": item.id.as_i64(),
        "order_id": item.order_id.as_i64(),
        "product_id": item.product_id.as_i64(),
        "quantity": item.quantity,
        "unit_price": item.unit_price.cents(),
        "created_at": item.created_at.to_rfc3339(),
        "updated_at": item.updated_at.to_rfc3339(),
    })
}

pub fn order_to_json(order: &Order) -> serde_json::Value {
    serde_json::json!({
        "id": order.id.as_i64(),
        "user_id": order.user_id.as_i64(),
        "status": order.status.as_str(),
        "total_amount": order.total_amount.cents(),
        "address": order.shipping.address,
        "city": order.shipping.city,
        "state": order.shipping.state,
        "postal_code": order.shipping.postal_code,
        "country": order.shipping.country,
        "phone": order.shipping.phone,
        "items": order.items.iter().map(order_item_to_json).collect::<Vec<_>>(),
        "created_at": order.created_at.to_rfc3339(),
        "updated_at": order.updated_at.to_rfc3339(),
    })
}

pub fn product_to_json(product: &Product) -> serde_json::Value {
    serde_json::json!({
        "id": product.id.as_i64(),
        "name": product.name,
        "slug": product.slug,
        "description": product.description,
        "short_description": product.short_description,
        "price": product.price.cents(),
        "discounted_price": product.discounted_price.cents(),
        "discount_percentage": product.discount_percentage(),
        "stock_quantity": product.stock_quantity,
        "availability": product.availability,
        "category_id": product.category_id,
        "image_url": product.image_url,
        "unit": product.unit,
        "created_at": product.created_at.to_rfc3339(),
        "updated_at": product.updated_at.to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_order_body_maps_flat_shipping_fields() {
        let body: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "address": "1 Main St",
            "city": "Springfield",
            "state": "IL",
            "postal_code": "62701",
            "country": "US",
            "phone": "555-0100",
            "items": [{"product_id": 3, "quantity": 2, "unit_price": 250}],
        }))
        .unwrap();

        let cmd = PlaceOrder::from(body);
        assert_eq!(cmd.shipping.city, "Springfield");
        assert_eq!(cmd.items.len(), 1);
        assert_eq!(cmd.items[0].product_id.as_i64(), 3);
        assert_eq!(cmd.items[0].unit_price, Money::from_cents(250));
    }

    #[test]
    fn update_order_status_is_parsed_case_insensitively() {
        let req = UpdateOrderRequest {
            status: Some("Shipped".to_string()),
            ..Default::default()
        };
        assert_eq!(req.into_patch().unwrap().status, Some(OrderStatus::Shipped));

        let req = UpdateOrderRequest {
            status: Some("lost".to_string()),
            ..Default::default()
        };
        assert!(matches!(req.into_patch(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn product_defaults_apply_when_fields_are_omitted() {
        let body: CreateProductRequest = serde_json::from_value(serde_json::json!({
            "name": "Apples",
            "slug": "apples",
            "price": 199,
        }))
        .unwrap();
        let draft = NewProduct::from(body);
        assert_eq!(draft.unit.as_deref(), Some("piece"));
        assert!(draft.availability);
        assert_eq!(draft.stock_quantity, 0);
        assert_eq!(draft.discounted_price, Money::ZERO);
    }

    #[test]
    fn bad_path_ids_become_400() {
        let resp = parse_id::<freshly_orders::OrderId>("abc", "order").unwrap_err();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let resp = parse_id::<freshly_orders::OrderId>("0", "order").unwrap_err();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(parse_id::<freshly_orders::OrderId>("12", "order").is_ok());
    }
}
