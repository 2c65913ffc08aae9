//! Postgres adapter tests.
//!
//! Need a scratch database:
//!
//! ```text
//! DATABASE_URL=postgres://localhost/freshly_test cargo test -p freshly-infra -- --ignored
//! ```

use std::sync::Arc;

use freshly_auth::Principal;
use freshly_core::{Money, UserId};
use freshly_infra::{OrderWorkflow, Page, PgStore, ProductCatalog, Store, WorkflowError};
use freshly_orders::{LineItem, OrderStatus, PlaceOrder, ShippingInfo};
use freshly_products::{NewProduct, Product};

const ADMIN: Principal = Principal::admin(UserId::new(1));
const ALICE: Principal = Principal::customer(UserId::new(7001));

async fn connect() -> PgStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres tests");
    let store = PgStore::connect(&url, 8).await.expect("connect");
    store.migrate().await.expect("migrate");
    store
}

fn unique_slug(prefix: &str) -> String {
    format!(
        "{prefix}-{}",
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    )
}

async fn seed(catalog: &ProductCatalog, stock: i64) -> Product {
    let slug = unique_slug("pg-test");
    catalog
        .create_product(
            &ADMIN,
            NewProduct {
                name: slug.clone(),
                slug,
                description: Some("integration fixture".to_string()),
                short_description: None,
                price: Money::from_cents(200),
                discounted_price: Money::ZERO,
                stock_quantity: stock,
                availability: true,
                category_id: None,
                image_url: None,
                unit: Some("piece".to_string()),
            },
        )
        .await
        .unwrap()
}

fn order_for(product: &Product, quantity: i64) -> PlaceOrder {
    PlaceOrder {
        shipping: ShippingInfo {
            address: "1 Test Way".to_string(),
            city: "Testville".to_string(),
            state: "TS".to_string(),
            postal_code: "00001".to_string(),
            country: "US".to_string(),
            phone: "555-0000".to_string(),
        },
        items: vec![LineItem {
            product_id: product.id,
            quantity,
            unit_price: product.price,
        }],
    }
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn place_reject_cancel_and_purge_round_trip() {
    let store: Arc<dyn Store> = Arc::new(connect().await);
    let orders = OrderWorkflow::new(store.clone());
    let catalog = ProductCatalog::new(store);
    let p = seed(&catalog, 10).await;

    let first = orders.place_order(&ALICE, order_for(&p, 7)).await.unwrap();
    assert_eq!(first.total_amount, Money::from_cents(1400));
    assert_eq!(catalog.get_product(p.id).await.unwrap().stock_quantity, 3);

    let err = orders.place_order(&ALICE, order_for(&p, 5)).await.unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::InsufficientStock { requested: 5, available: 3, .. }
    ));
    assert_eq!(catalog.get_product(p.id).await.unwrap().stock_quantity, 3);

    let loaded = orders.get_order(&ALICE, first.id).await.unwrap();
    assert_eq!(loaded.items.len(), 1);
    assert_eq!(loaded.items_total(), Some(loaded.total_amount));

    let cancelled = orders.cancel_order(&ALICE, first.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(catalog.get_product(p.id).await.unwrap().stock_quantity, 10);

    assert!(matches!(
        catalog.delete_product(&ADMIN, p.id).await,
        Err(WorkflowError::Conflict(_))
    ));
    orders.purge_order(&ADMIN, first.id).await.unwrap();
    catalog.delete_product(&ADMIN, p.id).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires DATABASE_URL"]
async fn concurrent_orders_never_oversell() {
    let store: Arc<dyn Store> = Arc::new(connect().await);
    let orders = OrderWorkflow::new(store.clone());
    let catalog = ProductCatalog::new(store);
    let p = seed(&catalog, 5).await;

    let mut handles = Vec::new();
    for n in 0..12 {
        let orders = orders.clone();
        let cmd = order_for(&p, 1);
        let buyer = Principal::customer(UserId::new(8000 + n));
        handles.push(tokio::spawn(async move { orders.place_order(&buyer, cmd).await }));
    }

    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 5);
    assert_eq!(catalog.get_product(p.id).await.unwrap().stock_quantity, 0);

    let listed = orders.list_orders(&ADMIN, Page::new(None, Some(1000))).await.unwrap();
    assert!(listed.windows(2).all(|w| w[0].id < w[1].id));
}
