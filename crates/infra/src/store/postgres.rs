//! Postgres-backed store.
//!
//! One [`PgUnitOfWork`] wraps one sqlx transaction. Dropping it without
//! calling `commit` returns the connection to the pool and rolls back.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Duplicate product slug |
//! | Database (foreign key violation) | `23503` | `Conflict` | Deleting a product or order still referenced by order items |
//! | Database (check constraint violation) | `23514` | `Database` | Negative stock or price reached the database |
//! | Database (other) | Any other | `Database` | Other database errors |
//! | PoolClosed | N/A | `Database` | Connection pool was closed |
//! | Other | N/A | `Database` | Network errors, connection failures, etc. |
//!
//! ## Locking
//!
//! `lock_products` issues `SELECT … FOR UPDATE` ordered by id so that two
//! orders touching overlapping products always lock them in the same order.
//! Stock changes are additionally guarded by `WHERE stock_quantity + $2 >= 0`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use freshly_core::{Money, UserId};
use freshly_orders::{LineItem, NewOrder, Order, OrderId, OrderItem, OrderItemId, OrderStatus, ShippingInfo};
use freshly_products::{NewProduct, Product, ProductId};

use super::{Page, StockUpdate, Store, StoreError, UnitOfWork};

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

const PRODUCT_COLUMNS: &str = "id, name, slug, description, short_description, price, \
    discounted_price, stock_quantity, availability, category_id, image_url, unit, \
    created_at, updated_at";

const ORDER_COLUMNS: &str = "id, user_id, status, total_amount, address, city, state, \
    postal_code, country, phone, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, quantity, unit_price, created_at, updated_at";

/// Postgres store over a shared connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    #[instrument(skip(database_url), err)]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema. Every statement is idempotent.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        tracing::info!("database schema applied");
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl PgUnitOfWork {
    async fn items_for(&mut self, order_ids: &[i64]) -> Result<Vec<OrderItem>, StoreError> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ANY($1) ORDER BY id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(order_ids)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_order_items", e))?;
        rows.iter().map(item_from_row).collect()
    }

    async fn order_with_items(
        &mut self,
        id: OrderId,
        for_update: bool,
    ) -> Result<Option<Order>, StoreError> {
        let lock = if for_update { " FOR UPDATE" } else { "" };
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1{lock}");
        let row = sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_order", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut order = order_from_row(&row)?;
        order.items = self.items_for(&[id.as_i64()]).await?;
        Ok(Some(order))
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    #[instrument(skip(self), fields(count = ids.len()), err)]
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let ids: Vec<i64> = ids.iter().map(ProductId::as_i64).collect();
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) ORDER BY id ASC FOR UPDATE"
        );
        let rows = sqlx::query(&sql)
            .bind(&ids)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_products", e))?;
        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_product", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_products(
        &mut self,
        page: Page,
        available_only: bool,
    ) -> Result<Vec<Product>, StoreError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE ($1 = FALSE OR availability = TRUE) \
             ORDER BY id ASC LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query(&sql)
            .bind(available_only)
            .bind(to_i64(page.limit))
            .bind(to_i64(page.skip))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_products", e))?;
        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self, draft), fields(slug = %draft.slug), err)]
    async fn insert_product(
        &mut self,
        draft: NewProduct,
        now: DateTime<Utc>,
    ) -> Result<Product, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO products (
                name, slug, description, short_description, price, discounted_price,
                stock_quantity, availability, category_id, image_url, unit, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
            RETURNING id
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.slug)
        .bind(&draft.description)
        .bind(&draft.short_description)
        .bind(money_to_db(draft.price)?)
        .bind(money_to_db(draft.discounted_price)?)
        .bind(draft.stock_quantity)
        .bind(draft.availability)
        .bind(draft.category_id)
        .bind(&draft.image_url)
        .bind(&draft.unit)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;

        let id: i64 = row.try_get("id").map_err(corrupt)?;
        Ok(draft.into_product(ProductId::from(id), now))
    }

    #[instrument(skip(self, product), fields(product_id = %product.id), err)]
    async fn save_product(&mut self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE products SET
                name = $2, slug = $3, description = $4, short_description = $5,
                price = $6, discounted_price = $7, stock_quantity = $8, availability = $9,
                category_id = $10, image_url = $11, unit = $12, updated_at = $13
            WHERE id = $1
            "#,
        )
        .bind(product.id.as_i64())
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.description)
        .bind(&product.short_description)
        .bind(money_to_db(product.price)?)
        .bind(money_to_db(product.discounted_price)?)
        .bind(product.stock_quantity)
        .bind(product.availability)
        .bind(product.category_id)
        .bind(&product.image_url)
        .bind(&product.unit)
        .bind(product.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_product", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn delete_product(&mut self, id: ProductId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_i64())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn product_is_referenced(&mut self, id: ProductId) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM order_items WHERE product_id = $1) AS referenced")
            .bind(id.as_i64())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("product_is_referenced", e))?;
        row.try_get("referenced").map_err(corrupt)
    }

    #[instrument(skip(self, now), fields(product_id = %id), err)]
    async fn adjust_stock(
        &mut self,
        id: ProductId,
        delta: i64,
        now: DateTime<Utc>,
    ) -> Result<StockUpdate, StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + $2, updated_at = $3
            WHERE id = $1 AND stock_quantity + $2 >= 0
            RETURNING stock_quantity
            "#,
        )
        .bind(id.as_i64())
        .bind(delta)
        .bind(now)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("adjust_stock", e))?;

        if let Some(row) = updated {
            let remaining: i64 = row.try_get("stock_quantity").map_err(corrupt)?;
            return Ok(StockUpdate::Applied { remaining });
        }

        // Zero rows touched: tell a missing product apart from a shortfall.
        let current = sqlx::query("SELECT stock_quantity FROM products WHERE id = $1")
            .bind(id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("adjust_stock", e))?;
        match current {
            None => Ok(StockUpdate::Missing),
            Some(row) => Ok(StockUpdate::Insufficient {
                available: row.try_get("stock_quantity").map_err(corrupt)?,
            }),
        }
    }

    #[instrument(skip(self, order, now), fields(user_id = %order.user_id), err)]
    async fn insert_order(&mut self, order: &NewOrder, now: DateTime<Utc>) -> Result<Order, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO orders (
                user_id, status, total_amount, address, city, state, postal_code, country, phone,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(order.user_id.as_i64())
            .bind(order.status.as_str())
            .bind(money_to_db(order.total_amount)?)
            .bind(&order.shipping.address)
            .bind(&order.shipping.city)
            .bind(&order.shipping.state)
            .bind(&order.shipping.postal_code)
            .bind(&order.shipping.country)
            .bind(&order.shipping.phone)
            .bind(now)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order", e))?;
        order_from_row(&row)
    }

    #[instrument(skip(self, lines, now), fields(order_id = %order_id, count = lines.len()), err)]
    async fn insert_order_items(
        &mut self,
        order_id: OrderId,
        lines: &[LineItem],
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderItem>, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO order_items (order_id, product_id, quantity, unit_price, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING {ITEM_COLUMNS}
            "#
        );
        let mut created = Vec::with_capacity(lines.len());
        for line in lines {
            let row = sqlx::query(&sql)
                .bind(order_id.as_i64())
                .bind(line.product_id.as_i64())
                .bind(line.quantity)
                .bind(money_to_db(line.unit_price)?)
                .bind(now)
                .fetch_one(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx_error("insert_order_item", e))?;
            created.push(item_from_row(&row)?);
        }
        Ok(created)
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn load_order_with_items(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        self.order_with_items(id, false).await
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn lock_order_with_items(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        self.order_with_items(id, true).await
    }

    #[instrument(skip(self, order), fields(order_id = %order.id, status = %order.status), err)]
    async fn save_order(&mut self, order: &Order) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE orders SET
                status = $2, total_amount = $3, address = $4, city = $5, state = $6,
                postal_code = $7, country = $8, phone = $9, updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(order.id.as_i64())
        .bind(order.status.as_str())
        .bind(money_to_db(order.total_amount)?)
        .bind(&order.shipping.address)
        .bind(&order.shipping.city)
        .bind(&order.shipping.state)
        .bind(&order.shipping.postal_code)
        .bind(&order.shipping.country)
        .bind(&order.shipping.phone)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_order", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_orders(
        &mut self,
        owner: Option<UserId>,
        page: Page,
    ) -> Result<Vec<Order>, StoreError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE ($1::BIGINT IS NULL OR user_id = $1) \
             ORDER BY id ASC LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query(&sql)
            .bind(owner.map(|u| u.as_i64()))
            .bind(to_i64(page.limit))
            .bind(to_i64(page.skip))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_orders", e))?;

        let mut orders = rows.iter().map(order_from_row).collect::<Result<Vec<_>, _>>()?;
        if orders.is_empty() {
            return Ok(orders);
        }

        let ids: Vec<i64> = orders.iter().map(|o| o.id.as_i64()).collect();
        for item in self.items_for(&ids).await? {
            if let Some(order) = orders.iter_mut().find(|o| o.id == item.order_id) {
                order.items.push(item);
            }
        }
        Ok(orders)
    }

    #[instrument(skip(self), fields(order_id = %order_id), err)]
    async fn delete_order_items(&mut self, order_id: OrderId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(order_id.as_i64())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_order_items", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn delete_order(&mut self, id: OrderId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_i64())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_order", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23503") => StoreError::Conflict(msg),
                _ => StoreError::Database(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Database(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Database(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn corrupt(err: sqlx::Error) -> StoreError {
    StoreError::Corrupt(err.to_string())
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn money_to_db(money: Money) -> Result<i64, StoreError> {
    i64::try_from(money.cents())
        .map_err(|_| StoreError::Database(format!("amount {money} does not fit a BIGINT column")))
}

fn money_from_db(row: &PgRow, column: &str) -> Result<Money, StoreError> {
    let cents: i64 = row.try_get(column).map_err(corrupt)?;
    u64::try_from(cents)
        .map(Money::from_cents)
        .map_err(|_| StoreError::Corrupt(format!("{column} is negative: {cents}")))
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let id: i64 = row.try_get("id").map_err(corrupt)?;
    Ok(Product {
        id: ProductId::from(id),
        name: row.try_get("name").map_err(corrupt)?,
        slug: row.try_get("slug").map_err(corrupt)?,
        description: row.try_get("description").map_err(corrupt)?,
        short_description: row.try_get("short_description").map_err(corrupt)?,
        price: money_from_db(row, "price")?,
        discounted_price: money_from_db(row, "discounted_price")?,
        stock_quantity: row.try_get("stock_quantity").map_err(corrupt)?,
        availability: row.try_get("availability").map_err(corrupt)?,
        category_id: row.try_get("category_id").map_err(corrupt)?,
        image_url: row.try_get("image_url").map_err(corrupt)?,
        unit: row.try_get("unit").map_err(corrupt)?,
        created_at: row.try_get("created_at").map_err(corrupt)?,
        updated_at: row.try_get("updated_at").map_err(corrupt)?,
    })
}

fn order_from_row(row: &PgRow) -> Result<Order, StoreError> {
    let id: i64 = row.try_get("id").map_err(corrupt)?;
    let user_id: i64 = row.try_get("user_id").map_err(corrupt)?;
    let status: String = row.try_get("status").map_err(corrupt)?;
    let status: OrderStatus = status
        .parse()
        .map_err(|_| StoreError::Corrupt(format!("order {id} has unknown status '{status}'")))?;

    Ok(Order {
        id: OrderId::from(id),
        user_id: UserId::new(user_id),
        status,
        total_amount: money_from_db(row, "total_amount")?,
        shipping: ShippingInfo {
            address: row.try_get("address").map_err(corrupt)?,
            city: row.try_get("city").map_err(corrupt)?,
            state: row.try_get("state").map_err(corrupt)?,
            postal_code: row.try_get("postal_code").map_err(corrupt)?,
            country: row.try_get("country").map_err(corrupt)?,
            phone: row.try_get("phone").map_err(corrupt)?,
        },
        items: Vec::new(),
        created_at: row.try_get("created_at").map_err(corrupt)?,
        updated_at: row.try_get("updated_at").map_err(corrupt)?,
    })
}

fn item_from_row(row: &PgRow) -> Result<OrderItem, StoreError> {
    let id: i64 = row.try_get("id").map_err(corrupt)?;
    let order_id: i64 = row.try_get("order_id").map_err(corrupt)?;
    let product_id: i64 = row.try_get("product_id").map_err(corrupt)?;
    Ok(OrderItem {
        id: OrderItemId::from(id),
        order_id: OrderId::from(order_id),
        product_id: ProductId::from(product_id),
        quantity: row.try_get("quantity").map_err(corrupt)?,
        unit_price: money_from_db(row, "unit_price")?,
        created_at: row.try_get("created_at").map_err(corrupt)?,
        updated_at: row.try_get("updated_at").map_err(corrupt)?,
    })
}
