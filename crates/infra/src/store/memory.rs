use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use freshly_core::UserId;
use freshly_orders::{LineItem, NewOrder, Order, OrderId, OrderItem, OrderItemId};
use freshly_products::{NewProduct, Product, ProductId};

use super::{Page, StockUpdate, Store, StoreError, UnitOfWork};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    products: BTreeMap<ProductId, Product>,
    /// Order headers; `items` is always empty here.
    orders: BTreeMap<OrderId, Order>,
    items: BTreeMap<OrderItemId, OrderItem>,
    last_product_id: i64,
    last_order_id: i64,
    last_item_id: i64,
}

impl MemoryState {
    fn items_of(&self, order_id: OrderId) -> Vec<OrderItem> {
        self.items
            .values()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect()
    }

    fn with_items(&self, header: &Order) -> Order {
        let mut order = header.clone();
        order.items = self.items_of(header.id);
        order
    }

    fn ensure_unique_slug(&self, slug: &str, except: Option<ProductId>) -> Result<(), StoreError> {
        let taken = self
            .products
            .values()
            .any(|p| p.slug == slug && Some(p.id) != except);
        if taken {
            return Err(StoreError::Conflict(format!("slug '{slug}' already exists")));
        }
        Ok(())
    }
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

fn window<T>(iter: impl Iterator<Item = T>, page: Page) -> Vec<T> {
    let skip = usize::try_from(page.skip).unwrap_or(usize::MAX);
    let limit = usize::try_from(page.limit).unwrap_or(usize::MAX);
    iter.skip(skip).take(limit).collect()
}

/// In-memory store for tests and local development.
///
/// A unit of work holds the store-wide lock for its whole lifetime and stages
/// its changes on a private copy of the state, so units of work are fully
/// serialized and an uncommitted one leaves no trace.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, staged }))
    }
}

struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids
            .into_iter()
            .filter_map(|id| self.staged.products.get(&id).cloned())
            .collect())
    }

    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.staged.products.get(&id).cloned())
    }

    async fn list_products(
        &mut self,
        page: Page,
        available_only: bool,
    ) -> Result<Vec<Product>, StoreError> {
        let matching = self
            .staged
            .products
            .values()
            .filter(|p| !available_only || p.availability)
            .cloned();
        Ok(window(matching, page))
    }

    async fn insert_product(
        &mut self,
        draft: NewProduct,
        now: DateTime<Utc>,
    ) -> Result<Product, StoreError> {
        self.staged.ensure_unique_slug(&draft.slug, None)?;
        let id = ProductId::from(next_id(&mut self.staged.last_product_id));
        let product = draft.into_product(id, now);
        self.staged.products.insert(id, product.clone());
        Ok(product)
    }

    async fn save_product(&mut self, product: &Product) -> Result<(), StoreError> {
        self.staged.ensure_unique_slug(&product.slug, Some(product.id))?;
        match self.staged.products.get_mut(&product.id) {
            Some(slot) => {
                *slot = product.clone();
                Ok(())
            }
            None => Err(StoreError::Database(format!("product {} does not exist", product.id))),
        }
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<bool, StoreError> {
        if self.product_is_referenced(id).await? {
            return Err(StoreError::Conflict(format!(
                "product {id} is referenced by order items"
            )));
        }
        Ok(self.staged.products.remove(&id).is_some())
    }

    async fn product_is_referenced(&mut self, id: ProductId) -> Result<bool, StoreError> {
        Ok(self.staged.items.values().any(|item| item.product_id == id))
    }

    async fn adjust_stock(
        &mut self,
        id: ProductId,
        delta: i64,
        now: DateTime<Utc>,
    ) -> Result<StockUpdate, StoreError> {
        let Some(product) = self.staged.products.get_mut(&id) else {
            return Ok(StockUpdate::Missing);
        };
        match product.stock_quantity.checked_add(delta) {
            Some(remaining) if remaining >= 0 => {
                product.stock_quantity = remaining;
                product.updated_at = now;
                Ok(StockUpdate::Applied { remaining })
            }
            _ => Ok(StockUpdate::Insufficient {
                available: product.stock_quantity,
            }),
        }
    }

    async fn insert_order(&mut self, order: &NewOrder, now: DateTime<Utc>) -> Result<Order, StoreError> {
        let id = OrderId::from(next_id(&mut self.staged.last_order_id));
        let header = Order {
            id,
            user_id: order.user_id,
            status: order.status,
            total_amount: order.total_amount,
            shipping: order.shipping.clone(),
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.staged.orders.insert(id, header.clone());
        Ok(header)
    }

    async fn insert_order_items(
        &mut self,
        order_id: OrderId,
        lines: &[LineItem],
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderItem>, StoreError> {
        if !self.staged.orders.contains_key(&order_id) {
            return Err(StoreError::Conflict(format!("order {order_id} does not exist")));
        }

        let mut created = Vec::with_capacity(lines.len());
        for line in lines {
            if !self.staged.products.contains_key(&line.product_id) {
                return Err(StoreError::Conflict(format!(
                    "product {} does not exist",
                    line.product_id
                )));
            }
            let item = OrderItem {
                id: OrderItemId::from(next_id(&mut self.staged.last_item_id)),
                order_id,
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
                created_at: now,
                updated_at: now,
            };
            self.staged.items.insert(item.id, item.clone());
            created.push(item);
        }
        Ok(created)
    }

    async fn load_order_with_items(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self
            .staged
            .orders
            .get(&id)
            .map(|header| self.staged.with_items(header)))
    }

    async fn lock_order_with_items(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        // The unit of work already holds the store-wide lock.
        self.load_order_with_items(id).await
    }

    async fn save_order(&mut self, order: &Order) -> Result<(), StoreError> {
        match self.staged.orders.get_mut(&order.id) {
            Some(header) => {
                header.status = order.status;
                header.total_amount = order.total_amount;
                header.shipping = order.shipping.clone();
                header.updated_at = order.updated_at;
                Ok(())
            }
            None => Err(StoreError::Database(format!("order {} does not exist", order.id))),
        }
    }

    async fn list_orders(
        &mut self,
        owner: Option<UserId>,
        page: Page,
    ) -> Result<Vec<Order>, StoreError> {
        let state = &self.staged;
        let matching = state
            .orders
            .values()
            .filter(|o| owner.is_none_or(|user| o.user_id == user))
            .map(|header| state.with_items(header));
        Ok(window(matching, page))
    }

    async fn delete_order_items(&mut self, order_id: OrderId) -> Result<u64, StoreError> {
        let before = self.staged.items.len();
        self.staged.items.retain(|_, item| item.order_id != order_id);
        Ok((before - self.staged.items.len()) as u64)
    }

    async fn delete_order(&mut self, id: OrderId) -> Result<bool, StoreError> {
        if self.staged.items.values().any(|item| item.order_id == id) {
            return Err(StoreError::Conflict(format!("order {id} still has items")));
        }
        Ok(self.staged.orders.remove(&id).is_some())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryUnitOfWork { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freshly_core::Money;
    use freshly_orders::ShippingInfo;

    fn draft(slug: &str, stock: i64) -> NewProduct {
        NewProduct {
            name: slug.to_string(),
            slug: slug.to_string(),
            description: None,
            short_description: None,
            price: Money::from_cents(250),
            discounted_price: Money::ZERO,
            stock_quantity: stock,
            availability: true,
            category_id: None,
            image_url: None,
            unit: None,
        }
    }

    fn shipping() -> ShippingInfo {
        ShippingInfo {
            address: "4 Dock Road".to_string(),
            city: "Hull".to_string(),
            state: "YK".to_string(),
            postal_code: "HU1".to_string(),
            country: "UK".to_string(),
            phone: "01482".to_string(),
        }
    }

    #[tokio::test]
    async fn uncommitted_changes_are_discarded() {
        let store = InMemoryStore::new();
        {
            let mut uow = store.begin().await.unwrap();
            uow.insert_product(draft("kale", 3), Utc::now()).await.unwrap();
        }

        let mut uow = store.begin().await.unwrap();
        assert!(uow.list_products(Page::default(), false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn committed_changes_are_visible_to_the_next_unit_of_work() {
        let store = InMemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let kale = uow.insert_product(draft("kale", 3), Utc::now()).await.unwrap();
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        assert_eq!(uow.find_product(kale.id).await.unwrap(), Some(kale));
    }

    #[tokio::test]
    async fn adjust_stock_refuses_to_go_negative() {
        let store = InMemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let kale = uow.insert_product(draft("kale", 3), Utc::now()).await.unwrap();

        assert_eq!(
            uow.adjust_stock(kale.id, -2, Utc::now()).await.unwrap(),
            StockUpdate::Applied { remaining: 1 }
        );
        assert_eq!(
            uow.adjust_stock(kale.id, -2, Utc::now()).await.unwrap(),
            StockUpdate::Insufficient { available: 1 }
        );
        assert_eq!(
            uow.adjust_stock(ProductId::from(99), 1, Utc::now()).await.unwrap(),
            StockUpdate::Missing
        );
    }

    #[tokio::test]
    async fn duplicate_slugs_conflict() {
        let store = InMemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        uow.insert_product(draft("kale", 3), Utc::now()).await.unwrap();
        let err = uow.insert_product(draft("kale", 1), Utc::now()).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn orders_are_listed_by_owner_in_id_order() {
        let store = InMemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let kale = uow.insert_product(draft("kale", 30), Utc::now()).await.unwrap();
        let line = LineItem {
            product_id: kale.id,
            quantity: 1,
            unit_price: kale.price,
        };
        for owner in [1, 2, 1] {
            let header = NewOrder::pending(UserId::new(owner), kale.price, shipping());
            let order = uow.insert_order(&header, Utc::now()).await.unwrap();
            uow.insert_order_items(order.id, std::slice::from_ref(&line), Utc::now())
                .await
                .unwrap();
        }

        let mine = uow.list_orders(Some(UserId::new(1)), Page::default()).await.unwrap();
        let ids: Vec<i64> = mine.iter().map(|o| o.id.as_i64()).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(mine.iter().all(|o| o.items.len() == 1));

        let everything = uow.list_orders(None, Page::new(Some(1), Some(1))).await.unwrap();
        assert_eq!(everything.len(), 1);
        assert_eq!(everything[0].id, OrderId::from(2));
    }

    #[tokio::test]
    async fn deleting_items_then_order_removes_both() {
        let store = InMemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let kale = uow.insert_product(draft("kale", 30), Utc::now()).await.unwrap();
        let order = uow
            .insert_order(&NewOrder::pending(UserId::new(1), kale.price, shipping()), Utc::now())
            .await
            .unwrap();
        let line = LineItem {
            product_id: kale.id,
            quantity: 2,
            unit_price: kale.price,
        };
        uow.insert_order_items(order.id, &[line.clone(), line], Utc::now())
            .await
            .unwrap();

        assert!(uow.product_is_referenced(kale.id).await.unwrap());
        assert!(matches!(
            uow.delete_order(order.id).await,
            Err(StoreError::Conflict(_))
        ));
        assert!(uow.load_order_with_items(order.id).await.unwrap().is_some());

        assert_eq!(uow.delete_order_items(order.id).await.unwrap(), 2);
        assert!(uow.delete_order(order.id).await.unwrap());
        assert_eq!(uow.load_order_with_items(order.id).await.unwrap(), None);
        assert!(!uow.product_is_referenced(kale.id).await.unwrap());
    }
}
