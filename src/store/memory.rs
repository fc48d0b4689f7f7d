//! In-memory store. Every multi-record operation runs under one write lock.

use async_trait::async_trait;
use chrono::Datelike;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    CartRepository, MonthlySales, OrderRepository, OrderWithBuyer, ProductRepository, StoreError, StoreResult,
    UserRepository,
};
use crate::catalog::{CategoryCount, Page, ProductQuery};
use crate::domain::aggregates::{Cart, Order, OwnerKey, PaymentResult, Product, User};
use crate::domain::value_objects::Money;

#[derive(Default)]
struct Tables {
    products: HashMap<Uuid, Product>,
    carts: HashMap<OwnerKey, Cart>,
    orders: HashMap<Uuid, Order>,
    users: HashMap<Uuid, User>,
}

impl Tables {
    fn buyer_name(&self, order: &Order) -> String {
        self.users.get(&order.user_id()).map(|u| u.name.clone()).unwrap_or_default()
    }

    fn remove_cart(&mut self, id: Uuid) -> bool {
        let before = self.carts.len();
        self.carts.retain(|_, c| c.id() != id);
        self.carts.len() < before
    }

    fn orders_newest_first(&self) -> Vec<&Order> {
        let mut orders: Vec<&Order> = self.orders.values().collect();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        orders
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn product_by_id(&self, id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn product_by_slug(&self, slug: &str) -> StoreResult<Option<Product>> {
        let tables = self.tables.read().await;
        Ok(tables.products.values().find(|p| p.slug.as_str() == slug).cloned())
    }

    async fn search_products(&self, query: &ProductQuery, page_size: u32) -> StoreResult<Page<Product>> {
        let tables = self.tables.read().await;
        Ok(query.apply(tables.products.values().cloned(), page_size))
    }

    async fn latest_products(&self, limit: usize) -> StoreResult<Vec<Product>> {
        let tables = self.tables.read().await;
        let mut products: Vec<Product> = tables.products.values().cloned().collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        products.truncate(limit);
        Ok(products)
    }

    async fn featured_products(&self, limit: usize) -> StoreResult<Vec<Product>> {
        let tables = self.tables.read().await;
        let mut products: Vec<Product> = tables.products.values().filter(|p| p.is_featured).cloned().collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        products.truncate(limit);
        Ok(products)
    }

    async fn categories(&self) -> StoreResult<Vec<CategoryCount>> {
        let tables = self.tables.read().await;
        let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
        for product in tables.products.values() {
            *counts.entry(product.category.as_str()).or_default() += 1;
        }
        Ok(counts.into_iter().map(|(category, count)| CategoryCount { category: category.to_string(), count }).collect())
    }

    async fn insert_product(&self, product: &Product) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.products.values().any(|p| p.slug == product.slug) {
            return Err(StoreError::Conflict(format!("slug {} already exists", product.slug)));
        }
        tables.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.products.values().any(|p| p.slug == product.slug && p.id != product.id) {
            return Err(StoreError::Conflict(format!("slug {} already exists", product.slug)));
        }
        match tables.products.get_mut(&product.id) {
            Some(existing) => {
                *existing = product.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_product(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.products.remove(&id).is_some())
    }

    async fn count_products(&self) -> StoreResult<u64> {
        Ok(self.tables.read().await.products.len() as u64)
    }
}

#[async_trait]
impl CartRepository for MemoryStore {
    async fn cart_for(&self, owner: &OwnerKey) -> StoreResult<Option<Cart>> {
        Ok(self.tables.read().await.carts.get(owner).cloned())
    }

    async fn save_cart(&self, cart: &Cart) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.carts.retain(|owner, c| c.id() != cart.id() || owner == cart.owner());
        tables.carts.insert(cart.owner().clone(), cart.clone());
        Ok(())
    }

    async fn delete_cart(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.remove_cart(id))
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn order_by_id(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn place_order(&self, order: &Order, cart_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if !tables.remove_cart(cart_id) {
            return Ok(false);
        }
        tables.orders.insert(order.id(), order.clone());
        Ok(true)
    }

    async fn save_payment_result(&self, order_id: Uuid, result: &PaymentResult) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let Some(order) = tables.orders.get_mut(&order_id) else {
            return Ok(false);
        };
        Ok(order.begin_payment(result.clone()).is_ok())
    }

    async fn record_payment(&self, order: &Order) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.orders.get(&order.id()) {
            Some(stored) if !stored.is_paid() => {}
            _ => return Ok(false),
        }
        for item in order.items() {
            if let Some(product) = tables.products.get_mut(&item.product_id) {
                product.stock = product.stock.saturating_sub(item.qty);
            }
        }
        tables.orders.insert(order.id(), order.clone());
        Ok(true)
    }

    async fn record_delivery(&self, order: &Order) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.orders.get(&order.id()) {
            Some(stored) if stored.is_paid() && !stored.is_delivered() => {}
            _ => return Ok(false),
        }
        tables.orders.insert(order.id(), order.clone());
        Ok(true)
    }

    async fn orders_for_user(&self, user_id: Uuid, page: u32, page_size: u32) -> StoreResult<Page<Order>> {
        let tables = self.tables.read().await;
        let orders: Vec<Order> = tables.orders_newest_first().into_iter().filter(|o| o.user_id() == user_id).cloned().collect();
        Ok(Page::slice(orders, page, page_size))
    }

    async fn list_orders(&self, buyer_name: Option<&str>, page: u32, page_size: u32) -> StoreResult<Page<OrderWithBuyer>> {
        let tables = self.tables.read().await;
        let orders: Vec<OrderWithBuyer> = tables
            .orders_newest_first()
            .into_iter()
            .map(|o| OrderWithBuyer { order: o.clone(), buyer_name: tables.buyer_name(o) })
            .filter(|o| buyer_name.map_or(true, |name| contains_ignore_case(&o.buyer_name, name)))
            .collect();
        Ok(Page::slice(orders, page, page_size))
    }

    async fn latest_orders(&self, limit: usize) -> StoreResult<Vec<OrderWithBuyer>> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders_newest_first()
            .into_iter()
            .take(limit)
            .map(|o| OrderWithBuyer { order: o.clone(), buyer_name: tables.buyer_name(o) })
            .collect())
    }

    async fn delete_order(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.orders.remove(&id).is_some())
    }

    async fn count_orders(&self) -> StoreResult<u64> {
        Ok(self.tables.read().await.orders.len() as u64)
    }

    async fn total_sales(&self) -> StoreResult<Money> {
        let tables = self.tables.read().await;
        Ok(tables.orders.values().map(|o| o.totals().total_price).sum())
    }

    async fn monthly_sales(&self) -> StoreResult<Vec<MonthlySales>> {
        let tables = self.tables.read().await;
        let mut buckets: BTreeMap<(i32, u32), Money> = BTreeMap::new();
        for order in tables.orders.values() {
            let created = order.created_at();
            let key = (created.year(), created.month());
            let total = buckets.entry(key).or_default();
            *total = total.add(order.totals().total_price);
        }
        Ok(buckets
            .into_iter()
            .map(|((year, month), total_sales)| MonthlySales { month: format!("{month:02}/{:02}", year % 100), total_sales })
            .collect())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.trim().to_lowercase();
        Ok(self.tables.read().await.users.values().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("email already exists".to_string()));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.users.remove(&id).is_some())
    }

    async fn list_users(&self, name: Option<&str>, page: u32, page_size: u32) -> StoreResult<Page<User>> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables
            .users
            .values()
            .filter(|u| name.map_or(true, |n| contains_ignore_case(&u.name, n)))
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Page::slice(users, page, page_size))
    }

    async fn count_users(&self) -> StoreResult<u64> {
        Ok(self.tables.read().await.users.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{CartItem, PaymentMethod, ShippingAddress};

    fn cart_of(owner: OwnerKey, qty: u32) -> Cart {
        let mut cart = Cart::new(owner);
        cart.add_item(CartItem {
            product_id: Uuid::from_u128(1), slug: "widget".into(), name: "Widget".into(),
            image: "/w.jpg".into(), price: Money::from_cents(1000), qty,
        }, 100).unwrap();
        cart
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Jane Doe".into(), street_address: "1 Main St".into(), city: "Springfield".into(),
            postal_code: "12345".into(), country: "USA".into(),
        }
    }

    #[tokio::test]
    async fn one_cart_per_owner() {
        let store = MemoryStore::new();
        let owner = OwnerKey::User(Uuid::from_u128(7));
        let first = cart_of(owner.clone(), 1);
        let second = cart_of(owner.clone(), 2);
        store.save_cart(&first).await.unwrap();
        store.save_cart(&second).await.unwrap();

        let stored = store.cart_for(&owner).await.unwrap().unwrap();
        assert_eq!(stored.id(), second.id());

        let order = Order::place(Uuid::from_u128(7), &stored, address(), PaymentMethod::CashOnDelivery).unwrap();
        assert!(store.place_order(&order, stored.id()).await.unwrap());
        assert!(store.cart_for(&owner).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stale_cart_places_nothing() {
        let store = MemoryStore::new();
        let owner = OwnerKey::User(Uuid::from_u128(7));
        let cart = cart_of(owner, 1);
        store.save_cart(&cart).await.unwrap();

        let order = Order::place(Uuid::from_u128(7), &cart, address(), PaymentMethod::CashOnDelivery).unwrap();
        let twin = Order::place(Uuid::from_u128(7), &cart, address(), PaymentMethod::CashOnDelivery).unwrap();
        assert!(store.place_order(&order, cart.id()).await.unwrap());
        assert!(!store.place_order(&twin, cart.id()).await.unwrap());
        assert!(store.order_by_id(twin.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reassigned_cart_leaves_old_owner() {
        let store = MemoryStore::new();
        let guest = OwnerKey::Session("tok-1".into());
        let user = OwnerKey::User(Uuid::from_u128(7));
        let mut cart = cart_of(guest.clone(), 1);
        store.save_cart(&cart).await.unwrap();

        cart.reassign(user.clone());
        store.save_cart(&cart).await.unwrap();
        assert!(store.cart_for(&guest).await.unwrap().is_none());
        assert_eq!(store.cart_for(&user).await.unwrap().unwrap().id(), cart.id());
    }
}
