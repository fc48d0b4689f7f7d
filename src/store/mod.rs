//! Persistence seams.
//!
//! Services only talk to these traits. [`memory::MemoryStore`] backs tests
//! and database-less runs; [`postgres::PgStore`] is the production store.
//! Operations that touch more than one table (placing an order, recording a
//! payment) are single trait calls so each store can make them atomic.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::{CategoryCount, Page, ProductQuery};
use crate::domain::aggregates::{Cart, Order, OwnerKey, PaymentResult, Product, User};
use crate::domain::value_objects::Money;

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn product_by_id(&self, id: Uuid) -> StoreResult<Option<Product>>;
    async fn product_by_slug(&self, slug: &str) -> StoreResult<Option<Product>>;
    async fn search_products(&self, query: &ProductQuery, page_size: u32) -> StoreResult<Page<Product>>;
    async fn latest_products(&self, limit: usize) -> StoreResult<Vec<Product>>;
    async fn featured_products(&self, limit: usize) -> StoreResult<Vec<Product>>;
    async fn categories(&self) -> StoreResult<Vec<CategoryCount>>;
    /// Fails with [`StoreError::Conflict`] when the slug is taken.
    async fn insert_product(&self, product: &Product) -> StoreResult<()>;
    async fn update_product(&self, product: &Product) -> StoreResult<bool>;
    async fn delete_product(&self, id: Uuid) -> StoreResult<bool>;
    async fn count_products(&self) -> StoreResult<u64>;
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn cart_for(&self, owner: &OwnerKey) -> StoreResult<Option<Cart>>;
    /// Inserts or replaces the cart. An owner holds at most one cart, so a
    /// different cart already stored for the same owner is replaced.
    async fn save_cart(&self, cart: &Cart) -> StoreResult<()>;
    async fn delete_cart(&self, id: Uuid) -> StoreResult<bool>;
}

/// Month bucket for the sales chart, labelled `MM/YY`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MonthlySales {
    pub month: String,
    pub total_sales: Money,
}

/// Order with the buyer's display name, for admin tables.
#[derive(Clone, Debug, Serialize)]
pub struct OrderWithBuyer {
    #[serde(flatten)]
    pub order: Order,
    pub buyer_name: String,
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn order_by_id(&self, id: Uuid) -> StoreResult<Option<Order>>;
    /// Inserts the order and deletes the cart it was placed from, atomically.
    /// Returns `false` and stores nothing when that cart is already gone.
    async fn place_order(&self, order: &Order, cart_id: Uuid) -> StoreResult<bool>;
    async fn save_payment_result(&self, order_id: Uuid, result: &PaymentResult) -> StoreResult<bool>;
    /// Persists a freshly paid order and deducts stock for its items.
    /// Returns `false` without side effects when the stored order was already paid.
    async fn record_payment(&self, order: &Order) -> StoreResult<bool>;
    /// Persists a freshly delivered order. Returns `false` when the stored order is unpaid or already delivered.
    async fn record_delivery(&self, order: &Order) -> StoreResult<bool>;
    async fn orders_for_user(&self, user_id: Uuid, page: u32, page_size: u32) -> StoreResult<Page<Order>>;
    /// All orders, newest first, optionally filtered by buyer name.
    async fn list_orders(&self, buyer_name: Option<&str>, page: u32, page_size: u32) -> StoreResult<Page<OrderWithBuyer>>;
    async fn latest_orders(&self, limit: usize) -> StoreResult<Vec<OrderWithBuyer>>;
    async fn delete_order(&self, id: Uuid) -> StoreResult<bool>;
    async fn count_orders(&self) -> StoreResult<u64>;
    async fn total_sales(&self) -> StoreResult<Money>;
    async fn monthly_sales(&self) -> StoreResult<Vec<MonthlySales>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    /// Fails with [`StoreError::Conflict`] when the email is taken.
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn update_user(&self, user: &User) -> StoreResult<bool>;
    async fn delete_user(&self, id: Uuid) -> StoreResult<bool>;
    async fn list_users(&self, name: Option<&str>, page: u32, page_size: u32) -> StoreResult<Page<User>>;
    async fn count_users(&self) -> StoreResult<u64>;
}

/// Handles to every repository, cheap to clone.
#[derive(Clone)]
pub struct Repositories {
    pub products: Arc<dyn ProductRepository>,
    pub carts: Arc<dyn CartRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub users: Arc<dyn UserRepository>,
}

impl Repositories {
    /// Uses one backing store for all four repositories.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: ProductRepository + CartRepository + OrderRepository + UserRepository + 'static,
    {
        Self { products: store.clone(), carts: store.clone(), orders: store.clone(), users: store }
    }
}
