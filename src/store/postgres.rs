//! Postgres store built on sqlx.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use std::collections::HashMap;
use uuid::Uuid;

use super::{
    CartRepository, MonthlySales, OrderRepository, OrderWithBuyer, ProductRepository, StoreError, StoreResult,
    UserRepository,
};
use crate::catalog::{self, CategoryCount, Page, ProductQuery, SortOrder};
use crate::domain::aggregates::{
    Cart, CartItem, Order, OrderItem, OrderRecord, OwnerKey, PaymentMethod, PaymentResult, Product, Role,
    ShippingAddress, User,
};
use crate::domain::pricing::PriceSummary;
use crate::domain::value_objects::{Money, Quantity, Slug};

const PRODUCT_COLUMNS: &str =
    "id, name, slug, category, brand, description, images, stock, price, rating, num_reviews, is_featured, banner, created_at";
const ORDER_COLUMNS: &str = "o.id, o.user_id, o.shipping_address, o.payment_method, o.payment_result, o.items_price, \
     o.shipping_price, o.tax_price, o.total_price, o.is_paid, o.paid_at, o.is_delivered, o.delivered_at, o.created_at";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(database_url).await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn hydrate_orders(&self, rows: Vec<OrderRow>) -> StoreResult<Vec<(Order, String)>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let item_rows = sqlx::query_as::<_, OrderItemRow>(
            "SELECT order_id, product_id, slug, name, image, price, qty FROM order_items WHERE order_id = ANY($1) ORDER BY position",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            items.entry(row.order_id).or_default().push(row.try_into()?);
        }

        rows.into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                let buyer = row.buyer_name.clone();
                Ok((row.into_order(lines)?, buyer))
            })
            .collect()
    }
}

fn like_pattern(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

fn to_i32(value: u32, what: &str) -> StoreResult<i32> {
    i32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{what} out of range: {value}")))
}

fn to_u32(value: i32, what: &str) -> StoreResult<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative {what}: {value}")))
}

fn count(value: i64) -> u64 { u64::try_from(value).unwrap_or_default() }

fn conflict_or(e: sqlx::Error, message: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return StoreError::Conflict(message.to_string());
        }
    }
    StoreError::Database(e)
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    slug: String,
    category: String,
    brand: String,
    description: String,
    images: Vec<String>,
    stock: i32,
    price: Decimal,
    rating: Decimal,
    num_reviews: i32,
    is_featured: bool,
    banner: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(r: ProductRow) -> Result<Self, Self::Error> {
        let slug = Slug::new(&r.slug).map_err(|e| StoreError::Corrupt(format!("product {} slug: {e}", r.id)))?;
        Ok(Product {
            id: r.id, name: r.name, slug, category: r.category, brand: r.brand, description: r.description,
            images: r.images, stock: Quantity::new(to_u32(r.stock, "stock")?), price: Money::new(r.price),
            rating: r.rating, num_reviews: to_u32(r.num_reviews, "num_reviews")?, is_featured: r.is_featured,
            banner: r.banner, created_at: r.created_at, events: vec![],
        })
    }
}

fn push_product_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &ProductQuery) {
    qb.push(" WHERE TRUE");
    if let Some(text) = &query.text {
        qb.push(" AND name ILIKE ").push_bind(like_pattern(text));
    }
    if let Some(category) = &query.category {
        qb.push(" AND category = ").push_bind(category.clone());
    }
    if let Some(range) = query.price_range {
        qb.push(" AND price BETWEEN ").push_bind(range.min).push(" AND ").push_bind(range.max);
    }
    if let Some(min) = query.min_rating {
        qb.push(" AND rating >= ").push_bind(min);
    }
}

fn order_by(sort: SortOrder) -> &'static str {
    match sort {
        SortOrder::Newest => " ORDER BY created_at DESC, id",
        SortOrder::Lowest => " ORDER BY price ASC, id",
        SortOrder::Highest => " ORDER BY price DESC, id",
        SortOrder::Rating => " ORDER BY rating DESC, id",
    }
}

#[async_trait]
impl ProductRepository for PgStore {
    async fn product_by_id(&self, id: Uuid) -> StoreResult<Option<Product>> {
        sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Product::try_from)
            .transpose()
    }

    async fn product_by_slug(&self, slug: &str) -> StoreResult<Option<Product>> {
        sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE slug = $1"))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .map(Product::try_from)
            .transpose()
    }

    async fn search_products(&self, query: &ProductQuery, page_size: u32) -> StoreResult<Page<Product>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
        push_product_filters(&mut qb, query);
        qb.push(order_by(query.sort));
        qb.push(" LIMIT ").push_bind(i64::from(page_size));
        qb.push(" OFFSET ").push_bind(i64::try_from(catalog::offset(query.page, page_size)).unwrap_or(i64::MAX));
        let rows = qb.build_query_as::<ProductRow>().fetch_all(&self.pool).await?;

        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_product_filters(&mut count_qb, query);
        let total: i64 = count_qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        Ok(Page {
            data: rows.into_iter().map(Product::try_from).collect::<StoreResult<_>>()?,
            total_pages: catalog::total_pages(count(total), page_size),
        })
    }

    async fn latest_products(&self, limit: usize) -> StoreResult<Vec<Product>> {
        sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC LIMIT $1"))
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Product::try_from)
            .collect()
    }

    async fn featured_products(&self, limit: usize) -> StoreResult<Vec<Product>> {
        sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_featured ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Product::try_from)
        .collect()
    }

    async fn categories(&self) -> StoreResult<Vec<CategoryCount>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT category, COUNT(*) FROM products GROUP BY category ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(category, n)| CategoryCount { category, count: count(n) }).collect())
    }

    async fn insert_product(&self, p: &Product) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO products ({PRODUCT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        ))
        .bind(p.id)
        .bind(&p.name)
        .bind(p.slug.as_str())
        .bind(&p.category)
        .bind(&p.brand)
        .bind(&p.description)
        .bind(&p.images)
        .bind(to_i32(p.stock.value(), "stock")?)
        .bind(p.price.amount())
        .bind(p.rating)
        .bind(to_i32(p.num_reviews, "num_reviews")?)
        .bind(p.is_featured)
        .bind(&p.banner)
        .bind(p.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or(e, "slug already exists"))?;
        Ok(())
    }

    async fn update_product(&self, p: &Product) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE products SET name = $2, slug = $3, category = $4, brand = $5, description = $6, images = $7, \
             stock = $8, price = $9, is_featured = $10, banner = $11 WHERE id = $1",
        )
        .bind(p.id)
        .bind(&p.name)
        .bind(p.slug.as_str())
        .bind(&p.category)
        .bind(&p.brand)
        .bind(&p.description)
        .bind(&p.images)
        .bind(to_i32(p.stock.value(), "stock")?)
        .bind(p.price.amount())
        .bind(p.is_featured)
        .bind(&p.banner)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or(e, "slug already exists"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_product(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_products(&self) -> StoreResult<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products").fetch_one(&self.pool).await?;
        Ok(count(n))
    }
}

#[derive(sqlx::FromRow)]
struct CartRow {
    id: Uuid,
    user_id: Option<Uuid>,
    session_token: Option<String>,
    items: Json<Vec<CartItem>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CartRow> for Cart {
    type Error = StoreError;

    fn try_from(r: CartRow) -> Result<Self, Self::Error> {
        let owner = match (r.user_id, r.session_token) {
            (Some(user_id), _) => OwnerKey::User(user_id),
            (None, Some(token)) => OwnerKey::Session(token),
            (None, None) => return Err(StoreError::Corrupt(format!("cart {} has no owner", r.id))),
        };
        Ok(Cart::restore(r.id, owner, r.items.0, r.created_at, r.updated_at))
    }
}

const SAVE_CART: &str =
    "INSERT INTO carts (id, user_id, session_token, items, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6)";

/// Upsert on the owner's partial unique index, so the last save wins.
fn cart_conflict_target(owner: &OwnerKey) -> &'static str {
    match owner {
        OwnerKey::User(_) => {
            "ON CONFLICT (user_id) WHERE user_id IS NOT NULL DO UPDATE SET id = EXCLUDED.id, \
             items = EXCLUDED.items, created_at = EXCLUDED.created_at, updated_at = EXCLUDED.updated_at"
        }
        OwnerKey::Session(_) => {
            "ON CONFLICT (session_token) WHERE session_token IS NOT NULL DO UPDATE SET id = EXCLUDED.id, \
             items = EXCLUDED.items, created_at = EXCLUDED.created_at, updated_at = EXCLUDED.updated_at"
        }
    }
}

#[async_trait]
impl CartRepository for PgStore {
    async fn cart_for(&self, owner: &OwnerKey) -> StoreResult<Option<Cart>> {
        let select = "SELECT id, user_id, session_token, items, created_at, updated_at FROM carts";
        let row = match owner {
            OwnerKey::User(id) => {
                sqlx::query_as::<_, CartRow>(&format!("{select} WHERE user_id = $1"))
                    .bind(*id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            OwnerKey::Session(token) => {
                sqlx::query_as::<_, CartRow>(&format!("{select} WHERE session_token = $1"))
                    .bind(token)
                    .fetch_optional(&self.pool)
                    .await?
            }
        };
        row.map(Cart::try_from).transpose()
    }

    async fn save_cart(&self, cart: &Cart) -> StoreResult<()> {
        let (user_id, session_token) = match cart.owner() {
            OwnerKey::User(id) => (Some(*id), None),
            OwnerKey::Session(token) => (None, Some(token.clone())),
        };
        let mut tx = self.pool.begin().await?;

        // A reassigned cart keeps its id, so drop the row stored under the previous owner.
        sqlx::query("DELETE FROM carts WHERE id = $1 AND (user_id IS DISTINCT FROM $2 OR session_token IS DISTINCT FROM $3)")
            .bind(cart.id())
            .bind(user_id)
            .bind(&session_token)
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("{} {}", SAVE_CART, cart_conflict_target(cart.owner())))
            .bind(cart.id())
            .bind(user_id)
            .bind(&session_token)
            .bind(Json(cart.items()))
            .bind(cart.created_at())
            .bind(cart.updated_at())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_cart(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM carts WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    shipping_address: Json<ShippingAddress>,
    payment_method: String,
    payment_result: Option<Json<PaymentResult>>,
    items_price: Decimal,
    shipping_price: Decimal,
    tax_price: Decimal,
    total_price: Decimal,
    is_paid: bool,
    paid_at: Option<DateTime<Utc>>,
    is_delivered: bool,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    #[sqlx(default)]
    buyer_name: String,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> StoreResult<Order> {
        let payment_method: PaymentMethod = self
            .payment_method
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("order {}: {e}", self.id)))?;
        Ok(Order::from(OrderRecord {
            id: self.id,
            user_id: self.user_id,
            items,
            shipping_address: self.shipping_address.0,
            payment_method,
            payment_result: self.payment_result.map(|j| j.0),
            totals: PriceSummary {
                items_price: Money::new(self.items_price),
                shipping_price: Money::new(self.shipping_price),
                tax_price: Money::new(self.tax_price),
                total_price: Money::new(self.total_price),
            },
            is_paid: self.is_paid,
            paid_at: self.paid_at,
            is_delivered: self.is_delivered,
            delivered_at: self.delivered_at,
            created_at: self.created_at,
        }))
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    order_id: Uuid,
    product_id: Uuid,
    slug: String,
    name: String,
    image: String,
    price: Decimal,
    qty: i32,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = StoreError;

    fn try_from(r: OrderItemRow) -> Result<Self, Self::Error> {
        Ok(OrderItem { product_id: r.product_id, slug: r.slug, name: r.name, image: r.image, price: Money::new(r.price), qty: to_u32(r.qty, "qty")? })
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn order_by_id(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(self.hydrate_orders(vec![row]).await?.pop().map(|(order, _)| order)),
            None => Ok(None),
        }
    }

    async fn place_order(&self, order: &Order, cart_id: Uuid) -> StoreResult<bool> {
        let totals = order.totals();
        let mut tx = self.pool.begin().await?;

        let consumed = sqlx::query("DELETE FROM carts WHERE id = $1").bind(cart_id).execute(&mut *tx).await?;
        if consumed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO orders (id, user_id, shipping_address, payment_method, items_price, shipping_price, tax_price, \
             total_price, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(order.id())
        .bind(order.user_id())
        .bind(Json(order.shipping_address()))
        .bind(order.payment_method().as_str())
        .bind(totals.items_price.amount())
        .bind(totals.shipping_price.amount())
        .bind(totals.tax_price.amount())
        .bind(totals.total_price.amount())
        .bind(order.created_at())
        .execute(&mut *tx)
        .await?;

        for (position, item) in order.items().iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, slug, name, image, price, qty, position) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(order.id())
            .bind(item.product_id)
            .bind(&item.slug)
            .bind(&item.name)
            .bind(&item.image)
            .bind(item.price.amount())
            .bind(to_i32(item.qty, "qty")?)
            .bind(i32::try_from(position).unwrap_or(i32::MAX))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn save_payment_result(&self, order_id: Uuid, result: &PaymentResult) -> StoreResult<bool> {
        let done = sqlx::query("UPDATE orders SET payment_result = $2 WHERE id = $1 AND NOT is_paid")
            .bind(order_id)
            .bind(Json(result))
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn record_payment(&self, order: &Order) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        let flipped = sqlx::query("UPDATE orders SET is_paid = TRUE, paid_at = $2, payment_result = $3 WHERE id = $1 AND NOT is_paid")
            .bind(order.id())
            .bind(order.paid_at())
            .bind(order.payment_result().map(Json))
            .execute(&mut *tx)
            .await?;
        if flipped.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        for item in order.items() {
            sqlx::query("UPDATE products SET stock = GREATEST(stock - $2, 0) WHERE id = $1")
                .bind(item.product_id)
                .bind(to_i32(item.qty, "qty")?)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(true)
    }

    async fn record_delivery(&self, order: &Order) -> StoreResult<bool> {
        let done = sqlx::query("UPDATE orders SET is_delivered = TRUE, delivered_at = $2 WHERE id = $1 AND is_paid AND NOT is_delivered")
            .bind(order.id())
            .bind(order.delivered_at())
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn orders_for_user(&self, user_id: Uuid, page: u32, page_size: u32) -> StoreResult<Page<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.user_id = $1 ORDER BY o.created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(i64::from(page_size))
        .bind(i64::try_from(catalog::offset(page, page_size)).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let orders = self.hydrate_orders(rows).await?;
        Ok(Page { data: orders.into_iter().map(|(o, _)| o).collect(), total_pages: catalog::total_pages(count(total), page_size) })
    }

    async fn list_orders(&self, buyer_name: Option<&str>, page: u32, page_size: u32) -> StoreResult<Page<OrderWithBuyer>> {
        let pattern = like_pattern(buyer_name.unwrap_or_default());
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS}, u.name AS buyer_name FROM orders o JOIN users u ON u.id = o.user_id \
             WHERE u.name ILIKE $1 ORDER BY o.created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(&pattern)
        .bind(i64::from(page_size))
        .bind(i64::try_from(catalog::offset(page, page_size)).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders o JOIN users u ON u.id = o.user_id WHERE u.name ILIKE $1")
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await?;

        let orders = self.hydrate_orders(rows).await?;
        Ok(Page {
            data: orders.into_iter().map(|(order, buyer_name)| OrderWithBuyer { order, buyer_name }).collect(),
            total_pages: catalog::total_pages(count(total), page_size),
        })
    }

    async fn latest_orders(&self, limit: usize) -> StoreResult<Vec<OrderWithBuyer>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS}, u.name AS buyer_name FROM orders o JOIN users u ON u.id = o.user_id \
             ORDER BY o.created_at DESC LIMIT $1"
        ))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        let orders = self.hydrate_orders(rows).await?;
        Ok(orders.into_iter().map(|(order, buyer_name)| OrderWithBuyer { order, buyer_name }).collect())
    }

    async fn delete_order(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_orders(&self) -> StoreResult<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders").fetch_one(&self.pool).await?;
        Ok(count(n))
    }

    async fn total_sales(&self) -> StoreResult<Money> {
        let total: Decimal = sqlx::query_scalar("SELECT COALESCE(SUM(total_price), 0) FROM orders").fetch_one(&self.pool).await?;
        Ok(Money::new(total))
    }

    async fn monthly_sales(&self) -> StoreResult<Vec<MonthlySales>> {
        let rows = sqlx::query_as::<_, (String, Decimal)>(
            "SELECT to_char(date_trunc('month', created_at), 'MM/YY'), SUM(total_price) FROM orders \
             GROUP BY date_trunc('month', created_at) ORDER BY date_trunc('month', created_at)",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(month, total)| MonthlySales { month, total_sales: Money::new(total) }).collect())
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: Option<String>,
    role: String,
    address: Option<Json<ShippingAddress>>,
    payment_method: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let role: Role = r.role.parse().map_err(|e| StoreError::Corrupt(format!("user {}: {e}", r.id)))?;
        let payment_method = r
            .payment_method
            .map(|m| m.parse::<PaymentMethod>())
            .transpose()
            .map_err(|e| StoreError::Corrupt(format!("user {}: {e}", r.id)))?;
        Ok(User {
            id: r.id, name: r.name, email: r.email, password_hash: r.password_hash, role,
            address: r.address.map(|j| j.0), payment_method, created_at: r.created_at,
        })
    }
}

const USER_COLUMNS: &str = "id, name, email, password_hash, role, address, payment_method, created_at";

#[async_trait]
impl UserRepository for PgStore {
    async fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn insert_user(&self, u: &User) -> StoreResult<()> {
        sqlx::query(&format!("INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"))
            .bind(u.id)
            .bind(&u.name)
            .bind(&u.email)
            .bind(&u.password_hash)
            .bind(u.role.as_str())
            .bind(u.address.as_ref().map(Json))
            .bind(u.payment_method.map(|m| m.as_str()))
            .bind(u.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_or(e, "email already exists"))?;
        Ok(())
    }

    async fn update_user(&self, u: &User) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE users SET name = $2, role = $3, address = $4, payment_method = $5 WHERE id = $1")
            .bind(u.id)
            .bind(&u.name)
            .bind(u.role.as_str())
            .bind(u.address.as_ref().map(Json))
            .bind(u.payment_method.map(|m| m.as_str()))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_users(&self, name: Option<&str>, page: u32, page_size: u32) -> StoreResult<Page<User>> {
        let pattern = like_pattern(name.unwrap_or_default());
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE name ILIKE $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(&pattern)
        .bind(i64::from(page_size))
        .bind(i64::try_from(catalog::offset(page, page_size)).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE name ILIKE $1")
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await?;

        Ok(Page {
            data: rows.into_iter().map(User::try_from).collect::<StoreResult<_>>()?,
            total_pages: catalog::total_pages(count(total), page_size),
        })
    }

    async fn count_users(&self) -> StoreResult<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(&self.pool).await?;
        Ok(count(n))
    }
}
