//! Admin back office: dashboard and product/order/user management.

use serde::Serialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::user_by_id;
use crate::auth::{require_admin, Session};
use crate::catalog::{filter_value, ListingParams, Page, ProductQuery};
use crate::domain::aggregates::{NewProduct, Product, User, UserUpdate};
use crate::domain::value_objects::Money;
use crate::state::AppState;
use crate::store::{MonthlySales, OrderWithBuyer};
use crate::{EcommerceError, Result};

/// How many orders the dashboard lists.
pub const LATEST_ORDERS_LIMIT: usize = 6;

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub total_sales: Money,
    pub orders_count: u64,
    pub users_count: u64,
    pub products_count: u64,
    pub sales_by_month: Vec<MonthlySales>,
    pub latest_orders: Vec<OrderWithBuyer>,
}

pub async fn summary(state: &AppState, admin: &Session) -> Result<DashboardSummary> {
    require_admin(admin)?;
    let repos = state.repos();
    Ok(DashboardSummary {
        total_sales: repos.orders.total_sales().await?,
        orders_count: repos.orders.count_orders().await?,
        users_count: repos.users.count_users().await?,
        products_count: repos.products.count_products().await?,
        sales_by_month: repos.orders.monthly_sales().await?,
        latest_orders: repos.orders.latest_orders(LATEST_ORDERS_LIMIT).await?,
    })
}

// =============================================================================
// Products
// =============================================================================

pub async fn list_products(state: &AppState, admin: &Session, params: ListingParams) -> Result<Page<Product>> {
    require_admin(admin)?;
    let query = ProductQuery::parse(params)?;
    Ok(state.repos().products.search_products(&query, state.page_size()).await?)
}

pub async fn create_product(state: &AppState, admin: &Session, form: NewProduct) -> Result<Product> {
    require_admin(admin)?;
    form.validate()?;
    let mut product = Product::create(form)?;
    let events = product.take_events();
    state.repos().products.insert_product(&product).await?;
    state.events().publish(events).await;

    info!(product_id = %product.id, slug = %product.slug, "product created");
    Ok(product)
}

pub async fn update_product(state: &AppState, admin: &Session, id: Uuid, form: NewProduct) -> Result<Product> {
    require_admin(admin)?;
    form.validate()?;
    let mut product = state.repos().products.product_by_id(id).await?.ok_or(EcommerceError::NotFound("Product"))?;
    product.update(form)?;
    if !state.repos().products.update_product(&product).await? {
        return Err(EcommerceError::NotFound("Product"));
    }
    info!(product_id = %id, "product updated");
    Ok(product)
}

pub async fn delete_product(state: &AppState, admin: &Session, id: Uuid) -> Result<()> {
    require_admin(admin)?;
    if !state.repos().products.delete_product(id).await? {
        return Err(EcommerceError::NotFound("Product"));
    }
    info!(product_id = %id, "product deleted");
    Ok(())
}

// =============================================================================
// Orders
// =============================================================================

pub async fn list_orders(state: &AppState, admin: &Session, buyer: Option<String>, page: u32) -> Result<Page<OrderWithBuyer>> {
    require_admin(admin)?;
    let buyer = filter_value(buyer);
    Ok(state.repos().orders.list_orders(buyer.as_deref(), page.max(1), state.page_size()).await?)
}

pub async fn delete_order(state: &AppState, admin: &Session, id: Uuid) -> Result<()> {
    require_admin(admin)?;
    if !state.repos().orders.delete_order(id).await? {
        return Err(EcommerceError::NotFound("Order"));
    }
    info!(order_id = %id, "order deleted");
    Ok(())
}

// =============================================================================
// Users
// =============================================================================

pub async fn list_users(state: &AppState, admin: &Session, name: Option<String>, page: u32) -> Result<Page<User>> {
    require_admin(admin)?;
    let name = filter_value(name);
    Ok(state.repos().users.list_users(name.as_deref(), page.max(1), state.page_size()).await?)
}

pub async fn update_user(state: &AppState, admin: &Session, id: Uuid, form: UserUpdate) -> Result<User> {
    require_admin(admin)?;
    form.validate()?;
    let mut user = user_by_id(state, id).await?;
    user.name = form.name;
    user.role = form.role;
    state.repos().users.update_user(&user).await?;
    info!(user_id = %id, role = %user.role, "user updated");
    Ok(user)
}

pub async fn delete_user(state: &AppState, admin: &Session, id: Uuid) -> Result<()> {
    require_admin(admin)?;
    if !state.repos().users.delete_user(id).await? {
        return Err(EcommerceError::NotFound("User"));
    }
    info!(user_id = %id, "user deleted");
    Ok(())
}
