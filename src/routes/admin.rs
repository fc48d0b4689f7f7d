//! Admin handlers. Every service call re-checks the admin role.

use axum::extract::State;
use serde::Deserialize;
use uuid::Uuid;

use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::response::{ActionResponse, ApiResult};
use crate::auth::{require_admin, Session};
use crate::catalog::{ListingParams, Page};
use crate::domain::aggregates::{NewProduct, Order, Product, User, UserUpdate};
use crate::services::{self, admin::DashboardSummary};
use crate::state::AppState;
use crate::store::OrderWithBuyer;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub page: Option<u32>,
}

pub async fn summary(State(s): State<AppState>, session: Session) -> ApiResult<DashboardSummary> {
    Ok(ActionResponse::ok("Summary", services::admin::summary(&s, &session).await?))
}

pub async fn list_products(State(s): State<AppState>, session: Session, ApiQuery(p): ApiQuery<ListingParams>) -> ApiResult<Page<Product>> {
    Ok(ActionResponse::ok("Products", services::admin::list_products(&s, &session, p).await?))
}

pub async fn get_product(State(s): State<AppState>, session: Session, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Product> {
    require_admin(&session)?;
    Ok(ActionResponse::ok("Product", services::catalog::product_by_id(&s, id).await?))
}

pub async fn create_product(State(s): State<AppState>, session: Session, ApiJson(form): ApiJson<NewProduct>) -> ApiResult<Product> {
    Ok(ActionResponse::ok("Product created successfully", services::admin::create_product(&s, &session, form).await?))
}

pub async fn update_product(
    State(s): State<AppState>,
    session: Session,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(form): ApiJson<NewProduct>,
) -> ApiResult<Product> {
    Ok(ActionResponse::ok("Product updated successfully", services::admin::update_product(&s, &session, id, form).await?))
}

pub async fn delete_product(State(s): State<AppState>, session: Session, ApiPath(id): ApiPath<Uuid>) -> ApiResult<()> {
    services::admin::delete_product(&s, &session, id).await?;
    Ok(ActionResponse::done("Product deleted successfully"))
}

pub async fn list_orders(State(s): State<AppState>, session: Session, ApiQuery(p): ApiQuery<SearchParams>) -> ApiResult<Page<OrderWithBuyer>> {
    let page = services::admin::list_orders(&s, &session, p.query, p.page.unwrap_or(1)).await?;
    Ok(ActionResponse::ok("Orders", page))
}

pub async fn delete_order(State(s): State<AppState>, session: Session, ApiPath(id): ApiPath<Uuid>) -> ApiResult<()> {
    services::admin::delete_order(&s, &session, id).await?;
    Ok(ActionResponse::done("Order deleted successfully"))
}

pub async fn mark_paid(State(s): State<AppState>, session: Session, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Order> {
    Ok(ActionResponse::ok("Order marked as paid", services::orders::mark_paid_cod(&s, &session, id).await?))
}

pub async fn mark_delivered(State(s): State<AppState>, session: Session, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Order> {
    Ok(ActionResponse::ok("Order has been marked delivered", services::orders::mark_delivered(&s, &session, id).await?))
}

pub async fn list_users(State(s): State<AppState>, session: Session, ApiQuery(p): ApiQuery<SearchParams>) -> ApiResult<Page<User>> {
    let page = services::admin::list_users(&s, &session, p.query, p.page.unwrap_or(1)).await?;
    Ok(ActionResponse::ok("Users", page))
}

pub async fn update_user(
    State(s): State<AppState>,
    session: Session,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(form): ApiJson<UserUpdate>,
) -> ApiResult<User> {
    Ok(ActionResponse::ok("User updated successfully", services::admin::update_user(&s, &session, id, form).await?))
}

pub async fn delete_user(State(s): State<AppState>, session: Session, ApiPath(id): ApiPath<Uuid>) -> ApiResult<()> {
    services::admin::delete_user(&s, &session, id).await?;
    Ok(ActionResponse::done("User deleted successfully"))
}
