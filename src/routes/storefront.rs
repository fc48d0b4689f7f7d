//! Shopper-facing handlers.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::response::{ActionResponse, ApiResult};
use crate::auth::{Session, Visitor};
use crate::catalog::{CategoryCount, ListingParams, Page};
use crate::domain::aggregates::{Cart, Order, PaymentMethod, Product, Registration, ShippingAddress, User};
use crate::domain::checkout::{CheckoutProgress, CheckoutStep};
use crate::payment::PaymentHandle;
use crate::services::{self, account::ProfileUpdate};
use crate::state::AppState;
use crate::EcommerceError;

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub qty: u32,
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentMethodRequest {
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub handle: String,
}

#[derive(Debug, Deserialize)]
pub struct StepParams {
    pub step: Option<CheckoutStep>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutView {
    pub progress: CheckoutProgress,
    pub step: CheckoutStep,
    pub path: &'static str,
}

// =============================================================================
// Catalog
// =============================================================================

pub async fn list_products(State(s): State<AppState>, ApiQuery(p): ApiQuery<ListingParams>) -> ApiResult<Page<Product>> {
    Ok(ActionResponse::ok("Products", services::catalog::query_products(&s, p).await?))
}

pub async fn latest_products(State(s): State<AppState>) -> ApiResult<Vec<Product>> {
    Ok(ActionResponse::ok("Latest products", services::catalog::latest_products(&s).await?))
}

pub async fn featured_products(State(s): State<AppState>) -> ApiResult<Vec<Product>> {
    Ok(ActionResponse::ok("Featured products", services::catalog::featured_products(&s).await?))
}

pub async fn product_by_slug(State(s): State<AppState>, ApiPath(slug): ApiPath<String>) -> ApiResult<Product> {
    Ok(ActionResponse::ok("Product", services::catalog::product_by_slug(&s, &slug).await?))
}

pub async fn categories(State(s): State<AppState>) -> ApiResult<Vec<CategoryCount>> {
    Ok(ActionResponse::ok("Categories", services::catalog::categories(&s).await?))
}

// =============================================================================
// Cart
// =============================================================================

pub async fn get_cart(State(s): State<AppState>, visitor: Visitor) -> ApiResult<Cart> {
    Ok(ActionResponse::ok("Cart", services::cart::get_cart(&s, &visitor).await?))
}

pub async fn add_to_cart(State(s): State<AppState>, visitor: Visitor, ApiJson(r): ApiJson<AddToCartRequest>) -> ApiResult<Cart> {
    let cart = services::cart::add_item(&s, &visitor, r.product_id, r.qty).await?;
    let name = cart.item(r.product_id).map(|i| i.name.clone()).unwrap_or_default();
    Ok(ActionResponse::ok(format!("{name} added to cart"), cart))
}

pub async fn remove_from_cart(State(s): State<AppState>, visitor: Visitor, ApiPath(product_id): ApiPath<Uuid>) -> ApiResult<Cart> {
    Ok(ActionResponse::ok("Item removed from cart", services::cart::remove_item(&s, &visitor, product_id).await?))
}

pub async fn clear_cart(State(s): State<AppState>, visitor: Visitor) -> ApiResult<()> {
    services::cart::clear_cart(&s, &visitor).await?;
    Ok(ActionResponse::done("Cart cleared"))
}

// =============================================================================
// Account
// =============================================================================

pub async fn sign_up(State(s): State<AppState>, ApiJson(form): ApiJson<Registration>) -> ApiResult<User> {
    Ok(ActionResponse::ok("User registered successfully", services::account::register(&s, form).await?))
}

/// Credentials check for the auth proxy. A guest cart on the request moves to the user.
pub async fn sign_in(State(s): State<AppState>, visitor: Visitor, ApiJson(c): ApiJson<Credentials>) -> ApiResult<Session> {
    let session = services::account::verify_credentials(&s, &c.email, &c.password).await?;
    if let Some(token) = &visitor.session_token {
        services::cart::claim_session_cart(&s, token, session.user_id).await?;
    }
    Ok(ActionResponse::ok("Signed in", session))
}

pub async fn sign_out(State(s): State<AppState>, visitor: Visitor) -> ApiResult<()> {
    services::cart::sign_out(&s, &visitor).await?;
    Ok(ActionResponse::done("Signed out"))
}

pub async fn update_profile(State(s): State<AppState>, session: Session, ApiJson(form): ApiJson<ProfileUpdate>) -> ApiResult<User> {
    Ok(ActionResponse::ok("User updated successfully", services::account::update_profile(&s, &session, form).await?))
}

// =============================================================================
// Checkout
// =============================================================================

/// Where the buyer stands; `step` is the page they asked for, defaulting to place order.
pub async fn checkout_progress(State(s): State<AppState>, session: Session, ApiQuery(p): ApiQuery<StepParams>) -> ApiResult<CheckoutView> {
    let progress = services::checkout::progress(&s, &session).await?;
    let step = progress.resolve(p.step.unwrap_or(CheckoutStep::PlaceOrder));
    Ok(ActionResponse::ok("Checkout", CheckoutView { progress, step, path: step.path() }))
}

pub async fn save_shipping_address(State(s): State<AppState>, session: Session, ApiJson(a): ApiJson<ShippingAddress>) -> ApiResult<User> {
    Ok(ActionResponse::ok("Address saved", services::checkout::save_shipping_address(&s, &session, a).await?))
}

pub async fn save_payment_method(State(s): State<AppState>, session: Session, ApiJson(r): ApiJson<PaymentMethodRequest>) -> ApiResult<User> {
    Ok(ActionResponse::ok("Payment method saved", services::checkout::save_payment_method(&s, &session, r.payment_method).await?))
}

pub async fn place_order(State(s): State<AppState>, session: Session) -> ApiResult<Order> {
    Ok(ActionResponse::ok("Order created", services::checkout::place_order(&s, &session).await?))
}

// =============================================================================
// Orders
// =============================================================================

pub async fn my_orders(State(s): State<AppState>, session: Session, ApiQuery(p): ApiQuery<PageParams>) -> ApiResult<Page<Order>> {
    Ok(ActionResponse::ok("Orders", services::orders::my_orders(&s, &session, p.page.unwrap_or(1)).await?))
}

pub async fn get_order(State(s): State<AppState>, session: Session, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Order> {
    Ok(ActionResponse::ok("Order", services::orders::order_for(&s, &session, id).await?))
}

pub async fn create_payment(State(s): State<AppState>, session: Session, ApiPath(id): ApiPath<Uuid>) -> ApiResult<PaymentHandle> {
    Ok(ActionResponse::ok("Payment created", services::orders::create_payment(&s, &session, id).await?))
}

pub async fn confirm_payment(
    State(s): State<AppState>,
    session: Session,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(r): ApiJson<ConfirmPaymentRequest>,
) -> ApiResult<Order> {
    Ok(ActionResponse::ok("Your order has been paid", services::orders::confirm_payment(&s, &session, id, &r.handle).await?))
}

pub async fn stripe_webhook(State(s): State<AppState>, headers: HeaderMap, body: Bytes) -> ApiResult<()> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| EcommerceError::Validation("Missing Stripe-Signature header".into()))?;
    match services::orders::handle_stripe_webhook(&s, &body, signature).await? {
        Some(order) => Ok(ActionResponse::done(format!("Order {} paid", order.id()))),
        None => Ok(ActionResponse::done("Event ignored")),
    }
}
