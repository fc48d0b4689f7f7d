//! HTTP surface.

use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

pub mod admin;
pub mod extract;
pub mod response;
pub mod storefront;

pub use response::{ActionResponse, ApiResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront"})) }))
        .merge(storefront_routes())
        .nest("/api/admin", admin_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn storefront_routes() -> Router<AppState> {
    use self::storefront::*;
    Router::new()
        .route("/api/products", get(list_products))
        .route("/api/products/latest", get(latest_products))
        .route("/api/products/featured", get(featured_products))
        .route("/api/products/:slug", get(product_by_slug))
        .route("/api/categories", get(categories))
        .route("/api/cart", get(get_cart).delete(clear_cart))
        .route("/api/cart/items", post(add_to_cart))
        .route("/api/cart/items/:product_id", delete(remove_from_cart))
        .route("/api/auth/sign-up", post(sign_up))
        .route("/api/auth/sign-in", post(sign_in))
        .route("/api/auth/sign-out", post(sign_out))
        .route("/api/profile", put(update_profile))
        .route("/api/checkout", get(checkout_progress))
        .route("/api/checkout/shipping-address", put(save_shipping_address))
        .route("/api/checkout/payment-method", put(save_payment_method))
        .route("/api/orders", get(my_orders).post(place_order))
        .route("/api/orders/:id", get(get_order))
        .route("/api/orders/:id/payment", post(create_payment))
        .route("/api/orders/:id/payment/confirm", post(confirm_payment))
        .route("/api/webhooks/stripe", post(stripe_webhook))
}

fn admin_routes() -> Router<AppState> {
    use self::admin::*;
    Router::new()
        .route("/summary", get(summary))
        .route("/products", get(list_products).post(create_product))
        .route("/products/:id", get(get_product).put(update_product).delete(delete_product))
        .route("/orders", get(list_orders))
        .route("/orders/:id", delete(delete_order))
        .route("/orders/:id/paid", post(mark_paid))
        .route("/orders/:id/delivered", post(mark_delivered))
        .route("/users", get(list_users))
        .route("/users/:id", put(update_user).delete(delete_user))
}
