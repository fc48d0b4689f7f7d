use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use storefront::domain::aggregates::{NewProduct, Product, Role, User};
use storefront::state::AppState;
use storefront::store::{memory::MemoryStore, Repositories};

struct TestApp {
    router: Router,
    state: AppState,
}

impl TestApp {
    fn new() -> Self {
        let state = AppState::builder(Repositories::from_store(Arc::new(MemoryStore::new()))).page_size(2).build();
        Self { router: storefront::routes::router(state.clone()), state }
    }

    async fn send(&self, method: Method, uri: &str, headers: &[(&str, String)], body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            req = req.header(*name, value);
        }
        let req = match body {
            Some(body) => req.header("content-type", "application/json").body(Body::from(body.to_string())).unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn seed_product(&self, slug: &str, price_cents: i64, stock: u32) -> Product {
        let product = Product::create(NewProduct {
            name: slug.replace('-', " "), slug: slug.into(), category: "Shirts".into(), brand: "Polo".into(),
            description: "A fine shirt".into(), images: vec![format!("/images/{slug}.jpg")],
            price: Decimal::new(price_cents, 2), stock, is_featured: false, banner: None,
        })
        .unwrap();
        self.state.repos().products.insert_product(&product).await.unwrap();
        product
    }

    async fn seed_admin(&self) -> Vec<(&'static str, String)> {
        let mut admin = User::new("Admin", "admin@example.com", None);
        admin.role = Role::Admin;
        self.state.repos().users.insert_user(&admin).await.unwrap();
        signed_in(admin.id, "admin")
    }
}

fn signed_in(user_id: Uuid, role: &str) -> Vec<(&'static str, String)> {
    vec![("x-user-id", user_id.to_string()), ("x-user-role", role.to_string())]
}

#[tokio::test]
async fn health() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/health", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn guest_to_delivered_order() {
    let app = TestApp::new();
    let product = app.seed_product("polo-shirt", 2500, 10).await;
    let guest = vec![("x-session-token", "guest-1".to_string())];

    let (status, body) = app.send(Method::POST, "/api/cart/items", &guest, Some(json!({"product_id": product.id, "qty": 2}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_price"], "64.00");

    let (status, _) = app
        .send(Method::POST, "/api/auth/sign-up", &[], Some(json!({
            "name": "Jane Doe", "email": "jane@example.com", "password": "secret1", "confirm_password": "secret1",
        })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(Method::POST, "/api/auth/sign-in", &guest, Some(json!({"email": "jane@example.com", "password": "secret1"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    let user_id: Uuid = body["data"]["user_id"].as_str().unwrap().parse().unwrap();
    let jane = signed_in(user_id, "customer");

    let (_, body) = app.send(Method::GET, "/api/checkout", &jane, None).await;
    assert_eq!(body["data"]["step"], "shipping_address");
    assert_eq!(body["data"]["path"], "/shipping-address");

    let address = json!({
        "full_name": "Jane Doe", "street_address": "1 Main St", "city": "Springfield", "postal_code": "12345", "country": "USA",
    });
    let (status, _) = app.send(Method::PUT, "/api/checkout/shipping-address", &jane, Some(address)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .send(Method::PUT, "/api/checkout/payment-method", &jane, Some(json!({"payment_method": "CashOnDelivery"})))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.send(Method::POST, "/api/orders", &jane, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_price"], "64.00");
    assert_eq!(body["data"]["is_paid"], false);
    let order_id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = app.send(Method::GET, "/api/cart", &jane, None).await;
    assert_eq!(body["data"]["items"], json!([]));

    let admin = app.seed_admin().await;
    let (status, body) = app.send(Method::POST, &format!("/api/admin/orders/{order_id}/delivered"), &admin, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (status, body) = app.send(Method::POST, &format!("/api/admin/orders/{order_id}/paid"), &admin, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_paid"], true);

    let (status, body) = app.send(Method::POST, &format!("/api/admin/orders/{order_id}/delivered"), &admin, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_delivered"], true);

    let (_, body) = app.send(Method::GET, "/api/products/polo-shirt", &[], None).await;
    assert_eq!(body["data"]["stock"], 8);

    let (_, body) = app.send(Method::GET, "/api/admin/summary", &admin, None).await;
    assert_eq!(body["data"]["total_sales"], "64.00");
    assert_eq!(body["data"]["latest_orders"][0]["buyer_name"], "Jane Doe");
}

#[tokio::test]
async fn empty_cart_redirects_to_cart() {
    let app = TestApp::new();
    let (status, body) = app
        .send(Method::POST, "/api/auth/sign-up", &[], Some(json!({
            "name": "Jane Doe", "email": "jane@example.com", "password": "secret1", "confirm_password": "secret1",
        })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let jane = signed_in(body["data"]["id"].as_str().unwrap().parse().unwrap(), "customer");

    let (status, body) = app.send(Method::POST, "/api/orders", &jane, None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, json!({"success": false, "message": "Your cart is empty", "redirect": "/cart"}));
}

#[tokio::test]
async fn identity_errors() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/api/orders", &[], None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let customer = signed_in(Uuid::new_v4(), "customer");
    let (status, body) = app.send(Method::GET, "/api/admin/summary", &customer, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Forbidden");

    let (status, _) = app.send(Method::GET, &format!("/api/orders/{}", Uuid::new_v4()), &customer, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn catalog_listing_and_filters() {
    let app = TestApp::new();
    app.seed_product("red-shirt", 1500, 5).await;
    app.seed_product("blue-shirt", 2500, 5).await;
    app.seed_product("green-shirt", 9900, 5).await;

    let (status, body) = app.send(Method::GET, "/api/products?sort=highest&page=1", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_pages"], 2);
    assert_eq!(body["data"]["data"][0]["slug"], "green-shirt");

    let (_, body) = app.send(Method::GET, "/api/products?price=1-30&q=shirt&category=all", &[], None).await;
    assert_eq!(body["data"]["data"].as_array().unwrap().len(), 2);

    let (_, body) = app.send(Method::GET, "/api/products?page=9", &[], None).await;
    assert_eq!(body["data"]["data"], json!([]));
    assert_eq!(body["data"]["total_pages"], 2);

    let (status, _) = app.send(Method::GET, "/api/products?price=cheap", &[], None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, body) = app.send(Method::GET, "/api/categories", &[], None).await;
    assert_eq!(body["data"], json!([{"category": "Shirts", "count": 3}]));
}

#[tokio::test]
async fn malformed_input_gets_the_error_envelope() {
    let app = TestApp::new();
    let guest = vec![("x-session-token", "guest-1".to_string())];

    let (status, body) = app.send(Method::POST, "/api/cart/items", &guest, Some(json!({"product_id": "nope", "qty": 1}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("product_id"));

    let (status, body) = app.send(Method::DELETE, "/api/cart/items/not-a-uuid", &guest, None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);

    let (status, body) = app.send(Method::GET, "/api/products?page=-1", &[], None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);

    let admin = app.seed_admin().await;
    let (status, body) = app.send(Method::DELETE, "/api/admin/orders/123", &admin, None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
}
