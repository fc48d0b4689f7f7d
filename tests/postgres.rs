//! Runs against the database named by `DATABASE_URL`; skipped when it is unset.

use rust_decimal::Decimal;
use uuid::Uuid;

use storefront::domain::aggregates::{
    Cart, CartItem, NewProduct, Order, OwnerKey, PaymentMethod, Product, ShippingAddress, User,
};
use storefront::store::postgres::PgStore;
use storefront::store::{CartRepository, OrderRepository, ProductRepository, UserRepository};

async fn store() -> Option<PgStore> {
    let url = std::env::var("DATABASE_URL").ok().filter(|u| !u.is_empty())?;
    let store = PgStore::connect(&url, 2).await.unwrap();
    store.migrate().await.unwrap();
    Some(store)
}

async fn seed_user(store: &PgStore) -> User {
    let user = User::new("Jane Doe", format!("jane-{}@example.com", Uuid::new_v4().simple()), None);
    store.insert_user(&user).await.unwrap();
    user
}

async fn seed_product(store: &PgStore, stock: u32) -> Product {
    let slug = format!("pg-{}", Uuid::new_v4().simple());
    let product = Product::create(NewProduct {
        name: "Polo Shirt".into(), slug, category: "Shirts".into(), brand: "Polo".into(),
        description: "A fine shirt".into(), images: vec!["/images/polo.jpg".into()],
        price: Decimal::new(2500, 2), stock, is_featured: false, banner: None,
    })
    .unwrap();
    store.insert_product(&product).await.unwrap();
    product
}

fn cart_with(owner: OwnerKey, product: &Product, qty: u32) -> Cart {
    let mut cart = Cart::new(owner);
    cart.add_item(CartItem {
        product_id: product.id, slug: product.slug.to_string(), name: product.name.clone(),
        image: product.thumbnail().to_string(), price: product.price, qty,
    }, product.stock.value())
    .unwrap();
    cart
}

fn address() -> ShippingAddress {
    ShippingAddress {
        full_name: "Jane Doe".into(), street_address: "1 Main St".into(), city: "Springfield".into(),
        postal_code: "12345".into(), country: "USA".into(),
    }
}

#[tokio::test]
async fn order_is_placed_once_and_paid_once() {
    let Some(store) = store().await else { return };
    let user = seed_user(&store).await;
    let product = seed_product(&store, 10).await;
    let cart = cart_with(OwnerKey::User(user.id), &product, 2);
    store.save_cart(&cart).await.unwrap();

    let order = Order::place(user.id, &cart, address(), PaymentMethod::CashOnDelivery).unwrap();
    let twin = Order::place(user.id, &cart, address(), PaymentMethod::CashOnDelivery).unwrap();
    assert!(store.place_order(&order, cart.id()).await.unwrap());
    assert!(!store.place_order(&twin, cart.id()).await.unwrap());
    assert!(store.order_by_id(twin.id()).await.unwrap().is_none());
    assert!(store.cart_for(&OwnerKey::User(user.id)).await.unwrap().is_none());

    let stored = store.order_by_id(order.id()).await.unwrap().unwrap();
    assert_eq!(stored.totals(), order.totals());
    assert_eq!(stored.items().len(), 1);

    let mut first = stored.clone();
    assert!(first.mark_paid(None));
    let mut second = stored.clone();
    assert!(second.mark_paid(None));
    assert!(store.record_payment(&first).await.unwrap());
    assert!(!store.record_payment(&second).await.unwrap());

    assert!(store.order_by_id(order.id()).await.unwrap().unwrap().is_paid());
    assert_eq!(store.product_by_id(product.id).await.unwrap().unwrap().stock.value(), 8);
}

#[tokio::test]
async fn carts_are_one_per_owner() {
    let Some(store) = store().await else { return };
    let user = seed_user(&store).await;
    let product = seed_product(&store, 10).await;
    let owner = OwnerKey::User(user.id);

    let first = cart_with(owner.clone(), &product, 1);
    let second = cart_with(owner.clone(), &product, 2);
    store.save_cart(&first).await.unwrap();
    store.save_cart(&second).await.unwrap();
    let stored = store.cart_for(&owner).await.unwrap().unwrap();
    assert_eq!(stored.id(), second.id());
    assert_eq!(stored.items()[0].qty, 2);

    let guest = OwnerKey::Session(format!("tok-{}", Uuid::new_v4().simple()));
    let mut claimed = cart_with(guest.clone(), &product, 3);
    store.save_cart(&claimed).await.unwrap();
    claimed.reassign(owner.clone());
    store.save_cart(&claimed).await.unwrap();

    assert!(store.cart_for(&guest).await.unwrap().is_none());
    assert_eq!(store.cart_for(&owner).await.unwrap().unwrap().id(), claimed.id());
}
