//! Checkout: collect address and payment method, then place the order.

use tracing::info;
use validator::Validate;

use super::current_user;
use crate::auth::Session;
use crate::domain::aggregates::{Order, PaymentMethod, ShippingAddress, User};
use crate::domain::checkout::{CheckoutProgress, CheckoutStep};
use crate::state::AppState;
use crate::{EcommerceError, Result};

pub async fn save_shipping_address(state: &AppState, session: &Session, address: ShippingAddress) -> Result<User> {
    address.validate()?;
    let mut user = current_user(state, session).await?;
    user.address = Some(address);
    state.repos().users.update_user(&user).await?;
    Ok(user)
}

pub async fn save_payment_method(state: &AppState, session: &Session, method: PaymentMethod) -> Result<User> {
    let mut user = current_user(state, session).await?;
    user.payment_method = Some(method);
    state.repos().users.update_user(&user).await?;
    Ok(user)
}

pub async fn progress(state: &AppState, session: &Session) -> Result<CheckoutProgress> {
    let user = current_user(state, session).await?;
    let cart = state.repos().carts.cart_for(&session.owner_key()).await?;
    Ok(CheckoutProgress::of(cart.as_ref(), &user))
}

/// The step a buyer asking for `requested` should actually see.
pub async fn resolve_step(state: &AppState, session: &Session, requested: CheckoutStep) -> Result<CheckoutStep> {
    Ok(progress(state, session).await?.resolve(requested))
}

/// Turns the buyer's cart into an order and deletes the cart.
///
/// Guards are re-checked here, whatever the client was shown before.
pub async fn place_order(state: &AppState, session: &Session) -> Result<Order> {
    let user = current_user(state, session).await?;
    let cart = state.repos().carts.cart_for(&session.owner_key()).await?;

    CheckoutProgress::of(cart.as_ref(), &user).require(CheckoutStep::PlaceOrder).map_err(|step| match step {
        CheckoutStep::Cart => EcommerceError::EmptyCart,
        step => EcommerceError::MissingPrerequisite(step),
    })?;
    let (Some(cart), Some(address), Some(method)) = (cart, user.address, user.payment_method) else {
        return Err(EcommerceError::EmptyCart);
    };

    let mut order = Order::place(user.id, &cart, address, method)?;
    let events = order.take_events();
    if !state.repos().orders.place_order(&order, cart.id()).await? {
        return Err(EcommerceError::EmptyCart);
    }
    state.events().publish(events).await;

    info!(order_id = %order.id(), user_id = %user.id, total = %order.totals().total_price, method = %method, "order placed");
    Ok(order)
}
