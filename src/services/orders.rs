//! Orders after placement: payment capture, delivery and order history.

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{require_admin, Session};
use crate::catalog::Page;
use crate::domain::aggregates::{Order, PaymentMethod, PaymentResult};
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::payment::{verify_webhook_signature, PaymentError, PaymentHandle, WebhookEvent};
use crate::state::AppState;
use crate::{EcommerceError, Result};

async fn load_order(state: &AppState, order_id: Uuid) -> Result<Order> {
    state.repos().orders.order_by_id(order_id).await?.ok_or(EcommerceError::NotFound("Order"))
}

/// An order visible to the caller: their own, or any order for admins.
pub async fn order_for(state: &AppState, session: &Session, order_id: Uuid) -> Result<Order> {
    let order = load_order(state, order_id).await?;
    if order.user_id() != session.user_id && !session.is_admin() {
        return Err(EcommerceError::NotFound("Order"));
    }
    Ok(order)
}

pub async fn my_orders(state: &AppState, session: &Session, page: u32) -> Result<Page<Order>> {
    Ok(state.repos().orders.orders_for_user(session.user_id, page.max(1), state.page_size()).await?)
}

/// Opens a processor-side payment and remembers its id on the order.
pub async fn create_payment(state: &AppState, session: &Session, order_id: Uuid) -> Result<PaymentHandle> {
    let order = order_for(state, session, order_id).await?;
    if order.is_paid() {
        return Err(EcommerceError::Validation("Order is already paid".into()));
    }
    if order.payment_method() == PaymentMethod::CashOnDelivery {
        return Err(EcommerceError::Validation("Cash on delivery orders are paid on delivery".into()));
    }

    let gateway = state.gateways().for_method(order.payment_method())?;
    let handle = gateway.create_payment(&order).await?;
    state.repos().orders.save_payment_result(order.id(), &PaymentResult::pending(&handle.id)).await?;

    info!(order_id = %order.id(), payment_id = %handle.id, method = %order.payment_method(), "payment created");
    Ok(handle)
}

/// Captures a processor payment and marks the order paid.
///
/// Confirming an order that is already paid succeeds without side effects.
pub async fn confirm_payment(state: &AppState, session: &Session, order_id: Uuid, handle: &str) -> Result<Order> {
    let order = order_for(state, session, order_id).await?;
    if order.is_paid() {
        debug!(order_id = %order.id(), "payment already confirmed");
        return Ok(order);
    }
    if order.payment_method() == PaymentMethod::CashOnDelivery {
        return Err(EcommerceError::Validation("Cash on delivery orders are paid on delivery".into()));
    }

    let expected = order.pending_payment_id().map(str::to_string);
    if expected.as_deref() != Some(handle) {
        warn!(order_id = %order.id(), handle, "payment id does not match the order");
        return Err(PaymentError::Rejected("payment does not belong to this order".into()).into());
    }

    let gateway = state.gateways().for_method(order.payment_method())?;
    let confirmation = match gateway.confirm_payment(&order, handle).await {
        Ok(confirmation) => confirmation,
        Err(e) => {
            warn!(order_id = %order.id(), error = %e, "payment rejected");
            return Err(e.into());
        }
    };
    if expected.as_deref() != Some(confirmation.id.as_str()) {
        warn!(order_id = %order.id(), capture_id = %confirmation.id, "capture id does not match the order");
        return Err(PaymentError::Rejected("capture does not match this order".into()).into());
    }

    settle(state, order, Some(confirmation.into())).await
}

/// Applies a verified Stripe webhook. Only `charge.succeeded` is acted on.
pub async fn handle_stripe_webhook(state: &AppState, payload: &[u8], signature: &str) -> Result<Option<Order>> {
    let secret = state.stripe_webhook_secret().ok_or(PaymentError::NotConfigured(PaymentMethod::Stripe))?;
    verify_webhook_signature(payload, signature, secret)?;

    let event = WebhookEvent::parse(payload)?;
    if !event.is_charge_succeeded() {
        debug!(kind = %event.kind, "ignoring stripe event");
        return Ok(None);
    }
    let order_id = event.order_id().ok_or_else(|| EcommerceError::Validation("Stripe event has no order id".into()))?;
    let order = load_order(state, order_id).await?;
    if order.payment_method() != PaymentMethod::Stripe {
        warn!(%order_id, method = %order.payment_method(), "stripe charge for a non-stripe order");
        return Err(PaymentError::Rejected("order is not paid through Stripe".into()).into());
    }
    let charged = event.data.object.amount;
    if charged != order.totals().total_price.to_cents() {
        warn!(%order_id, charged, expected = order.totals().total_price.to_cents(), "stripe charge amount mismatch");
        return Err(PaymentError::Rejected("charged amount does not match the order total".into()).into());
    }
    settle(state, order, Some(event.payment_result())).await.map(Some)
}

/// Admin confirmation that a cash on delivery order was paid.
pub async fn mark_paid_cod(state: &AppState, admin: &Session, order_id: Uuid) -> Result<Order> {
    require_admin(admin)?;
    let order = load_order(state, order_id).await?;
    if order.payment_method() != PaymentMethod::CashOnDelivery {
        return Err(EcommerceError::Validation("Only cash on delivery orders can be marked paid".into()));
    }
    settle(state, order, None).await
}

pub async fn mark_delivered(state: &AppState, admin: &Session, order_id: Uuid) -> Result<Order> {
    require_admin(admin)?;
    let mut order = load_order(state, order_id).await?;
    if !order.mark_delivered()? {
        return Ok(order);
    }

    let events = order.take_events();
    if state.repos().orders.record_delivery(&order).await? {
        state.events().publish(events).await;
        info!(order_id = %order.id(), "order delivered");
        Ok(order)
    } else {
        load_order(state, order_id).await
    }
}

/// Flips the order to paid and deducts stock, once.
///
/// When a concurrent confirmation got there first the stored order is
/// returned unchanged.
async fn settle(state: &AppState, mut order: Order, result: Option<PaymentResult>) -> Result<Order> {
    if !order.mark_paid(result) {
        return Ok(order);
    }

    let mut events = order.take_events();
    if !state.repos().orders.record_payment(&order).await? {
        debug!(order_id = %order.id(), "order was paid concurrently");
        return load_order(state, order.id()).await;
    }

    events.extend(order.items().iter().map(|item| {
        DomainEvent::Product(ProductEvent::InventoryRemoved { product_id: item.product_id, quantity: item.qty })
    }));
    state.events().publish(events).await;
    info!(order_id = %order.id(), method = %order.payment_method(), total = %order.totals().total_price, "order paid");
    Ok(order)
}
