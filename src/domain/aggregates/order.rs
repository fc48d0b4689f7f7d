//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::cart::{Cart, CartItem};
use crate::domain::checkout::CheckoutStep;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::pricing::{compute_totals, PriceSummary, PricedLine};
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub slug: String,
    pub name: String,
    pub image: String,
    pub price: Money,
    pub qty: u32,
}

impl From<&CartItem> for OrderItem {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id,
            slug: item.slug.clone(),
            name: item.name.clone(),
            image: item.image.clone(),
            price: item.price,
            qty: item.qty,
        }
    }
}

impl PricedLine for OrderItem {
    fn unit_price(&self) -> Money { self.price }
    fn quantity(&self) -> u32 { self.qty }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ShippingAddress {
    #[validate(length(min = 3, message = "Name must be at least 3 characters"))]
    pub full_name: String,
    #[validate(length(min = 3, message = "Address must be at least 3 characters"))]
    pub street_address: String,
    #[validate(length(min = 3, message = "City must be at least 3 characters"))]
    pub city: String,
    #[validate(length(min = 3, message = "Postal code must be at least 3 characters"))]
    pub postal_code: String,
    #[validate(length(min = 3, message = "Country must be at least 3 characters"))]
    pub country: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    PayPal,
    Stripe,
    CashOnDelivery,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [Self::PayPal, Self::Stripe, Self::CashOnDelivery];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PayPal => "PayPal",
            Self::Stripe => "Stripe",
            Self::CashOnDelivery => "CashOnDelivery",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for PaymentMethod {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|m| m.as_str() == s).ok_or_else(|| OrderError::UnknownPaymentMethod(s.to_string()))
    }
}

/// What the payment processor told us about a charge.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub id: String,
    pub status: String,
    pub email_address: String,
    pub price_paid: Money,
}

impl PaymentResult {
    /// Placeholder stored when a processor-side payment is created but not yet captured.
    pub fn pending(id: impl Into<String>) -> Self {
        Self { id: id.into(), status: "PENDING".into(), email_address: String::new(), price_paid: Money::ZERO }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Order {
    id: Uuid,
    user_id: Uuid,
    items: Vec<OrderItem>,
    shipping_address: ShippingAddress,
    payment_method: PaymentMethod,
    payment_result: Option<PaymentResult>,
    #[serde(flatten)]
    totals: PriceSummary,
    is_paid: bool,
    paid_at: Option<DateTime<Utc>>,
    is_delivered: bool,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

/// Flat representation of a persisted order, used by stores to rebuild the aggregate.
#[derive(Clone, Debug)]
pub struct OrderRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_result: Option<PaymentResult>,
    pub totals: PriceSummary,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<OrderRecord> for Order {
    fn from(r: OrderRecord) -> Self {
        Self {
            id: r.id, user_id: r.user_id, items: r.items, shipping_address: r.shipping_address,
            payment_method: r.payment_method, payment_result: r.payment_result, totals: r.totals,
            is_paid: r.is_paid, paid_at: r.paid_at, is_delivered: r.is_delivered, delivered_at: r.delivered_at,
            created_at: r.created_at, events: vec![],
        }
    }
}

impl Order {
    /// Snapshots a cart into a new order. Totals are computed here and frozen.
    pub fn place(user_id: Uuid, cart: &Cart, shipping_address: ShippingAddress, payment_method: PaymentMethod) -> Result<Self, OrderError> {
        if cart.is_empty() { return Err(OrderError::NoItems); }

        let items: Vec<OrderItem> = cart.items().iter().map(OrderItem::from).collect();
        let totals = compute_totals(&items);
        let mut order = Self {
            id: Uuid::new_v4(), user_id, items, shipping_address, payment_method, payment_result: None, totals,
            is_paid: false, paid_at: None, is_delivered: false, delivered_at: None, created_at: Utc::now(), events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Created { order_id: order.id, user_id, total: totals.total_price }));
        Ok(order)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn items(&self) -> &[OrderItem] { &self.items }
    pub fn shipping_address(&self) -> &ShippingAddress { &self.shipping_address }
    pub fn payment_method(&self) -> PaymentMethod { self.payment_method }
    pub fn payment_result(&self) -> Option<&PaymentResult> { self.payment_result.as_ref() }
    pub fn totals(&self) -> &PriceSummary { &self.totals }
    pub fn is_paid(&self) -> bool { self.is_paid }
    pub fn paid_at(&self) -> Option<DateTime<Utc>> { self.paid_at }
    pub fn is_delivered(&self) -> bool { self.is_delivered }
    pub fn delivered_at(&self) -> Option<DateTime<Utc>> { self.delivered_at }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    /// Where this order sits in the checkout workflow.
    pub fn step(&self) -> CheckoutStep {
        match (self.is_paid, self.is_delivered) {
            (_, true) => CheckoutStep::Fulfilled,
            (true, false) => CheckoutStep::AwaitingDelivery,
            (false, _) if self.payment_method == PaymentMethod::CashOnDelivery => CheckoutStep::AwaitingCod,
            (false, _) => CheckoutStep::PaymentCapture,
        }
    }

    /// Id of the processor-side payment created for this order, if any.
    pub fn pending_payment_id(&self) -> Option<&str> {
        self.payment_result.as_ref().map(|r| r.id.as_str())
    }

    pub fn begin_payment(&mut self, pending: PaymentResult) -> Result<(), OrderError> {
        if self.is_paid { return Err(OrderError::AlreadyPaid); }
        self.payment_result = Some(pending);
        Ok(())
    }

    /// Flips the order to paid. Returns `false` when it was already paid,
    /// leaving `paid_at` and the stored payment result untouched.
    pub fn mark_paid(&mut self, result: Option<PaymentResult>) -> bool {
        if !self.step().can_advance_to(CheckoutStep::AwaitingDelivery) {
            return false;
        }
        let now = Utc::now();
        self.is_paid = true;
        self.paid_at = Some(now);
        if result.is_some() { self.payment_result = result; }
        self.raise_event(DomainEvent::Order(OrderEvent::Paid { order_id: self.id, paid_at: now }));
        true
    }

    /// Flips the order to delivered. Returns `false` when it was already delivered.
    pub fn mark_delivered(&mut self) -> Result<bool, OrderError> {
        if self.is_delivered { return Ok(false); }
        if !self.step().can_advance_to(CheckoutStep::Fulfilled) { return Err(OrderError::NotPaid); }
        let now = Utc::now();
        self.is_delivered = true;
        self.delivered_at = Some(now);
        self.raise_event(DomainEvent::Order(OrderEvent::Delivered { order_id: self.id, delivered_at: now }));
        Ok(true)
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("order has no items")]
    NoItems,
    #[error("order is not paid")]
    NotPaid,
    #[error("order is already paid")]
    AlreadyPaid,
    #[error("unknown payment method: {0}")]
    UnknownPaymentMethod(String),
}
