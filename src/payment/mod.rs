//! Payment processors over their REST APIs.
//!
//! A gateway does two things: open a processor-side payment for an order
//! and later confirm that it was captured. Flipping the order to paid is
//! left to the order service.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::aggregates::{Order, PaymentMethod, PaymentResult};
use crate::domain::value_objects::Money;

pub mod paypal;
pub mod stripe;

pub use paypal::PayPalGateway;
pub use stripe::{verify_webhook_signature, StripeGateway, WebhookEvent};

/// What the buyer's browser needs to finish paying.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PaymentHandle {
    /// Processor-side payment id, stored on the order as pending.
    pub id: String,
    /// Token handed to the client SDK (PayPal order id, Stripe client secret).
    pub client_token: String,
}

/// A capture the processor reports as complete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentConfirmation {
    pub id: String,
    pub status: String,
    pub email_address: String,
    pub amount: Money,
}

impl From<PaymentConfirmation> for PaymentResult {
    fn from(c: PaymentConfirmation) -> Self {
        PaymentResult { id: c.id, status: c.status, email_address: c.email_address, price_paid: c.amount }
    }
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("no payment gateway configured for {0}")]
    NotConfigured(PaymentMethod),
    #[error("payment processor unreachable: {0}")]
    Http(#[from] reqwest::Error),
    #[error("payment rejected: {0}")]
    Rejected(String),
    #[error("unexpected processor response: {0}")]
    Unexpected(String),
    #[error("invalid webhook: {0}")]
    InvalidWebhook(&'static str),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment(&self, order: &Order) -> Result<PaymentHandle, PaymentError>;
    /// Captures or verifies `handle`. Errors unless the processor reports the payment complete.
    async fn confirm_payment(&self, order: &Order, handle: &str) -> Result<PaymentConfirmation, PaymentError>;
}

/// Configured gateways, one slot per processor-backed payment method.
#[derive(Clone, Default)]
pub struct PaymentGateways {
    pub paypal: Option<Arc<dyn PaymentGateway>>,
    pub stripe: Option<Arc<dyn PaymentGateway>>,
}

impl PaymentGateways {
    pub fn for_method(&self, method: PaymentMethod) -> Result<&Arc<dyn PaymentGateway>, PaymentError> {
        let slot = match method {
            PaymentMethod::PayPal => self.paypal.as_ref(),
            PaymentMethod::Stripe => self.stripe.as_ref(),
            PaymentMethod::CashOnDelivery => None,
        };
        slot.ok_or(PaymentError::NotConfigured(method))
    }
}

/// Reads a JSON body, turning non-2xx responses into [`PaymentError::Rejected`].
async fn read_json<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T, PaymentError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(PaymentError::Rejected(format!("{status}: {body}")));
    }
    Ok(resp.json().await?)
}
