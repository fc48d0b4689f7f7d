//! Stripe payment intents and webhooks, via REST (no SDK dependency).

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use uuid::Uuid;

use super::{read_json, PaymentConfirmation, PaymentError, PaymentGateway, PaymentHandle};
use crate::domain::aggregates::{Order, PaymentResult};
use crate::domain::value_objects::Money;

const API_URL: &str = "https://api.stripe.com/v1";
const SUCCEEDED: &str = "succeeded";
/// Webhooks older than this many seconds are rejected.
const WEBHOOK_TOLERANCE_SECS: i64 = 300;

pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), secret_key: secret_key.into() }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_payment(&self, order: &Order) -> Result<PaymentHandle, PaymentError> {
        let amount = order.totals().total_price.to_cents().to_string();
        let order_id = order.id().to_string();
        let resp = self
            .client
            .post(format!("{API_URL}/payment_intents"))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&[("amount", amount.as_str()), ("currency", "usd"), ("metadata[order_id]", order_id.as_str())])
            .send()
            .await?;
        let intent: serde_json::Value = read_json(resp).await?;

        let id = intent["id"].as_str().ok_or_else(|| PaymentError::Unexpected(format!("payment intent without id: {intent}")))?;
        let secret = intent["client_secret"]
            .as_str()
            .ok_or_else(|| PaymentError::Unexpected(format!("payment intent without client_secret: {intent}")))?;
        Ok(PaymentHandle { id: id.to_string(), client_token: secret.to_string() })
    }

    async fn confirm_payment(&self, order: &Order, handle: &str) -> Result<PaymentConfirmation, PaymentError> {
        let resp = self
            .client
            .get(format!("{API_URL}/payment_intents/{handle}"))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await?;
        let intent: serde_json::Value = read_json(resp).await?;

        let status = intent["status"].as_str().unwrap_or_default();
        if status != SUCCEEDED {
            return Err(PaymentError::Rejected(format!("payment intent {handle} is {status}")));
        }
        if intent["metadata"]["order_id"].as_str() != Some(order.id().to_string().as_str()) {
            return Err(PaymentError::Rejected(format!("payment intent {handle} belongs to another order")));
        }

        Ok(PaymentConfirmation {
            id: handle.to_string(),
            status: status.to_string(),
            email_address: intent["receipt_email"].as_str().unwrap_or_default().to_string(),
            amount: intent["amount_received"].as_i64().map(Money::from_cents).unwrap_or(order.totals().total_price),
        })
    }
}

/// The subset of a Stripe event the storefront acts on.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub object: Charge,
}

#[derive(Debug, Deserialize)]
pub struct Charge {
    pub id: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub metadata: ChargeMetadata,
    #[serde(default)]
    pub billing_details: BillingDetails,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChargeMetadata {
    pub order_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BillingDetails {
    pub email: Option<String>,
}

impl WebhookEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, PaymentError> {
        serde_json::from_slice(payload).map_err(|_| PaymentError::InvalidWebhook("malformed event payload"))
    }

    pub fn is_charge_succeeded(&self) -> bool { self.kind == "charge.succeeded" }

    pub fn order_id(&self) -> Option<Uuid> {
        self.data.object.metadata.order_id.as_deref().and_then(|id| Uuid::parse_str(id).ok())
    }

    pub fn payment_result(&self) -> PaymentResult {
        let charge = &self.data.object;
        PaymentResult {
            id: charge.id.clone(),
            status: "COMPLETED".to_string(),
            email_address: charge.billing_details.email.clone().unwrap_or_default(),
            price_paid: Money::from_cents(charge.amount),
        }
    }
}

/// Verify Stripe webhook signature (HMAC-SHA256)
pub fn verify_webhook_signature(payload: &[u8], sig_header: &str, secret: &str) -> Result<(), PaymentError> {
    verify_signature_at(payload, sig_header, secret, chrono::Utc::now().timestamp())
}

fn verify_signature_at(payload: &[u8], sig_header: &str, secret: &str, now: i64) -> Result<(), PaymentError> {
    let mut timestamp = "";
    let mut signature = "";
    for part in sig_header.split(',') {
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.strip_prefix("v1=") {
            signature = v;
        }
    }
    if timestamp.is_empty() || signature.is_empty() {
        return Err(PaymentError::InvalidWebhook("invalid Stripe-Signature header"));
    }

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| PaymentError::InvalidWebhook("HMAC key error"))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    let sig_bytes = hex::decode(signature).map_err(|_| PaymentError::InvalidWebhook("invalid signature hex"))?;
    mac.verify_slice(&sig_bytes).map_err(|_| PaymentError::InvalidWebhook("signature mismatch"))?;

    let ts: i64 = timestamp.parse().map_err(|_| PaymentError::InvalidWebhook("invalid timestamp"))?;
    if (now - ts).abs() > WEBHOOK_TOLERANCE_SECS {
        return Err(PaymentError::InvalidWebhook("timestamp outside tolerance"));
    }
    Ok(())
}

/// Builds a valid `Stripe-Signature` header, for tests.
#[cfg(test)]
pub(crate) fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}
