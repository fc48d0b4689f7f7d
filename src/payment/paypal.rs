//! PayPal Orders v2.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;

use super::{read_json, PaymentConfirmation, PaymentError, PaymentGateway, PaymentHandle};
use crate::domain::aggregates::Order;
use crate::domain::value_objects::Money;

pub const SANDBOX_API_URL: &str = "https://api-m.sandbox.paypal.com";
const COMPLETED: &str = "COMPLETED";

pub struct PayPalGateway {
    client: reqwest::Client,
    api_url: String,
    client_id: String,
    secret: String,
}

#[derive(Deserialize)]
struct AccessToken {
    access_token: String,
}

#[derive(Deserialize)]
struct CreatedOrder {
    id: String,
}

#[derive(Deserialize)]
struct CapturedOrder {
    id: String,
    status: String,
    #[serde(default)]
    payer: Option<Payer>,
    #[serde(default)]
    purchase_units: Vec<PurchaseUnit>,
}

#[derive(Deserialize)]
struct Payer {
    email_address: Option<String>,
}

#[derive(Deserialize)]
struct PurchaseUnit {
    payments: Option<Payments>,
}

#[derive(Deserialize)]
struct Payments {
    #[serde(default)]
    captures: Vec<Capture>,
}

#[derive(Deserialize)]
struct Capture {
    amount: Amount,
}

#[derive(Deserialize)]
struct Amount {
    value: String,
}

impl PayPalGateway {
    pub fn new(api_url: impl Into<String>, client_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            secret: secret.into(),
        }
    }

    async fn access_token(&self) -> Result<String, PaymentError> {
        let resp = self
            .client
            .post(format!("{}/v1/oauth2/token", self.api_url))
            .basic_auth(&self.client_id, Some(&self.secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        let token: AccessToken = read_json(resp).await?;
        Ok(token.access_token)
    }
}

impl CapturedOrder {
    fn captured_amount(&self) -> Option<Money> {
        let capture = self.purchase_units.first()?.payments.as_ref()?.captures.first()?;
        Decimal::from_str(&capture.amount.value).ok().map(Money::new)
    }
}

#[async_trait]
impl PaymentGateway for PayPalGateway {
    async fn create_payment(&self, order: &Order) -> Result<PaymentHandle, PaymentError> {
        let token = self.access_token().await?;
        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": order.id().to_string(),
                "amount": { "currency_code": "USD", "value": order.totals().total_price.to_string() },
            }],
        });
        let resp = self
            .client
            .post(format!("{}/v2/checkout/orders", self.api_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        let created: CreatedOrder = read_json(resp).await?;
        Ok(PaymentHandle { client_token: created.id.clone(), id: created.id })
    }

    async fn confirm_payment(&self, order: &Order, handle: &str) -> Result<PaymentConfirmation, PaymentError> {
        let token = self.access_token().await?;
        let resp = self
            .client
            .post(format!("{}/v2/checkout/orders/{handle}/capture", self.api_url))
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?;
        let captured: CapturedOrder = read_json(resp).await?;
        if captured.status != COMPLETED {
            return Err(PaymentError::Rejected(format!("PayPal order {} is {}", captured.id, captured.status)));
        }

        Ok(PaymentConfirmation {
            amount: captured.captured_amount().unwrap_or(order.totals().total_price),
            email_address: captured.payer.as_ref().and_then(|p| p.email_address.clone()).unwrap_or_default(),
            status: captured.status,
            id: captured.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_response_amount() {
        let captured: CapturedOrder = serde_json::from_value(json!({
            "id": "5O190127TN364715T",
            "status": "COMPLETED",
            "payer": { "email_address": "buyer@example.com" },
            "purchase_units": [{ "payments": { "captures": [{ "amount": { "currency_code": "USD", "value": "64.00" } }] } }],
        }))
        .unwrap();
        assert_eq!(captured.captured_amount(), Some(Money::from_cents(6400)));
        assert_eq!(captured.payer.unwrap().email_address.as_deref(), Some("buyer@example.com"));
    }

    #[test]
    fn capture_without_units_has_no_amount() {
        let captured: CapturedOrder = serde_json::from_value(json!({ "id": "X", "status": "PENDING" })).unwrap();
        assert_eq!(captured.captured_amount(), None);
    }

    #[test]
    fn api_url_trailing_slash_is_trimmed() {
        let gw = PayPalGateway::new("https://api-m.sandbox.paypal.com/", "id", "secret");
        assert_eq!(gw.api_url, SANDBOX_API_URL);
    }
}
