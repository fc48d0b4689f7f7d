//! Response envelope and error rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::payment::PaymentError;
use crate::EcommerceError;

/// `{success, message, data}` body shared by every action.
#[derive(Debug, Serialize)]
pub struct ActionResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ActionResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self { success: true, message: message.into(), data: Some(data) }
    }
}

impl ActionResponse<()> {
    pub fn done(message: impl Into<String>) -> Self { Self { success: true, message: message.into(), data: None } }
}

impl<T: Serialize> IntoResponse for ActionResponse<T> {
    fn into_response(self) -> Response { Json(self).into_response() }
}

pub type ApiResult<T> = Result<ActionResponse<T>, EcommerceError>;

impl EcommerceError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::EmptyCart | Self::ItemNotFound => StatusCode::UNPROCESSABLE_ENTITY,
            Self::OutOfStock { .. } | Self::MissingPrerequisite(_) | Self::NotPaid => StatusCode::CONFLICT,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Payment(PaymentError::InvalidWebhook(_)) => StatusCode::BAD_REQUEST,
            Self::Payment(PaymentError::Http(_)) => StatusCode::BAD_GATEWAY,
            Self::Payment(PaymentError::NotConfigured(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Payment(_) => StatusCode::PAYMENT_REQUIRED,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Checkout page to send the buyer back to, for guard failures.
    fn redirect(&self) -> Option<&'static str> {
        match self {
            Self::EmptyCart => Some(crate::domain::checkout::CheckoutStep::Cart.path()),
            Self::MissingPrerequisite(step) => Some(step.path()),
            _ => None,
        }
    }
}

impl IntoResponse for EcommerceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() && !matches!(self, Self::Payment(_)) {
            tracing::error!(error = %self, "request failed");
            "Something went wrong".to_string()
        } else {
            if let Self::Payment(e) = &self {
                tracing::warn!(error = %e, "payment error");
            }
            self.to_string()
        };

        let mut body = json!({ "success": false, "message": message });
        if let Some(redirect) = self.redirect() {
            body["redirect"] = json!(redirect);
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::checkout::CheckoutStep;
    use crate::store::StoreError;

    #[test]
    fn status_mapping() {
        assert_eq!(EcommerceError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(EcommerceError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(EcommerceError::NotFound("Order").status(), StatusCode::NOT_FOUND);
        assert_eq!(EcommerceError::NotPaid.status(), StatusCode::CONFLICT);
        assert_eq!(EcommerceError::Validation("x".into()).status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(EcommerceError::Storage(StoreError::Corrupt("x".into())).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn guard_failures_carry_redirects() {
        assert_eq!(EcommerceError::EmptyCart.redirect(), Some("/cart"));
        assert_eq!(EcommerceError::MissingPrerequisite(CheckoutStep::PaymentMethod).redirect(), Some("/payment-method"));
        assert_eq!(EcommerceError::NotPaid.redirect(), None);
    }
}
