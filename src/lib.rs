//! Storefront
//!
//! Storefront and admin back office for a small online shop.
//!
//! ## Features
//! - Product catalog with search, filters and pagination
//! - Shopping cart for guests and signed-in users
//! - Checkout workflow (shipping address, payment method, place order)
//! - Payment capture through PayPal, Stripe or cash on delivery
//! - Admin dashboard and product/order/user management

use thiserror::Error;

pub mod auth;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod events;
pub mod payment;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

use catalog::CatalogError;
use domain::aggregates::{CartError, OrderError, ProductError, UserError};
use domain::checkout::CheckoutStep;
use payment::PaymentError;
use store::StoreError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum EcommerceError {
    #[error("{0}")]
    Validation(String),

    #[error("Not enough stock: requested {requested}, {available} available")]
    OutOfStock { requested: u32, available: u32 },

    #[error("Item not found in cart")]
    ItemNotFound,

    #[error("Your cart is empty")]
    EmptyCart,

    #[error("Checkout is missing the {0} step")]
    MissingPrerequisite(CheckoutStep),

    #[error("Order is not paid")]
    NotPaid,

    #[error("Forbidden")]
    Forbidden,

    #[error("Sign in required")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Payment failed: {0}")]
    Payment(#[from] PaymentError),

    #[error("Storage error: {0}")]
    Storage(StoreError),
}

pub type Result<T> = std::result::Result<T, EcommerceError>;

impl From<StoreError> for EcommerceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(message) => Self::Validation(message),
            other => Self::Storage(other),
        }
    }
}

impl From<CartError> for EcommerceError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::OutOfStock { requested, available, .. } => Self::OutOfStock { requested, available },
            CartError::ItemNotFound(_) => Self::ItemNotFound,
            CartError::InvalidQuantity => Self::Validation(e.to_string()),
        }
    }
}

impl From<OrderError> for EcommerceError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::NoItems => Self::EmptyCart,
            OrderError::NotPaid => Self::NotPaid,
            OrderError::AlreadyPaid | OrderError::UnknownPaymentMethod(_) => Self::Validation(e.to_string()),
        }
    }
}

impl From<ProductError> for EcommerceError {
    fn from(e: ProductError) -> Self { Self::Validation(e.to_string()) }
}

impl From<UserError> for EcommerceError {
    fn from(e: UserError) -> Self { Self::Validation(e.to_string()) }
}

impl From<CatalogError> for EcommerceError {
    fn from(e: CatalogError) -> Self { Self::Validation(e.to_string()) }
}

impl From<validator::ValidationErrors> for EcommerceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| e.message.as_ref().map_or_else(|| format!("{field} is invalid"), |m| m.to_string()))
            })
            .collect();
        messages.sort();
        Self::Validation(messages.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn conflict_becomes_validation() {
        let err: EcommerceError = StoreError::Conflict("slug already exists".into()).into();
        assert!(matches!(err, EcommerceError::Validation(m) if m == "slug already exists"));
    }

    #[test]
    fn validation_messages_are_joined() {
        let address = domain::aggregates::ShippingAddress { city: "NY".into(), ..Default::default() };
        let err: EcommerceError = address.validate().unwrap_err().into();
        let EcommerceError::Validation(message) = err else { panic!("expected validation error") };
        assert!(message.contains("City must be at least 3 characters"));
        assert!(message.contains("; "));
    }

    #[test]
    fn cart_errors_map() {
        let err: EcommerceError = CartError::OutOfStock { product_id: uuid::Uuid::nil(), requested: 4, available: 3 }.into();
        assert_eq!(err.to_string(), "Not enough stock: requested 4, 3 available");
        assert!(matches!(EcommerceError::from(OrderError::NoItems), EcommerceError::EmptyCart));
    }
}
