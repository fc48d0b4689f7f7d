//! Storefront domain: aggregates, value objects, pricing and the checkout workflow.
pub mod aggregates;
pub mod checkout;
pub mod events;
pub mod pricing;
pub mod value_objects;
