//! Checkout workflow as an explicit state machine.
//!
//! Steps before an order exists are guarded by what the buyer has filled in
//! (cart items, address, payment method). Steps after that are derived from
//! the order's payment and delivery flags, see [`Order::step`].
//!
//! [`Order::step`]: crate::domain::aggregates::Order::step

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::aggregates::{Cart, User};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    Cart,
    ShippingAddress,
    PaymentMethod,
    PlaceOrder,
    PaymentCapture,
    AwaitingCod,
    AwaitingDelivery,
    Fulfilled,
}

/// Legal forward transitions.
const TRANSITIONS: &[(CheckoutStep, CheckoutStep)] = &[
    (CheckoutStep::Cart, CheckoutStep::ShippingAddress),
    (CheckoutStep::ShippingAddress, CheckoutStep::PaymentMethod),
    (CheckoutStep::PaymentMethod, CheckoutStep::PlaceOrder),
    (CheckoutStep::PlaceOrder, CheckoutStep::PaymentCapture),
    (CheckoutStep::PlaceOrder, CheckoutStep::AwaitingCod),
    (CheckoutStep::PaymentCapture, CheckoutStep::AwaitingDelivery),
    (CheckoutStep::AwaitingCod, CheckoutStep::AwaitingDelivery),
    (CheckoutStep::AwaitingDelivery, CheckoutStep::Fulfilled),
];

impl CheckoutStep {
    pub fn can_advance_to(self, next: CheckoutStep) -> bool {
        TRANSITIONS.iter().any(|&(from, to)| from == self && to == next)
    }

    /// Steps the buyer walks through before an order exists.
    pub fn is_pre_order(self) -> bool { self <= CheckoutStep::PlaceOrder }

    /// Page a buyer is sent to when a guard fails at this step.
    pub fn path(self) -> &'static str {
        match self {
            Self::Cart => "/cart",
            Self::ShippingAddress => "/shipping-address",
            Self::PaymentMethod => "/payment-method",
            Self::PlaceOrder => "/place-order",
            Self::PaymentCapture | Self::AwaitingCod | Self::AwaitingDelivery | Self::Fulfilled => "/order",
        }
    }
}

impl fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cart => "cart",
            Self::ShippingAddress => "shipping address",
            Self::PaymentMethod => "payment method",
            Self::PlaceOrder => "place order",
            Self::PaymentCapture => "payment capture",
            Self::AwaitingCod => "awaiting cash on delivery",
            Self::AwaitingDelivery => "awaiting delivery",
            Self::Fulfilled => "fulfilled",
        };
        f.write_str(name)
    }
}

/// What a buyer has completed so far, i.e. the inputs to every pre-order guard.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CheckoutProgress {
    pub has_items: bool,
    pub has_address: bool,
    pub has_payment_method: bool,
}

impl CheckoutProgress {
    pub fn of(cart: Option<&Cart>, user: &User) -> Self {
        Self {
            has_items: cart.is_some_and(|c| !c.is_empty()),
            has_address: user.address.is_some(),
            has_payment_method: user.payment_method.is_some(),
        }
    }

    /// Whether the guard on the edge leaving `step` holds.
    fn guard_passes(&self, step: CheckoutStep) -> bool {
        match step {
            CheckoutStep::Cart => self.has_items,
            CheckoutStep::ShippingAddress => self.has_address,
            CheckoutStep::PaymentMethod => self.has_payment_method,
            _ => true,
        }
    }

    /// Furthest pre-order step reachable by walking the transition table.
    pub fn furthest(&self) -> CheckoutStep {
        let mut step = CheckoutStep::Cart;
        while step < CheckoutStep::PlaceOrder && self.guard_passes(step) {
            match TRANSITIONS.iter().find(|&&(from, to)| from == step && to.is_pre_order()) {
                Some(&(_, next)) => step = next,
                None => break,
            }
        }
        step
    }

    /// Returns `requested` if every guard before it holds, otherwise the
    /// first step whose guard fails (the redirect target).
    pub fn resolve(&self, requested: CheckoutStep) -> CheckoutStep {
        if !requested.is_pre_order() {
            return requested;
        }
        requested.min(self.furthest())
    }

    /// Commit-time check that `target` is reachable; yields the blocking step otherwise.
    pub fn require(&self, target: CheckoutStep) -> Result<(), CheckoutStep> {
        match self.resolve(target) {
            step if step == target => Ok(()),
            blocking => Err(blocking),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table() {
        assert!(CheckoutStep::Cart.can_advance_to(CheckoutStep::ShippingAddress));
        assert!(CheckoutStep::PlaceOrder.can_advance_to(CheckoutStep::AwaitingCod));
        assert!(!CheckoutStep::Cart.can_advance_to(CheckoutStep::PlaceOrder));
        assert!(!CheckoutStep::PaymentCapture.can_advance_to(CheckoutStep::Fulfilled));
        assert!(!CheckoutStep::Fulfilled.can_advance_to(CheckoutStep::Fulfilled));
    }

    #[test]
    fn empty_cart_redirects_to_cart() {
        let progress = CheckoutProgress { has_items: false, has_address: true, has_payment_method: true };
        assert_eq!(progress.resolve(CheckoutStep::PlaceOrder), CheckoutStep::Cart);
        assert_eq!(progress.require(CheckoutStep::PlaceOrder), Err(CheckoutStep::Cart));
    }

    #[test]
    fn missing_payment_method_blocks_place_order() {
        let progress = CheckoutProgress { has_items: true, has_address: true, has_payment_method: false };
        assert_eq!(progress.furthest(), CheckoutStep::PaymentMethod);
        assert_eq!(progress.resolve(CheckoutStep::PlaceOrder), CheckoutStep::PaymentMethod);
        assert_eq!(progress.resolve(CheckoutStep::ShippingAddress), CheckoutStep::ShippingAddress);
    }

    #[test]
    fn complete_progress_reaches_place_order() {
        let progress = CheckoutProgress { has_items: true, has_address: true, has_payment_method: true };
        assert_eq!(progress.furthest(), CheckoutStep::PlaceOrder);
        assert_eq!(progress.require(CheckoutStep::PlaceOrder), Ok(()));
    }

    #[test]
    fn redirect_paths() {
        assert_eq!(CheckoutStep::ShippingAddress.path(), "/shipping-address");
        assert_eq!(CheckoutStep::AwaitingCod.path(), "/order");
    }
}
