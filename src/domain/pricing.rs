//! Cart and order totals.
//!
//! Totals are always derived from line items. Nothing here reads a stored
//! total back, so a persisted figure can never drift from its items.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::Money;

/// Orders strictly above this subtotal ship for free.
pub const FREE_SHIPPING_THRESHOLD: Decimal = Decimal::from_parts(100, 0, 0, false, 0);
/// Flat shipping fee charged at or below the threshold.
pub const FLAT_SHIPPING_FEE: Decimal = Decimal::from_parts(1000, 0, 0, false, 2);
/// Sales tax applied to the items subtotal.
pub const TAX_RATE: Decimal = Decimal::from_parts(8, 0, 0, false, 2);

/// Anything with a unit price and a quantity.
pub trait PricedLine {
    fn unit_price(&self) -> Money;
    fn quantity(&self) -> u32;
    fn line_total(&self) -> Money { self.unit_price().multiply(self.quantity()) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSummary {
    pub items_price: Money,
    pub shipping_price: Money,
    pub tax_price: Money,
    pub total_price: Money,
}

pub fn compute_totals<L: PricedLine>(lines: &[L]) -> PriceSummary {
    if lines.is_empty() {
        return PriceSummary::default();
    }

    let items_price: Money = lines.iter().map(PricedLine::line_total).sum();
    let shipping_price = if items_price.amount() > FREE_SHIPPING_THRESHOLD {
        Money::ZERO
    } else {
        Money::new(FLAT_SHIPPING_FEE)
    };
    let tax_price = items_price.scale_by(TAX_RATE);
    let total_price = items_price.add(shipping_price).add(tax_price);

    PriceSummary { items_price, shipping_price, tax_price, total_price }
}
