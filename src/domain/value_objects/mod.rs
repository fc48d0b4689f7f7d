//! Value Objects for the storefront

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// URL slug value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    pub const MIN_LEN: usize = 3;
    pub const MAX_LEN: usize = 120;

    pub fn new(value: impl Into<String>) -> Result<Self, SlugError> {
        let value = value.into().trim().to_lowercase();
        if value.len() < Self::MIN_LEN { return Err(SlugError::TooShort); }
        if value.len() > Self::MAX_LEN { return Err(SlugError::TooLong); }
        if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(SlugError::InvalidCharacter);
        }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for Slug {
    type Error = SlugError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self { slug.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlugError {
    #[error("slug must be at least 3 characters")]
    TooShort,
    #[error("slug too long")]
    TooLong,
    #[error("slug may only contain letters, digits and '-'")]
    InvalidCharacter,
}

/// Money value object.
///
/// Always held at two decimal places; serialized as a string so the
/// JSON boundary never goes through a float.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::from_parts(0, 0, 0, false, 2));

    pub fn new(amount: Decimal) -> Self { Self(round_cents(amount)) }
    pub fn from_cents(cents: i64) -> Self { Self(Decimal::new(cents, 2)) }
    pub fn amount(&self) -> Decimal { self.0 }
    pub fn is_zero(&self) -> bool { self.0.is_zero() }
    pub fn add(&self, other: Money) -> Money { Money::new(self.0 + other.0) }
    pub fn multiply(&self, qty: u32) -> Money { Money::new(self.0 * Decimal::from(qty)) }
    pub fn scale_by(&self, rate: Decimal) -> Money { Money::new(self.0 * rate) }

    /// Whole number of cents, as payment processors expect.
    pub fn to_cents(&self) -> i64 {
        let cents = self.0 * Decimal::ONE_HUNDRED;
        i64::try_from(cents.trunc()).unwrap_or(i64::MAX)
    }

    /// Accepts amounts with at most two decimal places, rejecting negatives.
    pub fn parse_price(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() { return Err(MoneyError::Negative); }
        if amount.normalize().scale() > 2 { return Err(MoneyError::TooPrecise); }
        Ok(Self::new(amount))
    }
}

impl Default for Money {
    fn default() -> Self { Self::ZERO }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:.2}", self.0) }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc.add(m))
    }
}

fn round_cents(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("amount must not be negative")]
    Negative,
    #[error("amount must have at most two decimal places")]
    TooPrecise,
}

/// Quantity value object
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self { Self(value) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn saturating_sub(&self, other: u32) -> Self { Self(self.0.saturating_sub(other)) }
}
