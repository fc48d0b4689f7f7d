//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::pricing::{compute_totals, PriceSummary, PricedLine};
use crate::domain::value_objects::Money;

/// Whoever a cart belongs to: a signed-in user or an anonymous browser session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum OwnerKey {
    User(Uuid),
    Session(String),
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Session(token) => write!(f, "session:{token}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: Uuid,
    pub slug: String,
    pub name: String,
    pub image: String,
    pub price: Money,
    pub qty: u32,
}

impl PricedLine for CartItem {
    fn unit_price(&self) -> Money { self.price }
    fn quantity(&self) -> u32 { self.qty }
}

#[derive(Clone, Debug, Serialize)]
pub struct Cart {
    id: Uuid,
    owner: OwnerKey,
    items: Vec<CartItem>,
    #[serde(flatten)]
    totals: PriceSummary,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(owner: OwnerKey) -> Self {
        let now = Utc::now();
        Self { id: Uuid::new_v4(), owner, items: vec![], totals: PriceSummary::default(), created_at: now, updated_at: now }
    }

    /// Rebuilds a persisted cart. Totals are recomputed, never read back.
    pub fn restore(id: Uuid, owner: OwnerKey, items: Vec<CartItem>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        let totals = compute_totals(&items);
        Self { id, owner, items, totals, created_at, updated_at }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn owner(&self) -> &OwnerKey { &self.owner }
    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn totals(&self) -> &PriceSummary { &self.totals }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn item(&self, product_id: Uuid) -> Option<&CartItem> { self.items.iter().find(|i| i.product_id == product_id) }

    /// Merges `item` into the cart. `available` is the product's stock as of now.
    pub fn add_item(&mut self, item: CartItem, available: u32) -> Result<(), CartError> {
        if item.qty == 0 { return Err(CartError::InvalidQuantity); }

        let existing = self.item(item.product_id).map_or(0, |i| i.qty);
        let requested = existing.saturating_add(item.qty);
        if requested > available {
            return Err(CartError::OutOfStock { product_id: item.product_id, requested, available });
        }

        if let Some(line) = self.items.iter_mut().find(|i| i.product_id == item.product_id) {
            line.qty = requested;
        } else {
            self.items.push(item);
        }
        self.recalculate();
        Ok(())
    }

    /// Takes one unit off a line, dropping the line when it reaches zero.
    pub fn remove_item(&mut self, product_id: Uuid) -> Result<(), CartError> {
        let pos = self.items.iter().position(|i| i.product_id == product_id).ok_or(CartError::ItemNotFound(product_id))?;
        if self.items[pos].qty <= 1 {
            self.items.remove(pos);
        } else {
            self.items[pos].qty -= 1;
        }
        self.recalculate();
        Ok(())
    }

    /// Hands the cart to a new owner, e.g. when a guest signs in.
    pub fn reassign(&mut self, owner: OwnerKey) { self.owner = owner; self.touch(); }

    fn recalculate(&mut self) {
        self.totals = compute_totals(&self.items);
        self.touch();
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("item {0} is not in the cart")]
    ItemNotFound(Uuid),
    #[error("not enough stock: requested {requested}, {available} available")]
    OutOfStock { product_id: Uuid, requested: u32, available: u32 },
    #[error("quantity must be at least 1")]
    InvalidQuantity,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget(qty: u32) -> CartItem {
        CartItem {
            product_id: Uuid::from_u128(1),
            slug: "widget".into(),
            name: "Widget".into(),
            image: "/images/widget.jpg".into(),
            price: Money::from_cents(2500),
            qty,
        }
    }

    #[test]
    fn test_cart_operations() {
        let mut cart = Cart::new(OwnerKey::Session("abc".into()));
        cart.add_item(widget(2), 10).unwrap();
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.totals().items_price, Money::from_cents(5000));
        cart.add_item(widget(1), 10).unwrap();
        assert_eq!(cart.items()[0].qty, 3); // Merged
        assert_eq!(cart.totals().total_price, Money::from_cents(7500 + 1000 + 600));
    }

    #[test]
    fn test_out_of_stock_counts_existing_qty() {
        let mut cart = Cart::new(OwnerKey::Session("abc".into()));
        cart.add_item(widget(2), 3).unwrap();
        let err = cart.add_item(widget(2), 3).unwrap_err();
        assert_eq!(err, CartError::OutOfStock { product_id: Uuid::from_u128(1), requested: 4, available: 3 });
        assert_eq!(cart.items()[0].qty, 2);
    }

    #[test]
    fn test_add_then_remove_restores_cart() {
        let mut cart = Cart::new(OwnerKey::User(Uuid::from_u128(9)));
        cart.add_item(widget(2), 10).unwrap();
        let items_before = cart.items().to_vec();
        let totals_before = *cart.totals();

        cart.add_item(widget(1), 10).unwrap();
        cart.remove_item(Uuid::from_u128(1)).unwrap();

        assert_eq!(cart.items(), items_before.as_slice());
        assert_eq!(cart.totals(), &totals_before);
    }

    #[test]
    fn test_remove_last_unit_drops_line() {
        let mut cart = Cart::new(OwnerKey::Session("abc".into()));
        cart.add_item(widget(1), 10).unwrap();
        cart.remove_item(Uuid::from_u128(1)).unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.totals(), &PriceSummary::default());
        assert_eq!(cart.remove_item(Uuid::from_u128(1)), Err(CartError::ItemNotFound(Uuid::from_u128(1))));
    }

    #[test]
    fn test_zero_qty_rejected() {
        let mut cart = Cart::new(OwnerKey::Session("abc".into()));
        assert_eq!(cart.add_item(widget(0), 10), Err(CartError::InvalidQuantity));
    }
}
