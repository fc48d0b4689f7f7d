//! Cart actions for guests and signed-in users.

use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::Visitor;
use crate::domain::aggregates::{Cart, CartItem, OwnerKey};
use crate::state::AppState;
use crate::{EcommerceError, Result};

/// The visitor's cart, or an unsaved empty one.
pub async fn get_cart(state: &AppState, visitor: &Visitor) -> Result<Cart> {
    let owner = visitor.owner_key()?;
    Ok(state.repos().carts.cart_for(&owner).await?.unwrap_or_else(|| Cart::new(owner)))
}

/// Adds `qty` units of a product. Name, price and image come from the catalog.
pub async fn add_item(state: &AppState, visitor: &Visitor, product_id: Uuid, qty: u32) -> Result<Cart> {
    if qty == 0 {
        return Err(EcommerceError::Validation("Quantity must be at least 1".into()));
    }
    let product = state.repos().products.product_by_id(product_id).await?.ok_or(EcommerceError::NotFound("Product"))?;

    let mut cart = get_cart(state, visitor).await?;
    let item = CartItem {
        product_id,
        slug: product.slug.to_string(),
        name: product.name.clone(),
        image: product.thumbnail().to_string(),
        price: product.price,
        qty,
    };
    cart.add_item(item, product.stock.value())?;
    state.repos().carts.save_cart(&cart).await?;

    info!(cart_id = %cart.id(), owner = %cart.owner(), %product_id, qty, "added to cart");
    Ok(cart)
}

/// Takes one unit of a product out of the cart.
pub async fn remove_item(state: &AppState, visitor: &Visitor, product_id: Uuid) -> Result<Cart> {
    let owner = visitor.owner_key()?;
    let mut cart = state.repos().carts.cart_for(&owner).await?.ok_or(EcommerceError::ItemNotFound)?;
    cart.remove_item(product_id)?;
    state.repos().carts.save_cart(&cart).await?;

    info!(cart_id = %cart.id(), %product_id, "removed from cart");
    Ok(cart)
}

pub async fn clear_cart(state: &AppState, visitor: &Visitor) -> Result<()> {
    let owner = visitor.owner_key()?;
    delete_cart_of(state, &owner).await
}

/// Moves a guest cart to the user who just signed in, replacing any cart
/// the user already had. Returns the claimed cart, if there was one.
pub async fn claim_session_cart(state: &AppState, session_token: &str, user_id: Uuid) -> Result<Option<Cart>> {
    let carts = &state.repos().carts;
    let Some(mut guest) = carts.cart_for(&OwnerKey::Session(session_token.to_string())).await? else {
        return Ok(None);
    };
    let user_owner = OwnerKey::User(user_id);
    if let Some(existing) = carts.cart_for(&user_owner).await? {
        carts.delete_cart(existing.id()).await?;
    }
    guest.reassign(user_owner);
    carts.save_cart(&guest).await?;

    info!(cart_id = %guest.id(), %user_id, "claimed guest cart");
    Ok(Some(guest))
}

/// Drops every cart tied to the visitor so nothing leaks into the next session.
pub async fn sign_out(state: &AppState, visitor: &Visitor) -> Result<()> {
    if let Some(session) = &visitor.session {
        delete_cart_of(state, &session.owner_key()).await?;
    }
    if let Some(token) = &visitor.session_token {
        delete_cart_of(state, &OwnerKey::Session(token.clone())).await?;
    }
    Ok(())
}

async fn delete_cart_of(state: &AppState, owner: &OwnerKey) -> Result<()> {
    if let Some(cart) = state.repos().carts.cart_for(owner).await? {
        state.repos().carts.delete_cart(cart.id()).await?;
        debug!(cart_id = %cart.id(), %owner, "cart deleted");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Session;
    use crate::domain::aggregates::Role;
    use crate::domain::value_objects::Money;
    use crate::services::testing::{harness, seed_product};

    #[tokio::test]
    async fn add_merges_and_prices_from_catalog() {
        let h = harness();
        let product = seed_product(&h.state, "polo-shirt", 2500, 10).await;
        let guest = Visitor::anonymous("tok-1");

        add_item(&h.state, &guest, product.id, 1).await.unwrap();
        let cart = add_item(&h.state, &guest, product.id, 1).await.unwrap();

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].qty, 2);
        assert_eq!(cart.items()[0].image, "/images/polo-shirt.jpg");
        assert_eq!(cart.totals().total_price, Money::from_cents(6400));
        assert_eq!(get_cart(&h.state, &guest).await.unwrap().id(), cart.id());
    }

    #[tokio::test]
    async fn add_checks_live_stock() {
        let h = harness();
        let product = seed_product(&h.state, "rare-item", 1000, 1).await;
        let guest = Visitor::anonymous("tok-1");

        add_item(&h.state, &guest, product.id, 1).await.unwrap();
        let err = add_item(&h.state, &guest, product.id, 1).await.unwrap_err();
        assert!(matches!(err, EcommerceError::OutOfStock { requested: 2, available: 1 }));
    }

    #[tokio::test]
    async fn add_rejects_unknown_product_and_zero_qty() {
        let h = harness();
        let guest = Visitor::anonymous("tok-1");
        assert!(matches!(add_item(&h.state, &guest, Uuid::nil(), 1).await, Err(EcommerceError::NotFound("Product"))));
        let product = seed_product(&h.state, "polo-shirt", 2500, 10).await;
        assert!(matches!(add_item(&h.state, &guest, product.id, 0).await, Err(EcommerceError::Validation(_))));
    }

    #[tokio::test]
    async fn remove_without_cart_is_item_not_found() {
        let h = harness();
        let err = remove_item(&h.state, &Visitor::anonymous("tok-1"), Uuid::nil()).await.unwrap_err();
        assert!(matches!(err, EcommerceError::ItemNotFound));
    }

    #[tokio::test]
    async fn remove_last_unit_leaves_empty_cart() {
        let h = harness();
        let product = seed_product(&h.state, "polo-shirt", 2500, 10).await;
        let guest = Visitor::anonymous("tok-1");
        add_item(&h.state, &guest, product.id, 1).await.unwrap();

        let cart = remove_item(&h.state, &guest, product.id).await.unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.totals().total_price, Money::ZERO);
    }

    #[tokio::test]
    async fn empty_cart_is_not_persisted_by_get() {
        let h = harness();
        let guest = Visitor::anonymous("tok-1");
        let cart = get_cart(&h.state, &guest).await.unwrap();
        assert!(cart.is_empty());
        assert!(h.state.repos().carts.cart_for(cart.owner()).await.unwrap().is_none());
        assert!(matches!(get_cart(&h.state, &Visitor::default()).await, Err(EcommerceError::Unauthorized)));
    }

    #[tokio::test]
    async fn sign_in_claims_guest_cart() {
        let h = harness();
        let product = seed_product(&h.state, "polo-shirt", 2500, 10).await;
        let user_id = Uuid::from_u128(5);
        let user = Visitor::signed_in(Session::new(user_id, Role::Customer));
        add_item(&h.state, &user, product.id, 3).await.unwrap();
        add_item(&h.state, &Visitor::anonymous("tok-1"), product.id, 1).await.unwrap();

        let claimed = claim_session_cart(&h.state, "tok-1", user_id).await.unwrap().unwrap();
        assert_eq!(claimed.owner(), &OwnerKey::User(user_id));

        let cart = get_cart(&h.state, &user).await.unwrap();
        assert_eq!(cart.id(), claimed.id());
        assert_eq!(cart.items()[0].qty, 1);
        assert!(claim_session_cart(&h.state, "tok-1", user_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sign_out_deletes_cart() {
        let h = harness();
        let product = seed_product(&h.state, "polo-shirt", 2500, 10).await;
        let user = Visitor::signed_in(Session::new(Uuid::from_u128(5), Role::Customer));
        add_item(&h.state, &user, product.id, 1).await.unwrap();

        sign_out(&h.state, &user).await.unwrap();
        assert!(get_cart(&h.state, &user).await.unwrap().is_empty());
        clear_cart(&h.state, &user).await.unwrap();
    }
}
