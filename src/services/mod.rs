//! Application services: one async function per storefront action.
//!
//! Every function takes the shared [`AppState`] plus the caller's identity
//! explicitly. Aggregates are loaded from the repositories, mutated through
//! their own methods, and written back; domain events are taken off the
//! aggregate before it is persisted and published afterwards.

use uuid::Uuid;

use crate::auth::Session;
use crate::domain::aggregates::User;
use crate::state::AppState;
use crate::{EcommerceError, Result};

pub mod account;
pub mod admin;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;

/// Loads the signed-in user's profile.
pub(crate) async fn current_user(state: &AppState, session: &Session) -> Result<User> {
    user_by_id(state, session.user_id).await
}

pub(crate) async fn user_by_id(state: &AppState, id: Uuid) -> Result<User> {
    state.repos().users.user_by_id(id).await?.ok_or(EcommerceError::NotFound("User"))
}
