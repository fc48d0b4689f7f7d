//! Sign-up, credential checks and profile edits.

use serde::Deserialize;
use tracing::info;
use validator::Validate;

use super::current_user;
use crate::auth::{hash_password, verify_password, Session};
use crate::domain::aggregates::{Registration, User};
use crate::state::AppState;
use crate::{EcommerceError, Result};

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 3, message = "Name must be at least 3 characters"))]
    pub name: String,
}

pub async fn register(state: &AppState, form: Registration) -> Result<User> {
    form.validate()?;
    if !form.passwords_match() {
        return Err(EcommerceError::Validation("Passwords don't match".into()));
    }
    let hash = hash_password(&form.password)?;
    let user = User::new(form.name, form.email, Some(hash));
    state.repos().users.insert_user(&user).await?;

    info!(user_id = %user.id, "user registered");
    Ok(user)
}

/// Checks an email/password pair and returns the session to issue.
pub async fn verify_credentials(state: &AppState, email: &str, password: &str) -> Result<Session> {
    let invalid = || EcommerceError::Validation("Invalid email or password".into());
    let user = state.repos().users.user_by_email(email).await?.ok_or_else(invalid)?;
    match &user.password_hash {
        Some(hash) if verify_password(password, hash) => Ok(Session::new(user.id, user.role)),
        _ => Err(invalid()),
    }
}

pub async fn update_profile(state: &AppState, session: &Session, form: ProfileUpdate) -> Result<User> {
    form.validate()?;
    let mut user = current_user(state, session).await?;
    user.name = form.name;
    state.repos().users.update_user(&user).await?;
    Ok(user)
}
