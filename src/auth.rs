//! Caller identity.
//!
//! Authentication itself happens upstream; this module only models the
//! session it hands us and the checks services run against it.

use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{OwnerKey, Role};
use crate::{EcommerceError, Result};

/// A signed-in user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user_id: Uuid,
    pub role: Role,
}

impl Session {
    pub fn new(user_id: Uuid, role: Role) -> Self { Self { user_id, role } }
    pub fn is_admin(&self) -> bool { self.role == Role::Admin }
    pub fn owner_key(&self) -> OwnerKey { OwnerKey::User(self.user_id) }
}

pub fn require_admin(session: &Session) -> Result<()> {
    if session.is_admin() { Ok(()) } else { Err(EcommerceError::Forbidden) }
}

/// Whoever is making a request: possibly signed in, possibly carrying an
/// anonymous session token, possibly neither.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Visitor {
    pub session: Option<Session>,
    pub session_token: Option<String>,
}

impl Visitor {
    pub fn signed_in(session: Session) -> Self { Self { session: Some(session), session_token: None } }

    pub fn anonymous(token: impl Into<String>) -> Self { Self { session: None, session_token: Some(token.into()) } }

    pub fn session(&self) -> Result<&Session> { self.session.as_ref().ok_or(EcommerceError::Unauthorized) }

    /// Signed-in users own their cart by id; guests by session token.
    pub fn owner_key(&self) -> Result<OwnerKey> {
        match (&self.session, &self.session_token) {
            (Some(session), _) => Ok(session.owner_key()),
            (None, Some(token)) => Ok(OwnerKey::Session(token.clone())),
            (None, None) => Err(EcommerceError::Unauthorized),
        }
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    use argon2::password_hash::rand_core::OsRng;
    use argon2::password_hash::SaltString;
    use argon2::{Argon2, PasswordHasher};

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| EcommerceError::Validation(format!("could not hash password: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}
