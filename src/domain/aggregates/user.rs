//! User Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::order::{PaymentMethod, ShippingAddress};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Customer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Customer => "customer", Self::Admin => "admin" }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Role {
    type Err = UserError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "customer" | "user" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            other => Err(UserError::UnknownRole(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub role: Role,
    pub address: Option<ShippingAddress>,
    pub payment_method: Option<PaymentMethod>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>, password_hash: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into().trim().to_lowercase(),
            password_hash,
            role: Role::Customer,
            address: None,
            payment_method: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_admin(&self) -> bool { self.role == Role::Admin }
}

/// Sign-up form.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct Registration {
    #[validate(length(min = 3, message = "Name must be at least 3 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    pub confirm_password: String,
}

impl Registration {
    pub fn passwords_match(&self) -> bool { self.password == self.confirm_password }
}

/// Admin edit of another user.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct UserUpdate {
    #[validate(length(min = 3, message = "Name must be at least 3 characters"))]
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UserError {
    #[error("unknown role: {0}")]
    UnknownRole(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_is_customer() {
        let user = User::new("Jane", " Jane@Example.com ", None);
        assert_eq!(user.role, Role::Customer);
        assert_eq!(user.email, "jane@example.com");
        assert!(!user.is_admin());
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let user = User::new("Jane", "jane@example.com", Some("$argon2id$secret".into()));
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
    }

    #[test]
    fn test_registration_validation() {
        let form = Registration { name: "Jo".into(), email: "nope".into(), password: "123".into(), confirm_password: "123".into() };
        let errors = form.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert!("root".parse::<Role>().is_err());
    }
}
