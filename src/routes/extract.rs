//! Request extractors.
//!
//! Identity comes from headers set by the upstream auth proxy. Body, path
//! and query wrappers reject with [`EcommerceError`] so malformed input gets
//! the same JSON error body as every other failure.

use axum::async_trait;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use uuid::Uuid;

use crate::auth::{Session, Visitor};
use crate::domain::aggregates::Role;
use crate::EcommerceError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const SESSION_TOKEN_HEADER: &str = "x-session-token";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim).filter(|v| !v.is_empty())
}

fn visitor_from(headers: &HeaderMap) -> Result<Visitor, EcommerceError> {
    let session = match header(headers, USER_ID_HEADER) {
        Some(raw) => {
            let user_id = Uuid::parse_str(raw).map_err(|_| EcommerceError::Unauthorized)?;
            let role = match header(headers, USER_ROLE_HEADER) {
                Some(role) => role.parse::<Role>().map_err(|_| EcommerceError::Unauthorized)?,
                None => Role::Customer,
            };
            Some(Session::new(user_id, role))
        }
        None => None,
    };
    Ok(Visitor { session, session_token: header(headers, SESSION_TOKEN_HEADER).map(str::to_string) })
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Visitor {
    type Rejection = EcommerceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        visitor_from(&parts.headers)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = EcommerceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        visitor_from(&parts.headers)?.session.ok_or(EcommerceError::Unauthorized)
    }
}

/// JSON body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(EcommerceError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(EcommerceError))]
pub struct ApiPath<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(EcommerceError))]
pub struct ApiQuery<T>(pub T);

impl From<JsonRejection> for EcommerceError {
    fn from(rejection: JsonRejection) -> Self { Self::Validation(rejection.body_text()) }
}

impl From<PathRejection> for EcommerceError {
    fn from(rejection: PathRejection) -> Self { Self::Validation(rejection.body_text()) }
}

impl From<QueryRejection> for EcommerceError {
    fn from(rejection: QueryRejection) -> Self { Self::Validation(rejection.body_text()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn parses_signed_in_admin() {
        let mut headers = HeaderMap::new();
        let id = Uuid::from_u128(9);
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());
        headers.insert(USER_ROLE_HEADER, HeaderValue::from_static("admin"));
        let visitor = visitor_from(&headers).unwrap();
        assert_eq!(visitor.session, Some(Session::new(id, Role::Admin)));
        assert_eq!(visitor.session_token, None);
    }

    #[test]
    fn guest_and_garbage() {
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_TOKEN_HEADER, HeaderValue::from_static("tok"));
        assert_eq!(visitor_from(&headers).unwrap(), Visitor::anonymous("tok"));

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert!(matches!(visitor_from(&headers), Err(EcommerceError::Unauthorized)));
    }
}
