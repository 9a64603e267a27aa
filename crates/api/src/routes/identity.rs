//! Caller identity taken from request headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::{SessionId, UserId};
use domain::AppError;
use service::CartOwner;

use crate::error::ApiError;

/// Header carrying an authenticated user's ID.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying an anonymous session's ID.
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// The cart owner of a request.
///
/// A non-empty `X-User-Id` selects the user's cart; otherwise a non-empty
/// `X-Session-Id` selects the guest cart. A request with neither is rejected
/// with `invalid_request`.
#[derive(Debug, Clone)]
pub struct Identity(pub CartOwner);

fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, ApiError> {
    match parts.headers.get(name) {
        None => Ok(None),
        Some(value) => {
            let value = value.to_str().map_err(|_| {
                ApiError(AppError::invalid_request(format!("{name} header is not valid text")))
            })?;
            let value = value.trim();
            Ok((!value.is_empty()).then_some(value))
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user_id) = header(parts, USER_ID_HEADER)? {
            return Ok(Identity(CartOwner::User(UserId::new(user_id))));
        }
        if let Some(session_id) = header(parts, SESSION_ID_HEADER)? {
            return Ok(Identity(CartOwner::Guest(SessionId::new(session_id))));
        }
        Err(ApiError(AppError::invalid_request(
            "X-User-Id or X-Session-Id header is required",
        )))
    }
}
