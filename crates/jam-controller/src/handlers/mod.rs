//! HTTP request handlers.
//!
//! Identity arrives pre-authenticated as a JSON `User` in the `x-jam-user`
//! header; admin checks happen in the actors, not here.

pub mod sessions;
pub mod users;

use crate::errors::JcError;
use crate::models::User;

use axum::http::HeaderMap;

/// Header carrying the authenticated user as JSON.
pub const USER_HEADER: &str = "x-jam-user";

/// Extract the acting user from request headers.
pub fn require_user(headers: &HeaderMap) -> Result<User, JcError> {
    let value = headers
        .get(USER_HEADER)
        .ok_or_else(|| JcError::Forbidden(format!("Missing {USER_HEADER} header")))?;

    let raw = value
        .to_str()
        .map_err(|_| JcError::Forbidden(format!("Invalid {USER_HEADER} header")))?;

    serde_json::from_str(raw)
        .map_err(|_| JcError::Forbidden(format!("Invalid {USER_HEADER} header")))
}
