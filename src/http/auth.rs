//! Caller identity.
//!
//! Authentication happens upstream; requests arrive with the user id either
//! as `Authorization: Bearer <uuid>` or in `X-User-Id`.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use super::error::ApiError;
use crate::domain::value_objects::UserId;

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrentUser(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = if let Some(value) = parts.headers.get(AUTHORIZATION) {
            let value = value.to_str().map_err(|_| unauthorized("malformed authorization header"))?;
            value.strip_prefix("Bearer ").ok_or_else(|| unauthorized("expected a bearer token"))?.trim()
        } else if let Some(value) = parts.headers.get(USER_ID_HEADER) {
            value.to_str().map_err(|_| unauthorized("malformed user id header"))?.trim()
        } else {
            return Err(unauthorized("missing credentials"));
        };
        raw.parse::<UserId>().map(CurrentUser).map_err(|_| unauthorized("invalid user id"))
    }
}

fn unauthorized(reason: &str) -> ApiError { ApiError::Unauthorized(reason.to_string()) }
