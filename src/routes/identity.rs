use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};
use uuid::Uuid;

use crate::error::AppError;

/// Header carrying the authenticated viewer, set by the upstream gateway.
pub const VIEWER_HEADER: &str = "x-viewer-id";
/// Header carrying the authenticated content owner.
pub const OWNER_HEADER: &str = "x-owner-id";

/// Viewer identity taken from the `x-viewer-id` header.
#[derive(Debug, Clone, Copy)]
pub struct ViewerId(pub Uuid);

/// Owner identity taken from the `x-owner-id` header.
#[derive(Debug, Clone, Copy)]
pub struct OwnerId(pub Uuid);

impl<S> FromRequestParts<S> for ViewerId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        identity_header(parts, VIEWER_HEADER).map(ViewerId)
    }
}

/// An absent header reads as an anonymous caller; a malformed one is still rejected.
impl<S> OptionalFromRequestParts<S> for ViewerId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        if !parts.headers.contains_key(VIEWER_HEADER) {
            return Ok(None);
        }
        identity_header(parts, VIEWER_HEADER).map(|id| Some(ViewerId(id)))
    }
}

impl<S> FromRequestParts<S> for OwnerId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        identity_header(parts, OWNER_HEADER).map(OwnerId)
    }
}

fn identity_header(parts: &Parts, name: &'static str) -> Result<Uuid, AppError> {
    let value = parts
        .headers
        .get(name)
        .ok_or_else(|| AppError::Unauthorized(format!("missing `{name}` header")))?;

    value
        .to_str()
        .ok()
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
        .ok_or_else(|| AppError::Unauthorized(format!("`{name}` header is not a UUID")))
}
