//! Acting principal extractor.
//!
//! Authentication happens in front of this service; the authenticated
//! principal id arrives in the `x-principal-id` header.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;

pub const PRINCIPAL_HEADER: &str = "x-principal-id";

/// Id of the principal performing the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActingPrincipal(pub u64);

impl<S> FromRequestParts<S> for ActingPrincipal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(PRINCIPAL_HEADER)
            .ok_or_else(|| ApiError::unauthenticated("Authentication required"))?;

        let id = value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .ok_or_else(|| {
                ApiError::unauthenticated(format!("Invalid {PRINCIPAL_HEADER} header"))
            })?;

        Ok(Self(id))
    }
}
