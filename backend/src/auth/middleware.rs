//! Bearer token extraction
//!
//! Protected routes take a [`Bearer`] extractor and hand the raw token to
//! `AuthService::verify_session`, which resolves it to a full principal
//! record. The extractor itself only peels the Authorization header.

use crate::error::ApiError;
use axum::http::{header::AUTHORIZATION, request::Parts};

/// Raw bearer token pulled from the Authorization header.
#[derive(Debug, Clone)]
pub struct Bearer(pub String);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for Bearer
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("Invalid authorization format".to_string()))?;

        Ok(Bearer(token.to_string()))
    }
}
