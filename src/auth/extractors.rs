//! Authentication extractors for Axum

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::request::Parts,
};
use std::sync::Arc;
use tracing::debug;

use super::models::Identity;
use crate::common::{ApiError, AppState};

async fn resolve_identity<S>(parts: &mut Parts, state: &S) -> Result<Option<Identity>, ApiError>
where
    S: Send + Sync,
{
    let Extension(app_state): Extension<Arc<AppState>> =
        Extension::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;

    Ok(app_state.sessions.resolve_headers(&parts.headers))
}

/// Caller identity when a valid session cookie is present, anonymous otherwise.
///
/// Never rejects; handlers decide whether anonymity is acceptable.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Identity>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(resolve_identity(parts, state).await?))
    }
}

/// Authenticated user extractor
///
/// Rejects anonymous callers with 401.
#[derive(Debug, Clone)]
pub struct AuthedUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match resolve_identity(parts, state).await? {
            Some(identity) => Ok(AuthedUser(identity)),
            None => {
                debug!(path = %parts.uri.path(), "Anonymous caller rejected");
                Err(ApiError::Unauthorized("Not logged in".into()))
            }
        }
    }
}

impl std::ops::Deref for AuthedUser {
    type Target = Identity;

    fn deref(&self) -> &Identity {
        &self.0
    }
}
