//! Authentication handlers

use axum::{extract::Extension, http::header, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use super::MaybeUser;
use super::google::OAuthError;
use super::models::{LoginRequest, OAuthTokenPayload, RegisterRequest};
use crate::common::validation::require_text;
use crate::common::{safe_email_log, ApiError, ApiJson, AppState, ValidationResult};
use crate::users::models::UserRow;
use crate::users::validators::looks_like_email;

/// Builds the `{ok, user}` body plus a fresh session cookie.
fn session_response(
    state: &AppState,
    row: &UserRow,
) -> Result<impl IntoResponse, ApiError> {
    let cookie = state.sessions.issue_cookie(&row.identity())?;

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "ok": true, "user": row.profile() })),
    ))
}

/// POST /api/register
///
/// `username` may be a plain username or an email address.
pub async fn register(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!("📝 Received registration request");

    let row = state
        .users
        .register(&payload.username, &payload.password)
        .await?;

    info!(user_id = row.id, username = %row.username, "✅ Registration complete");
    session_response(&state, &row)
}

/// POST /api/login
///
/// Accepts an email or a username in the `email` field. Unknown accounts and
/// wrong passwords produce the same error.
pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut validation = ValidationResult::new();
    require_text(
        &mut validation,
        "email",
        Some(payload.email.as_str()),
        "Username or email is required",
    );
    require_text(
        &mut validation,
        "password",
        Some(payload.password.as_str()),
        "Password is required",
    );
    validation.into_result()?;

    let identifier = payload.email.trim();
    let row = if looks_like_email(identifier) {
        info!(email = %safe_email_log(identifier), "🔐 Login attempt by email");
        state
            .users
            .authenticate_by_email(identifier, &payload.password)
            .await?
    } else {
        info!(username = %identifier, "🔐 Login attempt by username");
        state
            .users
            .authenticate_by_username(identifier, &payload.password)
            .await?
    };

    info!(user_id = row.id, "✅ Login successful");
    session_response(&state, &row)
}

/// POST /api/oauth/google
///
/// Verifies a Google access token, then logs in, links or creates the
/// matching account.
pub async fn google_oauth(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(payload): ApiJson<OAuthTokenPayload>,
) -> Result<impl IntoResponse, ApiError> {
    info!("🔐 Received Google OAuth request");

    let token = payload.access_token.trim();
    if token.is_empty() {
        return Err(ApiError::validation("access_token is required"));
    }

    let profile = state.oauth.verify(token).await.map_err(|e| match e {
        OAuthError::Unavailable(reason) => {
            ApiError::InternalServer(format!("google userinfo unavailable: {}", reason))
        }
        other => {
            warn!(error = %other, "Google token verification failed");
            ApiError::Unauthorized("Google authentication failed".to_string())
        }
    })?;

    let row = state
        .users
        .authenticate_or_create_with_oauth(&profile.email, &profile.subject, profile.name.as_deref())
        .await?;

    info!(
        user_id = row.id,
        email = %safe_email_log(&profile.email),
        "✅ Google OAuth login successful"
    );
    session_response(&state, &row)
}

/// POST /api/logout
///
/// Always succeeds and clears the session cookie.
pub async fn logout(
    Extension(state): Extension<Arc<AppState>>,
    MaybeUser(identity): MaybeUser,
) -> impl IntoResponse {
    match identity {
        Some(identity) => info!(user_id = identity.user_id, "👋 User logged out"),
        None => info!("👋 Logout without an active session"),
    }

    (
        [(header::SET_COOKIE, state.sessions.clear_cookie())],
        Json(json!({ "ok": true })),
    )
}
