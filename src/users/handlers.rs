// src/users/handlers.rs
//! Profile and saved/completed itinerary handlers

use axum::{extract::Extension, http::header, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use super::models::{CompleteItineraryRequest, SaveItineraryRequest, UpdateProfileRequest};
use crate::auth::AuthedUser;
use crate::common::helpers::parse_id_set;
use crate::common::{ApiError, ApiJson, AppState};

/// Current user's profile
pub async fn me(
    Extension(state): Extension<Arc<AppState>>,
    authed: AuthedUser,
) -> Result<impl IntoResponse, ApiError> {
    let row = state.users.get_profile(authed.user_id).await?;

    Ok(Json(json!({ "ok": true, "user": row.profile() })))
}

/// Partial profile update. Re-issues the session so the cookie carries the
/// new username and display name.
pub async fn setup_profile(
    Extension(state): Extension<Arc<AppState>>,
    authed: AuthedUser,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state.users.update_profile(authed.user_id, payload).await?;
    let cookie = state.sessions.issue_cookie(&row.identity())?;

    info!(user_id = row.id, username = %row.username, "Profile setup complete");

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "ok": true, "user": row.profile() })),
    ))
}

pub async fn save_itinerary(
    Extension(state): Extension<Arc<AppState>>,
    authed: AuthedUser,
    ApiJson(payload): ApiJson<SaveItineraryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let saved = state
        .users
        .toggle_saved(authed.user_id, payload.saved_itinerary, true)
        .await?;

    Ok(Json(json!({ "ok": true, "saved_itineraries": saved })))
}

pub async fn unsave_itinerary(
    Extension(state): Extension<Arc<AppState>>,
    authed: AuthedUser,
    ApiJson(payload): ApiJson<SaveItineraryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let saved = state
        .users
        .toggle_saved(authed.user_id, payload.saved_itinerary, false)
        .await?;

    Ok(Json(json!({ "ok": true, "saved_itineraries": saved })))
}

pub async fn complete_itinerary(
    Extension(state): Extension<Arc<AppState>>,
    authed: AuthedUser,
    ApiJson(payload): ApiJson<CompleteItineraryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let completed = state
        .users
        .toggle_completed(authed.user_id, payload.completed_itinerary, true)
        .await?;

    Ok(Json(json!({ "ok": true, "completed_itineraries": completed })))
}

pub async fn uncomplete_itinerary(
    Extension(state): Extension<Arc<AppState>>,
    authed: AuthedUser,
    ApiJson(payload): ApiJson<CompleteItineraryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let completed = state
        .users
        .toggle_completed(authed.user_id, payload.completed_itinerary, false)
        .await?;

    Ok(Json(json!({ "ok": true, "completed_itineraries": completed })))
}

/// Saved set resolved into full itinerary records
pub async fn my_saved_itineraries(
    Extension(state): Extension<Arc<AppState>>,
    authed: AuthedUser,
) -> Result<impl IntoResponse, ApiError> {
    let row = state.users.get_profile(authed.user_id).await?;
    let ids = parse_id_set(row.saved_itineraries.as_deref());
    let itineraries = state.itineraries.list_by_ids(&ids).await?;

    Ok(Json(json!({ "ok": true, "itineraries": itineraries })))
}

/// Completed set resolved into full itinerary records
pub async fn my_completed_itineraries(
    Extension(state): Extension<Arc<AppState>>,
    authed: AuthedUser,
) -> Result<impl IntoResponse, ApiError> {
    let row = state.users.get_profile(authed.user_id).await?;
    let ids = parse_id_set(row.completed_itineraries.as_deref());
    let itineraries = state.itineraries.list_by_ids(&ids).await?;

    Ok(Json(json!({ "ok": true, "itineraries": itineraries })))
}
