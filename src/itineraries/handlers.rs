// src/itineraries/handlers.rs
//! Itinerary HTTP handlers

use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use super::models::{DeleteItineraryRequest, ItineraryFields, RatingRequest, UpdateItineraryRequest};
use crate::auth::AuthedUser;
use crate::common::{ApiError, ApiJson, AppState};

/// All itineraries. Public.
pub async fn list_itineraries(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let itineraries = state.itineraries.list().await?;

    Ok(Json(json!({ "ok": true, "itineraries": itineraries })))
}

pub async fn get_itinerary(
    Extension(state): Extension<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = raw_id
        .trim()
        .parse::<i64>()
        .map_err(|_| ApiError::validation("id must be an integer"))?;
    let itinerary = state.itineraries.get(id).await?;

    Ok(Json(json!({ "ok": true, "itinerary": itinerary })))
}

pub async fn create_itinerary(
    Extension(state): Extension<Arc<AppState>>,
    authed: AuthedUser,
    ApiJson(payload): ApiJson<ItineraryFields>,
) -> Result<impl IntoResponse, ApiError> {
    let id = state.itineraries.create(authed.user_id, payload).await?;

    Ok(Json(json!({ "ok": true, "itineraryId": id })))
}

/// Itineraries written by the caller, newest first
pub async fn my_itineraries(
    Extension(state): Extension<Arc<AppState>>,
    authed: AuthedUser,
) -> Result<impl IntoResponse, ApiError> {
    let itineraries = state.itineraries.list_by_author(authed.user_id).await?;

    Ok(Json(json!({ "ok": true, "itineraries": itineraries })))
}

pub async fn update_itinerary(
    Extension(state): Extension<Arc<AppState>>,
    authed: AuthedUser,
    ApiJson(payload): ApiJson<UpdateItineraryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = state.itineraries.update(authed.user_id, payload).await?;

    Ok(Json(json!({ "ok": true, "itineraryId": id })))
}

/// One rating per user per itinerary
pub async fn give_rating(
    Extension(state): Extension<Arc<AppState>>,
    authed: AuthedUser,
    ApiJson(payload): ApiJson<RatingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .itineraries
        .rate_once(authed.user_id, payload.id, payload.rating)
        .await?;

    Ok(Json(json!({
        "ok": true,
        "rating": summary.rating,
        "rating_count": summary.rating_count,
        "total_rating": summary.total_rating,
    })))
}

pub async fn delete_itinerary(
    Extension(state): Extension<Arc<AppState>>,
    authed: AuthedUser,
    ApiJson(payload): ApiJson<DeleteItineraryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.itineraries.delete(authed.user_id, payload.id).await?;

    info!(itinerary_id = payload.id, user_id = authed.user_id, "Delete request served");

    Ok(Json(json!({ "ok": true, "deleted": deleted })))
}
