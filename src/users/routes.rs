// src/users/routes.rs

use crate::users::handlers;
use axum::{
    routing::{get, post},
    Router,
};

pub fn users_routes() -> Router {
    Router::new()
        // Profile
        .route("/api/user/me", get(handlers::me))
        .route("/api/user/setup", post(handlers::setup_profile))
        // Saved / completed sets
        .route("/api/save-itinerary", post(handlers::save_itinerary))
        .route("/api/unsave-itinerary", post(handlers::unsave_itinerary))
        .route("/api/complete-itinerary", post(handlers::complete_itinerary))
        .route(
            "/api/uncomplete-itinerary",
            post(handlers::uncomplete_itinerary),
        )
        .route(
            "/api/my-saved-itineraries",
            get(handlers::my_saved_itineraries),
        )
        .route(
            "/api/my-completed-itineraries",
            get(handlers::my_completed_itineraries),
        )
}
