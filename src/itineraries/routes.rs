// src/itineraries/routes.rs

use crate::itineraries::handlers;
use axum::{
    routing::{get, post},
    Router,
};

pub fn itineraries_routes() -> Router {
    Router::new()
        // Browsing
        .route("/api/itineraries", get(handlers::list_itineraries))
        .route("/api/itineraries/:id", get(handlers::get_itinerary))
        .route("/api/my-itineraries", get(handlers::my_itineraries))
        // Authoring
        .route("/api/create-itinerary", post(handlers::create_itinerary))
        .route("/api/update-itinerary", post(handlers::update_itinerary))
        .route("/api/delete-itinerary", post(handlers::delete_itinerary))
        // Ratings
        .route("/api/give-rating", post(handlers::give_rating))
}
