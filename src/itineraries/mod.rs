// src/itineraries/mod.rs

pub mod handlers;
pub mod models;
pub mod routes;
pub mod store;
pub mod validators;


pub use routes::itineraries_routes;
pub use store::ItineraryStore;
