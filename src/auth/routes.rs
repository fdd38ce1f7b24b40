//! Authentication routes

use axum::{routing::post, Router};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `POST /api/register` - Create a local account
/// - `POST /api/login` - Password login by email or username
/// - `POST /api/oauth/google` - Google access-token login
/// - `POST /api/logout` - Clear the session cookie
pub fn auth_routes() -> Router {
    Router::new()
        .route("/api/register", post(handlers::register))
        .route("/api/login", post(handlers::login))
        .route("/api/oauth/google", post(handlers::google_oauth))
        .route("/api/logout", post(handlers::logout))
}
