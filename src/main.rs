// src/main.rs
use axum::{extract::Extension, middleware, routing::get, Json, Router};
use dotenv::dotenv;
use reqwest::Client;
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// MODULE IMPORTS
// ============================================================================

mod auth;
mod common;
mod itineraries;
mod logging_middleware;
mod users;

// ============================================================================
// COMMON IMPORTS
// ============================================================================

use auth::google::GoogleUserInfoVerifier;
use common::config::{apply_cli_override, AppConfig};
use common::AppState;

// ============================================================================
// MAIN APPLICATION ENTRY POINT
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // ========================================================================
    // ENVIRONMENT CONFIGURATION
    // ========================================================================

    let config = apply_cli_override(AppConfig::from_env());
    config.log_summary();

    // ========================================================================
    // DATABASE SETUP
    // ========================================================================

    let pool = common::database::connect(&config.database_url).await?;
    common::migrations::run_migrations(&pool).await?;

    // ========================================================================
    // APPLICATION STATE
    // ========================================================================

    let http_client = Client::builder().no_proxy().build()?;
    let oauth = Arc::new(GoogleUserInfoVerifier::new(
        http_client,
        config.google_userinfo_url.clone(),
    ));

    let port = config.port;
    let state = Arc::new(AppState::new(pool, config, oauth));
    info!(instance = %state.sessions.instance(), "Session keys ready");

    // ========================================================================
    // SERVER STARTUP
    // ========================================================================

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Liveness plus a database round trip
async fn health(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, common::ApiError> {
    sqlx::query("SELECT 1").execute(&state.db).await?;
    Ok(Json(json!({ "ok": true })))
}

// ============================================================================
// ROUTER COMPOSITION
// ============================================================================

fn build_router(state: Arc<AppState>) -> Router {
    let origins: Vec<axum::http::HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    Router::new()
        // ====================================================================
        // AUTHENTICATION ROUTES
        // ====================================================================
        .merge(auth::auth_routes())
        // ====================================================================
        // USER ROUTES (Profile, Saved and Completed Itineraries)
        // ====================================================================
        .merge(users::users_routes())
        // ====================================================================
        // ITINERARY ROUTES (Browse, Author, Rate)
        // ====================================================================
        .merge(itineraries::itineraries_routes())
        .route("/api/health", get(health))
        // ====================================================================
        // MIDDLEWARE AND LAYERS
        // ====================================================================
        // Add request/response body logging in debug mode
        .layer(middleware::from_fn(logging_middleware::log_request_response))
        .layer(Extension(state))
        .layer(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([axum::http::header::CONTENT_TYPE])
                .allow_credentials(true),
        )
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use auth::google::{OAuthError, OAuthProfile, OAuthVerifier};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    /// Accepts `good-token` as a verified Google identity.
    struct FakeGoogle;

    #[async_trait]
    impl OAuthVerifier for FakeGoogle {
        async fn verify(&self, access_token: &str) -> Result<OAuthProfile, OAuthError> {
            if access_token == "good-token" {
                Ok(OAuthProfile {
                    subject: "google-123".to_string(),
                    email: "leah@example.com".to_string(),
                    name: Some("Leah L".to_string()),
                })
            } else {
                Err(OAuthError::Rejected("status 401".to_string()))
            }
        }
    }

    async fn app() -> Router {
        let pool = common::database::test_pool().await;
        let state = AppState::new(pool, AppConfig::for_tests(), Arc::new(FakeGoogle));
        build_router(Arc::new(state))
    }

    struct TestResponse {
        status: StatusCode,
        cookie: Option<String>,
        body: Value,
    }

    async fn send(app: &Router, method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or_default().to_string());
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse { status, cookie, body }
    }

    async fn register(app: &Router, username: &str) -> String {
        let response = send(
            app,
            Method::POST,
            "/api/register",
            None,
            Some(json!({"username": username, "password": "password123"})),
        )
        .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);
        response.cookie.expect("session cookie")
    }

    #[tokio::test]
    async fn test_health() {
        let app = app().await;
        let response = send(&app, Method::GET, "/api/health", None, None).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_register_login_and_me() {
        let app = app().await;
        let cookie = register(&app, "alice").await;
        assert!(cookie.starts_with("wtd_session="));

        let me = send(&app, Method::GET, "/api/user/me", Some(&cookie), None).await;
        assert_eq!(me.status, StatusCode::OK);
        assert_eq!(me.body["user"]["username"], "alice");
        assert!(me.body["user"].get("password").is_none());

        let login = send(
            &app,
            Method::POST,
            "/api/login",
            None,
            Some(json!({"username": "alice", "password": "password123"})),
        )
        .await;
        assert_eq!(login.status, StatusCode::OK);
        assert!(login.cookie.is_some());

        let bad = send(
            &app,
            Method::POST,
            "/api/login",
            None,
            Some(json!({"email": "alice", "password": "nope-nope"})),
        )
        .await;
        assert_eq!(bad.status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            bad.body,
            json!({"ok": false, "errors": ["Invalid username or password"]})
        );
    }

    #[tokio::test]
    async fn test_anonymous_and_forged_sessions_are_rejected() {
        let app = app().await;

        let anonymous = send(&app, Method::GET, "/api/user/me", None, None).await;
        assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
        assert_eq!(anonymous.body["ok"], false);

        let forged = send(&app, Method::GET, "/api/user/me", Some("wtd_session=abc.def.ghi"), None).await;
        assert_eq!(forged.status, StatusCode::UNAUTHORIZED);

        let create = send(
            &app,
            Method::POST,
            "/api/create-itinerary",
            None,
            Some(json!({"title": "t", "description": "d", "duration": "1h", "price": "$"})),
        )
        .await;
        assert_eq!(create.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_body_uses_error_shape() {
        let app = app().await;
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["ok"], false);
        assert!(body["errors"].as_array().map_or(false, |e| !e.is_empty()));
    }

    #[tokio::test]
    async fn test_itinerary_lifecycle() {
        let app = app().await;
        let owner = register(&app, "owner").await;
        let fan = register(&app, "fan").await;

        let created = send(
            &app,
            Method::POST,
            "/api/create-itinerary",
            Some(&owner),
            Some(json!({
                "title": "West Village",
                "description": "Cafes and jazz",
                "duration": "1 day",
                "price": "$$",
                "tags": ["music"],
                "destinations": [{"name": "Blue Note", "lat": 40.73, "lng": -74.0}]
            })),
        )
        .await;
        assert_eq!(created.status, StatusCode::OK, "{}", created.body);
        let id = created.body["itineraryId"].as_i64().unwrap();

        let listed = send(&app, Method::GET, "/api/itineraries", None, None).await;
        assert_eq!(listed.body["itineraries"][0]["tags"], json!(["music"]));
        assert_eq!(listed.body["itineraries"][0]["authorname"], "owner");

        let saved = send(
            &app,
            Method::POST,
            "/api/save-itinerary",
            Some(&fan),
            Some(json!({"saved_itinerary": id.to_string()})),
        )
        .await;
        assert_eq!(saved.body["saved_itineraries"], json!([id]));

        let mine = send(&app, Method::GET, "/api/my-saved-itineraries", Some(&fan), None).await;
        assert_eq!(mine.body["itineraries"][0]["id"], id);

        let rated = send(
            &app,
            Method::POST,
            "/api/give-rating",
            Some(&fan),
            Some(json!({"id": id, "rating": 4})),
        )
        .await;
        assert_eq!(rated.status, StatusCode::OK);
        assert_eq!(rated.body["rating_count"], 1);

        let again = send(
            &app,
            Method::POST,
            "/api/give-rating",
            Some(&fan),
            Some(json!({"id": id, "rating": 5})),
        )
        .await;
        assert_eq!(again.status, StatusCode::CONFLICT);

        let stolen = send(
            &app,
            Method::POST,
            "/api/delete-itinerary",
            Some(&fan),
            Some(json!({"id": id})),
        )
        .await;
        assert_eq!(stolen.status, StatusCode::FORBIDDEN);

        let deleted = send(
            &app,
            Method::POST,
            "/api/delete-itinerary",
            Some(&owner),
            Some(json!({"id": id})),
        )
        .await;
        assert_eq!(deleted.status, StatusCode::OK);
        assert_eq!(deleted.body["deleted"], 1);

        let me = send(&app, Method::GET, "/api/user/me", Some(&fan), None).await;
        assert_eq!(me.body["user"]["saved_itineraries"], json!([]));

        let gone = send(&app, Method::GET, &format!("/api/itineraries/{}", id), None, None).await;
        assert_eq!(gone.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_profile_setup_reissues_cookie() {
        let app = app().await;
        let cookie = register(&app, "mona").await;

        let setup = send(
            &app,
            Method::POST,
            "/api/user/setup",
            Some(&cookie),
            Some(json!({"username": "monaL", "bio": "Loves parks"})),
        )
        .await;
        assert_eq!(setup.status, StatusCode::OK, "{}", setup.body);
        assert_eq!(setup.body["user"]["username"], "monaL");
        let fresh = setup.cookie.expect("re-issued cookie");

        let me = send(&app, Method::GET, "/api/user/me", Some(&fresh), None).await;
        assert_eq!(me.body["user"]["bio"], "Loves parks");
    }

    #[tokio::test]
    async fn test_google_oauth_and_logout() {
        let app = app().await;

        let rejected = send(
            &app,
            Method::POST,
            "/api/oauth/google",
            None,
            Some(json!({"access_token": "bad-token"})),
        )
        .await;
        assert_eq!(rejected.status, StatusCode::UNAUTHORIZED);

        let accepted = send(
            &app,
            Method::POST,
            "/api/oauth/google",
            None,
            Some(json!({"access_token": "good-token"})),
        )
        .await;
        assert_eq!(accepted.status, StatusCode::OK);
        assert_eq!(accepted.body["user"]["email"], "leah@example.com");
        assert_eq!(accepted.body["user"]["display_name"], "Leah L");
        let cookie = accepted.cookie.unwrap();

        let logout = send(&app, Method::POST, "/api/logout", Some(&cookie), None).await;
        assert_eq!(logout.status, StatusCode::OK);
        assert_eq!(logout.cookie.as_deref(), Some("wtd_session="));
    }
}
