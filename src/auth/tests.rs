//! Tests for auth module
//!
//! These tests verify core authentication functionality including:
//! - Session token issue and resolution
//! - Cookie parsing and attributes
//! - Google userinfo parsing

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::common::config::{AppConfig, AppEnv};
    use axum::http::{header::COOKIE, HeaderMap, HeaderValue};
    use chrono::Duration;
    use google::{profile_from_userinfo, OAuthError};
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use serde_json::json;
    use session::{CookiePolicy, SameSite, SessionKeys};

    fn identity() -> Identity {
        Identity {
            user_id: 42,
            username: "alice".to_string(),
            display_name: "Alice A".to_string(),
        }
    }

    fn keys() -> SessionKeys {
        SessionKeys::from_config(&AppConfig::for_tests())
    }

    fn cookie_headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_issue_and_resolve_round_trip() {
        let keys = keys();
        let token = keys.issue(&identity()).expect("Failed to issue token");

        assert_eq!(keys.resolve(&token), Some(identity()));
    }

    #[test]
    fn test_claims_carry_instance_tag() {
        let keys = keys();
        let token = keys.issue(&identity()).unwrap();

        let decoded = jsonwebtoken::decode::<models::Claims>(
            &token,
            &jsonwebtoken::DecodingKey::from_secret(b"test_secret_key"),
            &jsonwebtoken::Validation::new(Algorithm::HS256),
        )
        .unwrap();

        assert_eq!(decoded.claims.sub, "42");
        assert_eq!(decoded.claims.instance, keys.instance());
        assert!(decoded.claims.exp > decoded.claims.iat);
    }

    #[test]
    fn test_foreign_secret_is_anonymous() {
        let mut other_config = AppConfig::for_tests();
        other_config.jwt_secret = "another_secret".to_string();
        let other = SessionKeys::from_config(&other_config);

        let token = other.issue(&identity()).unwrap();

        assert_eq!(keys().resolve(&token), None);
        assert_eq!(keys().resolve("not-a-jwt"), None);
        assert_eq!(keys().resolve(""), None);
    }

    #[test]
    fn test_expired_token_is_anonymous() {
        let claims = models::Claims {
            sub: "42".to_string(),
            username: "alice".to_string(),
            display_name: "Alice".to_string(),
            instance: "old".to_string(),
            iat: 1_000,
            exp: 2_000, // Long past
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test_secret_key"),
        )
        .unwrap();

        assert_eq!(keys().resolve(&token), None);
    }

    #[test]
    fn test_non_numeric_subject_is_anonymous() {
        let claims = models::Claims {
            sub: "usr_abc".to_string(),
            username: "alice".to_string(),
            display_name: "Alice".to_string(),
            instance: "x".to_string(),
            iat: 1_000,
            exp: 9_999_999_999,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test_secret_key"),
        )
        .unwrap();

        assert_eq!(keys().resolve(&token), None);
    }

    #[test]
    fn test_token_from_cookie_header() {
        let keys = keys();
        let token = keys.issue(&identity()).unwrap();

        let headers = cookie_headers(&format!("theme=dark; wtd_session={}; other=1", token));
        assert_eq!(keys.token_from_headers(&headers), Some(token.clone()));
        assert_eq!(keys.resolve_headers(&headers), Some(identity()));

        assert_eq!(keys.token_from_headers(&cookie_headers("wtd_session=")), None);
        assert_eq!(keys.token_from_headers(&cookie_headers("wtd_sessionx=abc")), None);
        assert_eq!(keys.resolve_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn test_development_cookie_attributes() {
        let keys = keys();
        let cookie = keys.session_cookie("tok");

        assert!(cookie.starts_with("wtd_session=tok; "));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=86400"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(!cookie.contains("Secure"));

        let cleared = keys.clear_cookie();
        assert!(cleared.starts_with("wtd_session=; "));
        assert!(cleared.contains("Max-Age=0"));
    }

    #[test]
    fn test_production_cookie_policy() {
        let mut config = AppConfig::for_tests();
        config.env = AppEnv::Production;

        let same_site = CookiePolicy::for_config(&config);
        assert!(same_site.secure);
        assert_eq!(same_site.same_site, SameSite::Lax);

        config.cookie_cross_site = true;
        let cross_site = CookiePolicy::for_config(&config);
        assert_eq!(cross_site.same_site, SameSite::None);

        let keys = SessionKeys::new("s", Duration::hours(1), "sid".to_string(), cross_site);
        let cookie = keys.session_cookie("tok");
        assert!(cookie.contains("SameSite=None"));
        assert!(cookie.ends_with("; Secure"));
        assert!(cookie.contains("Max-Age=3600"));
    }

    #[test]
    fn test_cross_site_flag_ignored_in_development() {
        let mut config = AppConfig::for_tests();
        config.cookie_cross_site = true;

        let policy = CookiePolicy::for_config(&config);
        assert!(!policy.secure);
        assert_eq!(policy.same_site, SameSite::Lax);
    }

    #[test]
    fn test_login_request_accepts_username_alias() {
        let by_email: models::LoginRequest =
            serde_json::from_value(json!({"email": "a@b.co", "password": "pw"})).unwrap();
        assert_eq!(by_email.email, "a@b.co");

        let by_username: models::LoginRequest =
            serde_json::from_value(json!({"username": "alice", "password": "pw"})).unwrap();
        assert_eq!(by_username.email, "alice");

        let empty: models::LoginRequest = serde_json::from_value(json!({})).unwrap();
        assert!(empty.email.is_empty() && empty.password.is_empty());
    }

    // ============================================================================
    // Google userinfo
    // ============================================================================

    #[test]
    fn test_profile_from_userinfo() {
        let profile = profile_from_userinfo(&json!({
            "sub": "1234",
            "email": "Alice@Example.com",
            "email_verified": true,
            "name": " Alice A "
        }))
        .unwrap();

        assert_eq!(profile.subject, "1234");
        assert_eq!(profile.email, "alice@example.com");
        assert_eq!(profile.name.as_deref(), Some("Alice A"));
    }

    #[test]
    fn test_profile_from_userinfo_string_verified_flag() {
        let profile = profile_from_userinfo(&json!({
            "sub": "1234",
            "email": "a@example.com",
            "email_verified": "true"
        }))
        .unwrap();

        assert_eq!(profile.name, None);
    }

    #[test]
    fn test_profile_from_userinfo_rejections() {
        let unverified = profile_from_userinfo(&json!({
            "sub": "1", "email": "a@example.com", "email_verified": false
        }));
        assert!(matches!(unverified, Err(OAuthError::UnverifiedEmail)));

        let missing_flag = profile_from_userinfo(&json!({"sub": "1", "email": "a@example.com"}));
        assert!(matches!(missing_flag, Err(OAuthError::UnverifiedEmail)));

        let no_email = profile_from_userinfo(&json!({"sub": "1", "email_verified": true}));
        assert!(matches!(no_email, Err(OAuthError::MissingFields)));

        let no_sub = profile_from_userinfo(&json!({"email": "a@example.com", "email_verified": true}));
        assert!(matches!(no_sub, Err(OAuthError::MissingFields)));
    }
}
