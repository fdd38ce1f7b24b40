//! Signed session tokens and the cookie that carries them.

use axum::http::{header::COOKIE, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::{debug, error};
use uuid::Uuid;

use super::models::{Claims, Identity};
use crate::common::config::AppConfig;
use crate::common::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Lax,
    None,
}

impl SameSite {
    fn as_str(&self) -> &'static str {
        match self {
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePolicy {
    pub secure: bool,
    pub same_site: SameSite,
}

impl CookiePolicy {
    /// Development cookies stay plain `Lax`. Elsewhere they are `Secure`, and
    /// cross-site sendable only when the frontend lives on another origin.
    pub fn for_config(config: &AppConfig) -> Self {
        if config.env.is_development() {
            return Self {
                secure: false,
                same_site: SameSite::Lax,
            };
        }

        Self {
            secure: true,
            same_site: if config.cookie_cross_site {
                SameSite::None
            } else {
                SameSite::Lax
            },
        }
    }
}

/// Mints and resolves session tokens.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    cookie_name: String,
    policy: CookiePolicy,
    instance: String,
}

impl SessionKeys {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.jwt_secret,
            Duration::hours(config.session_ttl_hours),
            config.session_cookie_name.clone(),
            CookiePolicy::for_config(config),
        )
    }

    pub fn new(secret: &str, ttl: Duration, cookie_name: String, policy: CookiePolicy) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
            cookie_name,
            policy,
            instance: Uuid::new_v4().to_string(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn issue(&self, identity: &Identity) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = Claims {
            sub: identity.user_id.to_string(),
            username: identity.username.clone(),
            display_name: identity.display_name.clone(),
            instance: self.instance.clone(),
            iat: now.timestamp() as usize,
            exp: (now + self.ttl).timestamp() as usize,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            error!(error = %e, user_id = identity.user_id, "JWT encoding error");
            ApiError::InternalServer("jwt error".to_string())
        })?;

        debug!(user_id = identity.user_id, instance = %self.instance, "Session token issued");
        Ok(token)
    }

    /// Anything that does not verify resolves to `None` (anonymous).
    pub fn resolve(&self, token: &str) -> Option<Identity> {
        let decoded = match decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256)) {
            Ok(d) => d,
            Err(e) => {
                debug!(error = %e, "Session token rejected, treating caller as anonymous");
                return None;
            }
        };

        let claims = decoded.claims;
        let user_id = claims.sub.parse::<i64>().ok()?;

        debug!(user_id = user_id, instance = %claims.instance, "Session token resolved");
        Some(Identity {
            user_id,
            username: claims.username,
            display_name: claims.display_name,
        })
    }

    /// Extracts the session token from the request's `Cookie` headers.
    pub fn token_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.cookie_name)
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    pub fn resolve_headers(&self, headers: &HeaderMap) -> Option<Identity> {
        self.token_from_headers(headers)
            .and_then(|token| self.resolve(&token))
    }

    fn cookie_attributes(&self, max_age: i64) -> String {
        let mut attrs = format!(
            "Path=/; HttpOnly; Max-Age={}; SameSite={}",
            max_age,
            self.policy.same_site.as_str()
        );
        if self.policy.secure {
            attrs.push_str("; Secure");
        }
        attrs
    }

    /// `Set-Cookie` value carrying a freshly issued token.
    pub fn session_cookie(&self, token: &str) -> String {
        format!(
            "{}={}; {}",
            self.cookie_name,
            token,
            self.cookie_attributes(self.ttl.num_seconds())
        )
    }

    /// `Set-Cookie` value that removes the session cookie.
    pub fn clear_cookie(&self) -> String {
        format!("{}=; {}", self.cookie_name, self.cookie_attributes(0))
    }

    /// Issues a token for `identity` and wraps it in a `Set-Cookie` value.
    pub fn issue_cookie(&self, identity: &Identity) -> Result<String, ApiError> {
        let token = self.issue(identity)?;
        Ok(self.session_cookie(&token))
    }
}
