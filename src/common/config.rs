// src/common/config.rs
//! Runtime configuration read from the environment (and `.env`).

use std::env;
use tracing::{info, warn};

pub const DEFAULT_JWT_SECRET: &str = "replace_with_strong_secret";
pub const DEFAULT_GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
pub const MIN_BCRYPT_COST: u32 = 4;

/// Deployment flavour. Controls cookie hardening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "production" | "prod" => AppEnv::Production,
            _ => AppEnv::Development,
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, AppEnv::Development)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: AppEnv,
    pub database_url: String,
    pub jwt_secret: String,
    pub session_cookie_name: String,
    pub session_ttl_hours: i64,
    pub cookie_cross_site: bool,
    pub cors_origins: Vec<String>,
    pub google_userinfo_url: String,
    pub bcrypt_cost: u32,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let env = AppEnv::parse(&env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()));

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://whattodo.db".to_string());

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| DEFAULT_JWT_SECRET.to_string());

        let session_cookie_name =
            env::var("SESSION_COOKIE_NAME").unwrap_or_else(|_| "wtd_session".to_string());

        let session_ttl_hours = env::var("SESSION_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|h| *h > 0)
            .unwrap_or(24);

        let cookie_cross_site = env::var("COOKIE_CROSS_SITE")
            .unwrap_or_else(|_| "false".to_string())
            .to_lowercase()
            == "true";

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let google_userinfo_url = env::var("GOOGLE_USERINFO_URL")
            .unwrap_or_else(|_| DEFAULT_GOOGLE_USERINFO_URL.to_string());

        let bcrypt_cost = env::var("BCRYPT_COST")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|c| (MIN_BCRYPT_COST..=31).contains(c))
            .unwrap_or(bcrypt::DEFAULT_COST);

        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(8080);

        Self {
            env,
            database_url,
            jwt_secret,
            session_cookie_name,
            session_ttl_hours,
            cookie_cross_site,
            cors_origins,
            google_userinfo_url,
            bcrypt_cost,
            port,
        }
    }

    /// Emit the effective configuration. Secrets are never logged.
    pub fn log_summary(&self) {
        info!(
            env = ?self.env,
            database_url = %self.database_url,
            cookie = %self.session_cookie_name,
            ttl_hours = self.session_ttl_hours,
            cross_site = self.cookie_cross_site,
            cors_origins = ?self.cors_origins,
            "Configuration loaded"
        );
        if !self.env.is_development() && self.jwt_secret == DEFAULT_JWT_SECRET {
            warn!("JWT_SECRET is unset in production; sessions are signed with the default secret");
        }
    }
}

/// CLI argument parsing for the environment flag
pub fn parse_env_args() -> Option<AppEnv> {
    for arg in env::args() {
        match arg.as_str() {
            "--dev" | "--development" => return Some(AppEnv::Development),
            "--prod" | "--production" => return Some(AppEnv::Production),
            _ => {}
        }
    }

    None
}

/// Override the environment from CLI args
pub fn apply_cli_override(mut config: AppConfig) -> AppConfig {
    if let Some(cli_env) = parse_env_args() {
        info!(env = ?cli_env, "CLI override for APP_ENV");
        config.env = cli_env;
    }

    config
}

#[cfg(test)]
impl AppConfig {
    pub fn for_tests() -> Self {
        Self {
            env: AppEnv::Development,
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "test_secret_key".to_string(),
            session_cookie_name: "wtd_session".to_string(),
            session_ttl_hours: 24,
            cookie_cross_site: false,
            cors_origins: Vec::new(),
            google_userinfo_url: DEFAULT_GOOGLE_USERINFO_URL.to_string(),
            bcrypt_cost: MIN_BCRYPT_COST,
            port: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_env_parsing() {
        assert_eq!(AppEnv::parse("production"), AppEnv::Production);
        assert_eq!(AppEnv::parse(" PROD "), AppEnv::Production);
        assert_eq!(AppEnv::parse("development"), AppEnv::Development);
        assert_eq!(AppEnv::parse("staging"), AppEnv::Development);
        assert!(AppEnv::parse("").is_development());
    }
}
