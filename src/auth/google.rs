//! Google access-token verification

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("Token rejected by provider: {0}")]
    Rejected(String),

    #[error("Provider profile missing required fields")]
    MissingFields,

    #[error("Provider email is not verified")]
    UnverifiedEmail,

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

/// Profile returned by a successful verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProfile {
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
}

/// Turns a provider access token into a verified profile.
#[async_trait]
pub trait OAuthVerifier: Send + Sync {
    async fn verify(&self, access_token: &str) -> Result<OAuthProfile, OAuthError>;
}

/// Verifies tokens against Google's OpenID userinfo endpoint.
pub struct GoogleUserInfoVerifier {
    http: Client,
    userinfo_url: String,
}

impl GoogleUserInfoVerifier {
    pub fn new(http: Client, userinfo_url: String) -> Self {
        Self { http, userinfo_url }
    }
}

#[async_trait]
impl OAuthVerifier for GoogleUserInfoVerifier {
    async fn verify(&self, access_token: &str) -> Result<OAuthProfile, OAuthError> {
        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, endpoint = %self.userinfo_url, "HTTP error contacting Google userinfo endpoint");
                OAuthError::Unavailable(e.to_string())
            })?;

        let status = response.status();
        debug!(http_status = %status, "Received response from Google userinfo endpoint");

        if status.is_client_error() {
            warn!(http_status = %status, "Google rejected access token");
            return Err(OAuthError::Rejected(format!("status {}", status.as_u16())));
        }
        if !status.is_success() {
            return Err(OAuthError::Unavailable(format!("status {}", status.as_u16())));
        }

        let body: Value = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse Google userinfo response");
            OAuthError::Unavailable("malformed userinfo response".to_string())
        })?;

        profile_from_userinfo(&body)
    }
}

/// Extracts the fields we need from a userinfo document.
pub fn profile_from_userinfo(body: &Value) -> Result<OAuthProfile, OAuthError> {
    let subject = body.get("sub").and_then(|v| v.as_str()).map(str::to_string);
    let email = body
        .get("email")
        .and_then(|v| v.as_str())
        .map(|e| e.trim().to_lowercase());
    let name = body
        .get("name")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    // Google has served this as both a bool and a string
    let email_verified = match body.get("email_verified") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true",
        _ => false,
    };

    let (subject, email) = match (subject, email) {
        (Some(subject), Some(email)) if !subject.is_empty() && email.contains('@') => {
            (subject, email)
        }
        _ => return Err(OAuthError::MissingFields),
    };

    if !email_verified {
        return Err(OAuthError::UnverifiedEmail);
    }

    Ok(OAuthProfile {
        subject,
        email,
        name,
    })
}
