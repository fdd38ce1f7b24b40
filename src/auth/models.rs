//! Authentication data models

use serde::{Deserialize, Serialize};

/// JWT claims carried by the session cookie
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub display_name: String,
    /// Tag of the server instance that minted the token. Log-only.
    pub instance: String,
    pub iat: usize,
    pub exp: usize,
}

/// Resolved identity of an authenticated caller
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
    pub display_name: String,
}

/// Login payload. `email` also accepts a plain username.
#[derive(Deserialize, Debug, Default)]
pub struct LoginRequest {
    #[serde(default, alias = "username")]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Google access token handed over by the frontend
#[derive(Deserialize, Debug)]
pub struct OAuthTokenPayload {
    #[serde(default)]
    pub access_token: String,
}
