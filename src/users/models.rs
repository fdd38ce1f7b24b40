// src/users/models.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::auth::Identity;
use crate::common::helpers::{deserialize_id, parse_id_set};
use crate::common::Patch;

/// Row of the `user` table
#[derive(FromRow, Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub google_sub: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub saved_itineraries: Option<String>,
    pub completed_itineraries: Option<String>,
}

impl UserRow {
    /// Display name, falling back to the username when unset.
    pub fn label(&self) -> String {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(&self.username)
            .to_string()
    }

    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.id,
            username: self.username.clone(),
            display_name: self.label(),
        }
    }

    /// Safe projection returned to clients (no password, no OAuth subject).
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            bio: self.bio.clone(),
            display_name: self.display_name.clone(),
            saved_itineraries: parse_id_set(self.saved_itineraries.as_deref()),
            completed_itineraries: parse_id_set(self.completed_itineraries.as_deref()),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub display_name: Option<String>,
    pub saved_itineraries: Vec<i64>,
    pub completed_itineraries: Vec<i64>,
}

/// Partial profile update.
///
/// Absent or blank fields are left unchanged; an explicit `null` clears
/// `bio` or `display_name`.
#[derive(Deserialize, Debug, Default)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub bio: Patch<String>,
    #[serde(default, alias = "displayName")]
    pub display_name: Patch<String>,
    /// Either a new username or an email address
    #[serde(default, alias = "usernameOrEmail")]
    pub username: Patch<String>,
}

/// Which JSON set column a toggle targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Saved,
    Completed,
}

impl RelationKind {
    pub fn column(&self) -> &'static str {
        match self {
            RelationKind::Saved => "saved_itineraries",
            RelationKind::Completed => "completed_itineraries",
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct SaveItineraryRequest {
    #[serde(deserialize_with = "deserialize_id")]
    pub saved_itinerary: i64,
}

#[derive(Deserialize, Debug)]
pub struct CompleteItineraryRequest {
    #[serde(deserialize_with = "deserialize_id")]
    pub completed_itinerary: i64,
}
