// src/itineraries/models.rs

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use crate::common::helpers::{deserialize_id, parse_json_array};

/// Row of the `itineraries` table
#[derive(FromRow, Debug, Clone)]
pub struct ItineraryRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub tags: Option<String>,
    pub duration: Option<String>,
    pub price: Option<String>,
    pub authorid: Option<i64>,
    pub authorname: Option<String>,
    pub rating: Option<f64>,
    pub rating_count: Option<i64>,
    pub total_rating: Option<f64>,
    pub destinations: Option<String>,
}

/// Itinerary as returned to clients, with JSON columns decoded.
#[derive(Serialize, Debug, Clone)]
pub struct Itinerary {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub tags: Vec<Value>,
    pub duration: Option<String>,
    pub price: Option<String>,
    pub authorid: Option<i64>,
    /// Author label captured when the itinerary was created. Later profile
    /// edits do not rewrite it.
    pub authorname: Option<String>,
    pub rating: f64,
    pub rating_count: i64,
    pub total_rating: f64,
    pub destinations: Vec<Value>,
}

impl From<ItineraryRow> for Itinerary {
    fn from(row: ItineraryRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            tags: parse_json_array(row.tags.as_deref()),
            duration: row.duration,
            price: row.price,
            authorid: row.authorid,
            authorname: row.authorname,
            rating: row.rating.unwrap_or(0.0),
            rating_count: row.rating_count.unwrap_or(0),
            total_rating: row.total_rating.unwrap_or(0.0),
            destinations: parse_json_array(row.destinations.as_deref()),
        }
    }
}

/// One stop of an itinerary. Frontend variants send either `address` or
/// `notes`, and either `category` or `types`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Destination {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

/// Editable itinerary content. Used as-is for create and flattened into the
/// update payload.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ItineraryFields {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub destinations: Option<Vec<Destination>>,
}

impl ItineraryFields {
    /// Trimmed tags with blanks and duplicates removed.
    pub fn normalized_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        for tag in self.tags.iter().flatten() {
            let tag = tag.trim();
            if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }
        tags
    }

    pub fn encoded_tags(&self) -> String {
        serde_json::to_string(&self.normalized_tags()).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn encoded_destinations(&self) -> String {
        let destinations = self.destinations.as_deref().unwrap_or_default();
        serde_json::to_string(destinations).unwrap_or_else(|_| "[]".to_string())
    }

    /// Trimmed value of a required text field. Only call after validation.
    pub fn text(value: &Option<String>) -> String {
        value.as_deref().map(str::trim).unwrap_or_default().to_string()
    }
}

/// Full replacement of an itinerary.
///
/// `rating_count` and `total_rating` are optional; when sent they must
/// describe a consistent aggregate and `rating` is recomputed from them.
/// A client-supplied `rating` is ignored.
#[derive(Deserialize, Debug, Clone)]
pub struct UpdateItineraryRequest {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: i64,
    #[serde(flatten)]
    pub fields: ItineraryFields,
    #[serde(default)]
    pub rating_count: Option<i64>,
    #[serde(default)]
    pub total_rating: Option<f64>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RatingRequest {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: i64,
    #[serde(deserialize_with = "deserialize_stars")]
    pub rating: f64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DeleteItineraryRequest {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: i64,
}

/// Aggregate after a rating is applied
#[derive(FromRow, Serialize, Debug, Clone, PartialEq)]
pub struct RatingSummary {
    pub rating: f64,
    pub rating_count: i64,
    pub total_rating: f64,
}

/// Star values arrive as numbers or numeric strings.
fn deserialize_stars<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("rating must be a number")),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom("rating must be a number")),
        _ => Err(serde::de::Error::custom("rating must be a number")),
    }
}
