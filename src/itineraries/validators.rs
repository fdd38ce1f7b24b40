// src/itineraries/validators.rs

use super::models::{Destination, ItineraryFields, UpdateItineraryRequest};
use crate::common::validation::require_text;
use crate::common::{ApiError, ValidationResult, Validator};

pub const TITLE_MAX: usize = 200;
pub const MAX_STARS: f64 = 5.0;

pub struct ItineraryValidator;

impl Validator<ItineraryFields> for ItineraryValidator {
    fn validate(&self, data: &ItineraryFields) -> ValidationResult {
        let mut result = ValidationResult::new();

        require_text(&mut result, "title", data.title.as_deref(), "title is required");
        require_text(
            &mut result,
            "description",
            data.description.as_deref(),
            "description is required",
        );
        require_text(&mut result, "duration", data.duration.as_deref(), "duration is required");
        require_text(&mut result, "price", data.price.as_deref(), "price is required");

        if data
            .title
            .as_deref()
            .map_or(false, |t| t.trim().chars().count() > TITLE_MAX)
        {
            result.add_error("title", "title cannot exceed 200 characters");
        }

        for (index, destination) in data.destinations.iter().flatten().enumerate() {
            validate_destination(&mut result, index, destination);
        }

        result
    }
}

fn validate_destination(result: &mut ValidationResult, index: usize, destination: &Destination) {
    if destination.name.trim().is_empty() {
        result.add_error(
            "destinations",
            &format!("destination {} is missing a name", index + 1),
        );
    }
    if destination
        .lat
        .map_or(false, |lat| !lat.is_finite() || !(-90.0..=90.0).contains(&lat))
    {
        result.add_error(
            "destinations",
            &format!("destination {} has an invalid latitude", index + 1),
        );
    }
    if destination
        .lng
        .map_or(false, |lng| !lng.is_finite() || !(-180.0..=180.0).contains(&lng))
    {
        result.add_error(
            "destinations",
            &format!("destination {} has an invalid longitude", index + 1),
        );
    }
}

pub struct UpdateItineraryValidator;

impl Validator<UpdateItineraryRequest> for UpdateItineraryValidator {
    fn validate(&self, data: &UpdateItineraryRequest) -> ValidationResult {
        let mut result = ItineraryValidator.validate(&data.fields);

        match (data.rating_count, data.total_rating) {
            (None, None) => {}
            (Some(count), Some(total)) => {
                if count < 0 {
                    result.add_error("rating_count", "rating_count cannot be negative");
                } else if !total.is_finite() || total < 0.0 || total > MAX_STARS * count as f64 {
                    result.add_error(
                        "total_rating",
                        "total_rating must be between 0 and 5 times rating_count",
                    );
                }
            }
            _ => result.add_error(
                "rating_count",
                "rating_count and total_rating must be sent together",
            ),
        }

        result
    }
}

/// Individual ratings are 0 to 5 stars.
pub fn validate_stars(stars: f64) -> Result<(), ApiError> {
    if stars.is_finite() && (0.0..=MAX_STARS).contains(&stars) {
        Ok(())
    } else {
        Err(ApiError::validation("Rating must be between 0 and 5"))
    }
}

/// Mean of a rating aggregate, rounded to two decimals.
pub fn mean_rating(total: f64, count: i64) -> f64 {
    if count <= 0 {
        return 0.0;
    }
    (total / count as f64 * 100.0).round() / 100.0
}
