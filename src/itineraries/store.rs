// src/itineraries/store.rs
//! Itinerary Store: CRUD over `itineraries` plus rating aggregation.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use super::models::{Itinerary, ItineraryFields, ItineraryRow, RatingSummary, UpdateItineraryRequest};
use super::validators::{mean_rating, validate_stars, ItineraryValidator, UpdateItineraryValidator, MAX_STARS};
use crate::common::error::map_unique_violation;
use crate::common::{ApiError, RelationLocks, Validator};
use crate::users::store::prune_itinerary_references;

const ITINERARY_COLUMNS: &str = "id, title, description, tags, duration, price, authorid, authorname, rating, rating_count, total_rating, destinations";

fn not_found() -> ApiError {
    ApiError::NotFound("Itinerary not found".to_string())
}

#[derive(Clone)]
pub struct ItineraryStore {
    db: SqlitePool,
    locks: RelationLocks,
}

impl ItineraryStore {
    pub fn new(db: SqlitePool, locks: RelationLocks) -> Self {
        Self { db, locks }
    }

    // ============================================================================
    // Reads
    // ============================================================================

    async fn find_row(&self, id: i64) -> Result<Option<ItineraryRow>, ApiError> {
        let row = sqlx::query_as::<_, ItineraryRow>(&format!(
            "SELECT {} FROM itineraries WHERE id = ?",
            ITINERARY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row)
    }

    pub async fn get(&self, id: i64) -> Result<Itinerary, ApiError> {
        self.find_row(id).await?.map(Itinerary::from).ok_or_else(not_found)
    }

    /// Every itinerary, oldest first. No pagination.
    pub async fn list(&self) -> Result<Vec<Itinerary>, ApiError> {
        let rows = sqlx::query_as::<_, ItineraryRow>(&format!(
            "SELECT {} FROM itineraries ORDER BY id",
            ITINERARY_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Itinerary::from).collect())
    }

    /// Itineraries written by `author_id`, newest first.
    pub async fn list_by_author(&self, author_id: i64) -> Result<Vec<Itinerary>, ApiError> {
        let rows = sqlx::query_as::<_, ItineraryRow>(&format!(
            "SELECT {} FROM itineraries WHERE authorid = ? ORDER BY id DESC",
            ITINERARY_COLUMNS
        ))
        .bind(author_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Itinerary::from).collect())
    }

    /// Resolves a set of ids, keeping the order of `ids`. Unknown ids are
    /// skipped.
    pub async fn list_by_ids(&self, ids: &[i64]) -> Result<Vec<Itinerary>, ApiError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM itineraries WHERE id IN ({})",
            ITINERARY_COLUMNS, placeholders
        );

        let mut query = sqlx::query_as::<_, ItineraryRow>(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let mut rows = query.fetch_all(&self.db).await?;

        let mut ordered = Vec::with_capacity(rows.len());
        for id in ids {
            if let Some(pos) = rows.iter().position(|row| row.id == *id) {
                ordered.push(Itinerary::from(rows.swap_remove(pos)));
            }
        }
        Ok(ordered)
    }

    // ============================================================================
    // Writes
    // ============================================================================

    /// Inserts a new itinerary authored by `author_id` and returns its id.
    ///
    /// The author label is read from the user row at call time.
    pub async fn create(&self, author_id: i64, fields: ItineraryFields) -> Result<i64, ApiError> {
        ItineraryValidator.validate(&fields).into_result()?;

        let author: Option<(String, Option<String>)> =
            sqlx::query_as("SELECT username, display_name FROM user WHERE id = ?")
                .bind(author_id)
                .fetch_optional(&self.db)
                .await?;
        let (username, display_name) =
            author.ok_or_else(|| ApiError::Unauthorized("Not logged in".to_string()))?;
        let authorname = display_name
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or(username);

        let result = sqlx::query(
            r#"
            INSERT INTO itineraries
                (title, description, tags, duration, price, authorid, authorname,
                 rating, rating_count, total_rating, destinations)
            VALUES (?, ?, ?, ?, ?, ?, ?, 0, 0, 0, ?)
            "#,
        )
        .bind(ItineraryFields::text(&fields.title))
        .bind(ItineraryFields::text(&fields.description))
        .bind(fields.encoded_tags())
        .bind(ItineraryFields::text(&fields.duration))
        .bind(ItineraryFields::text(&fields.price))
        .bind(author_id)
        .bind(&authorname)
        .bind(fields.encoded_destinations())
        .execute(&self.db)
        .await?;

        let id = result.last_insert_rowid();
        info!(itinerary_id = id, author_id = author_id, "Itinerary created");

        Ok(id)
    }

    /// Replaces an itinerary's content. Owner only.
    pub async fn update(&self, user_id: i64, request: UpdateItineraryRequest) -> Result<i64, ApiError> {
        UpdateItineraryValidator.validate(&request).into_result()?;

        let current = self.owned_row(user_id, request.id).await?;
        let fields = &request.fields;

        let result = match (request.rating_count, request.total_rating) {
            (Some(count), Some(total)) => {
                // Compare-and-swap so a concurrent rating is not overwritten
                sqlx::query(
                    r#"
                    UPDATE itineraries SET
                        title = ?, description = ?, tags = ?, duration = ?, price = ?,
                        destinations = ?, rating_count = ?, total_rating = ?, rating = ?
                    WHERE id = ? AND rating_count = ? AND total_rating = ?
                    "#,
                )
                .bind(ItineraryFields::text(&fields.title))
                .bind(ItineraryFields::text(&fields.description))
                .bind(fields.encoded_tags())
                .bind(ItineraryFields::text(&fields.duration))
                .bind(ItineraryFields::text(&fields.price))
                .bind(fields.encoded_destinations())
                .bind(count)
                .bind(total)
                .bind(mean_rating(total, count))
                .bind(request.id)
                .bind(current.rating_count.unwrap_or(0))
                .bind(current.total_rating.unwrap_or(0.0))
                .execute(&self.db)
                .await?
            }
            _ => {
                sqlx::query(
                    r#"
                    UPDATE itineraries SET
                        title = ?, description = ?, tags = ?, duration = ?, price = ?,
                        destinations = ?
                    WHERE id = ?
                    "#,
                )
                .bind(ItineraryFields::text(&fields.title))
                .bind(ItineraryFields::text(&fields.description))
                .bind(fields.encoded_tags())
                .bind(ItineraryFields::text(&fields.duration))
                .bind(ItineraryFields::text(&fields.price))
                .bind(fields.encoded_destinations())
                .bind(request.id)
                .execute(&self.db)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            if self.find_row(request.id).await?.is_none() {
                return Err(not_found());
            }
            warn!(itinerary_id = request.id, "Rating changed during update");
            return Err(ApiError::Conflict(
                "Itinerary rating changed, reload and try again".to_string(),
            ));
        }

        info!(itinerary_id = request.id, user_id = user_id, "Itinerary updated");
        Ok(request.id)
    }

    /// Adds `user_id`'s rating, at most once per user and itinerary.
    pub async fn rate_once(&self, user_id: i64, id: i64, stars: f64) -> Result<RatingSummary, ApiError> {
        validate_stars(stars)?;

        let mut tx = self.db.begin().await?;
        let summary = apply_rating(&mut *tx, id, stars).await?;

        sqlx::query("INSERT INTO itinerary_ratings (user_id, itinerary_id, stars) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(id)
            .bind(stars)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_unique_violation(e, "You have already rated this itinerary"))?;

        tx.commit().await?;

        info!(
            itinerary_id = id,
            user_id = user_id,
            rating_count = summary.rating_count,
            "Itinerary rated"
        );
        Ok(summary)
    }

    /// Deletes an itinerary (owner only) and prunes it from every user's
    /// saved and completed sets. Returns the number of rows removed.
    pub async fn delete(&self, user_id: i64, id: i64) -> Result<u64, ApiError> {
        self.owned_row(user_id, id).await?;

        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM itinerary_ratings WHERE itinerary_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM itineraries WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(not_found());
        }
        tx.commit().await?;

        let pruned = prune_itinerary_references(&self.db, &self.locks, id).await?;
        info!(
            itinerary_id = id,
            user_id = user_id,
            users_pruned = pruned,
            "Itinerary deleted"
        );

        Ok(deleted)
    }

    /// Loads the row, failing with `NotFound`, or `Forbidden` when `user_id`
    /// is not its author.
    async fn owned_row(&self, user_id: i64, id: i64) -> Result<ItineraryRow, ApiError> {
        let row = self.find_row(id).await?.ok_or_else(not_found)?;
        if row.authorid != Some(user_id) {
            warn!(itinerary_id = id, user_id = user_id, "Non-owner tried to modify itinerary");
            return Err(ApiError::Forbidden(
                "Only the author can modify this itinerary".to_string(),
            ));
        }
        Ok(row)
    }
}

/// Single-statement increment; the right-hand side sees the pre-update row,
/// so concurrent ratings cannot lose each other.
async fn apply_rating(
    conn: &mut SqliteConnection,
    id: i64,
    stars: f64,
) -> Result<RatingSummary, ApiError> {
    let summary = sqlx::query_as::<_, RatingSummary>(
        r#"
        UPDATE itineraries SET
            total_rating = total_rating + ?,
            rating_count = rating_count + 1,
            rating = ROUND((total_rating + ?) / (rating_count + 1), 2)
        WHERE id = ?
        RETURNING rating, rating_count, total_rating
        "#,
    )
    .bind(stars)
    .bind(stars)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(not_found)?;

    if !(0.0..=MAX_STARS).contains(&summary.rating) {
        // Caller's transaction is dropped without commit
        warn!(itinerary_id = id, rating = summary.rating, "Computed mean out of range");
        return Err(ApiError::validation("Rating must be between 0 and 5"));
    }

    debug!(itinerary_id = id, rating = summary.rating, "Rating applied");
    Ok(summary)
}
