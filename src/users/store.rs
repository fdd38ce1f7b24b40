// src/users/store.rs
//! User Relation Store: accounts, credentials and the saved/completed sets.

use rand::Rng;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::models::{RelationKind, UpdateProfileRequest, UserRow};
use super::validators::{
    display_name_from_email, is_valid_email, is_valid_username, looks_like_email,
    username_base_from_email, validate_profile_text, RegisterValidator, DISPLAY_NAME_MAX,
    USERNAME_MAX, USERNAME_MIN,
};
use crate::auth::models::RegisterRequest;
use crate::common::error::map_unique_violation;
use crate::common::helpers::{encode_id_set, parse_id_set};
use crate::common::{safe_email_log, ApiError, Patch, RelationLocks, ValidationResult, Validator};

const USER_COLUMNS: &str = "id, username, password, email, google_sub, display_name, bio, saved_itineraries, completed_itineraries";

/// Give up on username allocation after this many collisions.
const MAX_USERNAME_ATTEMPTS: usize = 64;

/// Longest random suffix appended while breaking username collisions.
const MAX_SUFFIX_LEN: usize = 6;

/// Columns a user can be looked up by. Keeps column names out of caller input.
#[derive(Debug, Clone, Copy)]
enum LookupColumn {
    Username,
    Email,
    GoogleSub,
}

impl LookupColumn {
    fn as_str(&self) -> &'static str {
        match self {
            LookupColumn::Username => "username",
            LookupColumn::Email => "email",
            LookupColumn::GoogleSub => "google_sub",
        }
    }
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized("Invalid username or password".to_string())
}

fn random_digit() -> char {
    let digit = rand::thread_rng().gen_range(0..10u32);
    char::from_digit(digit, 10).unwrap_or('0')
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

#[derive(Clone)]
pub struct UserStore {
    db: SqlitePool,
    locks: RelationLocks,
    hash_cost: u32,
    dummy_hash: Arc<OnceCell<String>>,
}

impl UserStore {
    pub fn new(db: SqlitePool, locks: RelationLocks) -> Self {
        Self {
            db,
            locks,
            hash_cost: bcrypt::DEFAULT_COST,
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    // ============================================================================
    // Lookups
    // ============================================================================

    pub async fn find_by_id(&self, user_id: i64) -> Result<Option<UserRow>, ApiError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM user WHERE id = ?",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row)
    }

    async fn find_by(&self, column: LookupColumn, value: &str) -> Result<Option<UserRow>, ApiError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM user WHERE {} = ?",
            USER_COLUMNS,
            column.as_str()
        ))
        .bind(value)
        .fetch_optional(&self.db)
        .await?;

        Ok(row)
    }

    async fn username_taken(&self, username: &str) -> Result<bool, ApiError> {
        let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM user WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.db)
            .await?;

        Ok(existing.is_some())
    }

    /// Picks a free username starting from `base`.
    ///
    /// Collisions are broken by appending random digits, trimming the base so
    /// the result never exceeds ten characters.
    async fn unique_username(&self, base: &str) -> Result<String, ApiError> {
        let mut base = truncate_chars(base, USERNAME_MAX);
        while base.chars().count() < USERNAME_MIN {
            base.push(random_digit());
        }

        let mut candidate = base.clone();
        let mut suffix = String::new();

        for _ in 0..MAX_USERNAME_ATTEMPTS {
            if !self.username_taken(&candidate).await? {
                return Ok(candidate);
            }

            if suffix.len() >= MAX_SUFFIX_LEN {
                suffix.clear();
            }
            suffix.push(random_digit());
            candidate = format!(
                "{}{}",
                truncate_chars(&base, USERNAME_MAX - suffix.len()),
                suffix
            );
        }

        error!(base = %base, "Exhausted username allocation attempts");
        Err(ApiError::InternalServer(
            "could not allocate a unique username".to_string(),
        ))
    }

    // ============================================================================
    // Passwords
    // ============================================================================

    async fn hash_password(&self, password: &str) -> Result<String, ApiError> {
        let password = password.to_string();
        let cost = self.hash_cost;

        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| ApiError::InternalServer(format!("hashing task failed: {}", e)))?
            .map_err(|e| ApiError::InternalServer(format!("password hashing failed: {}", e)))
    }

    /// `false` for mismatches and for unusable hashes (OAuth-only accounts).
    async fn verify_password(&self, password: &str, hash: &str) -> bool {
        let password = password.to_string();
        let hash = hash.to_string();

        match tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await {
            Ok(Ok(matches)) => matches,
            Ok(Err(e)) => {
                debug!(error = %e, "Stored password hash is not verifiable");
                false
            }
            Err(e) => {
                error!(error = %e, "Password verification task failed");
                false
            }
        }
    }

    async fn dummy_hash(&self) -> Result<&str, ApiError> {
        let hash = self
            .dummy_hash
            .get_or_try_init(|| self.hash_password("not-a-real-password"))
            .await?;
        Ok(hash.as_str())
    }

    // ============================================================================
    // Registration and authentication
    // ============================================================================

    /// Creates a local account from a username or an email address.
    pub async fn register(&self, raw_identifier: &str, password: &str) -> Result<UserRow, ApiError> {
        let request = RegisterRequest {
            username: raw_identifier.to_string(),
            password: password.to_string(),
        };
        RegisterValidator.validate(&request).into_result()?;

        let identifier = raw_identifier.trim();
        let (username, email) = if looks_like_email(identifier) {
            let email = identifier.to_lowercase();
            if self.find_by(LookupColumn::Email, &email).await?.is_some() {
                return Err(ApiError::Conflict("Email is already registered".to_string()));
            }
            let username = self.unique_username(&username_base_from_email(&email)).await?;
            (username, Some(email))
        } else {
            if self.username_taken(identifier).await? {
                return Err(ApiError::Conflict("Username is already taken".to_string()));
            }
            (identifier.to_string(), None)
        };

        let hash = self.hash_password(password).await?;

        let result = sqlx::query(
            r#"
            INSERT INTO user (username, password, email, saved_itineraries, completed_itineraries)
            VALUES (?, ?, ?, '[]', '[]')
            "#,
        )
        .bind(&username)
        .bind(&hash)
        .bind(email.as_deref())
        .execute(&self.db)
        .await
        .map_err(|e| map_unique_violation(e, "Username or email is already taken"))?;

        let user_id = result.last_insert_rowid();
        info!(
            user_id = user_id,
            username = %username,
            email = %email.as_deref().map(safe_email_log).unwrap_or_default(),
            "User registered"
        );

        self.get_profile(user_id).await
    }

    pub async fn authenticate_by_username(
        &self,
        username: &str,
        password: &str,
    ) -> Result<UserRow, ApiError> {
        self.authenticate(LookupColumn::Username, username.trim(), password)
            .await
    }

    pub async fn authenticate_by_email(&self, email: &str, password: &str) -> Result<UserRow, ApiError> {
        let email = email.trim().to_lowercase();
        self.authenticate(LookupColumn::Email, &email, password).await
    }

    async fn authenticate(
        &self,
        column: LookupColumn,
        value: &str,
        password: &str,
    ) -> Result<UserRow, ApiError> {
        match self.find_by(column, value).await? {
            Some(row) => {
                if self.verify_password(password, &row.password).await {
                    info!(user_id = row.id, "Password login successful");
                    Ok(row)
                } else {
                    warn!(user_id = row.id, "Password login rejected");
                    Err(invalid_credentials())
                }
            }
            None => {
                // Same bcrypt work as a real mismatch
                let dummy = self.dummy_hash().await?.to_string();
                let _ = self.verify_password(password, &dummy).await;
                warn!(lookup = column.as_str(), "Password login for unknown account");
                Err(invalid_credentials())
            }
        }
    }

    /// Resolves a verified OAuth identity onto a user row, creating one if needed.
    ///
    /// Lookup order: OAuth subject, email, then a username equal to the email.
    pub async fn authenticate_or_create_with_oauth(
        &self,
        verified_email: &str,
        subject: &str,
        display_name: Option<&str>,
    ) -> Result<UserRow, ApiError> {
        let email = verified_email.trim().to_lowercase();
        let display_name = display_name
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| truncate_chars(d, DISPLAY_NAME_MAX));

        let existing = match self.find_by(LookupColumn::GoogleSub, subject).await? {
            Some(row) => Some(row),
            None => match self.find_by(LookupColumn::Email, &email).await? {
                Some(row) => Some(row),
                None => self.find_by(LookupColumn::Username, &email).await?,
            },
        };

        if let Some(row) = existing {
            return self
                .backfill_oauth_fields(row, &email, subject, display_name.as_deref())
                .await;
        }

        let username = self.unique_username(&username_base_from_email(&email)).await?;
        let placeholder = format!("!oauth-{}", Uuid::new_v4().simple());
        let display_name = display_name.unwrap_or_else(|| username.clone());

        let result = sqlx::query(
            r#"
            INSERT INTO user (username, password, email, google_sub, display_name, saved_itineraries, completed_itineraries)
            VALUES (?, ?, ?, ?, ?, '[]', '[]')
            "#,
        )
        .bind(&username)
        .bind(&placeholder)
        .bind(&email)
        .bind(subject)
        .bind(&display_name)
        .execute(&self.db)
        .await
        .map_err(|e| map_unique_violation(e, "Account already exists"))?;

        let user_id = result.last_insert_rowid();
        info!(
            user_id = user_id,
            email = %safe_email_log(&email),
            provider = "google",
            "Created user via OAuth"
        );

        self.get_profile(user_id).await
    }

    async fn backfill_oauth_fields(
        &self,
        row: UserRow,
        email: &str,
        subject: &str,
        display_name: Option<&str>,
    ) -> Result<UserRow, ApiError> {
        let email_backfill = if row.email.is_none() {
            match self.find_by(LookupColumn::Email, email).await? {
                Some(owner) if owner.id != row.id => {
                    warn!(
                        user_id = row.id,
                        owner_id = owner.id,
                        "OAuth email already owned by another account, not backfilling"
                    );
                    None
                }
                _ => Some(email),
            }
        } else {
            None
        };
        let sub_backfill = row.google_sub.is_none().then_some(subject);
        let has_display_name = row
            .display_name
            .as_deref()
            .map_or(false, |d| !d.trim().is_empty());
        let name_backfill = if has_display_name { None } else { display_name };

        if email_backfill.is_none() && sub_backfill.is_none() && name_backfill.is_none() {
            info!(user_id = row.id, provider = "google", "OAuth login for existing user");
            return Ok(row);
        }

        sqlx::query(
            r#"
            UPDATE user SET
                email = COALESCE(email, ?),
                google_sub = COALESCE(google_sub, ?),
                display_name = COALESCE(NULLIF(TRIM(display_name), ''), ?)
            WHERE id = ?
            "#,
        )
        .bind(email_backfill)
        .bind(sub_backfill)
        .bind(name_backfill)
        .bind(row.id)
        .execute(&self.db)
        .await
        .map_err(|e| map_unique_violation(e, "Account already linked"))?;

        info!(
            user_id = row.id,
            email_added = email_backfill.is_some(),
            sub_added = sub_backfill.is_some(),
            name_added = name_backfill.is_some(),
            "Backfilled OAuth fields on existing user"
        );

        self.get_profile(row.id).await
    }

    // ============================================================================
    // Profile
    // ============================================================================

    pub async fn get_profile(&self, user_id: i64) -> Result<UserRow, ApiError> {
        self.find_by_id(user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
    }

    /// Applies a partial profile update and returns the new row.
    pub async fn update_profile(
        &self,
        user_id: i64,
        request: UpdateProfileRequest,
    ) -> Result<UserRow, ApiError> {
        let current = self.get_profile(user_id).await?;

        let bio = request.bio.normalized();
        let display_name = request.display_name.normalized();
        let identifier = request.username.normalized();

        let set_value = |patch: &Patch<String>| match patch {
            Patch::Set(v) => Some(v.clone()),
            _ => None,
        };

        let mut validation: ValidationResult =
            validate_profile_text(set_value(&bio).as_deref(), set_value(&display_name).as_deref());
        match &identifier {
            Patch::Clear => validation.add_error("username", "Username cannot be cleared"),
            Patch::Set(value) if looks_like_email(value) => {
                if !is_valid_email(value) {
                    validation.add_error("username", "Email address is not valid");
                }
            }
            Patch::Set(value) => {
                if !is_valid_username(value) {
                    validation.add_error(
                        "username",
                        "Username must be 3-10 characters and contain only letters and numbers",
                    );
                }
            }
            Patch::Absent => {}
        }
        validation.into_result()?;

        let mut username = current.username.clone();
        let mut email = current.email.clone();
        let mut derived_display_name: Option<String> = None;

        if let Patch::Set(value) = &identifier {
            if looks_like_email(value) {
                let new_email = value.to_lowercase();
                if current.email.as_deref() != Some(new_email.as_str()) {
                    if let Some(owner) = self.find_by(LookupColumn::Email, &new_email).await? {
                        if owner.id != user_id {
                            return Err(ApiError::Conflict("Email is already in use".to_string()));
                        }
                    }
                    derived_display_name = display_name_from_email(&new_email);
                    email = Some(new_email);
                }
            } else if *value != current.username {
                if self.username_taken(value).await? {
                    return Err(ApiError::Conflict("Username is already taken".to_string()));
                }
                derived_display_name = Some(value.clone());
                username = value.clone();
            }
        }

        let new_display_name = match display_name {
            Patch::Set(v) => Some(v),
            Patch::Clear => None,
            Patch::Absent => derived_display_name
                .map(|d| truncate_chars(&d, DISPLAY_NAME_MAX))
                .or_else(|| current.display_name.clone()),
        };
        let new_bio = match bio {
            Patch::Set(v) => Some(v),
            Patch::Clear => None,
            Patch::Absent => current.bio.clone(),
        };

        sqlx::query(
            r#"
            UPDATE user SET username = ?, email = ?, display_name = ?, bio = ?
            WHERE id = ?
            "#,
        )
        .bind(&username)
        .bind(email.as_deref())
        .bind(new_display_name.as_deref())
        .bind(new_bio.as_deref())
        .bind(user_id)
        .execute(&self.db)
        .await
        .map_err(|e| map_unique_violation(e, "Username or email is already in use"))?;

        info!(user_id = user_id, "Profile updated");

        self.get_profile(user_id).await
    }

    // ============================================================================
    // Saved / completed sets
    // ============================================================================

    pub async fn toggle_saved(
        &self,
        user_id: i64,
        itinerary_id: i64,
        add: bool,
    ) -> Result<Vec<i64>, ApiError> {
        self.toggle(user_id, RelationKind::Saved, itinerary_id, add)
            .await
    }

    pub async fn toggle_completed(
        &self,
        user_id: i64,
        itinerary_id: i64,
        add: bool,
    ) -> Result<Vec<i64>, ApiError> {
        self.toggle(user_id, RelationKind::Completed, itinerary_id, add)
            .await
    }

    /// Adds or removes `itinerary_id` in one of the user's sets.
    ///
    /// Writes only when the set changes. Additions are guarded by an
    /// existence check inside the UPDATE, so they cannot race a delete.
    pub async fn toggle(
        &self,
        user_id: i64,
        kind: RelationKind,
        itinerary_id: i64,
        add: bool,
    ) -> Result<Vec<i64>, ApiError> {
        if add && !itinerary_exists(&self.db, itinerary_id).await? {
            return Err(ApiError::NotFound("Itinerary not found".to_string()));
        }

        let _guard = self.locks.lock(user_id).await;

        let column = kind.column();
        let stored: Option<(Option<String>,)> =
            sqlx::query_as(&format!("SELECT {} FROM user WHERE id = ?", column))
                .bind(user_id)
                .fetch_optional(&self.db)
                .await?;
        let (raw,) = stored.ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

        let mut ids = parse_id_set(raw.as_deref());
        let changed = if add {
            if ids.contains(&itinerary_id) {
                false
            } else {
                ids.push(itinerary_id);
                true
            }
        } else {
            let before = ids.len();
            ids.retain(|id| *id != itinerary_id);
            ids.len() != before
        };

        if !changed {
            debug!(user_id = user_id, itinerary_id = itinerary_id, column = column, "Set unchanged");
            return Ok(ids);
        }

        let encoded = encode_id_set(&ids);
        let result = if add {
            sqlx::query(&format!(
                "UPDATE user SET {} = ? WHERE id = ? AND EXISTS (SELECT 1 FROM itineraries WHERE id = ?)",
                column
            ))
            .bind(&encoded)
            .bind(user_id)
            .bind(itinerary_id)
            .execute(&self.db)
            .await?
        } else {
            sqlx::query(&format!("UPDATE user SET {} = ? WHERE id = ?", column))
                .bind(&encoded)
                .bind(user_id)
                .execute(&self.db)
                .await?
        };

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Itinerary not found".to_string()));
        }

        info!(
            user_id = user_id,
            itinerary_id = itinerary_id,
            column = column,
            added = add,
            "Itinerary set updated"
        );

        Ok(ids)
    }
}

pub(crate) async fn itinerary_exists(db: &SqlitePool, itinerary_id: i64) -> Result<bool, ApiError> {
    let found: Option<(i64,)> = sqlx::query_as("SELECT id FROM itineraries WHERE id = ?")
        .bind(itinerary_id)
        .fetch_optional(db)
        .await?;

    Ok(found.is_some())
}

/// Removes a deleted itinerary from every user's saved and completed sets.
///
/// Runs after the itinerary row is gone. Each affected user is rewritten
/// under that user's lock, from a fresh read. Returns the number of rows
/// changed.
pub(crate) async fn prune_itinerary_references(
    db: &SqlitePool,
    locks: &RelationLocks,
    itinerary_id: i64,
) -> Result<u64, ApiError> {
    let rows: Vec<(i64, Option<String>, Option<String>)> =
        sqlx::query_as("SELECT id, saved_itineraries, completed_itineraries FROM user")
            .fetch_all(db)
            .await?;

    let mut changed = 0u64;

    for (user_id, saved, completed) in rows {
        let referenced = parse_id_set(saved.as_deref()).contains(&itinerary_id)
            || parse_id_set(completed.as_deref()).contains(&itinerary_id);
        if !referenced {
            continue;
        }

        let _guard = locks.lock(user_id).await;

        let current: Option<(Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT saved_itineraries, completed_itineraries FROM user WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        let Some((saved, completed)) = current else {
            continue;
        };

        let mut saved_ids = parse_id_set(saved.as_deref());
        let mut completed_ids = parse_id_set(completed.as_deref());
        let before = (saved_ids.len(), completed_ids.len());
        saved_ids.retain(|id| *id != itinerary_id);
        completed_ids.retain(|id| *id != itinerary_id);

        if (saved_ids.len(), completed_ids.len()) == before {
            continue;
        }

        sqlx::query("UPDATE user SET saved_itineraries = ?, completed_itineraries = ? WHERE id = ?")
            .bind(encode_id_set(&saved_ids))
            .bind(encode_id_set(&completed_ids))
            .bind(user_id)
            .execute(db)
            .await?;
        changed += 1;
    }

    debug!(itinerary_id = itinerary_id, users_changed = changed, "Pruned itinerary references");
    Ok(changed)
}
