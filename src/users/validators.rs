// src/users/validators.rs

use regex::Regex;
use std::sync::OnceLock;

use crate::auth::models::RegisterRequest;
use crate::common::{ValidationResult, Validator};

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 10;
pub const PASSWORD_MIN: usize = 8;
pub const PASSWORD_MAX: usize = 70;
pub const BIO_MAX: usize = 500;
pub const DISPLAY_NAME_MAX: usize = 50;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex is valid")
    })
}

/// Anything containing `@` is routed down the email path.
pub fn looks_like_email(raw: &str) -> bool {
    raw.contains('@')
}

pub fn is_valid_email(raw: &str) -> bool {
    email_regex().is_match(raw)
}

pub fn is_valid_username(raw: &str) -> bool {
    let len = raw.chars().count();
    (USERNAME_MIN..=USERNAME_MAX).contains(&len) && raw.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Username seed derived from an email's local part: alphanumerics only,
/// at most ten characters, `user` when nothing survives.
pub fn username_base_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let base: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(USERNAME_MAX)
        .collect();

    if base.is_empty() {
        "user".to_string()
    } else {
        base
    }
}

/// Display name derived from an email's local part.
pub fn display_name_from_email(email: &str) -> Option<String> {
    let local = email.split('@').next().unwrap_or_default();
    let name: String = local.chars().filter(|c| c.is_alphanumeric()).collect();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

pub struct RegisterValidator;

impl Validator<RegisterRequest> for RegisterValidator {
    fn validate(&self, data: &RegisterRequest) -> ValidationResult {
        let mut result = ValidationResult::new();
        let identifier = data.username.trim();

        if identifier.is_empty() {
            result.add_error("username", "Username or email is required");
        } else if looks_like_email(identifier) {
            if !is_valid_email(identifier) {
                result.add_error("username", "Email address is not valid");
            }
        } else if !is_valid_username(identifier) {
            result.add_error(
                "username",
                "Username must be 3-10 characters and contain only letters and numbers",
            );
        }

        let password_len = data.password.chars().count();
        if password_len < PASSWORD_MIN {
            result.add_error("password", "Password must be at least 8 characters");
        } else if password_len > PASSWORD_MAX {
            result.add_error("password", "Password cannot exceed 70 characters");
        }

        result
    }
}

/// Length limits for the free-text profile fields.
pub fn validate_profile_text(bio: Option<&str>, display_name: Option<&str>) -> ValidationResult {
    let mut result = ValidationResult::new();

    if bio.map_or(false, |b| b.chars().count() > BIO_MAX) {
        result.add_error("bio", "Bio cannot exceed 500 characters");
    }
    if display_name.map_or(false, |d| d.chars().count() > DISPLAY_NAME_MAX) {
        result.add_error("display_name", "Display name cannot exceed 50 characters");
    }

    result
}
