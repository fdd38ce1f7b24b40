// Common module - shared types and utilities across all modules

pub mod config;
pub mod database;
pub mod error;
pub mod extract;
pub mod helpers;
pub mod locks;
pub mod migrations;
pub mod state;
pub mod validation;

// Re-export commonly used types for convenience
pub use error::ApiError;
pub use extract::ApiJson;
pub use helpers::{safe_email_log, Patch};
pub use locks::RelationLocks;
pub use state::AppState;
pub use validation::{ValidationResult, Validator};
