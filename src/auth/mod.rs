//! # Auth Module
//!
//! This module handles all authentication-related functionality including:
//! - Local registration and password login
//! - Google OAuth login
//! - Session tokens carried in an HttpOnly cookie
//! - `AuthedUser` / `MaybeUser` extractors for handlers

pub mod extractors;
pub mod google;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod session;

#[cfg(test)]
mod tests;

pub use extractors::{AuthedUser, MaybeUser};
pub use models::Identity;
pub use routes::auth_routes;
