//! # Auth Module
//!
//! This module handles the local authentication surface:
//! - registration and login with email-or-username + password
//! - session token issuance on login
//! - AuthedUser extractor for protected routes
//! - set-password for OAuth-created accounts

pub mod extractors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod validators;


pub use extractors::AuthedUser;
pub use models::User;
pub use routes::auth_routes;
