//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `POST /auth/register` - Create a local password account
/// - `POST /auth/login` - Login with email-or-username + password
/// - `GET /auth/me` - Get current user information
/// - `POST /auth/logout` - Logout (client-side token removal)
/// - `POST /auth/set-password` - Set or replace the current user's password
pub fn auth_routes() -> Router {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/me", get(handlers::me))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/set-password", post(handlers::set_password))
}
