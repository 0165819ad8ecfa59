//! OAuth routes

use axum::{
    routing::{delete, get},
    Router,
};

use super::handlers;

/// Creates and returns the OAuth router
///
/// # Routes
/// - `GET /auth/oauth/providers` - List available providers
/// - `GET /auth/oauth/:provider/authorize` - Redirect to the provider
/// - `GET /auth/oauth/:provider/callback` - Provider callback
/// - `DELETE /auth/oauth/unlink/:provider` - Unlink a social account
pub fn oauth_routes() -> Router {
    Router::new()
        .route("/auth/oauth/providers", get(handlers::list_providers))
        .route("/auth/oauth/:provider/authorize", get(handlers::authorize))
        .route("/auth/oauth/:provider/callback", get(handlers::callback))
        .route("/auth/oauth/unlink/:provider", delete(handlers::unlink))
}
