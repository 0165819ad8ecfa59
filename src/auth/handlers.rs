//! Authentication handlers

use axum::extract::{Extension, Json};
use axum::http::StatusCode;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use super::extractors::AuthedUser;
use super::models::{
    LoginRequest, RegisterRequest, SetPasswordRequest, TokenResponse, UserResponse,
};
use crate::common::{safe_email_log, ApiError, AppState, Validator};

/// POST /auth/register
/// Creates a local password account
///
/// # Request Body
/// ```json
/// {
///   "email": "ana@example.com",
///   "username": "ana",
///   "password": "secret"
/// }
/// ```
pub async fn register(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let state = state_lock.read().await.clone();

    let validation = payload.validate();
    if !validation.is_valid() {
        return Err(validation.into());
    }

    let user = state
        .identity
        .register_local(
            payload.email.trim(),
            payload.username.trim(),
            &payload.password,
        )
        .await?;

    info!(
        user_id = %user.id,
        email = %safe_email_log(&user.email),
        "User registered"
    );

    let resp = serde_json::json!({
        "message": "Account created successfully",
        "user": {
            "id": user.id,
            "email": user.email,
            "username": user.username,
        },
    });

    Ok((StatusCode::CREATED, Json(resp)))
}

/// POST /auth/login
/// Authenticates with email-or-username plus password and issues a session
/// token
///
/// # Response
/// ```json
/// {
///   "access_token": "<jwt>",
///   "token_type": "bearer",
///   "user": { ... }
/// }
/// ```
#[axum::debug_handler]
pub async fn login(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let state = state_lock.read().await.clone();

    let user = state
        .identity
        .authenticate_local(payload.identifier.trim(), &payload.password)
        .await?;

    let access_token = state.tokens.issue(&user.id, &user.email)?;
    let social_accounts = state.identity.list_social_accounts(&user.id).await?;

    info!(
        user_id = %user.id,
        email = %safe_email_log(&user.email),
        "User login successful"
    );

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        user: UserResponse::from_user(&user, social_accounts),
    }))
}

/// GET /auth/me
/// Returns the current authenticated user's information
pub async fn me(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
) -> Result<Json<UserResponse>, ApiError> {
    let state = state_lock.read().await.clone();

    let user = state
        .identity
        .get_user(&authed.id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("user not found".to_string()))?;
    let social_accounts = state.identity.list_social_accounts(&user.id).await?;

    Ok(Json(UserResponse::from_user(&user, social_accounts)))
}

/// POST /auth/logout
/// Tokens are stateless, so logout is handled client-side by discarding the
/// token; this endpoint just confirms the request
pub async fn logout(_authed: AuthedUser) -> Result<Json<serde_json::Value>, ApiError> {
    info!("User logout successful");
    let resp = serde_json::json!({
        "message": "Logout successful. Discard the token on the client."
    });
    Ok(Json(resp))
}

/// POST /auth/set-password
/// Sets or replaces the password of the authenticated user. This is how
/// OAuth-created accounts gain a local login method.
pub async fn set_password(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
    Json(payload): Json<SetPasswordRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    state
        .identity
        .set_password(&authed.id, &payload.password)
        .await?;

    let resp = serde_json::json!({
        "message": "Password set successfully"
    });
    Ok(Json(resp))
}
