//! Authentication data models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User database model. Never serialized directly - responses go through
/// [`UserResponse`] so `password_hash` cannot leak.
#[derive(FromRow, Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password_hash: Option<String>,
    pub avatar_url: Option<String>,
    pub email_verified: bool,
    pub created_at: String,
}

/// Linked external identity database model
#[derive(FromRow, Debug, Clone)]
pub struct SocialAccount {
    pub id: String,
    pub user_id: String,
    pub provider: String,
    pub provider_user_id: String,
    pub provider_email: Option<String>,
    pub created_at: String,
}

/// POST /auth/register request body
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// POST /auth/login request body. `identifier` accepts either the email or
/// the username.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

/// POST /auth/set-password request body
#[derive(Deserialize)]
pub struct SetPasswordRequest {
    pub password: String,
}

#[derive(Serialize)]
pub struct SocialAccountResponse {
    pub id: String,
    pub provider: String,
    pub provider_email: Option<String>,
    pub created_at: String,
}

impl From<SocialAccount> for SocialAccountResponse {
    fn from(account: SocialAccount) -> Self {
        Self {
            id: account.id,
            provider: account.provider,
            provider_email: account.provider_email,
            created_at: account.created_at,
        }
    }
}

/// User payload for API responses
#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub email_verified: bool,
    pub has_password: bool,
    pub created_at: String,
    pub social_accounts: Vec<SocialAccountResponse>,
}

impl UserResponse {
    pub fn from_user(user: &User, social_accounts: Vec<SocialAccount>) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            avatar_url: user.avatar_url.clone(),
            email_verified: user.email_verified,
            has_password: user.password_hash.is_some(),
            created_at: user.created_at.clone(),
            social_accounts: social_accounts.into_iter().map(Into::into).collect(),
        }
    }
}

/// POST /auth/login and OAuth-issued session response
#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: UserResponse,
}
