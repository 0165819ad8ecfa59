//! OAuth flow handlers
//!
//! Browser-facing endpoints: everything in the redirect dance answers with a
//! redirect, never a raw error page. Failures during the callback send the
//! user to the frontend callback route with a generic error indicator.

use axum::extract::{Extension, Json, Path, Query};
use axum::response::Redirect;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::auth::extractors::AuthedUser;
use crate::common::{safe_token_log, ApiError, AppState};

/// GET /auth/oauth/providers
/// Lists the providers available for login (those with configured
/// credentials)
pub async fn list_providers(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
) -> Json<serde_json::Value> {
    let state = state_lock.read().await.clone();
    Json(serde_json::json!({
        "providers": state.providers.available(),
    }))
}

/// GET /auth/oauth/:provider/authorize
/// Starts the OAuth flow: issues an anti-CSRF state token and redirects the
/// browser to the provider's authorization page
pub async fn authorize(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(provider): Path<String>,
) -> Result<Redirect, ApiError> {
    let state = state_lock.read().await.clone();

    let adapter = state.providers.get(&provider).ok_or_else(|| {
        ApiError::BadRequest(format!("Provider '{}' is not supported", provider))
    })?;

    let state_token = state.oauth_states.generate().await;
    let redirect_uri = state.config.oauth_redirect_uri(&provider);
    let auth_url = adapter.build_authorization_url(&redirect_uri, &state_token);

    info!(provider = %provider, "Starting OAuth authorization flow");

    Ok(Redirect::to(&auth_url))
}

/// GET /auth/oauth/:provider/callback
/// Completes the OAuth flow: verifies the state, exchanges the code,
/// resolves the identity, and redirects to the frontend with a session token
pub async fn callback(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(provider): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Redirect {
    let state = state_lock.read().await.clone();
    let frontend_url = state.config.frontend_url.clone();

    // Error reported by the provider (user denied, bad configuration, ...)
    if let Some(oauth_error) = params.get("error") {
        let detail = params.get("error_description").unwrap_or(oauth_error);
        warn!(provider = %provider, oauth_error = %detail, "Provider returned error on callback");
        return error_redirect(&frontend_url, "Authorization was denied");
    }

    let (code, state_token) = match (params.get("code"), params.get("state")) {
        (Some(code), Some(state_token)) => (code, state_token),
        _ => {
            warn!(provider = %provider, "OAuth callback missing code or state");
            return error_redirect(&frontend_url, "Invalid callback parameters");
        }
    };

    // CSRF check. Single-use: this consumes the state token whether or not
    // the rest of the flow succeeds.
    if !state.oauth_states.verify(state_token).await {
        warn!(provider = %provider, "Rejected OAuth callback with unknown or expired state");
        return error_redirect(&frontend_url, "Invalid or expired state");
    }

    let adapter = match state.providers.get(&provider) {
        Some(adapter) => adapter,
        None => {
            warn!(provider = %provider, "OAuth callback for unsupported provider");
            return error_redirect(&frontend_url, "Unsupported provider");
        }
    };

    let redirect_uri = state.config.oauth_redirect_uri(&provider);

    let access_token = match adapter.exchange_code_for_token(code, &redirect_uri).await {
        Ok(token) => token,
        Err(e) => {
            error!(provider = %provider, error = %e, "Authorization code exchange failed");
            return error_redirect(&frontend_url, "Authentication failed");
        }
    };

    debug!(
        provider = %provider,
        token = %safe_token_log(&access_token),
        "Obtained provider access token"
    );

    let user_info = match adapter.fetch_user_info(&access_token).await {
        Ok(info) => info,
        Err(e) => {
            error!(provider = %provider, error = %e, "Provider profile fetch failed");
            return error_redirect(&frontend_url, "Authentication failed");
        }
    };

    let (user, is_new) = match state.identity.resolve_oauth_identity(&user_info).await {
        Ok(resolved) => resolved,
        Err(e) => {
            error!(provider = %provider, error = %e, "OAuth identity resolution failed");
            return error_redirect(&frontend_url, "Authentication failed");
        }
    };

    let session_token = match state.tokens.issue(&user.id, &user.email) {
        Ok(token) => token,
        Err(e) => {
            error!(provider = %provider, user_id = %user.id, error = %e, "Session token issuance failed");
            return error_redirect(&frontend_url, "Authentication failed");
        }
    };

    info!(
        user_id = %user.id,
        provider = %provider,
        is_new_account = is_new,
        "OAuth login successful"
    );

    Redirect::to(&format!(
        "{}/auth/callback?token={}&is_new={}",
        frontend_url,
        urlencoding::encode(&session_token),
        is_new
    ))
}

/// DELETE /auth/oauth/unlink/:provider
/// Unlinks a social account from the authenticated user. Refused when it is
/// the user's only remaining sign-in method.
pub async fn unlink(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(provider): Path<String>,
    authed: AuthedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    state.identity.unlink_provider(&authed.id, &provider).await?;

    Ok(Json(serde_json::json!({
        "message": format!("{} account unlinked successfully", provider),
    })))
}

fn error_redirect(frontend_url: &str, message: &str) -> Redirect {
    Redirect::to(&format!(
        "{}/auth/callback?error={}",
        frontend_url,
        urlencoding::encode(message)
    ))
}
