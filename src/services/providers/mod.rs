// src/services/providers/mod.rs
//
// OAuth provider adapters. Every provider-specific field mapping and quirk
// lives behind the OAuthProvider trait so the identity resolution engine
// never branches on provider identity. Adding a provider means adding one
// module here and one registration in ProviderRegistry::from_config.

pub mod facebook;
pub mod instagram;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::common::AppConfig;

pub use facebook::FacebookProvider;
pub use instagram::InstagramProvider;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider answered the exchange or profile fetch with a non-2xx
    /// status. Authorization codes are single-use, so this is never retried.
    #[error("provider returned HTTP {status}: {body}")]
    Exchange { status: u16, body: String },

    /// Transport-level failure: connect error, timeout, TLS. Distinct from
    /// an explicit rejection by the provider.
    #[error("provider unreachable: {0}")]
    Unavailable(String),

    /// 2xx response whose body did not match the documented shape.
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Classify a reqwest error: anything transport-level is Unavailable.
    pub(crate) fn from_request(err: reqwest::Error) -> Self {
        ProviderError::Unavailable(err.to_string())
    }
}

/// Provider-agnostic profile shape produced by `fetch_user_info`.
///
/// Fields a provider does not offer are None (Instagram never reports email
/// or avatar) - callers must tolerate their absence.
#[derive(Debug, Clone)]
pub struct NormalizedUserInfo {
    pub provider: String,
    pub provider_user_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// One external identity provider's handshake, normalized.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Stable identifier, used as the `provider` column value and in routes.
    fn name(&self) -> &'static str;

    /// Human-readable name for frontend login buttons.
    fn display_name(&self) -> &'static str;

    fn authorization_endpoint(&self) -> &'static str;

    fn token_endpoint(&self) -> &'static str;

    fn scopes(&self) -> &'static [&'static str];

    /// Deterministic authorization URL embedding client_id, redirect_uri,
    /// requested scopes, the anti-CSRF state, and response_type=code.
    fn build_authorization_url(&self, redirect_uri: &str, state: &str) -> String;

    /// Exchange an authorization code for an access token. The redirect_uri
    /// must match the one used in the authorization redirect.
    async fn exchange_code_for_token(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<String, ProviderError>;

    /// Fetch and normalize the provider's profile data.
    async fn fetch_user_info(&self, access_token: &str) -> Result<NormalizedUserInfo, ProviderError>;
}

/// Provider descriptor returned by the providers listing endpoint.
#[derive(Debug, Serialize)]
pub struct ProviderInfo {
    pub name: &'static str,
    pub display_name: &'static str,
    pub enabled: bool,
}

/// Static lookup table of configured providers, keyed by provider name.
/// Providers without credentials in the configuration are not registered.
pub struct ProviderRegistry {
    providers: HashMap<&'static str, Arc<dyn OAuthProvider>>,
}

impl ProviderRegistry {
    pub fn from_config(config: &AppConfig, http: &Client) -> Self {
        let mut providers: HashMap<&'static str, Arc<dyn OAuthProvider>> = HashMap::new();

        if let (Some(client_id), Some(client_secret)) = (
            config.facebook_client_id.clone(),
            config.facebook_client_secret.clone(),
        ) {
            let provider = FacebookProvider::new(client_id, client_secret, http.clone());
            providers.insert(provider.name(), Arc::new(provider));
        }

        if let (Some(client_id), Some(client_secret)) = (
            config.instagram_client_id.clone(),
            config.instagram_client_secret.clone(),
        ) {
            let provider = InstagramProvider::new(client_id, client_secret, http.clone());
            providers.insert(provider.name(), Arc::new(provider));
        }

        Self { providers }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn OAuthProvider>> {
        self.providers.get(name).cloned()
    }

    /// Registered providers, sorted by name for a stable listing.
    pub fn available(&self) -> Vec<ProviderInfo> {
        let mut list: Vec<ProviderInfo> = self
            .providers
            .values()
            .map(|p| ProviderInfo {
                name: p.name(),
                display_name: p.display_name(),
                enabled: true,
            })
            .collect();
        list.sort_by_key(|info| info.name);
        list
    }
}
