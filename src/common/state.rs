// Application state shared across all modules

use std::sync::Arc;

use crate::common::config::AppConfig;
use crate::services::identity::IdentityService;
use crate::services::oauth_state::OAuthStateManager;
use crate::services::providers::ProviderRegistry;
use crate::services::token::TokenService;

/// Application state containing services and configuration. The database
/// pool lives inside IdentityService; the outbound HTTP client inside each
/// provider adapter.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub identity: Arc<IdentityService>,
    pub tokens: Arc<TokenService>,
    pub oauth_states: Arc<OAuthStateManager>,
    pub providers: Arc<ProviderRegistry>,
}
