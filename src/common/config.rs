// Application configuration loaded once at startup

use std::env;

/// Process-wide configuration, read from the environment at startup and
/// passed into each component that needs it. No component reads env vars
/// after this point.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub access_token_expire_days: i64,
    pub oauth_state_secret: String,
    pub frontend_url: String,
    pub backend_url: String,
    pub facebook_client_id: Option<String>,
    pub facebook_client_secret: Option<String>,
    pub instagram_client_id: Option<String>,
    pub instagram_client_secret: Option<String>,
    pub cors_origins: Vec<String>,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://auth_api.db".to_string(),
            jwt_secret: "replace_with_strong_secret".to_string(),
            access_token_expire_days: 30,
            oauth_state_secret: "replace_with_strong_state_secret".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            backend_url: "http://localhost:8000".to_string(),
            facebook_client_id: None,
            facebook_client_secret: None,
            instagram_client_id: None,
            instagram_client_secret: None,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
            port: 8000,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, falling back to
    /// development defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = env::var("DATABASE_URL") {
            config.database_url = url;
        }

        if let Ok(secret) = env::var("JWT_SECRET") {
            config.jwt_secret = secret;
        }

        if let Ok(days) = env::var("ACCESS_TOKEN_EXPIRE_DAYS") {
            if let Ok(val) = days.parse::<i64>() {
                config.access_token_expire_days = val;
            }
        }

        if let Ok(secret) = env::var("OAUTH_STATE_SECRET") {
            config.oauth_state_secret = secret;
        }

        if let Ok(url) = env::var("FRONTEND_URL") {
            config.frontend_url = url.trim_end_matches('/').to_string();
        }

        if let Ok(url) = env::var("BACKEND_URL") {
            config.backend_url = url.trim_end_matches('/').to_string();
        }

        config.facebook_client_id = env::var("FACEBOOK_CLIENT_ID").ok().filter(|s| !s.is_empty());
        config.facebook_client_secret = env::var("FACEBOOK_CLIENT_SECRET")
            .ok()
            .filter(|s| !s.is_empty());
        config.instagram_client_id = env::var("INSTAGRAM_CLIENT_ID")
            .ok()
            .filter(|s| !s.is_empty());
        config.instagram_client_secret = env::var("INSTAGRAM_CLIENT_SECRET")
            .ok()
            .filter(|s| !s.is_empty());

        // CORS_ORIGINS - comma-separated list of allowed origins
        if let Ok(origins) = env::var("CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(port) = env::var("PORT") {
            if let Ok(val) = port.parse::<u16>() {
                config.port = val;
            }
        }

        config
    }

    /// Callback URI registered with each provider. Must match the one used
    /// during the authorization redirect or the code exchange is rejected.
    pub fn oauth_redirect_uri(&self, provider: &str) -> String {
        format!("{}/auth/oauth/{}/callback", self.backend_url, provider)
    }
}
