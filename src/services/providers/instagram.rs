// src/services/providers/instagram.rs
//! OAuth adapter for the Instagram Basic Display API
//!
//! NOTE: Basic Display is being deprecated by Meta; migrating to Facebook
//! Login with Instagram permissions is the eventual replacement.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error};

use super::{NormalizedUserInfo, OAuthProvider, ProviderError};

const USER_INFO_URL: &str = "https://graph.instagram.com/me";

pub struct InstagramProvider {
    client_id: String,
    client_secret: String,
    http: Client,
}

impl InstagramProvider {
    pub fn new(client_id: String, client_secret: String, http: Client) -> Self {
        Self {
            client_id,
            client_secret,
            http,
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserInfo {
    id: String,
    username: Option<String>,
}

#[async_trait]
impl OAuthProvider for InstagramProvider {
    fn name(&self) -> &'static str {
        "instagram"
    }

    fn display_name(&self) -> &'static str {
        "Instagram"
    }

    fn authorization_endpoint(&self) -> &'static str {
        "https://api.instagram.com/oauth/authorize"
    }

    fn token_endpoint(&self) -> &'static str {
        "https://api.instagram.com/oauth/access_token"
    }

    fn scopes(&self) -> &'static [&'static str] {
        &["user_profile", "user_media"]
    }

    fn build_authorization_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&scope={}&response_type=code&state={}",
            self.authorization_endpoint(),
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&self.scopes().join(",")),
            urlencoding::encode(state)
        )
    }

    async fn exchange_code_for_token(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<String, ProviderError> {
        debug!(provider = "instagram", "Exchanging authorization code");

        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
            ("code", code),
        ];

        let response = self
            .http
            .post(self.token_endpoint())
            .form(&params)
            .send()
            .await
            .map_err(ProviderError::from_request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            error!(provider = "instagram", status = %status, body = %body, "Code exchange rejected");
            return Err(ProviderError::Exchange {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        Ok(token.access_token)
    }

    async fn fetch_user_info(&self, access_token: &str) -> Result<NormalizedUserInfo, ProviderError> {
        let response = self
            .http
            .get(USER_INFO_URL)
            .query(&[("fields", "id,username"), ("access_token", access_token)])
            .send()
            .await
            .map_err(ProviderError::from_request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            error!(provider = "instagram", status = %status, body = %body, "Profile fetch rejected");
            return Err(ProviderError::Exchange {
                status: status.as_u16(),
                body,
            });
        }

        let info: UserInfo = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        Ok(NormalizedUserInfo {
            provider: self.name().to_string(),
            provider_user_id: info.id,
            // Basic Display API never reports email or avatar
            email: None,
            display_name: info.username,
            avatar_url: None,
        })
    }
}
