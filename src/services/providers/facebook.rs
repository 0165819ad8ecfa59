// src/services/providers/facebook.rs
//! OAuth adapter for Facebook Login (Graph API v18)

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error};

use super::{NormalizedUserInfo, OAuthProvider, ProviderError};

const USER_INFO_URL: &str = "https://graph.facebook.com/v18.0/me";

pub struct FacebookProvider {
    client_id: String,
    client_secret: String,
    http: Client,
}

impl FacebookProvider {
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

#[async_trait]
impl OAuthProvider for FacebookProvider {
    fn name(&self) -> &'static str {
        "facebook"
    }

    fn display_name(&self) -> &'static str {
        "Facebook"
    }

    fn authorization_endpoint(&self) -> &'static str {
        "https://www.facebook.com/v18.0/dialog/oauth"
    }

    fn token_endpoint(&self) -> &'static str {
        "https://graph.facebook.com/v18.0/oauth/access_token"
    }

    fn scopes(&self) -> &'static [&'static str] {
        &["email", "public_profile"]
    }

    fn build_authorization_url(&self, redirect_uri: &str, state: &str) -> String {
        // Facebook expects comma-joined scopes
        format!(
            "{}?client_id={}&redirect_uri={}&state={}&scope={}&response_type=code",
            self.authorization_endpoint(),
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state),
            urlencoding::encode(&self.scopes().join(","))
        )
    }

    async fn exchange_code_for_token(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<String, ProviderError> {
        debug!(provider = "facebook", "Exchanging authorization code");

        // Graph API exchanges the code via GET with query parameters
        let response = self
            .http
            .get(self.token_endpoint())
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .map_err(ProviderError::from_request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            error!(provider = "facebook", status = %status, body = %body, "Code exchange rejected");
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
            .query(&[
                ("fields", "id,name,email,picture.type(large)"),
                ("access_token", access_token),
            ])
            .send()
            .await
            .map_err(ProviderError::from_request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            error!(provider = "facebook", status = %status, body = %body, "Profile fetch rejected");
            return Err(ProviderError::Exchange {
                status: status.as_u16(),
                body,
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let provider_user_id = body
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProviderError::Malformed("profile missing id".to_string()))?
            .to_string();

        // Avatar is nested: { "picture": { "data": { "url": ... } } }
        let avatar_url = body
            .get("picture")
            .and_then(|p| p.get("data"))
            .and_then(|d| d.get("url"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(NormalizedUserInfo {
            provider: self.name().to_string(),
            provider_user_id,
            // Facebook only reports email when the user granted the scope
            // and has a confirmed address
            email: body.get("email").and_then(|v| v.as_str()).map(str::to_string),
            display_name: body.get("name").and_then(|v| v.as_str()).map(str::to_string),
            avatar_url,
        })
    }
}
