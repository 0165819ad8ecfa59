//! Tests for oauth module
//!
//! These tests verify the provider adapter layer:
//! - authorization URL construction
//! - registry gating on configured credentials

#[cfg(test)]
mod tests {
    use crate::common::AppConfig;
    use crate::services::providers::{
        FacebookProvider, InstagramProvider, OAuthProvider, ProviderRegistry,
    };

    #[test]
    fn test_facebook_authorization_url() {
        let provider = FacebookProvider::new(
            "fb-client".to_string(),
            "fb-secret".to_string(),
            reqwest::Client::new(),
        );

        let url = provider.build_authorization_url(
            "http://localhost:8000/auth/oauth/facebook/callback",
            "abc123",
        );

        assert_eq!(
            url,
            "https://www.facebook.com/v18.0/dialog/oauth\
             ?client_id=fb-client\
             &redirect_uri=http%3A%2F%2Flocalhost%3A8000%2Fauth%2Foauth%2Ffacebook%2Fcallback\
             &state=abc123\
             &scope=email%2Cpublic_profile\
             &response_type=code"
        );
    }

    #[test]
    fn test_instagram_authorization_url() {
        let provider = InstagramProvider::new(
            "ig-client".to_string(),
            "ig-secret".to_string(),
            reqwest::Client::new(),
        );

        let url = provider.build_authorization_url(
            "http://localhost:8000/auth/oauth/instagram/callback",
            "xyz789",
        );

        assert!(url.starts_with("https://api.instagram.com/oauth/authorize?"));
        assert!(url.contains("client_id=ig-client"));
        assert!(url.contains("scope=user_profile%2Cuser_media"));
        assert!(url.contains("state=xyz789"));
        assert!(url.contains("response_type=code"));
        // The secret never appears in a browser-visible URL
        assert!(!url.contains("ig-secret"));
    }

    #[test]
    fn test_registry_only_registers_configured_providers() {
        let config = AppConfig {
            facebook_client_id: Some("fb-client".to_string()),
            facebook_client_secret: Some("fb-secret".to_string()),
            instagram_client_id: None,
            instagram_client_secret: None,
            ..AppConfig::default()
        };

        let registry = ProviderRegistry::from_config(&config, &reqwest::Client::new());

        assert!(registry.get("facebook").is_some());
        assert!(registry.get("instagram").is_none());
        assert!(registry.get("google").is_none());

        let available = registry.available();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].name, "facebook");
        assert_eq!(available[0].display_name, "Facebook");
        assert!(available[0].enabled);
    }

    #[test]
    fn test_registry_listing_is_sorted() {
        let config = AppConfig {
            facebook_client_id: Some("fb-client".to_string()),
            facebook_client_secret: Some("fb-secret".to_string()),
            instagram_client_id: Some("ig-client".to_string()),
            instagram_client_secret: Some("ig-secret".to_string()),
            ..AppConfig::default()
        };

        let registry = ProviderRegistry::from_config(&config, &reqwest::Client::new());

        let names: Vec<&str> = registry.available().iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["facebook", "instagram"]);
    }

    #[test]
    fn test_provider_constants() {
        let facebook = FacebookProvider::new(
            "id".to_string(),
            "secret".to_string(),
            reqwest::Client::new(),
        );
        assert_eq!(facebook.name(), "facebook");
        assert_eq!(facebook.scopes(), &["email", "public_profile"]);
        assert_eq!(
            facebook.token_endpoint(),
            "https://graph.facebook.com/v18.0/oauth/access_token"
        );

        let instagram = InstagramProvider::new(
            "id".to_string(),
            "secret".to_string(),
            reqwest::Client::new(),
        );
        assert_eq!(instagram.name(), "instagram");
        assert_eq!(instagram.scopes(), &["user_profile", "user_media"]);
        assert_eq!(
            instagram.token_endpoint(),
            "https://api.instagram.com/oauth/access_token"
        );
    }
}
