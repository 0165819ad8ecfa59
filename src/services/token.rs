// src/services/token.rs
//! Signed session tokens (JWT, HS256)
//!
//! Tokens are stateless: there is no revocation list, and rotating the
//! signing secret invalidates everything outstanding.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token encoding failed: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),

    #[error("invalid or expired token")]
    Invalid,
}

/// JWT claims structure
#[derive(Serialize, Deserialize, Debug)]
pub struct Claims {
    pub user_id: String,
    pub email: String,
    pub exp: usize,
}

/// Issues and verifies signed session tokens carrying user identity claims.
#[derive(Clone)]
pub struct TokenService {
    secret: String,
    expire_days: i64,
}

impl TokenService {
    pub fn new(secret: &str, expire_days: i64) -> Self {
        Self {
            secret: secret.to_string(),
            expire_days,
        }
    }

    /// Create a signed token for the given user identity.
    pub fn issue(&self, user_id: &str, email: &str) -> Result<String, TokenError> {
        let exp = (Utc::now() + Duration::days(self.expire_days)).timestamp() as usize;
        let claims = Claims {
            user_id: user_id.to_string(),
            email: email.to_string(),
            exp,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;

        Ok(token)
    }

    /// Check signature and expiry. Any tampering, malformed structure, or
    /// expiry yields `TokenError::Invalid` - never partially-trusted claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| {
            warn!(error = %e, "JWT validation failed");
            TokenError::Invalid
        })?;

        Ok(decoded.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify_roundtrip() {
        let service = TokenService::new("test_secret_key", 30);

        let token = service.issue("U_TEST01", "user@example.com").unwrap();
        let claims = service.verify(&token).unwrap();

        assert_eq!(claims.user_id, "U_TEST01");
        assert_eq!(claims.email, "user@example.com");
        assert!(claims.exp > Utc::now().timestamp() as usize);
    }

    #[test]
    fn test_verify_fails_with_wrong_secret() {
        let issuer = TokenService::new("test_secret_key", 30);
        let verifier = TokenService::new("wrong_secret_key", 30);

        let token = issuer.issue("U_TEST01", "user@example.com").unwrap();
        assert!(matches!(verifier.verify(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_verify_fails_on_expired_token() {
        // Negative TTL puts exp in the past, beyond the default leeway
        let service = TokenService::new("test_secret_key", -2);

        let token = service.issue("U_TEST01", "user@example.com").unwrap();
        assert!(matches!(service.verify(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_verify_fails_on_garbage() {
        let service = TokenService::new("test_secret_key", 30);
        assert!(matches!(
            service.verify("not.a.token"),
            Err(TokenError::Invalid)
        ));
    }
}
