// src/services/identity.rs
//! Identity resolution engine
//!
//! The orchestrator behind every login path: given local credentials or a
//! normalized OAuth profile, finds or creates the owning User, links and
//! unlinks social accounts, and guards the "a user always keeps at least one
//! sign-in method" invariant. Token issuance happens upstream; this module
//! only decides *which* user a request represents.

use sqlx::{Sqlite, SqlitePool, Transaction};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::auth::models::{SocialAccount, User};
use crate::common::{generate_social_account_id, generate_user_id, safe_email_log};
use crate::services::password::{hash_password, verify_password};
use crate::services::providers::NormalizedUserInfo;

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Maximum length of an auto-generated username before disambiguation.
const MAX_USERNAME_LENGTH: usize = 50;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("email is already registered")]
    DuplicateEmail,

    #[error("username is already taken")]
    DuplicateUsername,

    /// Deliberately identical for "no such account", "account has no
    /// password" and "wrong password" - no account enumeration.
    #[error("invalid username/email or password")]
    InvalidCredentials,

    #[error("password must be at least 6 characters")]
    PasswordTooShort,

    #[error("no linked {0} account")]
    NotLinked(String),

    #[error("cannot unlink your only sign-in method; set a password first")]
    LastAuthMethod,

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

/// Strip a display name down to the characters allowed in a username,
/// truncate, and fall back to "user" when nothing survives.
pub fn sanitize_username(base: &str) -> String {
    let cleaned: String = base
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .take(MAX_USERNAME_LENGTH)
        .collect();

    if cleaned.is_empty() {
        "user".to_string()
    } else {
        cleaned
    }
}

pub struct IdentityService {
    db: SqlitePool,
}

impl IdentityService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, IdentityError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    pub async fn list_social_accounts(
        &self,
        user_id: &str,
    ) -> Result<Vec<SocialAccount>, IdentityError> {
        let accounts = sqlx::query_as::<_, SocialAccount>(
            "SELECT * FROM social_accounts WHERE user_id = ? ORDER BY created_at, id",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(accounts)
    }

    /// Create a local password account. `email_verified` starts false; local
    /// signups have not proven ownership of the address.
    pub async fn register_local(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<User, IdentityError> {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(IdentityError::PasswordTooShort);
        }

        // Pre-check both uniqueness constraints for specific error messages.
        // The constraints themselves remain the arbiter under concurrency.
        let email_taken: Option<(String,)> =
            sqlx::query_as("SELECT id FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.db)
                .await?;
        if email_taken.is_some() {
            return Err(IdentityError::DuplicateEmail);
        }

        let username_taken: Option<(String,)> =
            sqlx::query_as("SELECT id FROM users WHERE username = ?")
                .bind(username)
                .fetch_optional(&self.db)
                .await?;
        if username_taken.is_some() {
            return Err(IdentityError::DuplicateUsername);
        }

        let password_hash = hash_password(password).map_err(|e| IdentityError::Hash(e.to_string()))?;
        let id = generate_user_id();

        let inserted = sqlx::query(
            "INSERT INTO users (id, email, username, password_hash, email_verified) VALUES (?, ?, ?, ?, 0)",
        )
        .bind(&id)
        .bind(email)
        .bind(username)
        .bind(&password_hash)
        .execute(&self.db)
        .await;

        if let Err(e) = inserted {
            // A concurrent registration won the race between our pre-checks
            // and the insert. Re-query to report which field collided.
            if is_unique_violation(&e) {
                let email_taken: Option<(String,)> =
                    sqlx::query_as("SELECT id FROM users WHERE email = ?")
                        .bind(email)
                        .fetch_optional(&self.db)
                        .await?;
                return Err(if email_taken.is_some() {
                    IdentityError::DuplicateEmail
                } else {
                    IdentityError::DuplicateUsername
                });
            }
            return Err(e.into());
        }

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(&id)
            .fetch_one(&self.db)
            .await?;

        info!(
            user_id = %user.id,
            email = %safe_email_log(&user.email),
            "Registered new local account"
        );

        Ok(user)
    }

    /// Look up by email or username, then check the password. All failure
    /// modes collapse into `InvalidCredentials`.
    pub async fn authenticate_local(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<User, IdentityError> {
        let user: Option<User> =
            sqlx::query_as("SELECT * FROM users WHERE email = ? OR username = ?")
                .bind(identifier)
                .bind(identifier)
                .fetch_optional(&self.db)
                .await?;

        let user = user.ok_or(IdentityError::InvalidCredentials)?;

        // OAuth-only accounts have no password; fail exactly like a mismatch
        let stored_hash = user
            .password_hash
            .as_deref()
            .ok_or(IdentityError::InvalidCredentials)?;

        if !verify_password(password, stored_hash) {
            return Err(IdentityError::InvalidCredentials);
        }

        debug!(user_id = %user.id, "Local authentication successful");

        Ok(user)
    }

    /// Resolve a normalized OAuth profile to a User, creating and linking as
    /// needed. Returns the user and whether the account was created by this
    /// call.
    ///
    /// Resolution order:
    /// 1. existing (provider, provider_user_id) link wins outright;
    /// 2. else an existing user with the provider-reported email gets the
    ///    new identity linked to it (account merge);
    /// 3. else a fresh user is created, with a placeholder email when the
    ///    provider reports none.
    ///
    /// All writes happen in one transaction; a unique violation means a
    /// concurrent request resolved the same identity first, so the whole
    /// resolution is re-run against the winner's rows.
    pub async fn resolve_oauth_identity(
        &self,
        user_info: &NormalizedUserInfo,
    ) -> Result<(User, bool), IdentityError> {
        match self.try_resolve(user_info).await {
            Err(IdentityError::Database(e)) if is_unique_violation(&e) => {
                warn!(
                    provider = %user_info.provider,
                    provider_user_id = %user_info.provider_user_id,
                    "Lost OAuth resolution race, re-resolving"
                );
                self.try_resolve(user_info).await
            }
            other => other,
        }
    }

    async fn try_resolve(
        &self,
        user_info: &NormalizedUserInfo,
    ) -> Result<(User, bool), IdentityError> {
        let mut tx = self.db.begin().await?;

        // 1. Existing link for this external identity
        let existing: Option<SocialAccount> = sqlx::query_as(
            "SELECT * FROM social_accounts WHERE provider = ? AND provider_user_id = ?",
        )
        .bind(&user_info.provider)
        .bind(&user_info.provider_user_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(link) = existing {
            let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
                .bind(&link.user_id)
                .fetch_one(&mut *tx)
                .await?;
            tx.commit().await?;

            debug!(
                user_id = %user.id,
                provider = %user_info.provider,
                "Resolved OAuth identity to existing link"
            );

            return Ok((user, false));
        }

        // 2. Merge into an existing account matched by email
        let mut matched: Option<User> = None;
        if let Some(email) = &user_info.email {
            matched = sqlx::query_as("SELECT * FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(&mut *tx)
                .await?;
        }

        let (user, is_new) = match matched {
            Some(user) => {
                info!(
                    user_id = %user.id,
                    provider = %user_info.provider,
                    email = %safe_email_log(&user.email),
                    "Merging OAuth identity into existing account by email"
                );
                (user, false)
            }
            // 3. Brand-new account
            None => {
                let base_name = user_info
                    .display_name
                    .clone()
                    .unwrap_or_else(|| format!("{}_user", user_info.provider));
                let username = Self::unique_username(&mut tx, &base_name).await?;

                // Providers that report no email get a synthetic address so
                // the unique-email constraint never blocks them
                let email = user_info.email.clone().unwrap_or_else(|| {
                    format!(
                        "{}_{}@oauth.local",
                        user_info.provider, user_info.provider_user_id
                    )
                });

                let id = generate_user_id();
                sqlx::query(
                    "INSERT INTO users (id, email, username, password_hash, avatar_url, email_verified) VALUES (?, ?, ?, NULL, ?, ?)",
                )
                .bind(&id)
                .bind(&email)
                .bind(&username)
                .bind(user_info.avatar_url.as_deref())
                .bind(user_info.email.is_some())
                .execute(&mut *tx)
                .await?;

                let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
                    .bind(&id)
                    .fetch_one(&mut *tx)
                    .await?;

                info!(
                    user_id = %user.id,
                    username = %user.username,
                    provider = %user_info.provider,
                    "Created new account from OAuth identity"
                );

                (user, true)
            }
        };

        let link_id = generate_social_account_id();
        sqlx::query(
            "INSERT INTO social_accounts (id, user_id, provider, provider_user_id, provider_email) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&link_id)
        .bind(&user.id)
        .bind(&user_info.provider)
        .bind(&user_info.provider_user_id)
        .bind(user_info.email.as_deref())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((user, is_new))
    }

    /// Disambiguate a sanitized username by appending _1, _2, ... until it
    /// is free. Runs inside the resolution transaction.
    async fn unique_username(
        tx: &mut Transaction<'_, Sqlite>,
        base: &str,
    ) -> Result<String, sqlx::Error> {
        let base = sanitize_username(base);
        let mut candidate = base.clone();
        let mut counter = 0u32;

        loop {
            let taken: Option<(String,)> =
                sqlx::query_as("SELECT id FROM users WHERE username = ?")
                    .bind(&candidate)
                    .fetch_optional(&mut **tx)
                    .await?;

            if taken.is_none() {
                return Ok(candidate);
            }

            counter += 1;
            candidate = format!("{}_{}", base, counter);
        }
    }

    /// Remove a social link, refusing when it is the user's only way in.
    /// The "other methods" check excludes the link being removed.
    pub async fn unlink_provider(
        &self,
        user_id: &str,
        provider: &str,
    ) -> Result<(), IdentityError> {
        let mut tx = self.db.begin().await?;

        let link: Option<SocialAccount> = sqlx::query_as(
            "SELECT * FROM social_accounts WHERE user_id = ? AND provider = ?",
        )
        .bind(user_id)
        .bind(provider)
        .fetch_optional(&mut *tx)
        .await?;

        let link = link.ok_or_else(|| IdentityError::NotLinked(provider.to_string()))?;

        let has_password: Option<(Option<String>,)> =
            sqlx::query_as("SELECT password_hash FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        let has_password = matches!(has_password, Some((Some(_),)));

        let other_links: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM social_accounts WHERE user_id = ? AND provider != ?",
        )
        .bind(user_id)
        .bind(provider)
        .fetch_one(&mut *tx)
        .await?;

        if !has_password && other_links == 0 {
            return Err(IdentityError::LastAuthMethod);
        }

        sqlx::query("DELETE FROM social_accounts WHERE id = ?")
            .bind(&link.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(user_id = %user_id, provider = %provider, "Unlinked social account");

        Ok(())
    }

    /// Set or overwrite the user's password. No old-password check: this is
    /// the recovery/first-setup path, reachable only behind authentication.
    pub async fn set_password(
        &self,
        user_id: &str,
        new_password: &str,
    ) -> Result<(), IdentityError> {
        if new_password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(IdentityError::PasswordTooShort);
        }

        let password_hash =
            hash_password(new_password).map_err(|e| IdentityError::Hash(e.to_string()))?;

        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(&password_hash)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        info!(user_id = %user_id, "Password updated");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::migrations::run_migrations;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup() -> IdentityService {
        // Single connection so every query sees the same in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory database");
        run_migrations(&pool).await.expect("Failed to run migrations");
        IdentityService::new(pool)
    }

    fn oauth_info(
        provider: &str,
        provider_user_id: &str,
        email: Option<&str>,
        display_name: Option<&str>,
    ) -> NormalizedUserInfo {
        NormalizedUserInfo {
            provider: provider.to_string(),
            provider_user_id: provider_user_id.to_string(),
            email: email.map(str::to_string),
            display_name: display_name.map(str::to_string),
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn test_register_then_authenticate_roundtrip() {
        let identity = setup().await;

        let registered = identity
            .register_local("ana@example.com", "ana", "hunter22")
            .await
            .unwrap();
        assert!(!registered.email_verified);
        assert!(registered.password_hash.is_some());

        let by_username = identity.authenticate_local("ana", "hunter22").await.unwrap();
        assert_eq!(by_username.id, registered.id);

        let by_email = identity
            .authenticate_local("ana@example.com", "hunter22")
            .await
            .unwrap();
        assert_eq!(by_email.id, registered.id);
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates() {
        let identity = setup().await;

        identity
            .register_local("ana@example.com", "ana", "hunter22")
            .await
            .unwrap();

        let dup_email = identity
            .register_local("ana@example.com", "other", "hunter22")
            .await;
        assert!(matches!(dup_email, Err(IdentityError::DuplicateEmail)));

        let dup_username = identity
            .register_local("other@example.com", "ana", "hunter22")
            .await;
        assert!(matches!(dup_username, Err(IdentityError::DuplicateUsername)));
    }

    #[tokio::test]
    async fn test_register_rejects_short_password() {
        let identity = setup().await;

        let result = identity
            .register_local("ana@example.com", "ana", "12345")
            .await;
        assert!(matches!(result, Err(IdentityError::PasswordTooShort)));
    }

    #[tokio::test]
    async fn test_authenticate_failures_are_uniform() {
        let identity = setup().await;

        identity
            .register_local("ana@example.com", "ana", "hunter22")
            .await
            .unwrap();

        // OAuth-only account: exists, but has no password
        identity
            .resolve_oauth_identity(&oauth_info(
                "facebook",
                "fb-1",
                Some("oauth-only@example.com"),
                Some("Oauth Only"),
            ))
            .await
            .unwrap();

        let wrong_password = identity.authenticate_local("ana", "wrong").await;
        let unknown_identifier = identity.authenticate_local("nobody", "hunter22").await;
        let oauth_only = identity
            .authenticate_local("oauth-only@example.com", "hunter22")
            .await;

        for result in [wrong_password, unknown_identifier, oauth_only] {
            assert!(matches!(result, Err(IdentityError::InvalidCredentials)));
        }
    }

    #[tokio::test]
    async fn test_resolve_oauth_identity_is_idempotent() {
        let identity = setup().await;

        let info = oauth_info("facebook", "fb-42", Some("ana@example.com"), Some("Ana"));

        let (first, is_new_first) = identity.resolve_oauth_identity(&info).await.unwrap();
        assert!(is_new_first);

        let (second, is_new_second) = identity.resolve_oauth_identity(&info).await.unwrap();
        assert!(!is_new_second);
        assert_eq!(first.id, second.id);

        let links = identity.list_social_accounts(&first.id).await.unwrap();
        assert_eq!(links.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_oauth_identity_merges_by_email() {
        let identity = setup().await;

        let local = identity
            .register_local("ana@example.com", "ana", "hunter22")
            .await
            .unwrap();

        let info = oauth_info("facebook", "fb-42", Some("ana@example.com"), Some("Ana B"));
        let (resolved, is_new) = identity.resolve_oauth_identity(&info).await.unwrap();

        assert!(!is_new);
        assert_eq!(resolved.id, local.id);
        // Merge keeps the original account; no second user row
        assert_eq!(resolved.username, "ana");

        let links = identity.list_social_accounts(&local.id).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].provider, "facebook");
        assert_eq!(links[0].provider_email.as_deref(), Some("ana@example.com"));
    }

    #[tokio::test]
    async fn test_resolve_oauth_identity_without_email() {
        let identity = setup().await;

        let info = oauth_info("x", "99", None, Some("Ana"));

        let (first, is_new) = identity.resolve_oauth_identity(&info).await.unwrap();
        assert!(is_new);
        assert_eq!(first.username, "Ana");
        assert_eq!(first.email, "x_99@oauth.local");
        assert!(!first.email_verified);
        assert!(first.password_hash.is_none());

        let (second, is_new_second) = identity.resolve_oauth_identity(&info).await.unwrap();
        assert!(!is_new_second);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_oauth_username_is_disambiguated() {
        let identity = setup().await;

        identity
            .register_local("ana@example.com", "Ana", "hunter22")
            .await
            .unwrap();

        let (user, _) = identity
            .resolve_oauth_identity(&oauth_info("x", "99", None, Some("Ana")))
            .await
            .unwrap();
        assert_eq!(user.username, "Ana_1");

        let (next, _) = identity
            .resolve_oauth_identity(&oauth_info("x", "100", None, Some("Ana")))
            .await
            .unwrap();
        assert_eq!(next.username, "Ana_2");
    }

    #[tokio::test]
    async fn test_oauth_username_falls_back_to_provider() {
        let identity = setup().await;

        let (user, _) = identity
            .resolve_oauth_identity(&oauth_info("instagram", "7", None, None))
            .await
            .unwrap();
        assert_eq!(user.username, "instagram_user");
    }

    #[tokio::test]
    async fn test_oauth_email_is_trusted_as_verified() {
        let identity = setup().await;

        let (user, _) = identity
            .resolve_oauth_identity(&oauth_info(
                "facebook",
                "fb-1",
                Some("ana@example.com"),
                Some("Ana"),
            ))
            .await
            .unwrap();
        assert!(user.email_verified);
    }

    #[tokio::test]
    async fn test_sanitize_username_rules() {
        assert_eq!(sanitize_username("Ana Banana!"), "AnaBanana");
        assert_eq!(sanitize_username("a_b-c"), "a_b-c");
        assert_eq!(sanitize_username("@@@"), "user");
        assert_eq!(sanitize_username(""), "user");

        let long = "x".repeat(80);
        assert_eq!(sanitize_username(&long).len(), 50);
    }

    #[tokio::test]
    async fn test_unlink_refuses_last_auth_method() {
        let identity = setup().await;

        let (user, _) = identity
            .resolve_oauth_identity(&oauth_info("instagram", "7", None, Some("ana")))
            .await
            .unwrap();

        let result = identity.unlink_provider(&user.id, "instagram").await;
        assert!(matches!(result, Err(IdentityError::LastAuthMethod)));

        // The link must survive the refused unlink
        let links = identity.list_social_accounts(&user.id).await.unwrap();
        assert_eq!(links.len(), 1);
    }

    #[tokio::test]
    async fn test_unlink_succeeds_with_password_set() {
        let identity = setup().await;

        let (user, _) = identity
            .resolve_oauth_identity(&oauth_info("instagram", "7", None, Some("ana")))
            .await
            .unwrap();

        identity.set_password(&user.id, "hunter22").await.unwrap();
        identity.unlink_provider(&user.id, "instagram").await.unwrap();

        let links = identity.list_social_accounts(&user.id).await.unwrap();
        assert!(links.is_empty());
    }

    #[tokio::test]
    async fn test_unlink_succeeds_with_second_link() {
        let identity = setup().await;

        let (user, _) = identity
            .resolve_oauth_identity(&oauth_info(
                "facebook",
                "fb-1",
                Some("ana@example.com"),
                Some("Ana"),
            ))
            .await
            .unwrap();
        let (same_user, is_new) = identity
            .resolve_oauth_identity(&oauth_info(
                "instagram",
                "ig-1",
                Some("ana@example.com"),
                Some("ana"),
            ))
            .await
            .unwrap();
        assert!(!is_new);
        assert_eq!(user.id, same_user.id);

        identity.unlink_provider(&user.id, "facebook").await.unwrap();

        let links = identity.list_social_accounts(&user.id).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].provider, "instagram");
    }

    #[tokio::test]
    async fn test_unlink_unknown_provider_is_not_linked() {
        let identity = setup().await;

        let user = identity
            .register_local("ana@example.com", "ana", "hunter22")
            .await
            .unwrap();

        let result = identity.unlink_provider(&user.id, "facebook").await;
        assert!(matches!(result, Err(IdentityError::NotLinked(p)) if p == "facebook"));
    }

    #[tokio::test]
    async fn test_set_password_enables_local_login() {
        let identity = setup().await;

        let (user, _) = identity
            .resolve_oauth_identity(&oauth_info("instagram", "7", None, Some("ana")))
            .await
            .unwrap();

        let too_short = identity.set_password(&user.id, "12345").await;
        assert!(matches!(too_short, Err(IdentityError::PasswordTooShort)));

        identity.set_password(&user.id, "hunter22").await.unwrap();

        let authed = identity.authenticate_local("ana", "hunter22").await.unwrap();
        assert_eq!(authed.id, user.id);
    }

    #[tokio::test]
    async fn test_set_password_overwrites_existing() {
        let identity = setup().await;

        let user = identity
            .register_local("ana@example.com", "ana", "first-password")
            .await
            .unwrap();

        identity.set_password(&user.id, "second-password").await.unwrap();

        assert!(identity
            .authenticate_local("ana", "first-password")
            .await
            .is_err());
        assert!(identity
            .authenticate_local("ana", "second-password")
            .await
            .is_ok());
    }
}
