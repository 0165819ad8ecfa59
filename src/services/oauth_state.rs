// src/services/oauth_state.rs
//! Single-use anti-CSRF state tokens for the OAuth authorization redirect.
//!
//! The store is an in-process map, sufficient for a single service instance.
//! A multi-instance deployment must swap it for an external key-value store
//! with TTL; callers only depend on `generate`/`verify` behavior.

use rand::Rng;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tracing::debug;

/// How long an issued state token remains valid.
pub const STATE_TTL_SECONDS: u64 = 600;

/// Issues and validates single-use, time-bounded anti-CSRF tokens.
pub struct OAuthStateManager {
    states: RwLock<HashMap<String, Instant>>,
    secret: String,
    ttl: Duration,
}

impl OAuthStateManager {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            secret: secret.to_string(),
            ttl,
        }
    }

    /// Generate a state token and record its issue time. Expired entries are
    /// purged opportunistically on each generation.
    pub async fn generate(&self) -> String {
        let random_bytes: [u8; 32] = rand::thread_rng().gen();
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();

        let mut hasher = Sha256::new();
        hasher.update(random_bytes);
        hasher.update(timestamp.to_be_bytes());
        hasher.update(self.secret.as_bytes());
        let state = hex::encode(hasher.finalize());

        let mut states = self.states.write().await;
        let now = Instant::now();
        states.retain(|_, created_at| now.duration_since(*created_at) <= self.ttl);
        states.insert(state.clone(), now);

        debug!(pending_states = states.len(), "Issued OAuth state token");

        state
    }

    /// True iff the token exists and is within the TTL. The entry is removed
    /// whenever it is found, valid or not: a state token is usable exactly
    /// once, and two concurrent verifications of the same value cannot both
    /// succeed because removal happens under a single write lock.
    pub async fn verify(&self, state: &str) -> bool {
        let created_at = self.states.write().await.remove(state);

        match created_at {
            Some(created_at) => created_at.elapsed() <= self.ttl,
            None => false,
        }
    }
}
