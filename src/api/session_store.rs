//! Bearer-token sessions.
//!
//! Tokens are random 32-byte hex strings mapped to a user id with an
//! expiry. Everything lives in memory, so a restart logs everyone out.

use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

use crate::core::errors::WalletError;

#[derive(Clone, Debug)]
pub struct TokenInfo {
    pub user_id: String,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
}

#[derive(Clone, Debug)]
pub struct SessionStore {
    tokens: Arc<RwLock<HashMap<String, TokenInfo>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl_seconds: u64) -> Self {
        Self { tokens: Arc::new(RwLock::new(HashMap::new())), ttl: Duration::from_secs(ttl_seconds) }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Creates a session for `user_id` and returns its token.
    pub async fn issue_token(&self, user_id: &str) -> String {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        self.register_token(&token, user_id, self.ttl).await;
        token
    }

    pub async fn register_token(&self, token: &str, user_id: &str, ttl: Duration) {
        let now = SystemTime::now();
        let info = TokenInfo { user_id: user_id.to_string(), created_at: now, expires_at: now + ttl };
        self.tokens.write().await.insert(token.to_string(), info);
        tracing::debug!(user_id, ttl_secs = ttl.as_secs(), "session registered");
    }

    /// Returns the user id behind a live token.
    pub async fn validate_token(&self, token: &str) -> Result<String, WalletError> {
        let tokens = self.tokens.read().await;
        match tokens.get(token) {
            Some(info) if SystemTime::now() <= info.expires_at => Ok(info.user_id.clone()),
            Some(_) => Err(WalletError::Unauthorized("Session expired".to_string())),
            None => Err(WalletError::Unauthorized("Invalid session token".to_string())),
        }
    }

    pub async fn revoke_token(&self, token: &str) -> Result<(), WalletError> {
        if self.tokens.write().await.remove(token).is_some() {
            tracing::info!("session revoked");
            Ok(())
        } else {
            Err(WalletError::Unauthorized("Invalid session token".to_string()))
        }
    }

    /// Drops expired sessions, returning how many were removed.
    pub async fn cleanup_expired_tokens(&self) -> usize {
        let mut tokens = self.tokens.write().await;
        let now = SystemTime::now();
        let before = tokens.len();
        tokens.retain(|_, info| now <= info.expires_at);
        let removed = before - tokens.len();
        if removed > 0 {
            tracing::info!(removed, "expired sessions cleaned up");
        }
        removed
    }

    pub async fn active_sessions(&self) -> usize {
        self.tokens.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_token_lifecycle() {
        let store = SessionStore::new(60);
        let token = store.issue_token("user123").await;
        assert_eq!(token.len(), 64);

        assert_eq!(store.validate_token(&token).await.unwrap(), "user123");
        store.revoke_token(&token).await.unwrap();
        assert!(store.validate_token(&token).await.is_err());
        assert!(store.revoke_token(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_expired_tokens_rejected_and_cleaned() {
        let store = SessionStore::new(60);
        store.register_token("stale", "user1", Duration::ZERO).await;
        store.register_token("fresh", "user2", Duration::from_secs(60)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let err = store.validate_token("stale").await.unwrap_err();
        assert_eq!(err.message(), "Session expired");

        assert_eq!(store.cleanup_expired_tokens().await, 1);
        assert_eq!(store.active_sessions().await, 1);
    }
}
