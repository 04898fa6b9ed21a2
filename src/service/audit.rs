//! Security audit scoring.

use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use tracing::info;

use crate::core::domain::SecurityAudit;
use crate::core::errors::WalletError;
use crate::monitoring::BusinessMetrics;
use crate::storage::WalletStorage;

pub const RECOMMENDATIONS: [&str; 4] = [
    "Enable two-factor authentication",
    "Update your password regularly",
    "Use a hardware wallet for large amounts",
    "Keep your recovery phrase secure",
];

pub const DEFAULT_HISTORY_LIMIT: u32 = 20;

pub struct AuditService {
    storage: Arc<WalletStorage>,
    metrics: Arc<BusinessMetrics>,
}

impl AuditService {
    pub fn new(storage: Arc<WalletStorage>, metrics: Arc<BusinessMetrics>) -> Self {
        Self { storage, metrics }
    }

    /// Scores the account between 80 and 99 and stores the result.
    pub async fn run_security_audit(&self, user_id: &str) -> Result<SecurityAudit, WalletError> {
        let score: u8 = rand::thread_rng().gen_range(80..=99);
        let recommendations: Vec<String> = RECOMMENDATIONS.iter().map(|r| r.to_string()).collect();

        let audit = self
            .storage
            .insert_security_audit(user_id, score, &recommendations, Utc::now())
            .await?;
        self.metrics.record_audit();
        info!(user_id, score, "security audit completed");
        Ok(audit)
    }

    pub async fn latest(&self, user_id: &str) -> Result<SecurityAudit, WalletError> {
        self.storage
            .latest_security_audit(user_id)
            .await?
            .ok_or_else(|| WalletError::NotFoundError("No security audit has been run".to_string()))
    }

    pub async fn history(&self, user_id: &str, limit: Option<u32>) -> Result<Vec<SecurityAudit>, WalletError> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, 100);
        self.storage.list_security_audits(user_id, limit).await
    }
}
