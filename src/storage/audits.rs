use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::WalletStorage;
use crate::core::domain::SecurityAudit;
use crate::core::errors::WalletError;

fn audit_from_row(row: &SqliteRow) -> Result<SecurityAudit, WalletError> {
    let score: i64 = row.try_get("score")?;
    let recommendations: String = row.try_get("recommendations")?;
    Ok(SecurityAudit {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        score: u8::try_from(score)
            .map_err(|_| WalletError::StorageError(format!("Audit score out of range: {}", score)))?,
        recommendations: serde_json::from_str(&recommendations)
            .map_err(|e| WalletError::StorageError(format!("Corrupt audit recommendations: {}", e)))?,
        completed_at: row.try_get("completed_at")?,
    })
}

impl WalletStorage {
    pub async fn insert_security_audit(
        &self,
        user_id: &str,
        score: u8,
        recommendations: &[String],
        completed_at: DateTime<Utc>,
    ) -> Result<SecurityAudit, WalletError> {
        let id = uuid::Uuid::new_v4().to_string();
        let encoded = serde_json::to_string(recommendations)
            .map_err(|e| WalletError::InternalError(format!("Failed to encode recommendations: {}", e)))?;

        sqlx::query(
            "INSERT INTO security_audits (id, user_id, score, recommendations, completed_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(i64::from(score))
        .bind(&encoded)
        .bind(completed_at)
        .execute(&self.pool)
        .await?;

        Ok(SecurityAudit {
            id,
            user_id: user_id.to_string(),
            score,
            recommendations: recommendations.to_vec(),
            completed_at,
        })
    }

    pub async fn latest_security_audit(
        &self,
        user_id: &str,
    ) -> Result<Option<SecurityAudit>, WalletError> {
        let row = sqlx::query(
            "SELECT * FROM security_audits WHERE user_id = ?1 ORDER BY completed_at DESC, rowid DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(audit_from_row).transpose()
    }

    pub async fn list_security_audits(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<SecurityAudit>, WalletError> {
        let rows = sqlx::query(
            "SELECT * FROM security_audits WHERE user_id = ?1 ORDER BY completed_at DESC, rowid DESC LIMIT ?2",
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(audit_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NewUser;

    #[tokio::test]
    async fn test_audits_latest_first() {
        let storage = WalletStorage::in_memory().await.unwrap();
        let user = storage
            .create_user(NewUser {
                email: "audit@example.com".to_string(),
                name: "Audit".to_string(),
                timezone: "UTC".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();

        assert!(storage.latest_security_audit(&user.id).await.unwrap().is_none());

        let recs = vec!["Enable two-factor authentication".to_string()];
        let earlier = Utc::now() - chrono::Duration::minutes(5);
        storage.insert_security_audit(&user.id, 81, &recs, earlier).await.unwrap();
        storage.insert_security_audit(&user.id, 95, &recs, Utc::now()).await.unwrap();

        let latest = storage.latest_security_audit(&user.id).await.unwrap().unwrap();
        assert_eq!(latest.score, 95);
        assert_eq!(latest.recommendations, recs);

        let all = storage.list_security_audits(&user.id, 10).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].score, 81);
    }
}
