//! Wallet balances and the transaction ledger.
//!
//! The free functions take a `&mut SqliteConnection` so callers can compose
//! them inside one database transaction; the `WalletStorage` methods are
//! single-statement conveniences over the pool.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::str::FromStr;
use tracing::debug;

use super::WalletStorage;
use crate::core::domain::{
    AssetType, LedgerEntry, Transaction, TransactionStatus, TransactionType, Wallet,
};
use crate::core::errors::WalletError;
use crate::crypto::generate_transaction_hash;

/// A ledger row to append. Asset type is copied from the wallet.
#[derive(Debug, Clone)]
pub struct NewTransaction<'a> {
    pub user_id: &'a str,
    pub wallet_id: &'a str,
    pub tx_type: TransactionType,
    pub amount: Decimal,
    pub to_address: Option<&'a str>,
    pub from_address: Option<&'a str>,
}

fn decimal_column(row: &SqliteRow, column: &str) -> Result<Decimal, WalletError> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(&raw)
        .map_err(|e| WalletError::StorageError(format!("Corrupt decimal in {}: {}", column, e)))
}

pub(crate) fn wallet_from_row(row: &SqliteRow) -> Result<Wallet, WalletError> {
    let asset: String = row.try_get("asset_type")?;
    Ok(Wallet {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        address: row.try_get("address")?,
        asset_type: AssetType::from_str(&asset)?,
        balance: decimal_column(row, "balance")?,
        private_key_encrypted: row.try_get("private_key_encrypted")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub(crate) fn transaction_from_row(row: &SqliteRow) -> Result<Transaction, WalletError> {
    let tx_type: String = row.try_get("type")?;
    let asset: String = row.try_get("asset_type")?;
    let status: String = row.try_get("status")?;
    Ok(Transaction {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        wallet_id: row.try_get("wallet_id")?,
        tx_type: TransactionType::from_str(&tx_type)?,
        asset_type: AssetType::from_str(&asset)?,
        amount: decimal_column(row, "amount")?,
        to_address: row.try_get("to_address")?,
        from_address: row.try_get("from_address")?,
        transaction_hash: row.try_get("transaction_hash")?,
        status: TransactionStatus::from_str(&status)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Take SQLite's write lock before reading balances, so concurrent ledger
/// updates for the same user serialize instead of failing on upgrade.
pub async fn lock_user_wallets(conn: &mut SqliteConnection, user_id: &str) -> Result<(), WalletError> {
    sqlx::query("UPDATE wallets SET updated_at = updated_at WHERE user_id = ?1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn wallet_by_asset(
    conn: &mut SqliteConnection,
    user_id: &str,
    asset_type: AssetType,
) -> Result<Option<Wallet>, WalletError> {
    let row = sqlx::query("SELECT * FROM wallets WHERE user_id = ?1 AND asset_type = ?2")
        .bind(user_id)
        .bind(asset_type.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(wallet_from_row).transpose()
}

/// Insert a zero-balance wallet unless one already exists for the pair, then
/// return whichever row is stored.
pub async fn insert_wallet(
    conn: &mut SqliteConnection,
    user_id: &str,
    asset_type: AssetType,
    address: &str,
    private_key_encrypted: &str,
) -> Result<Wallet, WalletError> {
    let now = Utc::now();
    let inserted = sqlx::query(
        r#"
        INSERT INTO wallets (id, user_id, address, asset_type, balance, private_key_encrypted, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, '0', ?5, ?6, ?6)
        ON CONFLICT (user_id, asset_type) DO NOTHING
        "#,
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(address)
    .bind(asset_type.as_str())
    .bind(private_key_encrypted)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if inserted.rows_affected() > 0 {
        debug!(user_id, asset = %asset_type, "wallet created");
    }

    wallet_by_asset(conn, user_id, asset_type)
        .await?
        .ok_or_else(|| WalletError::InternalError("Wallet missing after insert".to_string()))
}

pub async fn set_balance(
    conn: &mut SqliteConnection,
    wallet_id: &str,
    balance: Decimal,
) -> Result<(), WalletError> {
    if balance.is_sign_negative() && !balance.is_zero() {
        return Err(WalletError::InsufficientFunds("Insufficient balance".to_string()));
    }
    let result = sqlx::query("UPDATE wallets SET balance = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(balance.normalize().to_string())
        .bind(Utc::now())
        .bind(wallet_id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(WalletError::NotFoundError("Wallet not found".to_string()));
    }
    Ok(())
}

pub async fn insert_transaction(
    conn: &mut SqliteConnection,
    new_tx: &NewTransaction<'_>,
) -> Result<Transaction, WalletError> {
    let asset: Option<String> = sqlx::query_scalar("SELECT asset_type FROM wallets WHERE id = ?1")
        .bind(new_tx.wallet_id)
        .fetch_optional(&mut *conn)
        .await?;
    let asset = asset.ok_or_else(|| WalletError::NotFoundError("Wallet not found".to_string()))?;

    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO transactions
            (id, user_id, wallet_id, type, asset_type, amount, to_address, from_address,
             transaction_hash, status, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
        "#,
    )
    .bind(&id)
    .bind(new_tx.user_id)
    .bind(new_tx.wallet_id)
    .bind(new_tx.tx_type.as_str())
    .bind(&asset)
    .bind(new_tx.amount.normalize().to_string())
    .bind(new_tx.to_address)
    .bind(new_tx.from_address)
    .bind(generate_transaction_hash())
    .bind(TransactionStatus::Completed.as_str())
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let row = sqlx::query("SELECT * FROM transactions WHERE id = ?1")
        .bind(&id)
        .fetch_one(&mut *conn)
        .await?;
    transaction_from_row(&row)
}

impl WalletStorage {
    pub async fn get_user_wallets(&self, user_id: &str) -> Result<Vec<Wallet>, WalletError> {
        let rows = sqlx::query("SELECT * FROM wallets WHERE user_id = ?1 ORDER BY created_at, rowid")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(wallet_from_row).collect()
    }

    pub async fn get_wallet_by_asset(
        &self,
        user_id: &str,
        asset_type: AssetType,
    ) -> Result<Option<Wallet>, WalletError> {
        let mut conn = self.pool.acquire().await?;
        wallet_by_asset(&mut conn, user_id, asset_type).await
    }

    pub async fn create_wallet(
        &self,
        user_id: &str,
        asset_type: AssetType,
        address: &str,
        private_key_encrypted: &str,
    ) -> Result<Wallet, WalletError> {
        let mut conn = self.pool.acquire().await?;
        insert_wallet(&mut conn, user_id, asset_type, address, private_key_encrypted).await
    }

    /// Zero when the wallet does not exist.
    pub async fn get_wallet_balance(&self, wallet_id: &str) -> Result<Decimal, WalletError> {
        let raw: Option<String> = sqlx::query_scalar("SELECT balance FROM wallets WHERE id = ?1")
            .bind(wallet_id)
            .fetch_optional(&self.pool)
            .await?;
        match raw {
            Some(raw) => Decimal::from_str(&raw)
                .map_err(|e| WalletError::StorageError(format!("Corrupt decimal in balance: {}", e))),
            None => Ok(Decimal::ZERO),
        }
    }

    pub async fn update_wallet_balance(
        &self,
        wallet_id: &str,
        balance: Decimal,
    ) -> Result<(), WalletError> {
        let mut conn = self.pool.acquire().await?;
        set_balance(&mut conn, wallet_id, balance).await
    }

    pub async fn create_transaction(
        &self,
        new_tx: &NewTransaction<'_>,
    ) -> Result<Transaction, WalletError> {
        let mut conn = self.pool.acquire().await?;
        insert_transaction(&mut conn, new_tx).await
    }

    /// Newest first, joined with the owning wallet's address.
    pub async fn get_user_transactions(
        &self,
        user_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<LedgerEntry>, WalletError> {
        let rows = sqlx::query(
            r#"
            SELECT t.*, w.address AS wallet_address
            FROM transactions t
            JOIN wallets w ON w.id = t.wallet_id
            WHERE t.user_id = ?1
            ORDER BY t.created_at DESC, t.rowid DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(LedgerEntry {
                    transaction: transaction_from_row(row)?,
                    wallet_address: row.try_get("wallet_address")?,
                })
            })
            .collect()
    }

    pub async fn count_user_transactions(&self, user_id: &str) -> Result<u64, WalletError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NewUser;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    async fn storage_with_user() -> (WalletStorage, String) {
        let storage = WalletStorage::in_memory().await.unwrap();
        let user = storage
            .create_user(NewUser {
                email: "ledger@example.com".to_string(),
                name: "Ledger".to_string(),
                timezone: "UTC".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        (storage, user.id)
    }

    #[tokio::test]
    async fn test_insert_wallet_is_idempotent_per_asset() {
        let (storage, user_id) = storage_with_user().await;
        let mut conn = storage.pool().acquire().await.unwrap();
        let first = insert_wallet(&mut conn, &user_id, AssetType::Eth, "0xaaa", "enc").await.unwrap();
        let second = insert_wallet(&mut conn, &user_id, AssetType::Eth, "0xbbb", "enc").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.address, "0xaaa");
        assert_eq!(second.balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_balance_and_missing_wallet() {
        let (storage, user_id) = storage_with_user().await;
        assert_eq!(storage.get_wallet_balance("missing").await.unwrap(), Decimal::ZERO);

        let wallet = storage.create_wallet(&user_id, AssetType::Btc, "1abc", "enc").await.unwrap();
        storage.update_wallet_balance(&wallet.id, dec("0.12345678")).await.unwrap();
        assert_eq!(storage.get_wallet_balance(&wallet.id).await.unwrap(), dec("0.12345678"));
        let fetched = storage.get_wallet_by_asset(&user_id, AssetType::Btc).await.unwrap().unwrap();
        assert_eq!(fetched.balance, dec("0.12345678"));

        let negative = storage.update_wallet_balance(&wallet.id, dec("-1")).await;
        assert!(matches!(negative, Err(WalletError::InsufficientFunds(_))));
    }

    #[tokio::test]
    async fn test_transactions_newest_first_with_paging() {
        let (storage, user_id) = storage_with_user().await;
        let wallet = {
            let mut conn = storage.pool().acquire().await.unwrap();
            insert_wallet(&mut conn, &user_id, AssetType::Sol, "0xsol", "enc").await.unwrap()
        };

        for amount in [dec("1"), dec("2"), dec("3")] {
            storage
                .create_transaction(&NewTransaction {
                    user_id: &user_id,
                    wallet_id: &wallet.id,
                    tx_type: TransactionType::Received,
                    amount,
                    to_address: Some("0xsol"),
                    from_address: Some("External Deposit"),
                })
                .await
                .unwrap();
        }

        let page = storage.get_user_transactions(&user_id, 2, 0).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].transaction.amount, dec("3"));
        assert_eq!(page[0].transaction.asset_type, AssetType::Sol);
        assert_eq!(page[0].wallet_address, "0xsol");

        let rest = storage.get_user_transactions(&user_id, 2, 2).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].transaction.amount, dec("1"));
        assert_eq!(storage.count_user_transactions(&user_id).await.unwrap(), 3);
    }
}
