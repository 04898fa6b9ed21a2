//! Ledger domain types shared by storage, services and the HTTP layer.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::errors::WalletError;

/// Supported custodial asset types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetType {
    Btc,
    Eth,
    Sol,
    Usdc,
    Usdt,
}

impl AssetType {
    pub const ALL: [AssetType; 5] =
        [AssetType::Btc, AssetType::Eth, AssetType::Sol, AssetType::Usdc, AssetType::Usdt];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Btc => "BTC",
            AssetType::Eth => "ETH",
            AssetType::Sol => "SOL",
            AssetType::Usdc => "USDC",
            AssetType::Usdt => "USDT",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BTC" => Ok(AssetType::Btc),
            "ETH" => Ok(AssetType::Eth),
            "SOL" => Ok(AssetType::Sol),
            "USDC" => Ok(AssetType::Usdc),
            "USDT" => Ok(AssetType::Usdt),
            other => Err(WalletError::ValidationError(format!("Unsupported asset type: {}", other))),
        }
    }
}

/// Kind of balance-affecting ledger event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Sent,
    Received,
    Exchange,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Sent => "sent",
            TransactionType::Received => "received",
            TransactionType::Exchange => "exchange",
        }
    }
}

impl FromStr for TransactionType {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(TransactionType::Sent),
            "received" => Ok(TransactionType::Received),
            "exchange" => Ok(TransactionType::Exchange),
            other => Err(WalletError::StorageError(format!("Unknown transaction type: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(WalletError::StorageError(format!("Unknown transaction status: {}", other))),
        }
    }
}

/// Account holder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-user, per-asset balance record.
#[derive(Debug, Clone, Serialize)]
pub struct Wallet {
    pub id: String,
    pub user_id: String,
    pub address: String,
    pub asset_type: AssetType,
    pub balance: Decimal,
    /// Never leaves the service.
    #[serde(skip_serializing)]
    pub private_key_encrypted: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only ledger row.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub wallet_id: String,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub asset_type: AssetType,
    pub amount: Decimal,
    pub to_address: Option<String>,
    pub from_address: Option<String>,
    pub transaction_hash: String,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ledger row joined with the owning wallet's address.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub wallet_address: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityAudit {
    pub id: String,
    pub user_id: String,
    pub score: u8,
    pub recommendations: Vec<String>,
    pub completed_at: DateTime<Utc>,
}
