//! Request and response bodies.
//!
//! Request fields accept both snake_case and the camelCase names the
//! dashboard forms post. Amounts are taken as raw JSON so a string or a
//! number both parse.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::domain::{SecurityAudit, User};
use crate::core::errors::WalletError;
use crate::safe::ProposalReceipt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub timezone: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateWalletRequest {
    #[serde(alias = "assetType")]
    pub asset_type: String,
}

#[derive(Debug, Deserialize)]
pub struct AddFundsRequest {
    #[serde(alias = "assetType")]
    pub asset_type: String,
    pub amount: Value,
}

#[derive(Debug, Deserialize)]
pub struct SendFundsRequest {
    #[serde(alias = "assetType")]
    pub asset_type: String,
    pub amount: Value,
    #[serde(alias = "toAddress", default)]
    pub to_address: String,
}

#[derive(Debug, Deserialize)]
pub struct ExchangeRequest {
    #[serde(alias = "fromAsset")]
    pub from_asset: String,
    #[serde(alias = "toAsset")]
    pub to_asset: String,
    pub amount: Value,
}

/// `{ success, message, ...receipt }`
#[derive(Debug, Serialize)]
pub struct ActionResponse<T: Serialize> {
    pub success: bool,
    pub message: &'static str,
    #[serde(flatten)]
    pub result: T,
}

impl<T: Serialize> ActionResponse<T> {
    pub fn ok(message: &'static str, result: T) -> Self {
        Self { success: true, message, result }
    }
}

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct AuditHistoryQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct AuditResponse {
    pub success: bool,
    #[serde(flatten)]
    pub audit: SecurityAudit,
}

#[derive(Debug, Deserialize)]
pub struct CreateProposalRequest {
    pub to: String,
    pub value: Value,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub operation: Option<u8>,
    #[serde(default)]
    pub nonce: Option<u64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl CreateProposalRequest {
    /// Wei value as a decimal string. Accepts a JSON string or an unsigned integer.
    pub fn wei_value(&self) -> Result<String, WalletError> {
        match &self.value {
            Value::String(s) => Ok(s.trim().to_string()),
            Value::Number(n) if n.is_u64() => Ok(n.to_string()),
            Value::Null => Ok("0".to_string()),
            _ => Err(WalletError::InvalidAmount("Value must be a non-negative integer in wei".to_string())),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProposalCreatedResponse {
    pub success: bool,
    pub transaction: ProposalReceipt,
    pub message: &'static str,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveRequest {
    #[serde(default)]
    pub signer: Option<String>,
}
