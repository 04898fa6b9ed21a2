//! Safe wire types, camelCase as the dashboard consumes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeInfo {
    pub address: String,
    pub owners: Vec<String>,
    pub threshold: u32,
    /// Native balance in ether, decimal string.
    pub balance: String,
    pub nonce: u64,
    pub version: String,
    pub modules: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guard: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Executed,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeProposal {
    pub id: String,
    pub title: String,
    pub description: String,
    pub to: String,
    /// Wei, decimal string.
    pub value: String,
    pub data: String,
    pub status: ProposalStatus,
    pub confirmations: u32,
    pub required_confirmations: u32,
    pub submitted_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safe_tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
}

/// The fields of a `SafeTx` as hashed and executed by the Safe contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeTransactionData {
    pub to: String,
    pub value: String,
    pub data: String,
    pub operation: u8,
    pub safe_tx_gas: String,
    pub base_gas: String,
    pub gas_price: String,
    pub gas_token: String,
    pub refund_receiver: String,
    pub nonce: u64,
}

impl SafeTransactionData {
    /// A plain call with no gas refund parameters.
    pub fn call(to: &str, value: &str, data: &str, operation: u8, nonce: u64) -> Self {
        Self {
            to: to.to_string(),
            value: value.to_string(),
            data: data.to_string(),
            operation,
            safe_tx_gas: "0".to_string(),
            base_gas: "0".to_string(),
            gas_price: "0".to_string(),
            gas_token: ZERO_ADDRESS.to_string(),
            refund_receiver: ZERO_ADDRESS.to_string(),
            nonce,
        }
    }
}

/// A validated request to queue a new Safe transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposalRequest {
    pub to: String,
    pub value: String,
    pub data: String,
    pub operation: u8,
    /// Explicit nonce, used to queue a replacement for an existing proposal.
    pub nonce: Option<u64>,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalReceipt {
    pub safe_tx_hash: String,
    pub sender: String,
    pub transaction: SafeTransactionData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalReceipt {
    pub success: bool,
    pub safe_tx_hash: String,
    pub signer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub confirmations: u32,
    pub status: ProposalStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReceipt {
    pub success: bool,
    pub safe_tx_hash: String,
    pub tx_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proposal_wire_names() {
        let proposal = SafeProposal {
            id: "1".to_string(),
            title: "t".to_string(),
            description: "d".to_string(),
            to: ZERO_ADDRESS.to_string(),
            value: "0".to_string(),
            data: "0x".to_string(),
            status: ProposalStatus::Pending,
            confirmations: 1,
            required_confirmations: 2,
            submitted_by: "me".to_string(),
            created_at: Utc::now(),
            executed_at: None,
            safe_tx_hash: Some("0xabc".to_string()),
            transaction_hash: None,
            nonce: Some(42),
        };
        let json = serde_json::to_value(&proposal).unwrap();
        assert_eq!(json["requiredConfirmations"], 2);
        assert_eq!(json["submittedBy"], "me");
        assert_eq!(json["safeTxHash"], "0xabc");
        assert_eq!(json["status"], "pending");
        assert!(json.get("executedAt").is_none());
    }
}
