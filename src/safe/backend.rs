use async_trait::async_trait;

use super::types::{
    ApprovalReceipt, ExecutionReceipt, ProposalReceipt, ProposalRequest, ProposalStatus, SafeInfo,
    SafeProposal,
};
use crate::core::errors::WalletError;

pub const DEFAULT_HISTORY_LIMIT: usize = 20;
pub const DEFAULT_THRESHOLD: u32 = 2;

/// Source of Safe state and sink for Safe writes.
#[async_trait]
pub trait SafeBackend: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &'static str;

    async fn info(&self) -> Result<SafeInfo, WalletError>;

    async fn pending_proposals(&self) -> Result<Vec<SafeProposal>, WalletError>;

    async fn history(&self, limit: usize) -> Result<Vec<SafeProposal>, WalletError>;

    async fn propose(&self, request: ProposalRequest) -> Result<ProposalReceipt, WalletError>;

    /// Adds a confirmation. `signer` names the owner confirming; backends
    /// holding a single key reject any other owner.
    async fn approve(
        &self,
        safe_tx_hash: &str,
        signer: Option<&str>,
    ) -> Result<ApprovalReceipt, WalletError>;

    async fn execute(&self, safe_tx_hash: &str) -> Result<ExecutionReceipt, WalletError>;

    async fn is_owner(&self, address: &str) -> Result<bool, WalletError>;

    async fn required_confirmations(&self) -> Result<u32, WalletError>;
}

/// Hosted Safe Transaction Service for a chain, if one exists.
pub fn tx_service_url(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        1 => Some("https://safe-transaction-mainnet.safe.global"),
        5 => Some("https://safe-transaction-goerli.safe.global"),
        11155111 => Some("https://safe-transaction-sepolia.safe.global"),
        137 => Some("https://safe-transaction-polygon.safe.global"),
        56 => Some("https://safe-transaction-bsc.safe.global"),
        100 => Some("https://safe-transaction-gnosis-chain.safe.global"),
        42161 => Some("https://safe-transaction-arbitrum.safe.global"),
        10 => Some("https://safe-transaction-optimism.safe.global"),
        _ => None,
    }
}

pub fn pending_status(is_executed: bool, confirmations: u32, threshold: u32) -> ProposalStatus {
    if is_executed {
        ProposalStatus::Executed
    } else if confirmations >= threshold {
        ProposalStatus::Approved
    } else {
        ProposalStatus::Pending
    }
}

pub fn history_status(is_executed: bool, is_successful: Option<bool>) -> ProposalStatus {
    if is_executed {
        ProposalStatus::Executed
    } else if is_successful == Some(false) {
        ProposalStatus::Rejected
    } else {
        ProposalStatus::Approved
    }
}

/// Decoded method name, else `Transfer <value> ETH`.
pub fn proposal_title(method: Option<&str>, value: &str) -> String {
    match method {
        Some(method) => method.to_string(),
        None => format!("Transfer {} ETH", value),
    }
}

/// `decoded` is the method name and its parameter count.
pub fn proposal_description(decoded: Option<(&str, usize)>, value: &str, to: &str) -> String {
    if let Some((method, params)) = decoded {
        return format!("{} with {} parameters", method, params);
    }
    if !value.is_empty() && value != "0" {
        return format!("Transfer {} ETH to {}", value, to);
    }
    format!("Contract interaction with {}", to)
}
