//! In-memory Safe used when no live backend is available.
//!
//! Seeded with a 2-of-3 Safe at nonce 42 and two queued proposals. State
//! changes follow Safe rules: one confirmation per owner, execution only at
//! threshold and only for the current nonce. Executing a nonce rejects any
//! other proposal that shared it.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use tracing::info;

use super::backend::{proposal_description, proposal_title, SafeBackend};
use super::eip712::{format_hash, parse_address, safe_tx_hash};
use super::types::{
    ApprovalReceipt, ExecutionReceipt, ProposalReceipt, ProposalRequest, ProposalStatus, SafeInfo,
    SafeProposal, SafeTransactionData,
};
use crate::core::errors::WalletError;
use crate::crypto::generate_transaction_hash;

pub const DEFAULT_SAFE_ADDRESS: &str = "0x1234567890123456789012345678901234567890";

pub const MOCK_OWNERS: [&str; 3] = [
    "0x1234567890123456789012345678901234567890",
    "0x2345678901234567890123456789012345678901",
    "0x3456789012345678901234567890123456789012",
];

const ADD_OWNER_CALLDATA: &str = "0x0d582f13000000000000000000000000d8da6bf26964af9d7eed9e03e53415d37aa96045000000000000000000000000000000000000000000000000000000000000000a";

#[derive(Debug, Clone)]
struct MockEntry {
    proposal: SafeProposal,
    signers: Vec<String>,
}

#[derive(Debug)]
struct MockState {
    info: SafeInfo,
    entries: Vec<MockEntry>,
}

#[derive(Debug)]
pub struct MockSafeBackend {
    chain_id: u64,
    state: Mutex<MockState>,
}

fn seeded_at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).single().unwrap_or_else(Utc::now)
}

fn same_address(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

impl MockSafeBackend {
    pub fn new(address: Option<&str>, chain_id: u64) -> Self {
        let address = address.unwrap_or(DEFAULT_SAFE_ADDRESS).to_string();
        let info = SafeInfo {
            address: address.clone(),
            owners: MOCK_OWNERS.iter().map(|o| o.to_string()).collect(),
            threshold: 2,
            balance: "1.5".to_string(),
            nonce: 42,
            version: "1.3.0".to_string(),
            modules: Vec::new(),
            guard: None,
        };

        let entries = vec![
            MockEntry {
                proposal: SafeProposal {
                    id: "1".to_string(),
                    title: "Transfer 1 ETH to Treasury".to_string(),
                    description: "Monthly treasury funding for operational expenses".to_string(),
                    to: "0x742d35Cc6634C0532925a3b8D4C0C8b3C2e1e1e1".to_string(),
                    value: "1000000000000000000".to_string(),
                    data: "0x".to_string(),
                    status: ProposalStatus::Pending,
                    confirmations: 1,
                    required_confirmations: 2,
                    submitted_by: "0x1234...5678".to_string(),
                    created_at: seeded_at(2025, 1, 15, 10, 0),
                    executed_at: None,
                    safe_tx_hash: Some("0xabc123...".to_string()),
                    transaction_hash: None,
                    nonce: Some(42),
                },
                signers: vec![MOCK_OWNERS[0].to_string()],
            },
            MockEntry {
                proposal: SafeProposal {
                    id: "2".to_string(),
                    title: "Add New Owner".to_string(),
                    description: "Add new team member as Safe owner".to_string(),
                    to: address,
                    value: "0".to_string(),
                    data: ADD_OWNER_CALLDATA.to_string(),
                    status: ProposalStatus::Pending,
                    confirmations: 1,
                    required_confirmations: 2,
                    submitted_by: "0x9abc...def0".to_string(),
                    created_at: seeded_at(2025, 1, 16, 8, 45),
                    executed_at: None,
                    safe_tx_hash: Some("0xdef456...".to_string()),
                    transaction_hash: None,
                    nonce: Some(43),
                },
                signers: vec![MOCK_OWNERS[1].to_string()],
            },
        ];

        Self { chain_id, state: Mutex::new(MockState { info, entries }) }
    }

    /// Owner that signs proposals created through this backend.
    pub fn local_signer(&self) -> String {
        MOCK_OWNERS[0].to_string()
    }
}

impl MockState {
    fn find_mut(&mut self, key: &str) -> Result<&mut MockEntry, WalletError> {
        self.entries
            .iter_mut()
            .find(|e| e.proposal.id == key || e.proposal.safe_tx_hash.as_deref() == Some(key))
            .ok_or_else(|| WalletError::NotFoundError(format!("Proposal {} not found", key)))
    }

    fn is_owner(&self, address: &str) -> bool {
        self.info.owners.iter().any(|o| same_address(o, address))
    }

    fn next_nonce(&self) -> u64 {
        self.entries
            .iter()
            .filter(|e| matches!(e.proposal.status, ProposalStatus::Pending | ProposalStatus::Approved))
            .filter_map(|e| e.proposal.nonce)
            .map(|n| n + 1)
            .fold(self.info.nonce, u64::max)
    }
}

#[async_trait]
impl SafeBackend for MockSafeBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn info(&self) -> Result<SafeInfo, WalletError> {
        Ok(self.state.lock().info.clone())
    }

    async fn pending_proposals(&self) -> Result<Vec<SafeProposal>, WalletError> {
        let state = self.state.lock();
        let mut pending: Vec<SafeProposal> = state
            .entries
            .iter()
            .filter(|e| matches!(e.proposal.status, ProposalStatus::Pending | ProposalStatus::Approved))
            .map(|e| e.proposal.clone())
            .collect();
        pending.sort_by_key(|p| p.nonce);
        Ok(pending)
    }

    async fn history(&self, limit: usize) -> Result<Vec<SafeProposal>, WalletError> {
        let state = self.state.lock();
        let mut done: Vec<SafeProposal> = state
            .entries
            .iter()
            .filter(|e| matches!(e.proposal.status, ProposalStatus::Executed | ProposalStatus::Rejected))
            .map(|e| e.proposal.clone())
            .collect();
        done.sort_by(|a, b| {
            let at = a.executed_at.unwrap_or(a.created_at);
            let bt = b.executed_at.unwrap_or(b.created_at);
            bt.cmp(&at).then_with(|| b.nonce.cmp(&a.nonce))
        });
        done.truncate(limit);
        Ok(done)
    }

    async fn propose(&self, request: ProposalRequest) -> Result<ProposalReceipt, WalletError> {
        let mut state = self.state.lock();
        let nonce = match request.nonce {
            Some(nonce) if nonce < state.info.nonce => {
                return Err(WalletError::Conflict(format!(
                    "Nonce {} was already used; the Safe is at {}",
                    nonce, state.info.nonce
                )));
            }
            Some(nonce) => nonce,
            None => state.next_nonce(),
        };
        let transaction =
            SafeTransactionData::call(&request.to, &request.value, &request.data, request.operation, nonce);
        let safe = parse_address(&state.info.address)?;
        let hash = format_hash(safe_tx_hash(self.chain_id, safe, &transaction)?);
        if state.find_mut(&hash).is_ok() {
            return Err(WalletError::Conflict(format!("Proposal {} already exists", hash)));
        }
        let sender = self.local_signer();

        let proposal = SafeProposal {
            id: hash.clone(),
            title: request
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| proposal_title(None, &request.value)),
            description: request
                .description
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| proposal_description(None, &request.value, &request.to)),
            to: request.to,
            value: request.value,
            data: request.data,
            status: ProposalStatus::Pending,
            confirmations: 1,
            required_confirmations: state.info.threshold,
            submitted_by: sender.clone(),
            created_at: Utc::now(),
            executed_at: None,
            safe_tx_hash: Some(hash.clone()),
            transaction_hash: None,
            nonce: Some(nonce),
        };
        state.entries.push(MockEntry { proposal, signers: vec![sender.clone()] });
        info!(safe_tx_hash = %hash, nonce, "mock Safe proposal queued");

        Ok(ProposalReceipt { safe_tx_hash: hash, sender, transaction, signature: None })
    }

    async fn approve(
        &self,
        safe_tx_hash: &str,
        signer: Option<&str>,
    ) -> Result<ApprovalReceipt, WalletError> {
        let mut state = self.state.lock();
        let threshold = state.info.threshold;
        let owners = state.info.owners.clone();
        if let Some(signer) = signer {
            if !state.is_owner(signer) {
                return Err(WalletError::Unauthorized(format!("{} is not a Safe owner", signer)));
            }
        }

        let entry = state.find_mut(safe_tx_hash)?;
        if matches!(entry.proposal.status, ProposalStatus::Executed | ProposalStatus::Rejected) {
            return Err(WalletError::Conflict("Proposal is already finalized".to_string()));
        }

        let signer = match signer {
            Some(signer) => {
                if entry.signers.iter().any(|s| same_address(s, signer)) {
                    return Err(WalletError::Conflict(format!(
                        "{} already confirmed this proposal",
                        signer
                    )));
                }
                signer.to_string()
            }
            None => owners
                .iter()
                .find(|o| !entry.signers.iter().any(|s| same_address(s, o)))
                .cloned()
                .ok_or_else(|| {
                    WalletError::Conflict("Every owner already confirmed this proposal".to_string())
                })?,
        };

        entry.signers.push(signer.clone());
        entry.proposal.confirmations = entry.signers.len() as u32;
        if entry.proposal.confirmations >= threshold {
            entry.proposal.status = ProposalStatus::Approved;
        }
        info!(proposal = %entry.proposal.id, confirmations = entry.proposal.confirmations, "mock Safe confirmation added");

        Ok(ApprovalReceipt {
            success: true,
            safe_tx_hash: entry.proposal.safe_tx_hash.clone().unwrap_or_else(|| entry.proposal.id.clone()),
            signer,
            signature: None,
            confirmations: entry.proposal.confirmations,
            status: entry.proposal.status,
        })
    }

    async fn execute(&self, safe_tx_hash: &str) -> Result<ExecutionReceipt, WalletError> {
        let mut state = self.state.lock();
        let current_nonce = state.info.nonce;

        let entry = state.find_mut(safe_tx_hash)?;
        match entry.proposal.status {
            ProposalStatus::Approved => {}
            ProposalStatus::Pending => {
                return Err(WalletError::Conflict(format!(
                    "Proposal needs {} confirmations, has {}",
                    entry.proposal.required_confirmations, entry.proposal.confirmations
                )));
            }
            ProposalStatus::Executed | ProposalStatus::Rejected => {
                return Err(WalletError::Conflict("Proposal is already finalized".to_string()));
            }
        }
        let nonce = entry.proposal.nonce.unwrap_or(current_nonce);
        if nonce != current_nonce {
            return Err(WalletError::Conflict(format!(
                "Proposal nonce {} is not the Safe's current nonce {}",
                nonce, current_nonce
            )));
        }

        let tx_hash = format!("0x{}", generate_transaction_hash());
        entry.proposal.status = ProposalStatus::Executed;
        entry.proposal.executed_at = Some(Utc::now());
        entry.proposal.transaction_hash = Some(tx_hash.clone());
        let executed_id = entry.proposal.id.clone();
        let receipt_hash = entry.proposal.safe_tx_hash.clone().unwrap_or_else(|| executed_id.clone());

        for other in state.entries.iter_mut() {
            if other.proposal.id != executed_id
                && other.proposal.nonce == Some(nonce)
                && matches!(other.proposal.status, ProposalStatus::Pending | ProposalStatus::Approved)
            {
                other.proposal.status = ProposalStatus::Rejected;
            }
        }
        state.info.nonce = current_nonce + 1;
        info!(proposal = %executed_id, nonce, "mock Safe transaction executed");

        Ok(ExecutionReceipt { success: true, safe_tx_hash: receipt_hash, tx_hash, block_number: None })
    }

    async fn is_owner(&self, address: &str) -> Result<bool, WalletError> {
        Ok(self.state.lock().is_owner(address))
    }

    async fn required_confirmations(&self) -> Result<u32, WalletError> {
        Ok(self.state.lock().info.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request(value: &str) -> ProposalRequest {
        ProposalRequest {
            to: "0x742d35cc6634c0532925a3b8d4c0c8b3c2e1e1e1".to_string(),
            value: value.to_string(),
            data: "0x".to_string(),
            operation: 0,
            nonce: None,
            title: None,
            description: None,
        }
    }

    #[tokio::test]
    async fn test_seeded_state() {
        let mock = MockSafeBackend::new(None, 1);
        let info = mock.info().await.unwrap();
        assert_eq!(info.address, DEFAULT_SAFE_ADDRESS);
        assert_eq!(info.owners.len(), 3);
        assert_eq!(info.threshold, 2);
        assert_eq!(info.balance, "1.5");
        assert_eq!(info.nonce, 42);
        assert_eq!(info.version, "1.3.0");

        let pending = mock.pending_proposals().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, "1");
        assert_eq!(pending[1].to, DEFAULT_SAFE_ADDRESS);
        assert!(mock.history(20).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_proposal_is_conflict() {
        let mock = MockSafeBackend::new(None, 1);
        let mut replay = request("7");
        replay.nonce = Some(44);

        let first = mock.propose(replay.clone()).await.unwrap();
        let err = mock.propose(replay).await.unwrap_err();
        assert!(matches!(err, WalletError::Conflict(_)));

        let pending = mock.pending_proposals().await.unwrap();
        assert_eq!(pending.iter().filter(|p| p.id == first.safe_tx_hash).count(), 1);
        assert_eq!(pending.len(), 3);
    }

    #[tokio::test]
    async fn test_propose_uses_next_nonce() {
        let mock = MockSafeBackend::new(None, 1);
        let receipt = mock.propose(request("5")).await.unwrap();
        assert_eq!(receipt.transaction.nonce, 44);
        assert!(receipt.safe_tx_hash.starts_with("0x"));
        assert_eq!(receipt.safe_tx_hash.len(), 66);

        let pending = mock.pending_proposals().await.unwrap();
        let created = pending.iter().find(|p| p.id == receipt.safe_tx_hash).unwrap();
        assert_eq!(created.title, "Transfer 5 ETH");
        assert_eq!(created.description, "Transfer 5 ETH to 0x742d35cc6634c0532925a3b8d4c0c8b3c2e1e1e1");
        assert_eq!(created.confirmations, 1);
        assert_eq!(created.status, ProposalStatus::Pending);
    }

    #[tokio::test]
    async fn test_approve_rules() {
        let mock = MockSafeBackend::new(None, 1);

        let dup = mock.approve("1", Some(MOCK_OWNERS[0])).await.unwrap_err();
        assert!(matches!(dup, WalletError::Conflict(_)));

        let stranger = mock.approve("1", Some("0x9999999999999999999999999999999999999999")).await;
        assert!(matches!(stranger, Err(WalletError::Unauthorized(_))));

        let receipt = mock.approve("0xabc123...", None).await.unwrap();
        assert_eq!(receipt.signer, MOCK_OWNERS[1]);
        assert_eq!(receipt.confirmations, 2);
        assert_eq!(receipt.status, ProposalStatus::Approved);

        assert!(matches!(mock.approve("missing", None).await, Err(WalletError::NotFoundError(_))));
    }

    #[tokio::test]
    async fn test_execute_requires_threshold_and_current_nonce() {
        let mock = MockSafeBackend::new(None, 1);

        assert!(matches!(mock.execute("1").await, Err(WalletError::Conflict(_))));

        mock.approve("2", None).await.unwrap();
        let out_of_order = mock.execute("2").await.unwrap_err();
        assert!(out_of_order.message().contains("current nonce"));

        mock.approve("1", None).await.unwrap();
        let receipt = mock.execute("1").await.unwrap();
        assert!(receipt.success);
        assert!(receipt.tx_hash.starts_with("0x"));
        assert_eq!(mock.info().await.unwrap().nonce, 43);

        let history = mock.history(20).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, ProposalStatus::Executed);
        assert!(history[0].executed_at.is_some());

        mock.execute("2").await.unwrap();
        assert!(mock.pending_proposals().await.unwrap().is_empty());
        assert!(matches!(mock.execute("2").await, Err(WalletError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_executing_a_nonce_rejects_competitors() {
        let mock = MockSafeBackend::new(None, 1);
        let replacement = mock
            .propose(ProposalRequest { nonce: Some(42), ..request("0") })
            .await
            .unwrap();
        assert_eq!(replacement.transaction.nonce, 42);

        mock.approve(&replacement.safe_tx_hash, None).await.unwrap();
        mock.execute(&replacement.safe_tx_hash).await.unwrap();

        let pending = mock.pending_proposals().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "2");
        let history = mock.history(20).await.unwrap();
        let original = history.iter().find(|p| p.id == "1").unwrap();
        assert_eq!(original.status, ProposalStatus::Rejected);

        let stale = mock.propose(ProposalRequest { nonce: Some(42), ..request("0") }).await;
        assert!(matches!(stale, Err(WalletError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_is_owner_case_insensitive() {
        let mock = MockSafeBackend::new(Some("0x00000000000000000000000000000000000000aa"), 1);
        assert!(mock.is_owner(&MOCK_OWNERS[2].to_uppercase().replace("0X", "0x")).await.unwrap());
        assert!(!mock.is_owner("0x0000000000000000000000000000000000000001").await.unwrap());
        assert_eq!(mock.required_confirmations().await.unwrap(), 2);
        assert_eq!(mock.info().await.unwrap().address, "0x00000000000000000000000000000000000000aa");
    }
}
