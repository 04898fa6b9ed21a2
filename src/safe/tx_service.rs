//! Safe Transaction Service client.
//!
//! Reads come from the hosted REST API. Proposals and confirmations are
//! hashed locally (EIP-712) and signed with the configured owner key before
//! being posted. Execution submits `execTransaction` through an RPC provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ethers::prelude::*;
use ethers::providers::{Http, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Eip1559TransactionRequest, NameOrAddress, H256, U256};
use ethers::utils::{format_ether, to_checksum};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::backend::{
    history_status, pending_status, proposal_description, proposal_title, SafeBackend,
};
use super::eip712::{
    encode_exec_transaction, format_hash, pack_signatures, parse_address, parse_data,
    safe_tx_hash,
};
use super::types::{
    ApprovalReceipt, ExecutionReceipt, ProposalReceipt, ProposalRequest, SafeInfo, SafeProposal,
    SafeTransactionData, ZERO_ADDRESS,
};
use crate::core::errors::WalletError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok("0".to_string()),
        other => Err(de::Error::custom(format!("expected string or number, got {}", other))),
    }
}

fn u64_lenient<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = string_or_number(deserializer)?;
    raw.parse::<u64>().map_err(|_| de::Error::custom(format!("invalid integer: {}", raw)))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSafeInfo {
    pub address: String,
    #[serde(deserialize_with = "u64_lenient")]
    pub nonce: u64,
    pub threshold: u32,
    pub owners: Vec<String>,
    #[serde(default)]
    pub modules: Vec<String>,
    #[serde(default)]
    pub guard: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBalance {
    pub token_address: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub balance: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfirmation {
    pub owner: String,
    #[serde(default)]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataDecoded {
    pub method: String,
    #[serde(default)]
    pub parameters: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMultisigTx {
    pub safe_tx_hash: String,
    pub to: String,
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub operation: u8,
    #[serde(default, deserialize_with = "string_or_number")]
    pub safe_tx_gas: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub base_gas: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub gas_price: String,
    #[serde(default)]
    pub gas_token: Option<String>,
    #[serde(default)]
    pub refund_receiver: Option<String>,
    #[serde(deserialize_with = "u64_lenient")]
    pub nonce: u64,
    pub submission_date: DateTime<Utc>,
    #[serde(default)]
    pub execution_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub is_executed: bool,
    #[serde(default)]
    pub is_successful: Option<bool>,
    #[serde(default)]
    pub proposer: Option<String>,
    #[serde(default)]
    pub confirmations_required: Option<u32>,
    #[serde(default)]
    pub confirmations: Option<Vec<ServiceConfirmation>>,
    #[serde(default)]
    pub data_decoded: Option<DataDecoded>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paginated<T> {
    #[serde(default)]
    pub count: Option<u64>,
    pub results: Vec<T>,
}

impl ServiceMultisigTx {
    fn confirmation_count(&self) -> u32 {
        self.confirmations.as_ref().map(|c| c.len() as u32).unwrap_or(0)
    }

    fn non_empty(value: &str) -> String {
        if value.is_empty() { "0".to_string() } else { value.to_string() }
    }

    pub fn transaction_data(&self) -> SafeTransactionData {
        SafeTransactionData {
            to: self.to.clone(),
            value: Self::non_empty(&self.value),
            data: self.data.clone().unwrap_or_else(|| "0x".to_string()),
            operation: self.operation,
            safe_tx_gas: Self::non_empty(&self.safe_tx_gas),
            base_gas: Self::non_empty(&self.base_gas),
            gas_price: Self::non_empty(&self.gas_price),
            gas_token: self.gas_token.clone().unwrap_or_else(|| ZERO_ADDRESS.to_string()),
            refund_receiver: self.refund_receiver.clone().unwrap_or_else(|| ZERO_ADDRESS.to_string()),
            nonce: self.nonce,
        }
    }

    /// `for_history` selects the executed/rejected/approved status rule.
    pub fn to_proposal(&self, threshold: u32, for_history: bool) -> SafeProposal {
        let confirmations = self.confirmation_count();
        let required = self.confirmations_required.unwrap_or(threshold);
        let decoded = self.data_decoded.as_ref().map(|d| {
            (d.method.as_str(), d.parameters.as_ref().map(|p| p.len()).unwrap_or(0))
        });
        let status = if for_history {
            history_status(self.is_executed, self.is_successful)
        } else {
            pending_status(self.is_executed, confirmations, required)
        };

        SafeProposal {
            id: self.safe_tx_hash.clone(),
            title: proposal_title(decoded.map(|(m, _)| m), &self.value),
            description: proposal_description(decoded, &self.value, &self.to),
            to: self.to.clone(),
            value: self.value.clone(),
            data: self.data.clone().unwrap_or_else(|| "0x".to_string()),
            status,
            confirmations,
            required_confirmations: required,
            submitted_by: self.proposer.clone().unwrap_or_else(|| "Unknown".to_string()),
            created_at: self.submission_date,
            executed_at: self.execution_date,
            safe_tx_hash: Some(self.safe_tx_hash.clone()),
            transaction_hash: self.transaction_hash.clone(),
            nonce: Some(self.nonce),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProposeBody<'a> {
    to: String,
    value: &'a str,
    data: Option<&'a str>,
    operation: u8,
    safe_tx_gas: &'a str,
    base_gas: &'a str,
    gas_price: &'a str,
    gas_token: &'a str,
    refund_receiver: &'a str,
    nonce: u64,
    contract_transaction_hash: &'a str,
    sender: String,
    signature: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    origin: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ConfirmBody<'a> {
    signature: &'a str,
}

/// Connection settings for [`TxServiceBackend`].
#[derive(Debug, Clone)]
pub struct TxServiceSettings {
    pub base_url: String,
    pub safe_address: String,
    pub chain_id: u64,
    pub rpc_url: Option<String>,
}

pub struct TxServiceBackend {
    client: reqwest::Client,
    base_url: String,
    safe: Address,
    chain_id: u64,
    signer: Option<LocalWallet>,
    provider: Option<Provider<Http>>,
}

impl std::fmt::Debug for TxServiceBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxServiceBackend")
            .field("base_url", &self.base_url)
            .field("safe", &self.safe)
            .field("chain_id", &self.chain_id)
            .field("signer", &self.signer.as_ref().map(|s| s.address()))
            .field("provider", &self.provider.is_some())
            .finish()
    }
}

impl TxServiceBackend {
    /// `signer_key` is a hex private key of one of the Safe owners.
    pub fn new(settings: TxServiceSettings, signer_key: Option<&str>) -> Result<Self, WalletError> {
        let safe = parse_address(&settings.safe_address)?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| WalletError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        let signer = match signer_key {
            Some(key) if !key.trim().is_empty() => Some(
                LocalWallet::from_str(key.trim())
                    .map_err(|_| WalletError::ConfigError("Invalid signer private key".to_string()))?
                    .with_chain_id(settings.chain_id),
            ),
            _ => None,
        };

        let provider = match settings.rpc_url.as_deref() {
            Some(url) if !url.trim().is_empty() => Some(
                Provider::<Http>::try_from(url.trim())
                    .map_err(|e| WalletError::ConfigError(format!("Invalid RPC URL: {}", e)))?,
            ),
            _ => None,
        };

        info!(
            safe = %to_checksum(&safe, None),
            chain_id = settings.chain_id,
            signer = signer.is_some(),
            rpc = provider.is_some(),
            "Safe transaction service backend configured"
        );

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            safe,
            chain_id: settings.chain_id,
            signer,
            provider,
        })
    }

    fn safe_path(&self) -> String {
        to_checksum(&self.safe, None)
    }

    fn signer(&self) -> Result<&LocalWallet, WalletError> {
        self.signer
            .as_ref()
            .ok_or_else(|| WalletError::ConfigError("No Safe signer key configured".to_string()))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, WalletError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "GET Safe transaction service");
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(WalletError::NotFoundError(format!("Not found: {}", path)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WalletError::SafeError(format!(
                "Transaction service returned {}: {}",
                status, body
            )));
        }
        Ok(response.json::<T>().await?)
    }

    async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<(), WalletError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "POST Safe transaction service");
        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WalletError::SafeError(format!(
                "Transaction service returned {}: {}",
                status, body
            )));
        }
        Ok(())
    }

    async fn safe_state(&self) -> Result<ServiceSafeInfo, WalletError> {
        self.get_json(&format!("/api/v1/safes/{}/", self.safe_path())).await
    }

    async fn native_balance(&self) -> Result<String, WalletError> {
        if let Some(provider) = &self.provider {
            let wei = provider
                .get_balance(self.safe, None)
                .await
                .map_err(|e| WalletError::NetworkError(format!("Failed to get balance: {}", e)))?;
            return Ok(format_ether(wei));
        }
        let balances: Vec<ServiceBalance> =
            self.get_json(&format!("/api/v1/safes/{}/balances/", self.safe_path())).await?;
        let wei = balances
            .iter()
            .find(|b| b.token_address.is_none())
            .map(|b| U256::from_dec_str(&b.balance).unwrap_or_default())
            .unwrap_or_default();
        Ok(format_ether(wei))
    }

    async fn fetch_transaction(&self, safe_tx_hash: &str) -> Result<ServiceMultisigTx, WalletError> {
        self.get_json(&format!("/api/v1/multisig-transactions/{}/", safe_tx_hash)).await
    }

    async fn queued(&self, from_nonce: u64) -> Result<Vec<ServiceMultisigTx>, WalletError> {
        let page: Paginated<ServiceMultisigTx> = self
            .get_json(&format!(
                "/api/v1/safes/{}/multisig-transactions/?executed=false&nonce__gte={}",
                self.safe_path(),
                from_nonce
            ))
            .await?;
        Ok(page.results)
    }

    /// Hash the transaction as stored by the service and make sure it matches
    /// the hash the caller asked about.
    fn verified_hash(&self, tx: &ServiceMultisigTx) -> Result<(SafeTransactionData, H256), WalletError> {
        let data = tx.transaction_data();
        let hash = safe_tx_hash(self.chain_id, self.safe, &data)?;
        if !format_hash(hash).eq_ignore_ascii_case(&tx.safe_tx_hash) {
            return Err(WalletError::SafeError(format!(
                "Transaction service hash {} does not match local hash {}",
                tx.safe_tx_hash,
                format_hash(hash)
            )));
        }
        Ok((data, hash))
    }

    fn sign(&self, hash: H256) -> Result<String, WalletError> {
        let signature = self
            .signer()?
            .sign_hash(hash)
            .map_err(|e| WalletError::CryptoError(format!("Signing failed: {}", e)))?;
        Ok(format!("0x{}", hex::encode(signature.to_vec())))
    }
}

#[async_trait]
impl SafeBackend for TxServiceBackend {
    fn name(&self) -> &'static str {
        "tx-service"
    }

    async fn info(&self) -> Result<SafeInfo, WalletError> {
        let state = self.safe_state().await?;
        let balance = match self.native_balance().await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(error = %e, "Safe balance lookup failed");
                "0".to_string()
            }
        };
        Ok(SafeInfo {
            address: state.address,
            owners: state.owners,
            threshold: state.threshold,
            balance,
            nonce: state.nonce,
            version: state.version.unwrap_or_else(|| "unknown".to_string()),
            modules: state.modules,
            guard: state.guard.filter(|g| !g.eq_ignore_ascii_case(ZERO_ADDRESS)),
        })
    }

    async fn pending_proposals(&self) -> Result<Vec<SafeProposal>, WalletError> {
        let state = self.safe_state().await?;
        let queued = self.queued(state.nonce).await?;
        Ok(queued.iter().map(|tx| tx.to_proposal(state.threshold, false)).collect())
    }

    async fn history(&self, limit: usize) -> Result<Vec<SafeProposal>, WalletError> {
        let state = self.safe_state().await?;
        let page: Paginated<ServiceMultisigTx> = self
            .get_json(&format!(
                "/api/v1/safes/{}/multisig-transactions/?limit={}",
                self.safe_path(),
                limit
            ))
            .await?;
        Ok(page
            .results
            .iter()
            .take(limit)
            .map(|tx| tx.to_proposal(state.threshold, true))
            .collect())
    }

    async fn propose(&self, request: ProposalRequest) -> Result<ProposalReceipt, WalletError> {
        let signer = self.signer()?;
        let state = self.safe_state().await?;
        let nonce = match request.nonce {
            Some(nonce) => nonce,
            None => self
                .queued(state.nonce)
                .await?
                .iter()
                .map(|tx| tx.nonce + 1)
                .fold(state.nonce, u64::max),
        };

        let transaction = SafeTransactionData::call(
            &request.to,
            &request.value,
            &request.data,
            request.operation,
            nonce,
        );
        let hash = safe_tx_hash(self.chain_id, self.safe, &transaction)?;
        let hash_hex = format_hash(hash);
        let signature = self.sign(hash)?;
        let sender = to_checksum(&signer.address(), None);
        let data = if parse_data(&transaction.data)?.is_empty() {
            None
        } else {
            Some(transaction.data.as_str())
        };

        let body = ProposeBody {
            to: to_checksum(&parse_address(&transaction.to)?, None),
            value: &transaction.value,
            data,
            operation: transaction.operation,
            safe_tx_gas: &transaction.safe_tx_gas,
            base_gas: &transaction.base_gas,
            gas_price: &transaction.gas_price,
            gas_token: &transaction.gas_token,
            refund_receiver: &transaction.refund_receiver,
            nonce,
            contract_transaction_hash: &hash_hex,
            sender: sender.clone(),
            signature: &signature,
            origin: request.title.as_deref(),
        };
        self.post_json(&format!("/api/v1/safes/{}/multisig-transactions/", self.safe_path()), &body)
            .await?;
        info!(safe_tx_hash = %hash_hex, nonce, "Safe proposal submitted");

        Ok(ProposalReceipt { safe_tx_hash: hash_hex, sender, transaction, signature: Some(signature) })
    }

    async fn approve(
        &self,
        safe_tx_hash: &str,
        signer: Option<&str>,
    ) -> Result<ApprovalReceipt, WalletError> {
        let wallet = self.signer()?;
        let own_address = to_checksum(&wallet.address(), None);
        if let Some(requested) = signer {
            if !requested.trim().eq_ignore_ascii_case(&own_address) {
                return Err(WalletError::Unauthorized(format!(
                    "This service can only confirm as {}",
                    own_address
                )));
            }
        }

        let tx = self.fetch_transaction(safe_tx_hash).await?;
        if tx.is_executed {
            return Err(WalletError::Conflict("Proposal is already executed".to_string()));
        }
        if tx
            .confirmations
            .as_ref()
            .map(|c| c.iter().any(|c| c.owner.eq_ignore_ascii_case(&own_address)))
            .unwrap_or(false)
        {
            return Err(WalletError::Conflict(format!(
                "{} already confirmed this proposal",
                own_address
            )));
        }

        let (_, hash) = self.verified_hash(&tx)?;
        let signature = self.sign(hash)?;
        self.post_json(
            &format!("/api/v1/multisig-transactions/{}/confirmations/", tx.safe_tx_hash),
            &ConfirmBody { signature: &signature },
        )
        .await?;

        let confirmations = tx.confirmation_count() + 1;
        let threshold = match tx.confirmations_required {
            Some(required) => required,
            None => self.safe_state().await?.threshold,
        };
        info!(safe_tx_hash = %tx.safe_tx_hash, confirmations, "Safe confirmation submitted");

        Ok(ApprovalReceipt {
            success: true,
            safe_tx_hash: tx.safe_tx_hash,
            signer: own_address,
            signature: Some(signature),
            confirmations,
            status: pending_status(false, confirmations, threshold),
        })
    }

    async fn execute(&self, safe_tx_hash: &str) -> Result<ExecutionReceipt, WalletError> {
        let wallet = self.signer()?.clone();
        let provider = self
            .provider
            .clone()
            .ok_or_else(|| WalletError::ConfigError("No RPC URL configured for execution".to_string()))?;

        let tx = self.fetch_transaction(safe_tx_hash).await?;
        if tx.is_executed {
            return Err(WalletError::Conflict("Proposal is already executed".to_string()));
        }
        let threshold = match tx.confirmations_required {
            Some(required) => required,
            None => self.safe_state().await?.threshold,
        };
        let confirmations = tx.confirmations.clone().unwrap_or_default();
        if (confirmations.len() as u32) < threshold {
            return Err(WalletError::Conflict(format!(
                "Proposal needs {} confirmations, has {}",
                threshold,
                confirmations.len()
            )));
        }

        let (data, _) = self.verified_hash(&tx)?;
        let mut signatures = Vec::with_capacity(confirmations.len());
        for confirmation in &confirmations {
            let signature = confirmation.signature.as_deref().ok_or_else(|| {
                WalletError::SafeError(format!("Confirmation from {} has no signature", confirmation.owner))
            })?;
            signatures.push((parse_address(&confirmation.owner)?, parse_data(signature)?));
        }
        let packed = pack_signatures(signatures)?;
        let calldata = encode_exec_transaction(&data, &packed)?;

        let request = Eip1559TransactionRequest {
            to: Some(NameOrAddress::Address(self.safe)),
            data: Some(calldata),
            value: Some(U256::zero()),
            ..Default::default()
        };
        let client = SignerMiddleware::new(provider, wallet);
        let pending = client
            .send_transaction(request, None)
            .await
            .map_err(|e| WalletError::NetworkError(format!("Failed to send execTransaction: {}", e)))?;
        let tx_hash = format_hash(pending.tx_hash());
        info!(safe_tx_hash = %tx.safe_tx_hash, %tx_hash, "execTransaction sent");

        let receipt = pending
            .await
            .map_err(|e| WalletError::NetworkError(format!("Failed waiting for receipt: {}", e)))?;
        let block_number = receipt.as_ref().and_then(|r| r.block_number).map(|b| b.as_u64());
        let success = receipt
            .as_ref()
            .and_then(|r| r.status)
            .map(|s| s.as_u64() == 1)
            .unwrap_or(true);

        Ok(ExecutionReceipt { success, safe_tx_hash: tx.safe_tx_hash, tx_hash, block_number })
    }

    async fn is_owner(&self, address: &str) -> Result<bool, WalletError> {
        let state = self.safe_state().await?;
        Ok(state.owners.iter().any(|o| o.eq_ignore_ascii_case(address.trim())))
    }

    async fn required_confirmations(&self) -> Result<u32, WalletError> {
        Ok(self.safe_state().await?.threshold)
    }
}
