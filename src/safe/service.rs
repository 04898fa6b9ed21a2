use std::sync::Arc;
use tracing::{info, warn};

use super::backend::{tx_service_url, SafeBackend, DEFAULT_HISTORY_LIMIT};
use super::mock::MockSafeBackend;
use super::tx_service::{TxServiceBackend, TxServiceSettings};
use super::types::{
    ApprovalReceipt, ExecutionReceipt, ProposalReceipt, ProposalRequest, SafeInfo, SafeProposal,
};
use crate::core::config::SafeConfig;
use crate::core::errors::WalletError;
use crate::core::validation::{validate_ethereum_address, validate_hex_data, validate_wei_value};
use crate::monitoring::BusinessMetrics;

/// Largest accepted history page.
pub const MAX_HISTORY_LIMIT: usize = 100;

/// Front for Safe operations.
///
/// Reads degrade to the in-memory Safe when the live backend fails; writes
/// propagate the error.
pub struct SafeService {
    backend: Arc<dyn SafeBackend>,
    fallback: Arc<MockSafeBackend>,
    live: bool,
    configured: bool,
    require_address: bool,
    chain_id: u64,
    metrics: Arc<BusinessMetrics>,
}

impl std::fmt::Debug for SafeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeService")
            .field("backend", &self.backend.name())
            .field("live", &self.live)
            .field("configured", &self.configured)
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

impl SafeService {
    pub fn new(
        backend: Arc<dyn SafeBackend>,
        fallback: Arc<MockSafeBackend>,
        live: bool,
        config: &SafeConfig,
        metrics: Arc<BusinessMetrics>,
    ) -> Self {
        Self {
            backend,
            fallback,
            live,
            configured: config.address.is_some(),
            require_address: config.require_address,
            chain_id: config.chain_id,
            metrics,
        }
    }

    /// Picks the transaction service when the Safe address, a service URL and
    /// `live` are all present, else the in-memory Safe.
    pub fn from_config(config: &SafeConfig, metrics: Arc<BusinessMetrics>) -> Result<Self, WalletError> {
        let fallback = Arc::new(MockSafeBackend::new(config.address.as_deref(), config.chain_id));

        let service_url = config
            .tx_service_url
            .clone()
            .or_else(|| tx_service_url(config.chain_id).map(str::to_string));

        match (&config.address, service_url) {
            (Some(address), Some(base_url)) if config.live => {
                validate_ethereum_address(address)?;
                let backend = TxServiceBackend::new(
                    TxServiceSettings {
                        base_url,
                        safe_address: address.clone(),
                        chain_id: config.chain_id,
                        rpc_url: config.rpc_url.clone(),
                    },
                    config.signer_private_key.as_deref(),
                )?;
                Ok(Self::new(Arc::new(backend), fallback, true, config, metrics))
            }
            (Some(_), None) if config.live => {
                warn!(chain_id = config.chain_id, "No Safe transaction service for chain, using mock Safe");
                Ok(Self::new(fallback.clone(), fallback, false, config, metrics))
            }
            _ => {
                info!(configured = config.address.is_some(), "Using mock Safe");
                Ok(Self::new(fallback.clone(), fallback, false, config, metrics))
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.live
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn ensure_configured(&self) -> Result<(), WalletError> {
        if self.require_address && !self.configured {
            return Err(WalletError::SafeNotConfigured);
        }
        Ok(())
    }

    fn degrade(&self, operation: &str, err: &WalletError) {
        warn!(backend = self.backend.name(), operation, error = %err, "Safe backend read failed, serving mock data");
        self.metrics.record_safe_fallback();
    }

    pub async fn info(&self) -> Result<SafeInfo, WalletError> {
        self.ensure_configured()?;
        match self.backend.info().await {
            Ok(info) => Ok(info),
            Err(e) if self.live => {
                self.degrade("info", &e);
                self.fallback.info().await
            }
            Err(e) => Err(e),
        }
    }

    pub async fn pending_proposals(&self) -> Result<Vec<SafeProposal>, WalletError> {
        self.ensure_configured()?;
        match self.backend.pending_proposals().await {
            Ok(proposals) => Ok(proposals),
            Err(e) if self.live => {
                self.degrade("pending_proposals", &e);
                self.fallback.pending_proposals().await
            }
            Err(e) => Err(e),
        }
    }

    /// Executed and rejected proposals. A failing live backend yields an
    /// empty list rather than demo history.
    pub async fn history(&self, limit: Option<usize>) -> Result<Vec<SafeProposal>, WalletError> {
        self.ensure_configured()?;
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT);
        match self.backend.history(limit).await {
            Ok(history) => Ok(history),
            Err(e) if self.live => {
                self.degrade("history", &e);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn propose(&self, request: ProposalRequest) -> Result<ProposalReceipt, WalletError> {
        self.ensure_configured()?;
        validate_proposal(&request)?;
        let receipt = self.backend.propose(request).await?;
        self.metrics.record_safe_proposal();
        info!(safe_tx_hash = %receipt.safe_tx_hash, nonce = receipt.transaction.nonce, "Safe proposal created");
        Ok(receipt)
    }

    pub async fn approve(
        &self,
        safe_tx_hash: &str,
        signer: Option<&str>,
    ) -> Result<ApprovalReceipt, WalletError> {
        self.ensure_configured()?;
        if let Some(signer) = signer {
            validate_ethereum_address(signer)?;
        }
        let receipt = self.backend.approve(safe_tx_hash.trim(), signer).await?;
        self.metrics.record_safe_approval();
        Ok(receipt)
    }

    pub async fn execute(&self, safe_tx_hash: &str) -> Result<ExecutionReceipt, WalletError> {
        self.ensure_configured()?;
        let receipt = self.backend.execute(safe_tx_hash.trim()).await?;
        self.metrics.record_safe_execution();
        Ok(receipt)
    }

    pub async fn is_owner(&self, address: &str) -> Result<bool, WalletError> {
        self.ensure_configured()?;
        validate_ethereum_address(address)?;
        match self.backend.is_owner(address).await {
            Ok(owner) => Ok(owner),
            Err(e) if self.live => {
                self.degrade("is_owner", &e);
                self.fallback.is_owner(address).await
            }
            Err(e) => Err(e),
        }
    }

    pub async fn required_confirmations(&self) -> Result<u32, WalletError> {
        self.ensure_configured()?;
        match self.backend.required_confirmations().await {
            Ok(threshold) => Ok(threshold),
            Err(e) if self.live => {
                self.degrade("required_confirmations", &e);
                self.fallback.required_confirmations().await
            }
            Err(e) => Err(e),
        }
    }
}

fn validate_proposal(request: &ProposalRequest) -> Result<(), WalletError> {
    validate_ethereum_address(&request.to)?;
    validate_wei_value(&request.value)?;
    validate_hex_data(&request.data)?;
    if request.operation > 1 {
        return Err(WalletError::ValidationError(
            "Operation must be 0 (call) or 1 (delegatecall)".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safe::types::ProposalStatus;
    use async_trait::async_trait;

    struct DownBackend;

    #[async_trait]
    impl SafeBackend for DownBackend {
        fn name(&self) -> &'static str {
            "down"
        }
        async fn info(&self) -> Result<SafeInfo, WalletError> {
            Err(WalletError::NetworkError("connection refused".to_string()))
        }
        async fn pending_proposals(&self) -> Result<Vec<SafeProposal>, WalletError> {
            Err(WalletError::NetworkError("connection refused".to_string()))
        }
        async fn history(&self, _limit: usize) -> Result<Vec<SafeProposal>, WalletError> {
            Err(WalletError::NetworkError("connection refused".to_string()))
        }
        async fn propose(&self, _request: ProposalRequest) -> Result<ProposalReceipt, WalletError> {
            Err(WalletError::NetworkError("connection refused".to_string()))
        }
        async fn approve(&self, _hash: &str, _signer: Option<&str>) -> Result<ApprovalReceipt, WalletError> {
            Err(WalletError::NetworkError("connection refused".to_string()))
        }
        async fn execute(&self, _hash: &str) -> Result<ExecutionReceipt, WalletError> {
            Err(WalletError::NetworkError("connection refused".to_string()))
        }
        async fn is_owner(&self, _address: &str) -> Result<bool, WalletError> {
            Err(WalletError::NetworkError("connection refused".to_string()))
        }
        async fn required_confirmations(&self) -> Result<u32, WalletError> {
            Err(WalletError::NetworkError("connection refused".to_string()))
        }
    }

    fn metrics() -> Arc<BusinessMetrics> {
        Arc::new(BusinessMetrics::new().unwrap())
    }

    fn mock_config() -> SafeConfig {
        SafeConfig { require_address: false, live: false, ..SafeConfig::default() }
    }

    fn transfer() -> ProposalRequest {
        ProposalRequest {
            to: "0x742d35cc6634c0532925a3b8d4c0c8b3c2e1e1e1".to_string(),
            value: "1000".to_string(),
            data: "0x".to_string(),
            operation: 0,
            nonce: None,
            title: None,
            description: None,
        }
    }

    #[tokio::test]
    async fn test_requires_address_when_configured_to() {
        let service = SafeService::from_config(&SafeConfig::default(), metrics()).unwrap();
        assert!(matches!(service.info().await, Err(WalletError::SafeNotConfigured)));
        assert!(matches!(service.propose(transfer()).await, Err(WalletError::SafeNotConfigured)));
    }

    #[tokio::test]
    async fn test_mock_service_reads() {
        let service = SafeService::from_config(&mock_config(), metrics()).unwrap();
        assert!(!service.is_connected());
        assert_eq!(service.chain_id(), 1);
        let info = service.info().await.unwrap();
        assert_eq!(info.threshold, 2);
        assert_eq!(service.pending_proposals().await.unwrap().len(), 2);
        assert_eq!(service.required_confirmations().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_live_reads_fall_back() {
        let config = SafeConfig { address: Some(crate::safe::DEFAULT_SAFE_ADDRESS.to_string()), ..SafeConfig::default() };
        let fallback = Arc::new(MockSafeBackend::new(config.address.as_deref(), 1));
        let metrics = metrics();
        let service = SafeService::new(Arc::new(DownBackend), fallback, true, &config, metrics.clone());

        assert_eq!(service.info().await.unwrap().nonce, 42);
        assert_eq!(service.pending_proposals().await.unwrap().len(), 2);
        assert!(service.history(None).await.unwrap().is_empty());
        assert!(metrics.export().unwrap().contains("safe_fallbacks_total 3"));

        let err = service.propose(transfer()).await.unwrap_err();
        assert!(matches!(err, WalletError::NetworkError(_)));
    }

    #[tokio::test]
    async fn test_propose_validates_input() {
        let service = SafeService::from_config(&mock_config(), metrics()).unwrap();

        let bad_to = ProposalRequest { to: "0x123".to_string(), ..transfer() };
        assert!(matches!(service.propose(bad_to).await, Err(WalletError::ValidationError(_))));

        let bad_value = ProposalRequest { value: "-1".to_string(), ..transfer() };
        assert!(service.propose(bad_value).await.is_err());

        let bad_data = ProposalRequest { data: "0xzz".to_string(), ..transfer() };
        assert!(service.propose(bad_data).await.is_err());

        let bad_op = ProposalRequest { operation: 2, ..transfer() };
        assert!(service.propose(bad_op).await.is_err());

        let receipt = service.propose(transfer()).await.unwrap();
        let pending = service.pending_proposals().await.unwrap();
        let created = pending.iter().find(|p| p.safe_tx_hash.as_deref() == Some(receipt.safe_tx_hash.as_str()));
        assert_eq!(created.map(|p| p.status), Some(ProposalStatus::Pending));
    }
}
