//! Safe (Gnosis Safe) multisig proposals.
//!
//! [`SafeService`] fronts either the hosted Safe Transaction Service or an
//! in-memory Safe, depending on configuration.

pub mod backend;
pub mod eip712;
pub mod mock;
pub mod service;
pub mod tx_service;
pub mod types;

pub use backend::{tx_service_url, SafeBackend, DEFAULT_HISTORY_LIMIT};
pub use mock::{MockSafeBackend, DEFAULT_SAFE_ADDRESS, MOCK_OWNERS};
pub use service::SafeService;
pub use tx_service::{TxServiceBackend, TxServiceSettings};
pub use types::{
    ApprovalReceipt, ExecutionReceipt, ProposalReceipt, ProposalRequest, ProposalStatus, SafeInfo,
    SafeProposal, SafeTransactionData,
};
