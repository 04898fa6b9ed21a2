//! Safe multisig handlers.
//!
//! Reads are public, like the dashboard panel they feed. Writes need a
//! session.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use std::sync::Arc;
use tracing::info;

use crate::api::error::ApiError;
use crate::api::middleware::extract_user::extract_user_id_from_token;
use crate::api::server::WalletServer;
use crate::api::types::{ApproveRequest, CreateProposalRequest, HistoryQuery, ProposalCreatedResponse};
use crate::safe::{ApprovalReceipt, ExecutionReceipt, ProposalRequest, SafeInfo, SafeProposal};

pub async fn safe_info(State(state): State<Arc<WalletServer>>) -> Result<Json<SafeInfo>, ApiError> {
    Ok(Json(state.safe.info().await?))
}

pub async fn list_proposals(
    State(state): State<Arc<WalletServer>>,
) -> Result<Json<Vec<SafeProposal>>, ApiError> {
    Ok(Json(state.safe.pending_proposals().await?))
}

pub async fn proposal_history(
    State(state): State<Arc<WalletServer>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<SafeProposal>>, ApiError> {
    Ok(Json(state.safe.history(query.limit).await?))
}

pub async fn create_proposal(
    State(state): State<Arc<WalletServer>>,
    headers: HeaderMap,
    Json(payload): Json<CreateProposalRequest>,
) -> Result<Json<ProposalCreatedResponse>, ApiError> {
    let user_id = extract_user_id_from_token(&headers, &state).await?;
    let request = ProposalRequest {
        to: payload.to.trim().to_string(),
        value: payload.wei_value()?,
        data: payload.data.clone().filter(|d| !d.trim().is_empty()).unwrap_or_else(|| "0x".to_string()),
        operation: payload.operation.unwrap_or(0),
        nonce: payload.nonce,
        title: payload.title.clone(),
        description: payload.description.clone(),
    };
    let receipt = state.safe.propose(request).await?;
    info!(user_id = %user_id, safe_tx_hash = %receipt.safe_tx_hash, "proposal submitted");
    Ok(Json(ProposalCreatedResponse {
        success: true,
        transaction: receipt,
        message: "Proposal created successfully",
    }))
}

pub async fn approve_proposal(
    State(state): State<Arc<WalletServer>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Option<Json<ApproveRequest>>,
) -> Result<Json<ApprovalReceipt>, ApiError> {
    let user_id = extract_user_id_from_token(&headers, &state).await?;
    let Json(body) = payload.unwrap_or_default();
    let receipt = state.safe.approve(&id, body.signer.as_deref()).await?;
    info!(user_id = %user_id, safe_tx_hash = %receipt.safe_tx_hash, signer = %receipt.signer, "proposal approved");
    Ok(Json(receipt))
}

pub async fn execute_proposal(
    State(state): State<Arc<WalletServer>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ExecutionReceipt>, ApiError> {
    let user_id = extract_user_id_from_token(&headers, &state).await?;
    let receipt = state.safe.execute(&id).await?;
    info!(user_id = %user_id, tx_hash = %receipt.tx_hash, "proposal executed");
    Ok(Json(receipt))
}
