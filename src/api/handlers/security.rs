use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::middleware::extract_user::extract_user_id_from_token;
use crate::api::server::WalletServer;
use crate::api::types::{AuditHistoryQuery, AuditResponse};
use crate::core::domain::SecurityAudit;

pub async fn run_audit(
    State(state): State<Arc<WalletServer>>,
    headers: HeaderMap,
) -> Result<Json<AuditResponse>, ApiError> {
    let user_id = extract_user_id_from_token(&headers, &state).await?;
    let audit = state.audits.run_security_audit(&user_id).await?;
    Ok(Json(AuditResponse { success: true, audit }))
}

pub async fn latest_audit(
    State(state): State<Arc<WalletServer>>,
    headers: HeaderMap,
) -> Result<Json<SecurityAudit>, ApiError> {
    let user_id = extract_user_id_from_token(&headers, &state).await?;
    Ok(Json(state.audits.latest(&user_id).await?))
}

pub async fn list_audits(
    State(state): State<Arc<WalletServer>>,
    headers: HeaderMap,
    Query(query): Query<AuditHistoryQuery>,
) -> Result<Json<Vec<SecurityAudit>>, ApiError> {
    let user_id = extract_user_id_from_token(&headers, &state).await?;
    Ok(Json(state.audits.history(&user_id, query.limit).await?))
}
