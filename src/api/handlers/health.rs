use axum::{extract::State, http::header, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::server::WalletServer;
use crate::core::errors::WalletError;

pub async fn health_check(State(state): State<Arc<WalletServer>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "safe": {
            "connected": state.safe.is_connected(),
            "backend": state.safe.backend_name(),
            "chainId": state.safe.chain_id(),
        }
    }))
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<WalletServer>>) -> Result<impl IntoResponse, ApiError> {
    let body = state
        .metrics
        .export()
        .map_err(|e| WalletError::InternalError(format!("Failed to encode metrics: {}", e)))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
