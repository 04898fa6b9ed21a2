use axum::{extract::State, http::HeaderMap, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::api::error::ApiError;
use crate::api::middleware::extract_user::extract_token;
use crate::api::server::WalletServer;
use crate::api::types::{AuthResponse, LoginRequest, RegisterRequest};
use crate::core::domain::User;

async fn issue(state: &WalletServer, user: User) -> AuthResponse {
    let token = state.sessions.issue_token(&user.id).await;
    AuthResponse {
        token,
        token_type: "Bearer",
        expires_in: state.sessions.ttl().as_secs(),
        user,
    }
}

pub async fn register(
    State(state): State<Arc<WalletServer>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = state
        .profiles
        .register(&payload.email, &payload.password, &payload.name, payload.timezone.as_deref())
        .await?;
    Ok(Json(issue(&state, user).await))
}

pub async fn login(
    State(state): State<Arc<WalletServer>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = state.profiles.authenticate(&payload.email, &payload.password).await?;
    info!(user_id = %user.id, "user logged in");
    Ok(Json(issue(&state, user).await))
}

pub async fn logout(
    State(state): State<Arc<WalletServer>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let token = extract_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("Authentication token is required"))?;
    state.sessions.revoke_token(&token).await?;
    Ok(Json(json!({ "success": true, "message": "Logged out" })))
}
