use axum::{extract::State, http::HeaderMap, Json};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::middleware::extract_user::extract_user_id_from_token;
use crate::api::server::WalletServer;
use crate::api::types::{ActionResponse, UpdateProfileRequest};
use crate::core::domain::User;

pub async fn get_profile(
    State(state): State<Arc<WalletServer>>,
    headers: HeaderMap,
) -> Result<Json<User>, ApiError> {
    let user_id = extract_user_id_from_token(&headers, &state).await?;
    Ok(Json(state.profiles.get_profile(&user_id).await?))
}

pub async fn update_profile(
    State(state): State<Arc<WalletServer>>,
    headers: HeaderMap,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ActionResponse<User>>, ApiError> {
    let user_id = extract_user_id_from_token(&headers, &state).await?;
    let user = state
        .profiles
        .update_profile(&user_id, &payload.name, payload.phone.as_deref(), &payload.timezone)
        .await?;
    Ok(Json(ActionResponse::ok("Profile updated successfully", user)))
}
