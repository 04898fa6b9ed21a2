//! Wallet, balance and ledger mutation handlers.

use axum::{extract::State, http::HeaderMap, Json};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::middleware::extract_user::extract_user_id_from_token;
use crate::api::server::WalletServer;
use crate::api::types::{
    ActionResponse, AddFundsRequest, CreateWalletRequest, ExchangeRequest, SendFundsRequest,
};
use crate::core::domain::{AssetType, Wallet};
use crate::core::validation::parse_amount;
use crate::service::prices::AssetPrice;
use crate::service::wallet::{ExchangeReceipt, LedgerReceipt, Portfolio};

pub async fn get_balance(
    State(state): State<Arc<WalletServer>>,
    headers: HeaderMap,
) -> Result<Json<Portfolio>, ApiError> {
    let user_id = extract_user_id_from_token(&headers, &state).await?;
    Ok(Json(state.wallets.portfolio(&user_id).await?))
}

pub async fn get_prices(State(state): State<Arc<WalletServer>>) -> Result<Json<Vec<AssetPrice>>, ApiError> {
    Ok(Json(state.wallets.prices().await?))
}

pub async fn list_wallets(
    State(state): State<Arc<WalletServer>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Wallet>>, ApiError> {
    let user_id = extract_user_id_from_token(&headers, &state).await?;
    Ok(Json(state.wallets.get_user_wallets(&user_id).await?))
}

/// Returns the existing wallet for the asset if there is one.
pub async fn create_wallet(
    State(state): State<Arc<WalletServer>>,
    headers: HeaderMap,
    Json(payload): Json<CreateWalletRequest>,
) -> Result<Json<Wallet>, ApiError> {
    let user_id = extract_user_id_from_token(&headers, &state).await?;
    let asset: AssetType = payload.asset_type.parse()?;
    Ok(Json(state.wallets.create_wallet(&user_id, asset).await?))
}

pub async fn add_funds(
    State(state): State<Arc<WalletServer>>,
    headers: HeaderMap,
    Json(payload): Json<AddFundsRequest>,
) -> Result<Json<ActionResponse<LedgerReceipt>>, ApiError> {
    let user_id = extract_user_id_from_token(&headers, &state).await?;
    let asset: AssetType = payload.asset_type.parse()?;
    let amount = parse_amount(&payload.amount)?;
    let receipt = state.wallets.add_funds(&user_id, asset, amount).await?;
    Ok(Json(ActionResponse::ok("Funds added successfully", receipt)))
}

pub async fn send_funds(
    State(state): State<Arc<WalletServer>>,
    headers: HeaderMap,
    Json(payload): Json<SendFundsRequest>,
) -> Result<Json<ActionResponse<LedgerReceipt>>, ApiError> {
    let user_id = extract_user_id_from_token(&headers, &state).await?;
    let asset: AssetType = payload.asset_type.parse()?;
    let amount = parse_amount(&payload.amount)?;
    let receipt = state.wallets.send_funds(&user_id, asset, amount, &payload.to_address).await?;
    Ok(Json(ActionResponse::ok("Funds sent successfully", receipt)))
}

pub async fn exchange_assets(
    State(state): State<Arc<WalletServer>>,
    headers: HeaderMap,
    Json(payload): Json<ExchangeRequest>,
) -> Result<Json<ActionResponse<ExchangeReceipt>>, ApiError> {
    let user_id = extract_user_id_from_token(&headers, &state).await?;
    let from: AssetType = payload.from_asset.parse()?;
    let to: AssetType = payload.to_asset.parse()?;
    let amount = parse_amount(&payload.amount)?;
    let receipt = state.wallets.exchange_assets(&user_id, from, to, amount).await?;
    Ok(Json(ActionResponse::ok("Assets exchanged successfully", receipt)))
}
