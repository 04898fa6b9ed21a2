use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::middleware::extract_user::extract_user_id_from_token;
use crate::api::server::WalletServer;
use crate::api::types::TransactionsQuery;
use crate::service::wallet::TransactionPage;

pub async fn list_transactions(
    State(state): State<Arc<WalletServer>>,
    headers: HeaderMap,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<TransactionPage>, ApiError> {
    let user_id = extract_user_id_from_token(&headers, &state).await?;
    let page = state.wallets.get_user_transactions(&user_id, query.limit, query.offset).await?;
    Ok(Json(page))
}
