//! Resolves the calling user from the `Authorization` header.

use axum::http::HeaderMap;
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::server::WalletServer;

/// Token from `Authorization: Bearer <token>`. A bare token is accepted too.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v).trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn extract_user_id_from_token(
    headers: &HeaderMap,
    state: &Arc<WalletServer>,
) -> Result<String, ApiError> {
    let token = extract_token(headers)
        .ok_or_else(|| ApiError::unauthorized("Authentication token is required"))?;

    match state.sessions.validate_token(&token).await {
        Ok(user_id) => Ok(user_id),
        Err(e) => {
            tracing::warn!(error = %e, "token validation failed");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_token_forms() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_token(&headers).as_deref(), Some("abc123"));

        headers.insert("authorization", HeaderValue::from_static("abc123"));
        assert_eq!(extract_token(&headers).as_deref(), Some("abc123"));

        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(extract_token(&headers), None);
    }
}
