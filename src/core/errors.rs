use thiserror::Error;

/// Error type for wallet service operations.
#[derive(Debug, Error)]
pub enum WalletError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// Storage-related errors.
    #[error("Storage error: {0}")]
    StorageError(String),
    /// Encryption/decryption and hashing errors.
    #[error("Crypto error: {0}")]
    CryptoError(String),
    /// Validation errors.
    #[error("Validation error: {0}")]
    ValidationError(String),
    /// Invalid amount errors.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    /// Insufficient funds errors.
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    /// Resource not found errors.
    #[error("Not found: {0}")]
    NotFoundError(String),
    /// Unique constraint or state conflicts.
    #[error("Conflict: {0}")]
    Conflict(String),
    /// Authentication failures.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// The Safe address is missing from configuration.
    #[error("Safe address not configured")]
    SafeNotConfigured,
    /// Errors reported by the Safe backend.
    #[error("Safe error: {0}")]
    SafeError(String),
    /// Network errors.
    #[error("Network error: {0}")]
    NetworkError(String),
    /// Internal errors.
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl WalletError {
    /// The detail message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            WalletError::ConfigError(msg)
            | WalletError::StorageError(msg)
            | WalletError::CryptoError(msg)
            | WalletError::ValidationError(msg)
            | WalletError::InvalidAmount(msg)
            | WalletError::InsufficientFunds(msg)
            | WalletError::NotFoundError(msg)
            | WalletError::Conflict(msg)
            | WalletError::Unauthorized(msg)
            | WalletError::SafeError(msg)
            | WalletError::NetworkError(msg)
            | WalletError::InternalError(msg) => msg,
            WalletError::SafeNotConfigured => "Safe address not configured",
        }
    }

    /// Errors caused by the caller's input rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            WalletError::ValidationError(_)
                | WalletError::InvalidAmount(_)
                | WalletError::InsufficientFunds(_)
                | WalletError::NotFoundError(_)
                | WalletError::Conflict(_)
                | WalletError::Unauthorized(_)
                | WalletError::SafeNotConfigured
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, WalletError::NetworkError(_))
    }
}

impl From<sqlx::Error> for WalletError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => WalletError::NotFoundError("Record not found".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                WalletError::Conflict(db.message().to_string())
            }
            other => WalletError::StorageError(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for WalletError {
    fn from(err: anyhow::Error) -> Self {
        WalletError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        WalletError::ValidationError(err.to_string())
    }
}

impl From<reqwest::Error> for WalletError {
    fn from(err: reqwest::Error) -> Self {
        WalletError::NetworkError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_storage_error() {
        let err = WalletError::StorageError("DB failure".to_string());
        assert_eq!(format!("{}", err), "Storage error: DB failure");
    }

    #[test]
    fn test_message_strips_prefix() {
        let err = WalletError::InsufficientFunds("Insufficient balance".to_string());
        assert_eq!(err.message(), "Insufficient balance");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_from_anyhow() {
        let wallet_err: WalletError = anyhow::anyhow!("Test error").into();
        match wallet_err {
            WalletError::InternalError(msg) => assert_eq!(msg, "Test error"),
            _ => panic!("Expected InternalError variant"),
        }
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: WalletError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, WalletError::NotFoundError(_)));
    }
}
