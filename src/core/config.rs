use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::core::errors::WalletError;
use crate::service::prices::AssetPrice;

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
    /// Comma separated list of allowed CORS origins
    #[serde(default = "ServerConfig::default_cors_origin")]
    pub cors_allow_origin: String,
    /// Global request budget per minute
    #[serde(default = "ServerConfig::default_rate_limit")]
    pub rate_limit_per_minute: u32,
}

impl ServerConfig {
    fn default_host() -> String { "0.0.0.0".to_string() }
    fn default_port() -> u16 { 8888 }
    fn default_cors_origin() -> String { "http://localhost:3000".to_string() }
    fn default_rate_limit() -> u32 { 600 }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            cors_allow_origin: Self::default_cors_origin(),
            rate_limit_per_minute: Self::default_rate_limit(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_url: String,
    pub max_connections: Option<u32>,
    pub connection_timeout_seconds: Option<u64>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/wallet.db".to_string(),
            max_connections: Some(10),
            connection_timeout_seconds: Some(30),
        }
    }
}

/// Security configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Secret the private-key encryption key is derived from
    #[serde(default, skip_serializing)]
    pub encryption_key: String,

    /// Session timeout (seconds)
    #[serde(default = "SecurityConfig::default_session_ttl")]
    pub session_ttl_seconds: u64,
}

impl SecurityConfig {
    pub const MIN_ENCRYPTION_KEY_LEN: usize = 16;

    fn default_session_ttl() -> u64 { 60 * 60 * 24 * 7 }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self { encryption_key: String::new(), session_ttl_seconds: Self::default_session_ttl() }
    }
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("encryption_key", &"<redacted>")
            .field("session_ttl_seconds", &self.session_ttl_seconds)
            .finish()
    }
}

/// Safe multisig configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct SafeConfig {
    pub address: Option<String>,
    #[serde(default = "SafeConfig::default_chain_id")]
    pub chain_id: u64,
    pub rpc_url: Option<String>,
    /// Overrides the hosted transaction service chosen from `chain_id`
    pub tx_service_url: Option<String>,
    #[serde(default, skip_serializing)]
    pub signer_private_key: Option<String>,
    /// Reject Safe requests when no address is configured
    #[serde(default = "SafeConfig::default_require_address")]
    pub require_address: bool,
    /// Talk to the transaction service when the Safe is configured
    #[serde(default = "SafeConfig::default_live")]
    pub live: bool,
}

impl SafeConfig {
    fn default_chain_id() -> u64 { 1 }
    fn default_require_address() -> bool { true }
    fn default_live() -> bool { true }
}

impl Default for SafeConfig {
    fn default() -> Self {
        Self {
            address: None,
            chain_id: Self::default_chain_id(),
            rpc_url: None,
            tx_service_url: None,
            signer_private_key: None,
            require_address: Self::default_require_address(),
            live: Self::default_live(),
        }
    }
}

impl fmt::Debug for SafeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SafeConfig")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .field("rpc_url", &self.rpc_url)
            .field("tx_service_url", &self.tx_service_url)
            .field("signer_private_key", &self.signer_private_key.as_ref().map(|_| "<redacted>"))
            .field("require_address", &self.require_address)
            .field("live", &self.live)
            .finish()
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub safe: SafeConfig,
    /// Replaces the built-in price table when non-empty
    #[serde(default)]
    pub prices: Vec<AssetPrice>,
}

impl AppConfig {
    /// Load from `CONFIG_PATH` (default `config.toml`), then apply env overrides.
    pub fn load() -> Result<Self, WalletError> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> Result<Self, WalletError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| WalletError::ConfigError(format!("Failed to read {}: {}", path.display(), e)))?;
            Self::from_toml(&content)?
        } else {
            tracing::warn!("Config file {} not found, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, WalletError> {
        toml::from_str(content).map_err(|e| WalletError::ConfigError(format!("Invalid config: {}", e)))
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), WalletError> {
        if let Some(v) = env_nonempty("DATABASE_URL") {
            self.storage.database_url = v;
        }
        if let Some(v) = env_nonempty("ENCRYPTION_KEY") {
            self.security.encryption_key = v;
        }
        if let Some(v) = env_nonempty("SESSION_TTL_SECONDS") {
            self.security.session_ttl_seconds = v
                .parse()
                .map_err(|_| WalletError::ConfigError("SESSION_TTL_SECONDS must be an integer".to_string()))?;
        }
        if let Some(v) = env_nonempty("CORS_ALLOW_ORIGIN") {
            self.server.cors_allow_origin = v;
        }
        if let Some(v) = env_nonempty("SAFE_ADDRESS") {
            self.safe.address = Some(v);
        }
        if let Some(v) = env_nonempty("CHAIN_ID") {
            self.safe.chain_id =
                v.parse().map_err(|_| WalletError::ConfigError("CHAIN_ID must be an integer".to_string()))?;
        }
        if let Some(v) = env_nonempty("RPC_URL") {
            self.safe.rpc_url = Some(v);
        }
        if let Some(v) = env_nonempty("SAFE_TX_SERVICE_URL") {
            self.safe.tx_service_url = Some(v);
        }
        if let Some(v) = env_nonempty("SIGNER_PRIVATE_KEY") {
            self.safe.signer_private_key = Some(v);
        }
        Ok(())
    }

    /// Refuse configurations the server cannot safely run with.
    pub fn validate(&self) -> Result<(), WalletError> {
        if self.security.encryption_key.len() < SecurityConfig::MIN_ENCRYPTION_KEY_LEN
            && !cfg!(feature = "test-env")
        {
            return Err(WalletError::ConfigError(format!(
                "ENCRYPTION_KEY must be at least {} characters",
                SecurityConfig::MIN_ENCRYPTION_KEY_LEN
            )));
        }
        if self.security.session_ttl_seconds == 0 {
            return Err(WalletError::ConfigError("session_ttl_seconds must be positive".to_string()));
        }
        if let Some(address) = &self.safe.address {
            crate::core::validation::validate_ethereum_address(address)
                .map_err(|_| WalletError::ConfigError("Safe address is not a valid address".to_string()))?;
        }
        if let Some(bad) = self.prices.iter().find(|p| p.price <= rust_decimal::Decimal::ZERO) {
            return Err(WalletError::ConfigError(format!(
                "Price for {} must be positive",
                bad.symbol
            )));
        }
        Ok(())
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_from_toml_partial_uses_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [server]
            port = 9000

            [safe]
            address = "0x1234567890123456789012345678901234567890"
            chain_id = 11155111
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.safe.chain_id, 11155111);
        assert!(config.safe.require_address);
        assert!(config.prices.is_empty());
    }

    #[test]
    fn test_prices_section() {
        let config = AppConfig::from_toml(
            r#"
            [[prices]]
            symbol = "BTC"
            price = "50000"
            change24h = "1.5"
            "#,
        )
        .unwrap();
        assert_eq!(config.prices.len(), 1);
        assert_eq!(config.prices[0].symbol, "BTC");
    }

    #[test]
    fn test_validate_rejects_non_positive_prices() {
        let mut config = AppConfig::from_toml(
            r#"
            [security]
            encryption_key = "0123456789abcdef0123456789abcdef"

            [[prices]]
            symbol = "SOL"
            price = "-95"
            change24h = "0"
            "#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("SOL"));

        config.prices[0].price = rust_decimal::Decimal::ZERO;
        assert!(config.validate().is_err());

        config.prices[0].price = rust_decimal::Decimal::new(95, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("CHAIN_ID", "137");
        std::env::set_var("ENCRYPTION_KEY", "0123456789abcdef0123456789abcdef");
        let mut config = AppConfig::default();
        config.apply_env_overrides().unwrap();
        std::env::remove_var("CHAIN_ID");
        std::env::remove_var("ENCRYPTION_KEY");

        assert_eq!(config.safe.chain_id, 137);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_env_override_rejects_bad_chain_id() {
        std::env::set_var("CHAIN_ID", "mainnet");
        let mut config = AppConfig::default();
        let result = config.apply_env_overrides();
        std::env::remove_var("CHAIN_ID");
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut config = AppConfig::default();
        config.security.encryption_key = "super-secret-value".to_string();
        config.safe.signer_private_key = Some("0xdeadbeef".to_string());
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret-value"));
        assert!(!rendered.contains("deadbeef"));
    }
}
