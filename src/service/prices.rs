//! Asset price table.
//!
//! Prices are a fixed table unless configuration supplies its own. The
//! exchange rate between two assets is the ratio of their USD prices.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::domain::AssetType;
use crate::core::errors::WalletError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetPrice {
    pub symbol: String,
    pub price: Decimal,
    #[serde(rename = "change24h", alias = "change_24h")]
    pub change_24h: Decimal,
}

impl AssetPrice {
    pub fn new(symbol: &str, price: Decimal, change_24h: Decimal) -> Self {
        Self { symbol: symbol.to_string(), price, change_24h }
    }
}

#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn prices(&self) -> Result<Vec<AssetPrice>, WalletError>;
}

/// Serves a fixed price table.
#[derive(Debug, Clone)]
pub struct StaticPriceOracle {
    table: Vec<AssetPrice>,
}

impl StaticPriceOracle {
    pub fn new(table: Vec<AssetPrice>) -> Self {
        Self { table }
    }

    /// The configured table, or the built-in one when `configured` is empty.
    pub fn from_config(configured: &[AssetPrice]) -> Self {
        if configured.is_empty() {
            Self::default()
        } else {
            Self::new(configured.to_vec())
        }
    }
}

impl Default for StaticPriceOracle {
    fn default() -> Self {
        Self::new(default_price_table())
    }
}

#[async_trait]
impl PriceOracle for StaticPriceOracle {
    async fn prices(&self) -> Result<Vec<AssetPrice>, WalletError> {
        Ok(self.table.clone())
    }
}

pub fn default_price_table() -> Vec<AssetPrice> {
    vec![
        AssetPrice::new("BTC", Decimal::new(45_000, 0), Decimal::new(24, 1)),
        AssetPrice::new("ETH", Decimal::new(2_800, 0), Decimal::new(12, 1)),
        AssetPrice::new("SOL", Decimal::new(95, 0), Decimal::new(-8, 1)),
        AssetPrice::new("USDC", Decimal::ONE, Decimal::ZERO),
        AssetPrice::new("USDT", Decimal::ONE, Decimal::ZERO),
    ]
}

pub fn find_price(prices: &[AssetPrice], asset: AssetType) -> Option<&AssetPrice> {
    prices.iter().find(|p| p.symbol.eq_ignore_ascii_case(asset.as_str()))
}

/// USD price of `asset`, zero when the table has no entry.
pub fn price_of(prices: &[AssetPrice], asset: AssetType) -> Decimal {
    find_price(prices, asset).map(|p| p.price).unwrap_or(Decimal::ZERO)
}

/// `price(from) / price(to)`. Missing or zero prices count as 1.
pub fn exchange_rate(
    prices: &[AssetPrice],
    from: AssetType,
    to: AssetType,
) -> Result<Decimal, WalletError> {
    let lookup = |asset| {
        find_price(prices, asset)
            .map(|p| p.price)
            .filter(|p| !p.is_zero())
            .unwrap_or(Decimal::ONE)
    };
    lookup(from)
        .checked_div(lookup(to))
        .ok_or_else(|| WalletError::InvalidAmount("Exchange rate out of range".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_default_table() {
        let prices = StaticPriceOracle::default().prices().await.unwrap();
        assert_eq!(prices.len(), 5);
        assert_eq!(price_of(&prices, AssetType::Btc), Decimal::new(45_000, 0));
        assert_eq!(find_price(&prices, AssetType::Sol).unwrap().change_24h, Decimal::from_str("-0.8").unwrap());
    }

    #[test]
    fn test_exchange_rate_ratio() {
        let prices = default_price_table();
        let rate = exchange_rate(&prices, AssetType::Eth, AssetType::Usdc).unwrap();
        assert_eq!(rate, Decimal::new(2_800, 0));
        let rate = exchange_rate(&prices, AssetType::Usdt, AssetType::Btc).unwrap();
        assert_eq!(rate * Decimal::new(45_000, 0), Decimal::ONE);
    }

    #[test]
    fn test_missing_symbol_prices() {
        let prices = vec![AssetPrice::new("ETH", Decimal::new(2_000, 0), Decimal::ZERO)];
        assert_eq!(exchange_rate(&prices, AssetType::Eth, AssetType::Sol).unwrap(), Decimal::new(2_000, 0));
        assert_eq!(price_of(&prices, AssetType::Sol), Decimal::ZERO);
    }

    #[test]
    fn test_extreme_ratio_is_error() {
        let prices = vec![
            AssetPrice::new("BTC", Decimal::MAX, Decimal::ZERO),
            AssetPrice::new("USDC", Decimal::from_str("0.0000000000000000000000000001").unwrap(), Decimal::ZERO),
        ];
        let err = exchange_rate(&prices, AssetType::Btc, AssetType::Usdc).unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount(_)));
    }

    #[test]
    fn test_config_override_and_wire_name() {
        let custom = vec![AssetPrice::new("BTC", Decimal::new(1, 0), Decimal::ZERO)];
        assert_eq!(StaticPriceOracle::from_config(&custom).table.len(), 1);
        assert_eq!(StaticPriceOracle::from_config(&[]).table.len(), 5);

        let json = serde_json::to_value(&custom[0]).unwrap();
        assert!(json.get("change24h").is_some());
    }
}
