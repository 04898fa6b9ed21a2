//! Ledger operations: deposits, transfers, exchanges and portfolio valuation.
//!
//! Every balance change and its ledger row commit in one database transaction.
//! The transaction takes SQLite's write lock before reading balances, so two
//! concurrent debits cannot both pass the funds check.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::SqliteConnection;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::domain::{AssetType, LedgerEntry, Transaction, TransactionType, Wallet};
use crate::core::errors::WalletError;
use crate::core::validation::ensure_positive;
use crate::crypto::{generate_private_key, generate_wallet_address, KeyCipher};
use crate::monitoring::BusinessMetrics;
use crate::service::prices::{exchange_rate, find_price, price_of, AssetPrice, PriceOracle};
use crate::storage::{ledger, NewTransaction, WalletStorage};

pub const DEPOSIT_SOURCE: &str = "External Deposit";
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Fractional digits kept on stored amounts.
const AMOUNT_SCALE: u32 = 18;

#[derive(Debug, Clone, Serialize)]
pub struct WalletValuation {
    #[serde(flatten)]
    pub wallet: Wallet,
    pub usd_value: Decimal,
    pub price_change_24h: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct Portfolio {
    pub wallets: Vec<WalletValuation>,
    pub total_balance: Decimal,
    pub prices: Vec<AssetPrice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerReceipt {
    pub transaction: Transaction,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExchangeReceipt {
    pub transaction: Transaction,
    pub from_balance: Decimal,
    pub to_balance: Decimal,
    pub received_amount: Decimal,
    pub exchange_rate: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionPage {
    pub transactions: Vec<LedgerEntry>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

pub struct WalletService {
    storage: Arc<WalletStorage>,
    cipher: Arc<KeyCipher>,
    prices: Arc<dyn PriceOracle>,
    metrics: Arc<BusinessMetrics>,
}

impl WalletService {
    pub fn new(
        storage: Arc<WalletStorage>,
        cipher: Arc<KeyCipher>,
        prices: Arc<dyn PriceOracle>,
        metrics: Arc<BusinessMetrics>,
    ) -> Self {
        Self { storage, cipher, prices, metrics }
    }

    pub async fn prices(&self) -> Result<Vec<AssetPrice>, WalletError> {
        self.prices.prices().await
    }

    pub async fn get_user_wallets(&self, user_id: &str) -> Result<Vec<Wallet>, WalletError> {
        self.storage.get_user_wallets(user_id).await
    }

    /// Returns the user's wallet for `asset`, creating an empty one if needed.
    pub async fn create_wallet(&self, user_id: &str, asset: AssetType) -> Result<Wallet, WalletError> {
        let mut conn = self.storage.pool().acquire().await?;
        self.get_or_create_wallet(&mut conn, user_id, asset).await
    }

    async fn get_or_create_wallet(
        &self,
        conn: &mut SqliteConnection,
        user_id: &str,
        asset: AssetType,
    ) -> Result<Wallet, WalletError> {
        if let Some(wallet) = ledger::wallet_by_asset(conn, user_id, asset).await? {
            return Ok(wallet);
        }
        let address = generate_wallet_address(asset);
        let private_key = generate_private_key();
        let encrypted = self.cipher.encrypt(&private_key)?;
        let wallet = ledger::insert_wallet(conn, user_id, asset, &address, &encrypted).await?;
        info!(user_id, asset = %asset, "wallet ready");
        Ok(wallet)
    }

    pub async fn add_funds(
        &self,
        user_id: &str,
        asset: AssetType,
        amount: Decimal,
    ) -> Result<LedgerReceipt, WalletError> {
        let amount = ledger_amount(amount)?;

        let mut tx = self.storage.begin().await?;
        ledger::lock_user_wallets(&mut tx, user_id).await?;
        let wallet = self.get_or_create_wallet(&mut tx, user_id, asset).await?;
        let balance = checked_add(wallet.balance, amount)?;
        ledger::set_balance(&mut tx, &wallet.id, balance).await?;
        let transaction = ledger::insert_transaction(
            &mut tx,
            &NewTransaction {
                user_id,
                wallet_id: &wallet.id,
                tx_type: TransactionType::Received,
                amount,
                to_address: None,
                from_address: Some(DEPOSIT_SOURCE),
            },
        )
        .await?;
        tx.commit().await?;

        self.metrics.record_deposit(asset);
        info!(user_id, asset = %asset, %amount, "funds added");
        Ok(LedgerReceipt { transaction, balance: balance.normalize() })
    }

    pub async fn send_funds(
        &self,
        user_id: &str,
        asset: AssetType,
        amount: Decimal,
        to_address: &str,
    ) -> Result<LedgerReceipt, WalletError> {
        let amount = ledger_amount(amount)?;
        let to_address = to_address.trim();
        if to_address.is_empty() {
            return Err(WalletError::ValidationError("Recipient address is required".to_string()));
        }

        let mut tx = self.storage.begin().await?;
        ledger::lock_user_wallets(&mut tx, user_id).await?;
        let wallet = ledger::wallet_by_asset(&mut tx, user_id, asset)
            .await?
            .ok_or_else(|| WalletError::NotFoundError("Wallet not found".to_string()))?;
        if wallet.balance < amount {
            self.metrics.record_ledger_failure();
            warn!(user_id, asset = %asset, "send rejected: insufficient balance");
            return Err(WalletError::InsufficientFunds("Insufficient balance".to_string()));
        }
        let balance = wallet.balance - amount;
        ledger::set_balance(&mut tx, &wallet.id, balance).await?;
        let transaction = ledger::insert_transaction(
            &mut tx,
            &NewTransaction {
                user_id,
                wallet_id: &wallet.id,
                tx_type: TransactionType::Sent,
                amount,
                to_address: Some(to_address),
                from_address: Some(&wallet.address),
            },
        )
        .await?;
        tx.commit().await?;

        self.metrics.record_transfer(asset);
        info!(user_id, asset = %asset, %amount, "funds sent");
        Ok(LedgerReceipt { transaction, balance: balance.normalize() })
    }

    pub async fn exchange_assets(
        &self,
        user_id: &str,
        from: AssetType,
        to: AssetType,
        amount: Decimal,
    ) -> Result<ExchangeReceipt, WalletError> {
        let amount = ledger_amount(amount)?;
        if from == to {
            return Err(WalletError::ValidationError(
                "Cannot exchange an asset for itself".to_string(),
            ));
        }
        let prices = self.prices.prices().await?;
        let rate = exchange_rate(&prices, from, to)?;
        let received = amount
            .checked_mul(rate)
            .ok_or_else(|| WalletError::InvalidAmount("Amount too large".to_string()))?
            .round_dp(AMOUNT_SCALE);
        if received <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount(
                "Amount is too small to exchange at the current rate".to_string(),
            ));
        }

        let mut tx = self.storage.begin().await?;
        ledger::lock_user_wallets(&mut tx, user_id).await?;
        let source = ledger::wallet_by_asset(&mut tx, user_id, from)
            .await?
            .ok_or_else(|| WalletError::NotFoundError("Source wallet not found".to_string()))?;
        if source.balance < amount {
            self.metrics.record_ledger_failure();
            return Err(WalletError::InsufficientFunds("Insufficient balance".to_string()));
        }
        let destination = self.get_or_create_wallet(&mut tx, user_id, to).await?;

        let from_balance = source.balance - amount;
        let to_balance = checked_add(destination.balance, received)?;
        ledger::set_balance(&mut tx, &source.id, from_balance).await?;
        ledger::set_balance(&mut tx, &destination.id, to_balance).await?;
        let transaction = ledger::insert_transaction(
            &mut tx,
            &NewTransaction {
                user_id,
                wallet_id: &source.id,
                tx_type: TransactionType::Exchange,
                amount,
                to_address: Some(&destination.address),
                from_address: Some(&source.address),
            },
        )
        .await?;
        tx.commit().await?;

        self.metrics.record_exchange(from);
        info!(user_id, %from, %to, %amount, %received, "assets exchanged");
        Ok(ExchangeReceipt {
            transaction,
            from_balance: from_balance.normalize(),
            to_balance: to_balance.normalize(),
            received_amount: received.normalize(),
            exchange_rate: rate.normalize(),
        })
    }

    /// Wallets valued in USD against the current price table.
    pub async fn portfolio(&self, user_id: &str) -> Result<Portfolio, WalletError> {
        let wallets = self.storage.get_user_wallets(user_id).await?;
        let prices = self.prices.prices().await?;

        let wallets: Vec<WalletValuation> = wallets
            .into_iter()
            .map(|wallet| {
                let usd_value = (wallet.balance * price_of(&prices, wallet.asset_type)).normalize();
                let price_change_24h = find_price(&prices, wallet.asset_type)
                    .map(|p| p.change_24h)
                    .unwrap_or(Decimal::ZERO);
                WalletValuation { wallet, usd_value, price_change_24h }
            })
            .collect();
        let total_balance = wallets.iter().map(|w| w.usd_value).sum::<Decimal>().normalize();

        Ok(Portfolio { wallets, total_balance, prices })
    }

    /// Newest-first ledger page. `limit` defaults to 10 and is capped at 100.
    pub async fn get_user_transactions(
        &self,
        user_id: &str,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<TransactionPage, WalletError> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = offset.unwrap_or(0);
        let transactions = self.storage.get_user_transactions(user_id, limit, offset).await?;
        let total = self.storage.count_user_transactions(user_id).await?;
        Ok(TransactionPage { transactions, total, limit, offset })
    }
}

/// Rounds to the stored scale, then requires a positive result.
fn ledger_amount(amount: Decimal) -> Result<Decimal, WalletError> {
    let amount = amount.round_dp(AMOUNT_SCALE);
    ensure_positive(amount)?;
    Ok(amount)
}

fn checked_add(balance: Decimal, amount: Decimal) -> Result<Decimal, WalletError> {
    balance
        .checked_add(amount)
        .ok_or_else(|| WalletError::InvalidAmount("Amount too large".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::prices::StaticPriceOracle;
    use crate::storage::NewUser;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    async fn service() -> (WalletService, String) {
        let storage = Arc::new(WalletStorage::in_memory().await.unwrap());
        let user = storage
            .create_user(NewUser {
                email: "svc@example.com".to_string(),
                name: "Service".to_string(),
                timezone: "UTC".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        let service = WalletService::new(
            storage,
            Arc::new(KeyCipher::from_secret("unit-test-secret-0001").unwrap()),
            Arc::new(StaticPriceOracle::default()),
            Arc::new(BusinessMetrics::new().unwrap()),
        );
        (service, user.id)
    }

    #[tokio::test]
    async fn test_add_funds_creates_wallet_and_ledger_row() {
        let (service, user_id) = service().await;
        let receipt = service.add_funds(&user_id, AssetType::Eth, dec("1.5")).await.unwrap();
        assert_eq!(receipt.balance, dec("1.5"));
        assert_eq!(receipt.transaction.tx_type, TransactionType::Received);
        assert_eq!(receipt.transaction.from_address.as_deref(), Some(DEPOSIT_SOURCE));
        assert_eq!(receipt.transaction.asset_type, AssetType::Eth);

        let receipt = service.add_funds(&user_id, AssetType::Eth, dec("0.25")).await.unwrap();
        assert_eq!(receipt.balance, dec("1.75"));
        assert_eq!(service.get_user_wallets(&user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_decimal_balances_do_not_drift() {
        let (service, user_id) = service().await;
        for _ in 0..10 {
            service.add_funds(&user_id, AssetType::Usdc, dec("0.1")).await.unwrap();
        }
        let wallets = service.get_user_wallets(&user_id).await.unwrap();
        assert_eq!(wallets[0].balance, Decimal::ONE);
    }

    #[tokio::test]
    async fn test_non_positive_amounts_rejected() {
        let (service, user_id) = service().await;
        let err = service.add_funds(&user_id, AssetType::Btc, Decimal::ZERO).await.unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount(_)));
        let err = service.send_funds(&user_id, AssetType::Btc, dec("-1"), "0xabc").await.unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount(_)));
    }

    #[tokio::test]
    async fn test_amounts_rounding_to_zero_rejected() {
        let (service, user_id) = service().await;
        let dust = dec("0.0000000000000000001");

        let err = service.add_funds(&user_id, AssetType::Sol, dust).await.unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount(_)));
        assert!(service.get_user_wallets(&user_id).await.unwrap().is_empty());

        service.add_funds(&user_id, AssetType::Sol, dec("1")).await.unwrap();
        let err = service.send_funds(&user_id, AssetType::Sol, dust, "0xdest").await.unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount(_)));

        let wallets = service.get_user_wallets(&user_id).await.unwrap();
        assert_eq!(wallets[0].balance, Decimal::ONE);
        let page = service.get_user_transactions(&user_id, None, None).await.unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_exchange_rejects_zero_received() {
        let (service, user_id) = service().await;
        service.add_funds(&user_id, AssetType::Usdt, dec("1")).await.unwrap();

        let err = service
            .exchange_assets(&user_id, AssetType::Usdt, AssetType::Btc, dec("0.000000000000000001"))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount(_)));

        let wallets = service.get_user_wallets(&user_id).await.unwrap();
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets[0].balance, Decimal::ONE);
        assert_eq!(service.get_user_transactions(&user_id, None, None).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_receipt_balances_are_normalized() {
        let (service, user_id) = service().await;
        let receipt = service.add_funds(&user_id, AssetType::Eth, dec("1.50")).await.unwrap();
        assert_eq!(serde_json::to_value(&receipt).unwrap()["balance"], "1.5");

        let receipt = service.send_funds(&user_id, AssetType::Eth, dec("1.5"), "0xdest").await.unwrap();
        assert_eq!(receipt.balance.to_string(), "0");

        service.add_funds(&user_id, AssetType::Eth, dec("1")).await.unwrap();
        let receipt = service
            .exchange_assets(&user_id, AssetType::Eth, AssetType::Usdc, dec("0.5"))
            .await
            .unwrap();
        assert_eq!(receipt.from_balance.to_string(), "0.5");
        assert_eq!(receipt.to_balance.to_string(), "1400");
    }

    #[tokio::test]
    async fn test_send_funds_rules() {
        let (service, user_id) = service().await;

        let err = service.send_funds(&user_id, AssetType::Sol, dec("1"), "  ").await.unwrap_err();
        assert_eq!(err.message(), "Recipient address is required");

        let err = service.send_funds(&user_id, AssetType::Sol, dec("1"), "0xdest").await.unwrap_err();
        assert_eq!(err.message(), "Wallet not found");

        service.add_funds(&user_id, AssetType::Sol, dec("2")).await.unwrap();
        let err = service.send_funds(&user_id, AssetType::Sol, dec("3"), "0xdest").await.unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds(_)));

        let receipt = service.send_funds(&user_id, AssetType::Sol, dec("2"), "0xdest").await.unwrap();
        assert_eq!(receipt.balance, Decimal::ZERO);
        assert_eq!(receipt.transaction.to_address.as_deref(), Some("0xdest"));
        assert_eq!(receipt.transaction.tx_type, TransactionType::Sent);
    }

    #[tokio::test]
    async fn test_exchange_uses_price_ratio() {
        let (service, user_id) = service().await;
        service.add_funds(&user_id, AssetType::Eth, dec("2")).await.unwrap();

        let receipt = service
            .exchange_assets(&user_id, AssetType::Eth, AssetType::Usdc, dec("0.5"))
            .await
            .unwrap();
        assert_eq!(receipt.exchange_rate, dec("2800"));
        assert_eq!(receipt.received_amount, dec("1400"));
        assert_eq!(receipt.from_balance, dec("1.5"));
        assert_eq!(receipt.to_balance, dec("1400"));
        assert_eq!(receipt.transaction.tx_type, TransactionType::Exchange);
        assert_eq!(receipt.transaction.asset_type, AssetType::Eth);

        let page = service.get_user_transactions(&user_id, None, None).await.unwrap();
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn test_exchange_errors() {
        let (service, user_id) = service().await;
        let err = service
            .exchange_assets(&user_id, AssetType::Btc, AssetType::Eth, dec("1"))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Source wallet not found");

        let err = service
            .exchange_assets(&user_id, AssetType::Btc, AssetType::Btc, dec("1"))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::ValidationError(_)));

        service.add_funds(&user_id, AssetType::Btc, dec("0.1")).await.unwrap();
        let err = service
            .exchange_assets(&user_id, AssetType::Btc, AssetType::Eth, dec("1"))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds(_)));
        // The failed exchange must not have created the destination wallet.
        assert_eq!(service.get_user_wallets(&user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_portfolio_values() {
        let (service, user_id) = service().await;
        service.add_funds(&user_id, AssetType::Btc, dec("0.5")).await.unwrap();
        service.add_funds(&user_id, AssetType::Usdt, dec("100")).await.unwrap();

        let portfolio = service.portfolio(&user_id).await.unwrap();
        assert_eq!(portfolio.wallets.len(), 2);
        assert_eq!(portfolio.total_balance, dec("22600"));
        let btc = portfolio.wallets.iter().find(|w| w.wallet.asset_type == AssetType::Btc).unwrap();
        assert_eq!(btc.usd_value, dec("22500"));
        assert_eq!(btc.price_change_24h, dec("2.4"));
        assert_eq!(portfolio.prices.len(), 5);
    }

    #[tokio::test]
    async fn test_transaction_page_limits() {
        let (service, user_id) = service().await;
        for _ in 0..12 {
            service.add_funds(&user_id, AssetType::Usdc, dec("1")).await.unwrap();
        }
        let page = service.get_user_transactions(&user_id, None, None).await.unwrap();
        assert_eq!(page.transactions.len(), 10);
        assert_eq!(page.total, 12);

        let page = service.get_user_transactions(&user_id, Some(500), Some(10)).await.unwrap();
        assert_eq!(page.limit, MAX_PAGE_SIZE);
        assert_eq!(page.transactions.len(), 2);
    }
}
