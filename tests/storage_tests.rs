//! File-backed storage: data survives a reconnect.

use custodial_wallet::core::domain::AssetType;
use custodial_wallet::crypto::KeyCipher;
use custodial_wallet::monitoring::BusinessMetrics;
use custodial_wallet::service::{StaticPriceOracle, WalletService};
use custodial_wallet::storage::{NewUser, WalletStorage};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const SECRET: &str = "storage-test-secret-0001";

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn database_url(dir: &TempDir) -> String {
    format!("sqlite://{}/nested/wallet.db", dir.path().display())
}

async fn open(url: &str) -> Arc<WalletStorage> {
    Arc::new(WalletStorage::connect(url, 4, Duration::from_secs(5)).await.unwrap())
}

fn wallet_service(storage: Arc<WalletStorage>) -> WalletService {
    WalletService::new(
        storage,
        Arc::new(KeyCipher::from_secret(SECRET).unwrap()),
        Arc::new(StaticPriceOracle::default()),
        Arc::new(BusinessMetrics::new().unwrap()),
    )
}

#[tokio::test]
async fn test_ledger_persists_across_reconnect() {
    let dir = TempDir::new().unwrap();
    let url = database_url(&dir);

    let user_id = {
        let storage = open(&url).await;
        assert!(!storage.is_in_memory());
        let user = storage
            .create_user(NewUser {
                email: "Persist@Example.com".to_string(),
                name: "Persist".to_string(),
                timezone: "UTC".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();

        let service = wallet_service(storage.clone());
        service.add_funds(&user.id, AssetType::Btc, dec("0.75")).await.unwrap();
        service
            .send_funds(&user.id, AssetType::Btc, dec("0.25"), "bc1qrecipient")
            .await
            .unwrap();
        storage.pool().close().await;
        user.id
    };

    let storage = open(&url).await;
    let credentials = storage.get_user_by_email("persist@example.com").await.unwrap().unwrap();
    assert_eq!(credentials.user.id, user_id);

    let wallets = storage.get_user_wallets(&user_id).await.unwrap();
    assert_eq!(wallets.len(), 1);
    assert_eq!(wallets[0].balance, dec("0.5"));

    let cipher = KeyCipher::from_secret(SECRET).unwrap();
    assert!(cipher.decrypt(&wallets[0].private_key_encrypted).is_ok());

    assert_eq!(storage.count_user_transactions(&user_id).await.unwrap(), 2);
    let entries = storage.get_user_transactions(&user_id, 10, 0).await.unwrap();
    assert_eq!(entries[0].transaction.amount, dec("0.25"));
    assert_eq!(entries[0].transaction.to_address.as_deref(), Some("bc1qrecipient"));
}

#[tokio::test]
async fn test_schema_init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let url = database_url(&dir);

    for _ in 0..3 {
        let storage = open(&url).await;
        storage.pool().close().await;
    }

    let storage = open(&url).await;
    let tables: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(storage.pool())
            .await
            .unwrap();
    for table in ["security_audits", "transactions", "users", "wallets"] {
        assert!(tables.iter().any(|t| t == table), "missing table {}", table);
    }
}

#[tokio::test]
async fn test_duplicate_email_is_conflict() {
    let dir = TempDir::new().unwrap();
    let storage = open(&database_url(&dir)).await;
    let new_user = NewUser {
        email: "dup@example.com".to_string(),
        name: "Dup".to_string(),
        timezone: "UTC".to_string(),
        password_hash: "hash".to_string(),
    };
    storage.create_user(new_user.clone()).await.unwrap();

    let err = storage
        .create_user(NewUser { email: "DUP@example.com".to_string(), ..new_user })
        .await
        .unwrap_err();
    assert!(matches!(err, custodial_wallet::WalletError::Conflict(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sends_on_pooled_connections() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(WalletStorage::connect(&database_url(&dir), 8, Duration::from_secs(10)).await.unwrap());
    let user = storage
        .create_user(NewUser {
            email: "racer@example.com".to_string(),
            name: "Racer".to_string(),
            timezone: "UTC".to_string(),
            password_hash: "hash".to_string(),
        })
        .await
        .unwrap();
    let service = Arc::new(wallet_service(storage.clone()));
    service.add_funds(&user.id, AssetType::Usdt, dec("50")).await.unwrap();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let service = service.clone();
            let user_id = user.id.clone();
            tokio::spawn(async move {
                service
                    .send_funds(&user_id, AssetType::Usdt, dec("10"), &format!("0xdest{}", i))
                    .await
            })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(err) => assert!(matches!(err, custodial_wallet::WalletError::InsufficientFunds(_)), "{:?}", err),
        }
    }
    assert_eq!(succeeded, 5);

    let wallets = storage.get_user_wallets(&user.id).await.unwrap();
    assert_eq!(wallets[0].balance, Decimal::ZERO);
    assert_eq!(storage.count_user_transactions(&user.id).await.unwrap(), 6);
}
