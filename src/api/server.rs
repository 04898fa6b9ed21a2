use axum::{
    error_handling::HandleErrorLayer,
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::{limit::ConcurrencyLimitLayer, timeout::TimeoutLayer, BoxError, ServiceBuilder};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::api::handlers;
use crate::api::middleware::rate_limit;
use crate::api::security_headers::security_headers;
use crate::api::server_config::*;
use crate::api::session_store::SessionStore;
use crate::core::config::AppConfig;
use crate::core::errors::WalletError;
use crate::crypto::KeyCipher;
use crate::monitoring::BusinessMetrics;
use crate::safe::SafeService;
use crate::service::{AuditService, PriceOracle, ProfileService, StaticPriceOracle, WalletService};
use crate::storage::WalletStorage;

/// Shared state behind every handler.
#[derive(Clone)]
pub struct WalletServer {
    pub config: AppConfig,
    pub storage: Arc<WalletStorage>,
    pub wallets: Arc<WalletService>,
    pub audits: Arc<AuditService>,
    pub profiles: Arc<ProfileService>,
    pub safe: Arc<SafeService>,
    pub sessions: Arc<SessionStore>,
    pub metrics: Arc<BusinessMetrics>,
}

impl WalletServer {
    pub async fn new(config: AppConfig) -> Result<Self, WalletError> {
        let storage = WalletStorage::from_config(&config.storage).await?;
        Self::with_storage(config, storage)
    }

    /// In-memory database, for tests.
    pub async fn new_for_test(config: AppConfig) -> Result<Self, WalletError> {
        let storage = WalletStorage::in_memory().await?;
        Self::with_storage(config, storage)
    }

    pub fn with_storage(config: AppConfig, storage: WalletStorage) -> Result<Self, WalletError> {
        let metrics = Arc::new(
            BusinessMetrics::new()
                .map_err(|e| WalletError::InternalError(format!("Failed to register metrics: {}", e)))?,
        );
        let cipher = Arc::new(KeyCipher::from_secret(&config.security.encryption_key)?);
        let prices: Arc<dyn PriceOracle> = Arc::new(StaticPriceOracle::from_config(&config.prices));
        let safe = Arc::new(SafeService::from_config(&config.safe, metrics.clone())?);
        Ok(Self::from_parts(config, Arc::new(storage), cipher, prices, safe, metrics))
    }

    pub fn from_parts(
        config: AppConfig,
        storage: Arc<WalletStorage>,
        cipher: Arc<KeyCipher>,
        prices: Arc<dyn PriceOracle>,
        safe: Arc<SafeService>,
        metrics: Arc<BusinessMetrics>,
    ) -> Self {
        let wallets = Arc::new(WalletService::new(storage.clone(), cipher, prices, metrics.clone()));
        let audits = Arc::new(AuditService::new(storage.clone(), metrics.clone()));
        let profiles = Arc::new(ProfileService::new(storage.clone(), metrics.clone()));
        let sessions = Arc::new(SessionStore::new(config.security.session_ttl_seconds));
        Self { config, storage, wallets, audits, profiles, safe, sessions, metrics }
    }

    pub fn create_router(self) -> Router {
        let cors = cors_layer(&self.config.server.cors_allow_origin);
        let limiter = rate_limit::per_minute(self.config.server.rate_limit_per_minute);
        let state = Arc::new(self);

        let base = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/api/health", get(handlers::health_check))
            .route("/api/metrics", get(handlers::metrics))
            .route("/api/auth/register", post(handlers::register))
            .route("/api/auth/login", post(handlers::login))
            .route("/api/auth/logout", post(handlers::logout))
            .route("/api/profile", get(handlers::get_profile).put(handlers::update_profile))
            .route("/api/prices", get(handlers::get_prices))
            .route("/api/wallet/balance", get(handlers::get_balance))
            .route("/api/wallets", get(handlers::list_wallets).post(handlers::create_wallet))
            .route("/api/transactions", get(handlers::list_transactions))
            .route("/api/security/audit", post(handlers::run_audit).get(handlers::latest_audit))
            .route("/api/security/audits", get(handlers::list_audits))
            .route("/api/safe/info", get(handlers::safe_info))
            .route("/api/safe/history", get(handlers::proposal_history));
        let base = with_limits(base, MAX_BODY_SIZE, REQUEST_TIMEOUT);

        let ledger = Router::new()
            .route("/api/wallet/add-funds", post(handlers::add_funds))
            .route("/api/wallet/send", post(handlers::send_funds))
            .route("/api/wallet/exchange", post(handlers::exchange_assets));
        let ledger = with_limits(ledger, MAX_SENSITIVE_BODY_SIZE, LEDGER_REQUEST_TIMEOUT);

        let safe = Router::new()
            .route("/api/safe/proposals", get(handlers::list_proposals).post(handlers::create_proposal))
            .route("/api/safe/proposals/:id/approve", post(handlers::approve_proposal))
            .route("/api/safe/proposals/:id/execute", post(handlers::execute_proposal));
        let safe = with_limits(safe, MAX_SENSITIVE_BODY_SIZE, SAFE_REQUEST_TIMEOUT);

        let mut app = base
            .merge(ledger)
            .merge(safe)
            .with_state(state)
            .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENCY));

        if let Some(limiter) = limiter {
            app = app.layer(middleware::from_fn_with_state(limiter, rate_limit::rate_limit));
        }

        app.layer(middleware::from_fn(security_headers))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    pub async fn start(self) -> Result<(), anyhow::Error> {
        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);

        let sessions = self.sessions.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                sessions.cleanup_expired_tokens().await;
            }
        });

        tracing::info!(
            safe_backend = self.safe.backend_name(),
            safe_connected = self.safe.is_connected(),
            "Server listening on {}",
            addr
        );
        let app = self.create_router();
        let listener = TcpListener::bind(&addr).await?;
        axum::serve(listener, app.into_make_service()).await?;
        Ok(())
    }
}

/// Body limit plus timeout, with timeouts mapped to 408 and other layer
/// errors to 503.
fn with_limits(
    router: Router<Arc<WalletServer>>,
    body_limit: usize,
    timeout: Duration,
) -> Router<Arc<WalletServer>> {
    router.layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(|err: BoxError| async move {
                if err.is::<tower::timeout::error::Elapsed>() {
                    (StatusCode::REQUEST_TIMEOUT, "request timed out")
                } else {
                    (StatusCode::SERVICE_UNAVAILABLE, "service overloaded")
                }
            }))
            .layer(RequestBodyLimitLayer::new(body_limit))
            .layer(TimeoutLayer::new(timeout)),
    )
}

/// `origins` is a comma separated list. Invalid entries are skipped.
fn cors_layer(origins: &str) -> CorsLayer {
    let list: Vec<HeaderValue> = origins
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match HeaderValue::from_str(s) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = s, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    tracing::info!(origins = list.len(), "CORS configured");

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(list))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::ORIGIN,
        ])
        .expose_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(CORS_MAX_AGE)
}
