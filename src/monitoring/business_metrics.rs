//! Business-level Prometheus counters.

use parking_lot::Mutex;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::core::domain::AssetType;

pub struct BusinessMetrics {
    registry: Arc<Mutex<Registry>>,

    // ledger
    deposits_total: IntCounterVec,
    transfers_total: IntCounterVec,
    exchanges_total: IntCounterVec,
    ledger_failures_total: IntCounter,

    // security
    audits_total: IntCounter,
    login_attempts_total: IntCounter,
    failed_logins_total: IntCounter,
    registrations_total: IntCounter,

    // safe
    safe_proposals_total: IntCounter,
    safe_approvals_total: IntCounter,
    safe_executions_total: IntCounter,
    safe_fallbacks_total: IntCounter,
}

impl BusinessMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Arc::new(Mutex::new(Registry::new()));

        let deposits_total = IntCounterVec::new(
            Opts::new("wallet_deposits_total", "Deposits credited, by asset"),
            &["asset"],
        )?;
        let transfers_total = IntCounterVec::new(
            Opts::new("wallet_transfers_total", "Outgoing transfers, by asset"),
            &["asset"],
        )?;
        let exchanges_total = IntCounterVec::new(
            Opts::new("wallet_exchanges_total", "Asset exchanges, by source asset"),
            &["asset"],
        )?;
        let ledger_failures_total =
            IntCounter::new("wallet_ledger_failures_total", "Ledger operations that were rejected")?;

        let audits_total = IntCounter::new("security_audits_total", "Security audits run")?;
        let login_attempts_total = IntCounter::new("login_attempts_total", "Login attempts")?;
        let failed_logins_total = IntCounter::new("failed_logins_total", "Failed logins")?;
        let registrations_total = IntCounter::new("registrations_total", "Accounts registered")?;

        let safe_proposals_total = IntCounter::new("safe_proposals_total", "Safe proposals created")?;
        let safe_approvals_total = IntCounter::new("safe_approvals_total", "Safe confirmations added")?;
        let safe_executions_total =
            IntCounter::new("safe_executions_total", "Safe transactions executed")?;
        let safe_fallbacks_total = IntCounter::new(
            "safe_fallbacks_total",
            "Safe reads served from local data after a backend error",
        )?;

        {
            let r = registry.lock();
            r.register(Box::new(deposits_total.clone()))?;
            r.register(Box::new(transfers_total.clone()))?;
            r.register(Box::new(exchanges_total.clone()))?;
            r.register(Box::new(ledger_failures_total.clone()))?;
            r.register(Box::new(audits_total.clone()))?;
            r.register(Box::new(login_attempts_total.clone()))?;
            r.register(Box::new(failed_logins_total.clone()))?;
            r.register(Box::new(registrations_total.clone()))?;
            r.register(Box::new(safe_proposals_total.clone()))?;
            r.register(Box::new(safe_approvals_total.clone()))?;
            r.register(Box::new(safe_executions_total.clone()))?;
            r.register(Box::new(safe_fallbacks_total.clone()))?;
        }

        Ok(Self {
            registry,
            deposits_total,
            transfers_total,
            exchanges_total,
            ledger_failures_total,
            audits_total,
            login_attempts_total,
            failed_logins_total,
            registrations_total,
            safe_proposals_total,
            safe_approvals_total,
            safe_executions_total,
            safe_fallbacks_total,
        })
    }

    pub fn record_deposit(&self, asset: AssetType) {
        self.deposits_total.with_label_values(&[asset.as_str()]).inc();
    }

    pub fn record_transfer(&self, asset: AssetType) {
        self.transfers_total.with_label_values(&[asset.as_str()]).inc();
    }

    pub fn record_exchange(&self, from: AssetType) {
        self.exchanges_total.with_label_values(&[from.as_str()]).inc();
    }

    pub fn record_ledger_failure(&self) {
        self.ledger_failures_total.inc();
    }

    pub fn record_audit(&self) {
        self.audits_total.inc();
    }

    pub fn record_login_attempt(&self, success: bool) {
        self.login_attempts_total.inc();
        if !success {
            self.failed_logins_total.inc();
        }
    }

    pub fn record_registration(&self) {
        self.registrations_total.inc();
    }

    pub fn record_safe_proposal(&self) {
        self.safe_proposals_total.inc();
    }

    pub fn record_safe_approval(&self) {
        self.safe_approvals_total.inc();
    }

    pub fn record_safe_execution(&self) {
        self.safe_executions_total.inc();
    }

    pub fn record_safe_fallback(&self) {
        self.safe_fallbacks_total.inc();
    }

    /// Prometheus text exposition of every registered metric.
    pub fn export(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.lock().gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl std::fmt::Debug for BusinessMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusinessMetrics").finish_non_exhaustive()
    }
}
