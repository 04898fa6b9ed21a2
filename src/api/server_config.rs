//! Server limits.

use std::time::Duration;

pub const MAX_CONCURRENCY: usize = 256;

pub const MAX_BODY_SIZE: usize = 1024 * 1024; // 1MB

/// Ledger mutation and Safe write bodies.
pub const MAX_SENSITIVE_BODY_SIZE: usize = 64 * 1024;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const LEDGER_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Execution waits for the on-chain receipt.
pub const SAFE_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub const CORS_MAX_AGE: Duration = Duration::from_secs(3600);

pub const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);
