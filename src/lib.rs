//! Custodial multi-asset wallet service.
//!
//! An axum JSON API over a SQLite ledger, with mock-priced exchanges,
//! security audit scoring and a Safe multisig proposal service.

pub mod api;
pub mod core;
pub mod crypto;
pub mod monitoring;
pub mod safe;
pub mod service;
pub mod storage;

pub use crate::core::errors::WalletError;
