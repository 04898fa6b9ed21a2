//! HTTP handlers, one module per area.

pub mod auth;
pub mod health;
pub mod profile;
pub mod safe;
pub mod security;
pub mod transactions;
pub mod wallet;

pub use auth::{login, logout, register};
pub use health::{health_check, metrics};
pub use profile::{get_profile, update_profile};
pub use safe::{
    approve_proposal, create_proposal, execute_proposal, list_proposals, proposal_history, safe_info,
};
pub use security::{latest_audit, list_audits, run_audit};
pub use transactions::list_transactions;
pub use wallet::{
    add_funds, create_wallet, exchange_assets, get_balance, get_prices, list_wallets, send_funds,
};
