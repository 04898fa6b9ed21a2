pub mod config;
pub mod domain;
pub mod errors;
pub mod validation;

pub use config::AppConfig;
pub use errors::WalletError;
