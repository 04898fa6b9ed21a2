//! HTTP surface: router, handlers and request plumbing.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod security_headers;
pub mod server;
pub mod server_config;
pub mod session_store;
pub mod types;

pub use error::ApiError;
pub use server::WalletServer;
