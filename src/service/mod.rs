pub mod audit;
pub mod prices;
pub mod profile;
pub mod wallet;

pub use audit::AuditService;
pub use prices::{AssetPrice, PriceOracle, StaticPriceOracle};
pub use profile::ProfileService;
pub use wallet::WalletService;
