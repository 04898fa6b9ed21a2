//! Random key material for custodial wallets.

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::core::domain::AssetType;

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// 20 random bytes, hex encoded, with a `1` prefix for BTC and `0x` for ETH.
pub fn generate_wallet_address(asset: AssetType) -> String {
    let prefix = match asset {
        AssetType::Btc => "1",
        AssetType::Eth => "0x",
        _ => "",
    };
    format!("{}{}", prefix, random_hex(20))
}

/// 32 random bytes, hex encoded.
pub fn generate_private_key() -> Zeroizing<String> {
    Zeroizing::new(random_hex(32))
}

/// Identifier for internal ledger rows; same shape as a private key.
pub fn generate_transaction_hash() -> String {
    random_hex(32)
}
