pub mod encryption;
pub mod keys;
pub mod password;

pub use self::encryption::KeyCipher;
pub use self::keys::{generate_private_key, generate_transaction_hash, generate_wallet_address};
pub use self::password::{hash_password, verify_password};
