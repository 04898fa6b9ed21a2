//! Private-key encryption at rest.
//!
//! AES-256-GCM with a fresh 12-byte nonce per message. The cipher key is
//! derived from the configured secret with HKDF-SHA256. Tokens are
//! `hex(nonce):hex(ciphertext)`.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::Aes256Gcm;
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use std::fmt;
use zeroize::Zeroizing;

use crate::core::errors::WalletError;

const NONCE_LEN: usize = 12;
const KDF_SALT: &[u8] = b"custodial-wallet/v1";
const KDF_INFO: &[u8] = b"wallet-private-key";

pub struct KeyCipher {
    key: Zeroizing<[u8; 32]>,
}

impl KeyCipher {
    pub fn from_secret(secret: &str) -> Result<Self, WalletError> {
        if secret.is_empty() {
            return Err(WalletError::CryptoError("Encryption secret must not be empty".to_string()));
        }
        let hk = Hkdf::<Sha256>::new(Some(KDF_SALT), secret.as_bytes());
        let mut key = Zeroizing::new([0u8; 32]);
        hk.expand(KDF_INFO, &mut key[..])
            .map_err(|_| WalletError::CryptoError("Key derivation failed".to_string()))?;
        Ok(Self { key })
    }

    fn cipher(&self) -> Result<Aes256Gcm, WalletError> {
        Aes256Gcm::new_from_slice(&self.key[..])
            .map_err(|_| WalletError::CryptoError("Invalid key length".to_string()))
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, WalletError> {
        let cipher = self.cipher()?;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        #[allow(deprecated)]
        let nonce = aes_gcm::aead::Nonce::<Aes256Gcm>::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| WalletError::CryptoError("Encryption failed".to_string()))?;
        Ok(format!("{}:{}", hex::encode(nonce_bytes), hex::encode(ciphertext)))
    }

    pub fn decrypt(&self, token: &str) -> Result<Zeroizing<String>, WalletError> {
        let (nonce_hex, ct_hex) = token
            .split_once(':')
            .ok_or_else(|| WalletError::CryptoError("Malformed ciphertext".to_string()))?;
        let nonce_bytes =
            hex::decode(nonce_hex).map_err(|_| WalletError::CryptoError("Malformed nonce".to_string()))?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(WalletError::CryptoError("Malformed nonce".to_string()));
        }
        let ciphertext =
            hex::decode(ct_hex).map_err(|_| WalletError::CryptoError("Malformed ciphertext".to_string()))?;

        let cipher = self.cipher()?;
        #[allow(deprecated)]
        let nonce = aes_gcm::aead::Nonce::<Aes256Gcm>::from_slice(&nonce_bytes);
        let plaintext = cipher
            .decrypt(nonce, ciphertext.as_slice())
            .map_err(|_| WalletError::CryptoError("Decryption failed".to_string()))?;
        let text = String::from_utf8(plaintext)
            .map_err(|_| WalletError::CryptoError("Decrypted data is not UTF-8".to_string()))?;
        Ok(Zeroizing::new(text))
    }
}

impl fmt::Debug for KeyCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCipher").field("key", &"<redacted>").finish()
    }
}
