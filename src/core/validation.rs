use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value;
use sha3::{Digest, Keccak256};
use std::str::FromStr;

use crate::core::errors::WalletError;

static HEX_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("Hardcoded regex should always compile"));
static HEX_DATA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x([0-9a-fA-F]{2})*$").expect("Hardcoded regex should always compile"));
static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$")
        .expect("Hardcoded regex should always compile")
});

/// Validates an Ethereum address.
pub fn validate_ethereum_address(address: &str) -> Result<(), WalletError> {
    if !HEX_ADDRESS.is_match(address) {
        return Err(WalletError::ValidationError("Invalid Ethereum address format".to_string()));
    }
    // EIP-55: if mixed-case, enforce checksum. All-lower or all-upper acceptable for compatibility.
    let body = &address[2..];
    let is_all_lower = body.chars().all(|c| !c.is_ascii_uppercase());
    let is_all_upper = body.chars().all(|c| !c.is_ascii_lowercase());
    if is_all_lower || is_all_upper {
        return Ok(());
    }
    if !is_eip55_checksum_valid(address) {
        return Err(WalletError::ValidationError(
            "Invalid EIP-55 checksum for Ethereum address".to_string(),
        ));
    }
    Ok(())
}

fn is_eip55_checksum_valid(addr: &str) -> bool {
    let body = &addr[2..];
    let hash = Keccak256::digest(body.to_lowercase().as_bytes());
    for (i, ch) in body.chars().enumerate() {
        let nibble = (hash[i / 2] >> (4 * (1 - (i % 2)))) & 0x0f;
        match ch {
            'a'..='f' if nibble >= 8 => return false,
            'A'..='F' if nibble < 8 => return false,
            _ => {}
        }
    }
    true
}

/// Validates `0x`-prefixed, even-length hex call data.
pub fn validate_hex_data(data: &str) -> Result<(), WalletError> {
    if !HEX_DATA.is_match(data) {
        return Err(WalletError::ValidationError("Call data must be 0x-prefixed hex".to_string()));
    }
    Ok(())
}

/// Validates a base-unit (wei) integer amount such as a Safe transaction value.
pub fn validate_wei_value(value: &str) -> Result<(), WalletError> {
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(WalletError::InvalidAmount("Value must be a non-negative integer in wei".to_string()));
    }
    if value.len() > 78 {
        return Err(WalletError::InvalidAmount("Value exceeds uint256".to_string()));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), WalletError> {
    if email.len() > 254 || !EMAIL.is_match(email) {
        return Err(WalletError::ValidationError("Invalid email format".to_string()));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), WalletError> {
    if password.chars().count() < 8 {
        return Err(WalletError::ValidationError(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    Ok(())
}

/// Parses a ledger amount sent either as a JSON string or a JSON number.
pub fn parse_amount(value: &Value) -> Result<Decimal, WalletError> {
    let raw = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return Err(WalletError::InvalidAmount("Invalid amount".to_string())),
    };
    let amount = Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|_| WalletError::InvalidAmount("Invalid amount".to_string()))?;
    ensure_positive(amount)?;
    Ok(amount)
}

/// Amounts must be strictly positive.
pub fn ensure_positive(amount: Decimal) -> Result<(), WalletError> {
    if amount <= Decimal::ZERO {
        return Err(WalletError::InvalidAmount("Invalid amount".to_string()));
    }
    Ok(())
}
