//! EIP-712 hashing and calldata for Safe transactions.
//!
//! Domain is `{chainId, verifyingContract}` (Safe >= 1.3.0, no name/version).
//! `safeTxHash = keccak256(0x19 || 0x01 || domainSeparator || structHash)`.

use ethers::abi::{self, Token};
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::keccak256;
use std::str::FromStr;

use super::types::SafeTransactionData;
use crate::core::errors::WalletError;

pub const DOMAIN_TYPE: &str = "EIP712Domain(uint256 chainId,address verifyingContract)";
pub const SAFE_TX_TYPE: &str = "SafeTx(address to,uint256 value,bytes data,uint8 operation,uint256 safeTxGas,uint256 baseGas,uint256 gasPrice,address gasToken,address refundReceiver,uint256 nonce)";
pub const EXEC_TRANSACTION_SIGNATURE: &str =
    "execTransaction(address,uint256,bytes,uint8,uint256,uint256,uint256,address,address,bytes)";

pub fn parse_address(value: &str) -> Result<Address, WalletError> {
    Address::from_str(value.trim())
        .map_err(|_| WalletError::ValidationError(format!("Invalid address: {}", value)))
}

pub fn parse_uint(field: &str, value: &str) -> Result<U256, WalletError> {
    U256::from_dec_str(value.trim())
        .map_err(|_| WalletError::ValidationError(format!("Invalid {}: {}", field, value)))
}

pub fn parse_data(value: &str) -> Result<Vec<u8>, WalletError> {
    let stripped = value.trim().trim_start_matches("0x");
    hex::decode(stripped).map_err(|_| WalletError::ValidationError("Invalid hex data".to_string()))
}

pub fn domain_separator(chain_id: u64, safe: Address) -> H256 {
    let encoded = abi::encode(&[
        Token::FixedBytes(keccak256(DOMAIN_TYPE).to_vec()),
        Token::Uint(U256::from(chain_id)),
        Token::Address(safe),
    ]);
    H256::from(keccak256(encoded))
}

pub fn safe_tx_struct_hash(tx: &SafeTransactionData) -> Result<H256, WalletError> {
    let data = parse_data(&tx.data)?;
    let encoded = abi::encode(&[
        Token::FixedBytes(keccak256(SAFE_TX_TYPE).to_vec()),
        Token::Address(parse_address(&tx.to)?),
        Token::Uint(parse_uint("value", &tx.value)?),
        Token::FixedBytes(keccak256(data).to_vec()),
        Token::Uint(U256::from(tx.operation)),
        Token::Uint(parse_uint("safeTxGas", &tx.safe_tx_gas)?),
        Token::Uint(parse_uint("baseGas", &tx.base_gas)?),
        Token::Uint(parse_uint("gasPrice", &tx.gas_price)?),
        Token::Address(parse_address(&tx.gas_token)?),
        Token::Address(parse_address(&tx.refund_receiver)?),
        Token::Uint(U256::from(tx.nonce)),
    ]);
    Ok(H256::from(keccak256(encoded)))
}

pub fn safe_tx_hash(
    chain_id: u64,
    safe: Address,
    tx: &SafeTransactionData,
) -> Result<H256, WalletError> {
    let mut preimage = Vec::with_capacity(66);
    preimage.extend_from_slice(&[0x19, 0x01]);
    preimage.extend_from_slice(domain_separator(chain_id, safe).as_bytes());
    preimage.extend_from_slice(safe_tx_struct_hash(tx)?.as_bytes());
    Ok(H256::from(keccak256(preimage)))
}

/// Concatenates 65-byte owner signatures in ascending owner order, as
/// `checkSignatures` requires.
pub fn pack_signatures(mut signatures: Vec<(Address, Vec<u8>)>) -> Result<Bytes, WalletError> {
    signatures.sort_by_key(|(owner, _)| *owner);
    signatures.dedup_by_key(|(owner, _)| *owner);
    let mut packed = Vec::with_capacity(signatures.len() * 65);
    for (owner, signature) in signatures {
        if signature.len() != 65 {
            return Err(WalletError::SafeError(format!(
                "Confirmation from {:?} is not a 65-byte signature",
                owner
            )));
        }
        packed.extend_from_slice(&signature);
    }
    Ok(Bytes::from(packed))
}

/// ABI-encoded `execTransaction` calldata.
pub fn encode_exec_transaction(
    tx: &SafeTransactionData,
    signatures: &Bytes,
) -> Result<Bytes, WalletError> {
    let selector = &keccak256(EXEC_TRANSACTION_SIGNATURE)[..4];
    let args = abi::encode(&[
        Token::Address(parse_address(&tx.to)?),
        Token::Uint(parse_uint("value", &tx.value)?),
        Token::Bytes(parse_data(&tx.data)?),
        Token::Uint(U256::from(tx.operation)),
        Token::Uint(parse_uint("safeTxGas", &tx.safe_tx_gas)?),
        Token::Uint(parse_uint("baseGas", &tx.base_gas)?),
        Token::Uint(parse_uint("gasPrice", &tx.gas_price)?),
        Token::Address(parse_address(&tx.gas_token)?),
        Token::Address(parse_address(&tx.refund_receiver)?),
        Token::Bytes(signatures.to_vec()),
    ]);
    let mut calldata = selector.to_vec();
    calldata.extend_from_slice(&args);
    Ok(Bytes::from(calldata))
}

pub fn format_hash(hash: H256) -> String {
    format!("0x{}", hex::encode(hash.as_bytes()))
}
