//! Identifier and amount format invariants
//!
//! Wire formats must be preserved for compatibility with existing records:
//! escrow id `ESC_` + 8 uppercase alphanumerics, dispute id `DSP_` + 8,
//! wallet address = 3 lowercase letters + 38 chars from `[a-z2-9]`,
//! public key / transaction hash = 64 lowercase hex characters. Monetary
//! amounts travel as decimal-digit strings counting beddows (the smallest
//! currency unit) and are parsed into `U256` for all arithmetic.

use crate::error::EscrowError;
use crate::EscrowResult;
use primitive_types::U256;
use uuid::Uuid;

/// Escrow id prefix
pub const ESCROW_ID_PREFIX: &str = "ESC_";
/// Dispute id prefix
pub const DISPUTE_ID_PREFIX: &str = "DSP_";

const SHORT_ID_LEN: usize = 8;
const WALLET_SUFFIX_LEN: usize = 38;
const HEX_KEY_LEN: usize = 64;

/// Generate an 8-character uppercase alphanumeric short id
pub fn generate_short_id() -> String {
    Uuid::new_v4().simple().to_string()[..SHORT_ID_LEN].to_uppercase()
}

/// Generate a fresh escrow id (`ESC_` + short id)
pub fn new_escrow_id() -> String {
    format!("{}{}", ESCROW_ID_PREFIX, generate_short_id())
}

/// Generate a fresh dispute id (`DSP_` + short id)
pub fn new_dispute_id() -> String {
    format!("{}{}", DISPUTE_ID_PREFIX, generate_short_id())
}

/// Generate a mock contract address (`contract-` + lowercase short id)
pub fn new_contract_address() -> String {
    format!("contract-{}", generate_short_id().to_lowercase())
}

fn is_short_id(s: &str) -> bool {
    s.len() == SHORT_ID_LEN
        && s.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
}

/// Check `ESC_[A-Z0-9]{8}`
pub fn is_valid_escrow_id(id: &str) -> bool {
    id.strip_prefix(ESCROW_ID_PREFIX).is_some_and(is_short_id)
}

/// Check `DSP_[A-Z0-9]{8}`
pub fn is_valid_dispute_id(id: &str) -> bool {
    id.strip_prefix(DISPUTE_ID_PREFIX).is_some_and(is_short_id)
}

/// Check a wallet address: 3 lowercase letters followed by 38 characters
/// from `[a-z2-9]` (no `0`/`1`, mirroring the chain's base32 alphabet)
pub fn is_valid_wallet_address(address: &str) -> bool {
    let (prefix, suffix) = match address.char_indices().nth(3) {
        Some((idx, _)) => address.split_at(idx),
        None => return false,
    };
    prefix.chars().all(|c| c.is_ascii_lowercase())
        && suffix.len() == WALLET_SUFFIX_LEN
        && suffix
            .chars()
            .all(|c| c.is_ascii_lowercase() || ('2'..='9').contains(&c))
}

/// Check a public key or transaction hash: 64 lowercase hex characters
pub fn is_valid_hex_key(key: &str) -> bool {
    key.len() == HEX_KEY_LEN
        && key
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

/// Check that an amount string is all decimal digits (zero allowed)
pub fn is_valid_amount(amount: &str) -> bool {
    !amount.is_empty() && amount.chars().all(|c| c.is_ascii_digit())
}

/// Parse a decimal-digit amount string into a `U256`
pub fn parse_amount(amount: &str) -> EscrowResult<U256> {
    if !is_valid_amount(amount) {
        return Err(EscrowError::validation(format!(
            "Amount must be a decimal-digit string in beddows, got {:?}",
            amount
        )));
    }
    U256::from_dec_str(amount)
        .map_err(|_| EscrowError::validation(format!("Amount {:?} out of range", amount)))
}

/// Parse an amount and require it to be strictly positive
pub fn parse_positive_amount(amount: &str) -> EscrowResult<U256> {
    let value = parse_amount(amount)?;
    if value.is_zero() {
        return Err(EscrowError::validation("Amount must be greater than 0"));
    }
    Ok(value)
}

/// Reject text that is empty after trimming or exceeds `max_len` characters
pub fn validate_text(field: &str, text: &str, max_len: usize) -> EscrowResult<()> {
    if text.trim().is_empty() {
        return Err(EscrowError::validation(format!("{} cannot be empty", field)));
    }
    if text.chars().count() > max_len {
        return Err(EscrowError::validation(format!(
            "{} cannot exceed {} characters",
            field, max_len
        )));
    }
    Ok(())
}

/// Like [`validate_text`] but allows absent/empty values
pub fn validate_optional_text(field: &str, text: &str, max_len: usize) -> EscrowResult<()> {
    if text.chars().count() > max_len {
        return Err(EscrowError::validation(format!(
            "{} cannot exceed {} characters",
            field, max_len
        )));
    }
    Ok(())
}

/// Generate a mock 64-hex transaction hash
pub fn new_transaction_hash() -> String {
    format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}
