//! # Amounts
//!
//! Monetary values are unsigned 256-bit integers in the ledger's smallest
//! unit. JSON has no native big integer, so on the wire they are decimal
//! strings (`"1000000000000000000"`), never numbers and never hex.

use crate::errors::TypesError;

pub use primitive_types::U256;

/// Amount in the ledger's smallest unit.
pub type Amount = U256;

/// Parse an unsigned decimal amount.
///
/// Rejects signs, whitespace, hex and anything wider than 256 bits.
pub fn parse_amount(input: &str) -> Result<Amount, TypesError> {
    if input.is_empty() || !input.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TypesError::InvalidAmount(input.to_string()));
    }
    U256::from_dec_str(input).map_err(|_| TypesError::InvalidAmount(input.to_string()))
}

/// Serde adapter rendering an [`Amount`] as a decimal string.
///
/// Use with `#[serde(with = "shared_types::amount::decimal")]`.
pub mod decimal {
    use super::{parse_amount, Amount};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_amount(&raw).map_err(D::Error::custom)
    }
}
