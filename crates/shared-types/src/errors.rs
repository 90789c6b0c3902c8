//! # Error Types
//!
//! Parsing and validation errors for the shared value types.

use thiserror::Error;

/// Errors raised while parsing or validating shared value types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    /// Address is not 20 bytes of hex.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Amount is not an unsigned decimal integer that fits in 256 bits.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Identifier is not a UUID.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Signature is not 65 bytes of hex.
    #[error("Invalid signature encoding: {0}")]
    InvalidSignature(String),

    /// Payload could not be decoded for the given message type.
    #[error("Malformed {message_type} payload: {reason}")]
    MalformedPayload {
        /// Wire name of the message type.
        message_type: String,
        /// Decoder error.
        reason: String,
    },
}
