//! # Domain Errors
//!
//! Every driver operation fails with one of these. Validation and state
//! errors are final for the given input; `Ledger` errors leave local state
//! untouched so the same call can be retried.

use shared_types::{Address, ChannelState, TypesError};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// Malformed input: bad address, zero amount, self-channel.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unknown proposal, channel or peer.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Operation not valid in the entity's current lifecycle state.
    #[error("invalid state: {operation} requires {expected}, found {actual}")]
    InvalidState {
        operation: &'static str,
        expected: String,
        actual: String,
    },

    /// Caller is not the designated acceptor.
    #[error("unauthorized: {0} is not the designated acceptor")]
    Unauthorized(Address),

    /// Caller is neither partA nor partB.
    #[error("{0} is not a participant of this channel")]
    NotParticipant(Address),

    /// This participant's funding flag is already set.
    #[error("{0} has already funded this channel")]
    AlreadyFunded(Address),

    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: String, requested: String },

    /// Withdraw attempted before the challenge window elapsed.
    #[error("challenge period active: block {current}, withdraw allowed after {unlocks_after}")]
    ChallengePeriodActive { current: u64, unlocks_after: u64 },

    /// Settlement contract call failed (reverted, out of gas, RPC down).
    #[error("ledger error: {0}")]
    Ledger(String),

    /// State could not be signed or a signature could not be recovered.
    #[error("signing error: {0}")]
    Signing(String),
}

impl ChannelError {
    pub(crate) fn proposal_not_found(id: impl fmt::Display) -> Self {
        Self::NotFound {
            kind: "proposal",
            id: id.to_string(),
        }
    }

    pub(crate) fn channel_not_found(id: impl fmt::Display) -> Self {
        Self::NotFound {
            kind: "channel",
            id: id.to_string(),
        }
    }

    pub(crate) fn wrong_channel_state(
        operation: &'static str,
        expected: ChannelState,
        actual: ChannelState,
    ) -> Self {
        Self::InvalidState {
            operation,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Error category as seen by a driver.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::Signing(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidState { .. } | Self::AlreadyFunded(_) => ErrorKind::State,
            Self::Unauthorized(_) | Self::NotParticipant(_) => ErrorKind::Authorization,
            Self::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            Self::ChallengePeriodActive { .. } => ErrorKind::ChallengePeriodActive,
            Self::Ledger(_) => ErrorKind::Ledger,
        }
    }
}

impl From<TypesError> for ChannelError {
    fn from(e: TypesError) -> Self {
        Self::Validation(e.to_string())
    }
}

/// Driver-facing error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    State,
    Authorization,
    InsufficientBalance,
    ChallengePeriodActive,
    Ledger,
    Network,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "ValidationError",
            Self::NotFound => "NotFoundError",
            Self::State => "StateError",
            Self::Authorization => "AuthorizationError",
            Self::InsufficientBalance => "InsufficientBalanceError",
            Self::ChallengePeriodActive => "ChallengePeriodActiveError",
            Self::Ledger => "LedgerError",
            Self::Network => "NetworkError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ChannelError::proposal_not_found("p").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ChannelError::AlreadyFunded(Address::new([1; 20])).kind(),
            ErrorKind::State
        );
        assert_eq!(
            ChannelError::NotParticipant(Address::new([1; 20])).kind(),
            ErrorKind::Authorization
        );
        assert_eq!(
            ChannelError::ChallengePeriodActive {
                current: 10,
                unlocks_after: 24
            }
            .kind()
            .to_string(),
            "ChallengePeriodActiveError"
        );
    }

    #[test]
    fn test_messages_are_actionable() {
        let err = ChannelError::wrong_channel_state("close", ChannelState::Active, ChannelState::Empty);
        assert_eq!(
            err.to_string(),
            "invalid state: close requires ACTIVE, found EMPTY"
        );
    }
}
