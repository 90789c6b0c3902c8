//! Outcomes of applying a peer notification.
//!
//! A notification that cannot be applied is not an error: the sender may be
//! ahead of us, behind us, replaying, or talking about an entity we never
//! took part in. Handlers report why and move on.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    /// Local state changed.
    Applied,
    /// Nothing changed.
    Ignored(IgnoreReason),
}

impl Reconciled {
    pub fn is_applied(&self) -> bool {
        matches!(self, Reconciled::Applied)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The referenced proposal or channel is not known here.
    UnknownEntity,
    /// This node is not a party to the entity.
    NotParticipant,
    /// Already applied.
    Duplicate,
    /// Older than local state (nonce or lifecycle position).
    Stale,
    /// Payload failed validation.
    Invalid(String),
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownEntity => f.write_str("unknown entity"),
            Self::NotParticipant => f.write_str("not a participant"),
            Self::Duplicate => f.write_str("duplicate"),
            Self::Stale => f.write_str("stale"),
            Self::Invalid(reason) => write!(f, "invalid: {reason}"),
        }
    }
}
