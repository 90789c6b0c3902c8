use shared_types::{MessageType, PeerAddress};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The payload does not match its type tag.
    #[error("malformed {kind} payload from {from}: {reason}")]
    Malformed {
        kind: MessageType,
        from: PeerAddress,
        reason: String,
    },
}
