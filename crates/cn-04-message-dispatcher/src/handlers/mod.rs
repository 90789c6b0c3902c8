//! Routing table: one arm per message type.

mod lifecycle;
mod peer;

use crate::domain::{DispatchError, DispatchOutcome};
use crate::service::MessageDispatcher;
use shared_types::{MessageType, Payload, WireMessage};

fn decode<P: Payload>(message: &WireMessage) -> Result<P, DispatchError> {
    message.decode::<P>().map_err(|e| DispatchError::Malformed {
        kind: message.kind,
        from: message.from.clone(),
        reason: e.to_string(),
    })
}

impl MessageDispatcher {
    pub(crate) async fn route(
        &self,
        message: &WireMessage,
    ) -> Result<DispatchOutcome, DispatchError> {
        let from = &message.from;
        let outcome = match message.kind {
            MessageType::PeerConnected => self.on_peer_connected(from, decode(message)?),
            MessageType::PeerDisconnected => self.on_peer_disconnected(from, decode(message)?),
            MessageType::ChannelProposal => self.on_proposal(from, decode(message)?),
            MessageType::ChannelAccepted => self.on_accepted(from, decode(message)?),
            MessageType::ChannelCreated => self.on_created(from, decode(message)?),
            MessageType::ChannelFunded => self.on_funded(from, decode(message)?).await,
            MessageType::Payment => self.on_payment(from, decode(message)?),
            MessageType::ChannelClosing => self.on_closing(from, decode(message)?),
            MessageType::ChannelClosed => self.on_closed(from, decode(message)?),
            MessageType::ChannelWithdrawn => self.on_withdrawn(from, decode(message)?),
        };
        Ok(outcome)
    }
}
