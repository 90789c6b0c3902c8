//! # `WireMessage` Envelope
//!
//! The one wrapper for everything two nodes say to each other:
//!
//! ```json
//! {"type": "PAYMENT", "data": {...}, "from": "http://a:4000",
//!  "to": "http://b:4000", "timestamp": 1700000000000, "messageId": "<uuid>"}
//! ```
//!
//! `data` stays an untyped JSON value in the envelope so that a node can
//! deduplicate and route a message before (and regardless of whether) it
//! understands the payload. Typed access goes through [`WireMessage::decode`].

use crate::entities::{MessageId, PeerAddress, Timestamp};
use crate::errors::TypesError;
use crate::messages::Payload;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of peer message types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// A peer announces itself after a successful handshake.
    PeerConnected,
    /// A peer is going away.
    PeerDisconnected,
    /// New channel proposal.
    ChannelProposal,
    /// Proposal accepted by its acceptor.
    ChannelAccepted,
    /// Settlement contract deployed for a proposal.
    ChannelCreated,
    /// One participant funded the channel.
    ChannelFunded,
    /// Off-chain payment.
    Payment,
    /// Close submitted; challenge window started.
    ChannelClosing,
    /// Channel observed closed on the ledger.
    ChannelClosed,
    /// Funds withdrawn after the challenge window.
    ChannelWithdrawn,
}

impl MessageType {
    /// Every message type, in lifecycle order.
    pub const ALL: [MessageType; 10] = [
        Self::PeerConnected,
        Self::PeerDisconnected,
        Self::ChannelProposal,
        Self::ChannelAccepted,
        Self::ChannelCreated,
        Self::ChannelFunded,
        Self::Payment,
        Self::ChannelClosing,
        Self::ChannelClosed,
        Self::ChannelWithdrawn,
    ];

    /// Wire name (`CHANNEL_PROPOSAL`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PeerConnected => "PEER_CONNECTED",
            Self::PeerDisconnected => "PEER_DISCONNECTED",
            Self::ChannelProposal => "CHANNEL_PROPOSAL",
            Self::ChannelAccepted => "CHANNEL_ACCEPTED",
            Self::ChannelCreated => "CHANNEL_CREATED",
            Self::ChannelFunded => "CHANNEL_FUNDED",
            Self::Payment => "PAYMENT",
            Self::ChannelClosing => "CHANNEL_CLOSING",
            Self::ChannelClosed => "CHANNEL_CLOSED",
            Self::ChannelWithdrawn => "CHANNEL_WITHDRAWN",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The peer wire envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    /// Routing tag.
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// Type-specific payload.
    pub data: serde_json::Value,
    /// Sender's network address. Sole source of truth for who sent it.
    pub from: PeerAddress,
    /// Recipient's network address, filled in by the transport per send.
    #[serde(default)]
    pub to: Option<PeerAddress>,
    /// Creation time.
    pub timestamp: Timestamp,
    /// Unique message identifier.
    pub message_id: MessageId,
}

impl WireMessage {
    /// Wrap a typed payload in a fresh envelope.
    pub fn new<P: Payload>(
        payload: &P,
        from: PeerAddress,
        timestamp: Timestamp,
    ) -> Result<Self, TypesError> {
        let data = serde_json::to_value(payload).map_err(|e| TypesError::MalformedPayload {
            message_type: P::TYPE.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            kind: P::TYPE,
            data,
            from,
            to: None,
            timestamp,
            message_id: MessageId::generate(),
        })
    }

    /// Copy of this envelope addressed to `to`.
    pub fn addressed_to(&self, to: PeerAddress) -> Self {
        Self {
            to: Some(to),
            ..self.clone()
        }
    }

    /// Decode the payload as `P`, checking the type tag first.
    pub fn decode<P: Payload>(&self) -> Result<P, TypesError> {
        if self.kind != P::TYPE {
            return Err(TypesError::MalformedPayload {
                message_type: self.kind.to_string(),
                reason: format!("expected {}", P::TYPE),
            });
        }
        serde_json::from_value(self.data.clone()).map_err(|e| TypesError::MalformedPayload {
            message_type: self.kind.to_string(),
            reason: e.to_string(),
        })
    }
}
