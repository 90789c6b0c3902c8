//! # Message Payloads
//!
//! One struct per [`MessageType`]. Field names are camelCase on the wire and
//! every amount is a decimal string.
//!
//! ## Design Rules
//!
//! - Payloads MUST NOT carry the sender's network address; the envelope's
//!   `from` is authoritative. `PEER_*` payloads carry the *subject* address.
//! - Each payload names the logical entity it reconciles (`proposalId` or
//!   `channelId`) so a receiver can route it without extra state.

use crate::amount::{decimal, Amount};
use crate::entities::{
    Address, ChannelId, ChannelState, PaymentRecord, PeerAddress, ProposalId, Timestamp,
};
use crate::envelope::MessageType;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// A typed wire payload bound to its message type.
pub trait Payload: Serialize + DeserializeOwned {
    /// The envelope type tag for this payload.
    const TYPE: MessageType;
}

// =============================================================================
// PEER MANAGEMENT
// =============================================================================

/// `PEER_CONNECTED`: a node announces itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerConnectedPayload {
    /// Network address the announcing node is reachable at.
    pub address: PeerAddress,
    /// Ledger account of the announcing node.
    pub node_address: Address,
    /// Capabilities the node supports.
    pub capabilities: Vec<String>,
}

impl Payload for PeerConnectedPayload {
    const TYPE: MessageType = MessageType::PeerConnected;
}

/// `PEER_DISCONNECTED`: a node is leaving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerDisconnectedPayload {
    /// Network address of the departing node.
    pub address: PeerAddress,
}

impl Payload for PeerDisconnectedPayload {
    const TYPE: MessageType = MessageType::PeerDisconnected;
}

// =============================================================================
// PROPOSAL NEGOTIATION
// =============================================================================

/// `CHANNEL_PROPOSAL`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProposalPayload {
    /// Proposal identifier chosen by the proposer.
    pub proposal_id: ProposalId,
    /// Proposer (becomes partA).
    pub proposer: Address,
    /// Designated acceptor (becomes partB).
    pub acceptor: Address,
    /// Total channel amount.
    #[serde(with = "decimal")]
    pub amount: Amount,
    /// Proposal creation time.
    pub created_at: Timestamp,
}

impl Payload for ChannelProposalPayload {
    const TYPE: MessageType = MessageType::ChannelProposal;
}

/// `CHANNEL_ACCEPTED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAcceptedPayload {
    /// Accepted proposal.
    pub proposal_id: ProposalId,
    /// Account that accepted.
    pub acceptor: Address,
    /// Acceptance time.
    pub accepted_at: Timestamp,
}

impl Payload for ChannelAcceptedPayload {
    const TYPE: MessageType = MessageType::ChannelAccepted;
}

// =============================================================================
// CHANNEL LIFECYCLE
// =============================================================================

/// `CHANNEL_CREATED`: the settlement contract was deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelCreatedPayload {
    /// Proposal the channel materialises.
    pub proposal_id: ProposalId,
    /// Channel identifier shared by both nodes.
    pub channel_id: ChannelId,
    /// Deployed contract address.
    pub contract_address: Address,
    /// Participant A.
    pub part_a: Address,
    /// Participant B.
    pub part_b: Address,
    /// Total locked amount.
    #[serde(with = "decimal")]
    pub amount: Amount,
    /// Initial balance of A.
    #[serde(with = "decimal")]
    pub balance_a: Amount,
    /// Initial balance of B.
    #[serde(with = "decimal")]
    pub balance_b: Amount,
}

impl Payload for ChannelCreatedPayload {
    const TYPE: MessageType = MessageType::ChannelCreated;
}

/// `CHANNEL_FUNDED`: one participant deposited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelFundedPayload {
    /// Funded channel.
    pub channel_id: ChannelId,
    /// Participant that deposited.
    pub participant: Address,
    /// Ledger-reported state after the deposit.
    pub state: ChannelState,
    /// Whether both local funding flags are set on the sender.
    pub both_funded: bool,
}

impl Payload for ChannelFundedPayload {
    const TYPE: MessageType = MessageType::ChannelFunded;
}

/// `PAYMENT`: a signed off-chain balance update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// Channel the payment belongs to.
    pub channel_id: ChannelId,
    /// The signed record.
    pub payment: PaymentRecord,
}

impl Payload for PaymentPayload {
    const TYPE: MessageType = MessageType::Payment;
}

/// `CHANNEL_CLOSING`: close submitted on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelClosingPayload {
    /// Closing channel.
    pub channel_id: ChannelId,
    /// Nonce of the submitted state.
    pub nonce: u64,
    /// Submitted balance of A.
    #[serde(with = "decimal")]
    pub balance_a: Amount,
    /// Submitted balance of B.
    #[serde(with = "decimal")]
    pub balance_b: Amount,
    /// Block height at which the challenge window starts.
    pub closing_block: u64,
}

impl Payload for ChannelClosingPayload {
    const TYPE: MessageType = MessageType::ChannelClosing;
}

/// `CHANNEL_CLOSED`: ledger reports the channel closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelClosedPayload {
    /// Closed channel.
    pub channel_id: ChannelId,
    /// Final balance of A.
    #[serde(with = "decimal")]
    pub balance_a: Amount,
    /// Final balance of B.
    #[serde(with = "decimal")]
    pub balance_b: Amount,
}

impl Payload for ChannelClosedPayload {
    const TYPE: MessageType = MessageType::ChannelClosed;
}

/// `CHANNEL_WITHDRAWN`: funds released after the challenge window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelWithdrawnPayload {
    /// Withdrawn channel.
    pub channel_id: ChannelId,
    /// Participant that submitted the withdrawal.
    pub withdrawer: Address,
    /// Ledger transaction hash, hex.
    pub transaction_hash: String,
}

impl Payload for ChannelWithdrawnPayload {
    const TYPE: MessageType = MessageType::ChannelWithdrawn;
}
