//! # Delivery Reports
//!
//! Peer notifications are best-effort: a local state change is committed
//! first and the notification outcome is reported, never rolled back.

use crate::entities::{MessageId, PeerAddress};
use serde::{Deserialize, Serialize};

/// Outcome of a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status", content = "reason")]
pub enum DeliveryResult {
    /// Peer acknowledged receipt.
    Delivered,
    /// Delivery failed; the peer was marked unreachable.
    Failed(String),
    /// No peer could be resolved for the notification.
    NoRoute(String),
}

/// One recipient's delivery outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOutcome {
    /// Recipient, if one was resolved.
    pub peer: Option<PeerAddress>,
    /// Message that was sent.
    pub message_id: MessageId,
    /// What happened.
    pub result: DeliveryResult,
}

impl DeliveryOutcome {
    /// Whether this outcome is a success.
    pub fn is_delivered(&self) -> bool {
        matches!(self.result, DeliveryResult::Delivered)
    }
}

/// Per-peer outcomes of one notification or broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    /// Outcomes in send order.
    pub outcomes: Vec<DeliveryOutcome>,
}

impl DeliveryReport {
    /// An empty report (nothing was sent).
    pub fn empty() -> Self {
        Self::default()
    }

    /// A report with a single outcome.
    pub fn single(outcome: DeliveryOutcome) -> Self {
        Self {
            outcomes: vec![outcome],
        }
    }

    /// Append an outcome.
    pub fn push(&mut self, outcome: DeliveryOutcome) {
        self.outcomes.push(outcome);
    }

    /// Merge another report into this one.
    pub fn extend(&mut self, other: DeliveryReport) {
        self.outcomes.extend(other.outcomes);
    }

    /// True when at least one message was sent and every one was delivered.
    pub fn all_delivered(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(DeliveryOutcome::is_delivered)
    }

    /// Outcomes that did not succeed.
    pub fn failures(&self) -> impl Iterator<Item = &DeliveryOutcome> {
        self.outcomes.iter().filter(|o| !o.is_delivered())
    }

    /// Number of successful deliveries.
    pub fn delivered_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_delivered()).count()
    }
}
