//! # Channel Lifecycle Service
//!
//! Owns every proposal and channel this node knows, one mutex per entity.
//!
//! - `driver`: operations requested by the local driver
//! - `reconcile`: [`ChannelReconciler`](crate::ports::ChannelReconciler),
//!   applying peer notifications

mod driver;
mod reconcile;

#[cfg(test)]
pub(crate) mod test_support;

use crate::domain::{Channel, ChannelConfig, ChannelError, Proposal};
use crate::ports::{LedgerChannelState, SettlementContract, StateSigner};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use shared_types::amount::decimal;
use shared_types::{Address, Amount, ChannelId, ChannelState, PaymentRecord, ProposalId, TimeSource};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

type Shared<T> = Arc<Mutex<T>>;

/// Result of funding one side of a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundOutcome {
    /// Ledger-reported state after the deposit.
    pub state: ChannelState,
    /// Whether both local funding flags are set.
    pub both_funded: bool,
    pub transaction_hash: String,
}

/// Result of submitting a close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseOutcome {
    pub closing_block: u64,
    pub nonce: u64,
    #[serde(with = "decimal")]
    pub balance_a: Amount,
    #[serde(with = "decimal")]
    pub balance_b: Amount,
}

/// Result of re-reading a channel from the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub previous: ChannelState,
    pub current: ChannelState,
    pub ledger: LedgerChannelState,
}

impl SyncOutcome {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

/// Entity counts for status reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleStats {
    pub proposals: usize,
    pub pending_proposals: usize,
    pub channels: usize,
    pub active_channels: usize,
}

/// Entity with a ledger call in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum EntityKey {
    Proposal(ProposalId),
    Channel(ChannelId),
}

/// Marks an entity busy for the duration of a ledger call.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<EntityKey>>,
    key: EntityKey,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.key);
    }
}

pub struct ChannelLifecycleService {
    settlement: Arc<dyn SettlementContract>,
    signer: Arc<dyn StateSigner>,
    time_source: Arc<dyn TimeSource>,
    config: ChannelConfig,
    proposals: RwLock<HashMap<ProposalId, Shared<Proposal>>>,
    channels: RwLock<HashMap<ChannelId, Shared<Channel>>>,
    in_flight: Mutex<HashSet<EntityKey>>,
}

impl ChannelLifecycleService {
    pub fn new(
        settlement: Arc<dyn SettlementContract>,
        signer: Arc<dyn StateSigner>,
        time_source: Arc<dyn TimeSource>,
        config: ChannelConfig,
    ) -> Self {
        Self {
            settlement,
            signer,
            time_source,
            config,
            proposals: RwLock::new(HashMap::new()),
            channels: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// This node's ledger address.
    pub fn local_address(&self) -> Address {
        self.signer.address()
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    pub fn get_proposal(&self, id: &ProposalId) -> Result<Proposal, ChannelError> {
        Ok(self.proposal_entry(id)?.lock().clone())
    }

    /// All proposals, oldest first.
    pub fn list_proposals(&self) -> Vec<Proposal> {
        let entries: Vec<_> = self.proposals.read().values().cloned().collect();
        let mut proposals: Vec<Proposal> = entries.iter().map(|e| e.lock().clone()).collect();
        proposals.sort_by_key(|p| p.created_at);
        proposals
    }

    pub fn get_channel(&self, id: &ChannelId) -> Result<Channel, ChannelError> {
        Ok(self.channel_entry(id)?.lock().clone())
    }

    /// All channels, least recently updated first.
    pub fn list_channels(&self) -> Vec<Channel> {
        let entries: Vec<_> = self.channels.read().values().cloned().collect();
        let mut channels: Vec<Channel> = entries.iter().map(|e| e.lock().clone()).collect();
        channels.sort_by_key(|c| c.updated_at);
        channels
    }

    /// Applied payments of a channel in nonce order.
    pub fn list_payments(&self, id: &ChannelId) -> Result<Vec<PaymentRecord>, ChannelError> {
        Ok(self.channel_entry(id)?.lock().payments.clone())
    }

    pub fn channel_for_proposal(&self, id: &ProposalId) -> Option<ChannelId> {
        self.proposal_entry(id).ok()?.lock().channel_id
    }

    pub fn stats(&self) -> LifecycleStats {
        let proposals = self.list_proposals();
        let channels = self.list_channels();
        LifecycleStats {
            proposals: proposals.len(),
            pending_proposals: proposals.iter().filter(|p| p.status.is_pending()).count(),
            channels: channels.len(),
            active_channels: channels
                .iter()
                .filter(|c| c.state == ChannelState::Active)
                .count(),
        }
    }

    // =========================================================================
    // STORAGE HELPERS
    // =========================================================================

    fn proposal_entry(&self, id: &ProposalId) -> Result<Shared<Proposal>, ChannelError> {
        self.proposals
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ChannelError::proposal_not_found(id))
    }

    fn channel_entry(&self, id: &ChannelId) -> Result<Shared<Channel>, ChannelError> {
        self.channels
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ChannelError::channel_not_found(id))
    }

    fn begin(&self, key: EntityKey) -> Result<InFlight<'_>, ChannelError> {
        if !self.in_flight.lock().insert(key) {
            return Err(ChannelError::InvalidState {
                operation: "ledger call",
                expected: "no operation in progress".into(),
                actual: "operation in progress".into(),
            });
        }
        Ok(InFlight {
            set: &self.in_flight,
            key,
        })
    }

    /// Whether a ledger call on `key` is in progress.
    fn is_busy(&self, key: &EntityKey) -> bool {
        self.in_flight.lock().contains(key)
    }
}
