//! # Channel Node
//!
//! Driver-facing facade. Every driver operation commits locally first, then
//! notifies the counterparty once and reports how that went in a
//! [`Notified`]. A failed notification never undoes the local change.
//!
//! Notification targets come from the resolver: the proposal's mapping, else
//! the last peer we heard from, else the first connected peer.

use crate::config::NodeConfig;
use cn_01_peer_transport::{
    InboundHandler, PeerClient, PeerConnection, PeerTransportApi, PeerTransportService,
    ProbeReport, TransportError,
};
use cn_02_proposal_resolver::{Direction, ProposalResolver};
use cn_03_channel_lifecycle::{
    Channel, ChannelConfig, ChannelError, ChannelLifecycleService, CloseOutcome, ErrorKind,
    FundOutcome, LifecycleStats, Proposal, SettlementContract, StateSigner, SyncOutcome,
    WithdrawReceipt,
};
use cn_04_message_dispatcher::{DispatchStats, MessageDispatcher};
use serde::Serialize;
use shared_types::{
    Address, Amount, ChannelAcceptedPayload, ChannelClosedPayload, ChannelClosingPayload,
    ChannelCreatedPayload, ChannelFundedPayload, ChannelId, ChannelProposalPayload, ChannelState,
    ChannelWithdrawnPayload, DeliveryOutcome, DeliveryReport, DeliveryResult, MessageId, Payload,
    PaymentPayload, PaymentRecord, PeerAddress, ProposalId, TimeSource,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failure of a driver operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl NodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Channel(e) => e.kind(),
            Self::Transport(_) => ErrorKind::Network,
        }
    }
}

/// Result of a driver operation plus the delivery outcome of its
/// notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notified<T> {
    pub value: T,
    pub delivery: DeliveryReport,
}

/// What leaving a peer cleaned up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerRemoval {
    /// Whether the peer was connected.
    pub removed: bool,
    /// Unmaterialised proposals dropped with it.
    pub purged_proposals: Vec<ProposalId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub probe: ProbeReport,
    pub purged_proposals: Vec<ProposalId>,
    pub evicted_messages: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    pub address: PeerAddress,
    pub node_address: Address,
    pub peers: usize,
    pub reachable_peers: usize,
    pub routes: usize,
    pub lifecycle: LifecycleStats,
    pub dispatch: DispatchStats,
}

/// External collaborators a node is built from.
pub struct NodeComponents {
    /// Address other nodes reach this one at.
    pub advertised: PeerAddress,
    pub client: Arc<dyn PeerClient>,
    pub settlement: Arc<dyn SettlementContract>,
    pub signer: Arc<dyn StateSigner>,
    pub time_source: Arc<dyn TimeSource>,
}

pub struct ChannelNode {
    lifecycle: Arc<ChannelLifecycleService>,
    resolver: Arc<ProposalResolver>,
    transport: Arc<PeerTransportService>,
    dispatcher: Arc<MessageDispatcher>,
    time_source: Arc<dyn TimeSource>,
    channel_config: ChannelConfig,
}

impl ChannelNode {
    pub fn new(components: NodeComponents, config: &NodeConfig) -> Self {
        let NodeComponents {
            advertised,
            client,
            settlement,
            signer,
            time_source,
        } = components;
        let node_address = signer.address();

        let lifecycle = Arc::new(ChannelLifecycleService::new(
            settlement,
            signer,
            Arc::clone(&time_source),
            config.channel.clone(),
        ));
        let resolver = Arc::new(ProposalResolver::new(Arc::clone(&time_source)));
        let transport = Arc::new(PeerTransportService::new(
            advertised,
            node_address,
            client,
            config.transport.clone(),
            Arc::clone(&time_source),
        ));
        let dispatcher = Arc::new(MessageDispatcher::new(
            lifecycle.clone(),
            Arc::clone(&resolver),
            Arc::clone(&transport),
            config.dispatch.clone(),
            Arc::clone(&time_source),
        ));

        info!(
            address = %transport.local_address(),
            node_address = %node_address,
            "[node] channel node assembled"
        );
        Self {
            lifecycle,
            resolver,
            transport,
            dispatcher,
            time_source,
            channel_config: config.channel.clone(),
        }
    }

    /// Handler to mount on the peer endpoint or an in-memory network.
    pub fn inbound_handler(&self) -> Arc<dyn InboundHandler> {
        self.dispatcher.clone()
    }

    pub fn dispatcher(&self) -> &Arc<MessageDispatcher> {
        &self.dispatcher
    }

    pub fn resolver(&self) -> &Arc<ProposalResolver> {
        &self.resolver
    }

    pub fn transport(&self) -> &Arc<PeerTransportService> {
        &self.transport
    }

    pub fn lifecycle(&self) -> &Arc<ChannelLifecycleService> {
        &self.lifecycle
    }

    /// This node's ledger account.
    pub fn node_address(&self) -> Address {
        self.lifecycle.local_address()
    }

    /// This node's network address.
    pub fn peer_address(&self) -> &PeerAddress {
        self.transport.local_address()
    }

    // =========================================================================
    // DRIVER OPERATIONS
    // =========================================================================

    /// Propose a channel to `acceptor` and send it the proposal.
    pub async fn create_proposal(
        &self,
        acceptor: Address,
        amount: Amount,
    ) -> Result<Notified<Proposal>, NodeError> {
        let proposal = self.lifecycle.create_proposal(acceptor, amount)?;

        let target = self.peer_for_account(&acceptor).or_else(|| {
            self.resolver
                .resolve_target(&proposal.id, self.transport.first_connected())
                .map(|r| r.peer)
        });
        if let Some(peer) = target {
            self.resolver.register(proposal.id, peer, Direction::Outgoing);
        }

        let payload = ChannelProposalPayload {
            proposal_id: proposal.id,
            proposer: proposal.proposer,
            acceptor: proposal.acceptor,
            amount: proposal.amount,
            created_at: proposal.created_at,
        };
        let delivery = self.notify(proposal.id, &payload).await;
        Ok(Notified {
            value: proposal,
            delivery,
        })
    }

    /// Accept a received proposal as this node.
    pub async fn accept_proposal(&self, id: &ProposalId) -> Result<Notified<Proposal>, NodeError> {
        let proposal = self.lifecycle.accept_proposal(id, self.node_address())?;
        let payload = ChannelAcceptedPayload {
            proposal_id: proposal.id,
            acceptor: proposal.acceptor,
            accepted_at: proposal
                .accepted_at
                .unwrap_or_else(|| self.time_source.now()),
        };
        let delivery = self.notify(proposal.id, &payload).await;
        Ok(Notified {
            value: proposal,
            delivery,
        })
    }

    /// Deploy the contract for an accepted proposal.
    pub async fn materialize_channel(&self, id: &ProposalId) -> Result<Notified<Channel>, NodeError> {
        let channel = self.lifecycle.materialize_channel(id).await?;
        let payload = ChannelCreatedPayload {
            proposal_id: channel.proposal_id,
            channel_id: channel.id,
            contract_address: channel.contract_address,
            part_a: channel.part_a,
            part_b: channel.part_b,
            amount: channel.amount,
            balance_a: channel.balance_a,
            balance_b: channel.balance_b,
        };
        let delivery = self.notify(channel.proposal_id, &payload).await;
        Ok(Notified {
            value: channel,
            delivery,
        })
    }

    /// Deposit this node's share.
    pub async fn fund(&self, id: &ChannelId) -> Result<Notified<FundOutcome>, NodeError> {
        let proposal_id = self.lifecycle.get_channel(id)?.proposal_id;
        let participant = self.node_address();
        let outcome = self.lifecycle.fund(id, participant).await?;
        let payload = ChannelFundedPayload {
            channel_id: *id,
            participant,
            state: outcome.state,
            both_funded: outcome.both_funded,
        };
        let delivery = self.notify(proposal_id, &payload).await;
        Ok(Notified {
            value: outcome,
            delivery,
        })
    }

    /// Pay `amount` to the counterparty off-chain.
    pub async fn pay(
        &self,
        id: &ChannelId,
        amount: Amount,
    ) -> Result<Notified<PaymentRecord>, NodeError> {
        let proposal_id = self.lifecycle.get_channel(id)?.proposal_id;
        let record = self.lifecycle.pay(id, amount)?;
        let payload = PaymentPayload {
            channel_id: *id,
            payment: record.clone(),
        };
        let delivery = self.notify(proposal_id, &payload).await;
        Ok(Notified {
            value: record,
            delivery,
        })
    }

    /// Submit the latest state to the ledger.
    pub async fn close(&self, id: &ChannelId) -> Result<Notified<CloseOutcome>, NodeError> {
        let proposal_id = self.lifecycle.get_channel(id)?.proposal_id;
        let outcome = self.lifecycle.close(id).await?;
        let payload = ChannelClosingPayload {
            channel_id: *id,
            nonce: outcome.nonce,
            balance_a: outcome.balance_a,
            balance_b: outcome.balance_b,
            closing_block: outcome.closing_block,
        };
        let delivery = self.notify(proposal_id, &payload).await;
        Ok(Notified {
            value: outcome,
            delivery,
        })
    }

    /// Release funds after the challenge window.
    pub async fn withdraw(&self, id: &ChannelId) -> Result<Notified<WithdrawReceipt>, NodeError> {
        let proposal_id = self.lifecycle.get_channel(id)?.proposal_id;
        let receipt = self.lifecycle.withdraw(id).await?;
        let payload = ChannelWithdrawnPayload {
            channel_id: *id,
            withdrawer: self.node_address(),
            transaction_hash: receipt.transaction_hash.clone(),
        };
        let delivery = self.notify(proposal_id, &payload).await;
        Ok(Notified {
            value: receipt,
            delivery,
        })
    }

    /// Re-read a channel from the ledger. Tells the counterparty if the
    /// ledger shows it CLOSED before we withdrew.
    pub async fn sync_channel(&self, id: &ChannelId) -> Result<Notified<SyncOutcome>, NodeError> {
        let outcome = self.lifecycle.sync_channel(id).await?;
        if !(outcome.changed() && outcome.current == ChannelState::Closed) {
            return Ok(Notified {
                value: outcome,
                delivery: DeliveryReport::empty(),
            });
        }

        let channel = self.lifecycle.get_channel(id)?;
        let payload = ChannelClosedPayload {
            channel_id: *id,
            balance_a: channel.balance_a,
            balance_b: channel.balance_b,
        };
        let delivery = self.notify(channel.proposal_id, &payload).await;
        Ok(Notified {
            value: outcome,
            delivery,
        })
    }

    // =========================================================================
    // PEERS
    // =========================================================================

    pub async fn connect_peer(&self, peer: &PeerAddress) -> Result<PeerConnection, NodeError> {
        Ok(self.transport.connect(peer).await?)
    }

    /// Say goodbye to `peer`, then drop its routes and the proposals that
    /// were only reachable through it.
    pub async fn disconnect_peer(&self, peer: &PeerAddress) -> PeerRemoval {
        let removed = self.transport.disconnect(peer).await;
        let purged_proposals = self.forget_peer(peer);
        PeerRemoval {
            removed,
            purged_proposals,
        }
    }

    pub fn peers(&self) -> Vec<PeerConnection> {
        self.transport.peers()
    }

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    /// Drop unmaterialised proposals older than `max_age_ms` with their routes.
    pub fn purge_stale_proposals(&self, max_age_ms: u64) -> Vec<ProposalId> {
        let purged = self.lifecycle.purge_stale_proposals(max_age_ms);
        for id in &purged {
            self.resolver.remove(id);
        }
        purged
    }

    /// One pass of liveness probing and garbage collection.
    pub async fn run_maintenance(&self) -> MaintenanceReport {
        let probe = self.transport.probe_all().await;
        let mut purged_proposals = Vec::new();
        for peer in &probe.expired {
            purged_proposals.extend(self.forget_peer(peer));
        }
        purged_proposals.extend(self.purge_stale_proposals(self.channel_config.stale_proposal_age_ms));
        let evicted_messages = self.dispatcher.evict_expired();

        debug!(
            alive = probe.alive.len(),
            unreachable = probe.unreachable.len(),
            expired = probe.expired.len(),
            purged = purged_proposals.len(),
            evicted_messages,
            "[node] maintenance pass"
        );
        MaintenanceReport {
            probe,
            purged_proposals,
            evicted_messages,
        }
    }

    // =========================================================================
    // INTROSPECTION
    // =========================================================================

    pub fn list_proposals(&self) -> Vec<Proposal> {
        self.lifecycle.list_proposals()
    }

    pub fn get_proposal(&self, id: &ProposalId) -> Result<Proposal, NodeError> {
        Ok(self.lifecycle.get_proposal(id)?)
    }

    pub fn list_channels(&self) -> Vec<Channel> {
        self.lifecycle.list_channels()
    }

    pub fn get_channel(&self, id: &ChannelId) -> Result<Channel, NodeError> {
        Ok(self.lifecycle.get_channel(id)?)
    }

    pub fn list_payments(&self, id: &ChannelId) -> Result<Vec<PaymentRecord>, NodeError> {
        Ok(self.lifecycle.list_payments(id)?)
    }

    pub fn node_status(&self) -> NodeStatus {
        NodeStatus {
            address: self.peer_address().clone(),
            node_address: self.node_address(),
            peers: self.transport.peer_count(),
            reachable_peers: self.transport.reachable_peers().len(),
            routes: self.resolver.mapping_count(),
            lifecycle: self.lifecycle.stats(),
            dispatch: self.dispatcher.stats(),
        }
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn peer_for_account(&self, account: &Address) -> Option<PeerAddress> {
        self.transport
            .peers()
            .into_iter()
            .find(|p| p.alive && p.node_address.as_ref() == Some(account))
            .map(|p| p.address)
    }

    fn forget_peer(&self, peer: &PeerAddress) -> Vec<ProposalId> {
        let orphaned = self.resolver.cleanup(peer);
        self.lifecycle.purge_proposals(&orphaned)
    }

    /// Send `payload` to whoever the resolver picks for `proposal`.
    async fn notify<P: Payload>(&self, proposal: ProposalId, payload: &P) -> DeliveryReport {
        let message = match self.transport.message(payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(kind = %P::TYPE, error = %e, "[node] could not encode notification");
                return DeliveryReport::single(DeliveryOutcome {
                    peer: None,
                    message_id: MessageId::generate(),
                    result: DeliveryResult::Failed(e.to_string()),
                });
            }
        };

        match self
            .resolver
            .resolve_target(&proposal, self.transport.first_connected())
        {
            Some(target) => {
                debug!(
                    proposal_id = %proposal,
                    peer = %target.peer,
                    source = ?target.source,
                    kind = %P::TYPE,
                    "[node] notifying"
                );
                DeliveryReport::single(self.transport.send(&target.peer, message).await)
            }
            None => {
                warn!(proposal_id = %proposal, kind = %P::TYPE, "[node] no peer to notify");
                DeliveryReport::single(DeliveryOutcome {
                    peer: None,
                    message_id: message.message_id,
                    result: DeliveryResult::NoRoute(format!("no peer for proposal {proposal}")),
                })
            }
        }
    }
}
