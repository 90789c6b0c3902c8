//! # Test Cluster
//!
//! Nodes attached to one [`InMemoryPeerNetwork`], settling on one
//! [`SimulatedLedger`] and reading one manual clock.

use cn_01_peer_transport::{InMemoryPeerNetwork, TransportConfig};
use cn_03_channel_lifecycle::{LocalKeySigner, SimulatedLedger, StateSigner};
use node_runtime::{ChannelNode, NodeComponents, NodeConfig};
use shared_types::{Amount, ChannelId, ChannelState, ManualTimeSource, PeerAddress};
use std::sync::Arc;

pub fn amount(n: u64) -> Amount {
    Amount::from(n)
}

pub fn mem(name: &str) -> PeerAddress {
    PeerAddress::parse(&format!("mem://{name}")).expect("valid test address")
}

pub struct TestCluster {
    pub ledger: Arc<SimulatedLedger>,
    pub network: Arc<InMemoryPeerNetwork>,
    pub clock: Arc<ManualTimeSource>,
    pub config: NodeConfig,
}

impl Default for TestCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl TestCluster {
    pub fn new() -> Self {
        let config = NodeConfig {
            transport: TransportConfig::for_testing(),
            ..NodeConfig::default()
        };
        Self {
            ledger: Arc::new(SimulatedLedger::new(config.channel.challenge_period)),
            network: Arc::new(InMemoryPeerNetwork::new()),
            clock: Arc::new(ManualTimeSource::new(1_000)),
            config,
        }
    }

    /// A node reachable at `mem://{name}`.
    pub fn node(&self, name: &str) -> Arc<ChannelNode> {
        self.node_with_aliases(name, &[])
    }

    /// A node that advertises `mem://{name}` but is also reachable at the
    /// given alias addresses.
    pub fn node_with_aliases(&self, name: &str, aliases: &[&str]) -> Arc<ChannelNode> {
        let signer = LocalKeySigner::random();
        let node = Arc::new(ChannelNode::new(
            NodeComponents {
                advertised: mem(name),
                client: self.network.clone(),
                settlement: Arc::new(self.ledger.account(signer.address())),
                signer: Arc::new(signer),
                time_source: self.clock.clone(),
            },
            &self.config,
        ));
        for address in std::iter::once(name).chain(aliases.iter().copied()) {
            self.network.attach(mem(address), node.inbound_handler());
        }
        node
    }

    /// Alice and Bob, with Alice connected to Bob.
    pub async fn connected_pair(&self) -> (Arc<ChannelNode>, Arc<ChannelNode>) {
        let alice = self.node("alice");
        let bob = self.node("bob");
        alice
            .connect_peer(bob.peer_address())
            .await
            .expect("bob is attached");
        (alice, bob)
    }
}

/// Walk a channel from proposal to ACTIVE on both nodes, asserting every
/// notification was delivered.
pub async fn open_channel(alice: &ChannelNode, bob: &ChannelNode, value: u64) -> ChannelId {
    let proposed = alice
        .create_proposal(bob.node_address(), amount(value))
        .await
        .expect("proposal");
    assert!(proposed.delivery.all_delivered());
    let proposal_id = proposed.value.id;

    assert!(bob.accept_proposal(&proposal_id).await.expect("accept").delivery.all_delivered());
    let created = alice
        .materialize_channel(&proposal_id)
        .await
        .expect("materialize");
    assert!(created.delivery.all_delivered());
    let channel_id = created.value.id;

    assert!(alice.fund(&channel_id).await.expect("alice funds").delivery.all_delivered());
    let funded = bob.fund(&channel_id).await.expect("bob funds");
    assert!(funded.delivery.all_delivered());
    assert_eq!(funded.value.state, ChannelState::Active);

    for node in [alice, bob] {
        assert_eq!(
            node.get_channel(&channel_id).expect("known channel").state,
            ChannelState::Active
        );
    }
    channel_id
}
