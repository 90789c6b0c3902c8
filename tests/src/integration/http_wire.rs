//! # HTTP Wire
//!
//! Nodes talking over real sockets through the axum endpoint and the
//! reqwest client.

use super::fixtures::{amount, TestCluster};
use cn_01_peer_transport::HttpPeerClient;
use cn_03_channel_lifecycle::{LocalKeySigner, ProposalStatus, StateSigner};
use node_runtime::server::{bind, spawn_server};
use node_runtime::{ChannelNode, NodeComponents, NodeRuntime};
use shared_types::PeerAddress;
use std::sync::Arc;
use tokio::sync::watch;

fn http_node(cluster: &TestCluster, advertised: &str) -> Arc<ChannelNode> {
    let signer = LocalKeySigner::random();
    Arc::new(ChannelNode::new(
        NodeComponents {
            advertised: PeerAddress::parse(advertised).unwrap(),
            client: Arc::new(HttpPeerClient::new(&cluster.config.transport).unwrap()),
            settlement: Arc::new(cluster.ledger.account(signer.address())),
            signer: Arc::new(signer),
            time_source: cluster.clock.clone(),
        },
        &cluster.config,
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_proposal_round_trip_over_http() {
    let cluster = TestCluster::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut nodes = Vec::new();
    let mut tasks = Vec::new();
    for _ in 0..2 {
        let listener = bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let node = http_node(&cluster, &url);
        tasks.push(spawn_server(
            listener,
            node.inbound_handler(),
            shutdown_rx.clone(),
        ));
        nodes.push(node);
    }
    let (alice, bob) = (&nodes[0], &nodes[1]);

    let conn = alice.connect_peer(bob.peer_address()).await.unwrap();
    assert_eq!(conn.node_address, Some(bob.node_address()));
    assert_eq!(bob.transport().peer_count(), 1);

    let proposed = alice
        .create_proposal(bob.node_address(), amount(10))
        .await
        .unwrap();
    assert!(proposed.delivery.all_delivered());

    bob.accept_proposal(&proposed.value.id).await.unwrap();
    assert_eq!(
        alice.get_proposal(&proposed.value.id).unwrap().status,
        ProposalStatus::Accepted
    );

    shutdown_tx.send(true).unwrap();
    for task in tasks {
        task.await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_runtime_connects_bootstrap_peers_and_says_goodbye() {
    let mut cluster = TestCluster::new();
    cluster.config.network.listen_addr = "127.0.0.1:0".into();

    // Advertised addresses only label the nodes here; nothing dials them.
    let alice = NodeRuntime::new(
        http_node(&cluster, "http://127.0.0.1:9"),
        cluster.config.clone(),
    );
    let alice_socket = alice.start().await.unwrap();

    let mut bob_config = cluster.config.clone();
    bob_config.network.bootstrap_peers = vec![format!("http://{alice_socket}")];
    let bob = NodeRuntime::new(http_node(&cluster, "http://127.0.0.1:19"), bob_config);
    bob.start().await.unwrap();

    assert_eq!(bob.node().transport().peer_count(), 1);
    assert_eq!(alice.node().transport().peer_count(), 1);

    bob.shutdown().await;
    assert_eq!(bob.node().transport().peer_count(), 0);
    assert_eq!(alice.node().transport().peer_count(), 0);

    alice.shutdown().await;
}
