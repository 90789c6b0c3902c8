//! # Routing
//!
//! Which peer a notification goes to, and what is cleaned up when a peer
//! leaves or goes silent.

use super::fixtures::{amount, mem, open_channel, TestCluster};
use cn_02_proposal_resolver::Direction;
use shared_types::DeliveryResult;

#[tokio::test]
async fn test_reply_from_new_address_switches_route() {
    let cluster = TestCluster::new();
    let alice = cluster.node("alice");
    // Bob is dialled at one address but sends from another.
    let bob = cluster.node_with_aliases("bob-out", &["bob-in"]);
    alice.connect_peer(&mem("bob-in")).await.unwrap();

    let proposal = alice
        .create_proposal(bob.node_address(), amount(10))
        .await
        .unwrap()
        .value;
    let route = alice.resolver().resolve(&proposal.id).unwrap();
    assert_eq!((route.peer, route.direction), (mem("bob-in"), Direction::Outgoing));

    bob.accept_proposal(&proposal.id).await.unwrap();
    let route = alice.resolver().resolve(&proposal.id).unwrap();
    assert_eq!(route.peer, mem("bob-out"));
    assert_eq!(route.direction, Direction::Bidirectional);

    // Later notifications follow the updated route.
    let created = alice.materialize_channel(&proposal.id).await.unwrap();
    assert_eq!(created.delivery.outcomes[0].peer, Some(mem("bob-out")));
    assert!(bob.get_channel(&created.value.id).is_ok());
}

#[tokio::test]
async fn test_proposal_without_known_peer_falls_back_to_first_connection() {
    let cluster = TestCluster::new();
    let alice = cluster.node("alice");
    let carol = cluster.node("carol");
    alice.connect_peer(carol.peer_address()).await.unwrap();

    // Nobody announced this account, so the proposal goes to Carol, who is
    // not a party to it and ignores it.
    let stranger = cluster.node("dave").node_address();
    let proposed = alice.create_proposal(stranger, amount(5)).await.unwrap();
    assert_eq!(proposed.delivery.outcomes[0].peer, Some(mem("carol")));
    assert!(proposed.delivery.all_delivered());
    assert!(carol.list_proposals().is_empty());
}

#[tokio::test]
async fn test_no_peers_means_no_route() {
    let cluster = TestCluster::new();
    let alice = cluster.node("alice");
    let bob = cluster.node("bob");

    let proposed = alice
        .create_proposal(bob.node_address(), amount(5))
        .await
        .unwrap();
    assert!(matches!(
        proposed.delivery.outcomes[0].result,
        DeliveryResult::NoRoute(_)
    ));
    assert_eq!(alice.list_proposals().len(), 1);
}

#[tokio::test]
async fn test_disconnect_purges_pending_proposals_on_both_sides() {
    let cluster = TestCluster::new();
    let (alice, bob) = cluster.connected_pair().await;
    let channel_id = open_channel(&alice, &bob, 10).await;

    let pending = alice
        .create_proposal(bob.node_address(), amount(4))
        .await
        .unwrap()
        .value;
    assert_eq!(bob.list_proposals().len(), 2);

    let removal = alice.disconnect_peer(bob.peer_address()).await;
    assert!(removal.removed);
    assert_eq!(removal.purged_proposals, vec![pending.id]);

    for node in [&alice, &bob] {
        let proposals = node.list_proposals();
        assert_eq!(proposals.len(), 1, "materialised proposal survives");
        assert!(node.get_channel(&channel_id).is_ok());
        assert_eq!(node.resolver().mapping_count(), 0);
    }
    assert_eq!(alice.transport().peer_count(), 0);
    assert_eq!(bob.transport().peer_count(), 0);
}

#[tokio::test]
async fn test_silent_peer_expires_during_maintenance() {
    let cluster = TestCluster::new();
    let (alice, bob) = cluster.connected_pair().await;
    let pending = alice
        .create_proposal(bob.node_address(), amount(4))
        .await
        .unwrap()
        .value;

    cluster.network.set_unreachable(bob.peer_address(), true);
    let report = alice.run_maintenance().await;
    assert_eq!(report.probe.unreachable, vec![bob.peer_address().clone()]);
    assert!(report.probe.expired.is_empty());
    assert_eq!(alice.transport().peer_count(), 1);

    cluster
        .clock
        .advance(alice.transport().config().liveness_timeout_ms + 1);
    let report = alice.run_maintenance().await;
    assert_eq!(report.probe.expired, vec![bob.peer_address().clone()]);
    assert_eq!(report.purged_proposals, vec![pending.id]);
    assert_eq!(alice.transport().peer_count(), 0);
    assert!(alice.list_proposals().is_empty());
}
