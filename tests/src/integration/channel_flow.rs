//! # Channel Flow
//!
//! A full channel life on two nodes: proposal, acceptance, deployment,
//! funding, off-chain payments, close and the challenge window.

use super::fixtures::{amount, open_channel, TestCluster};
use cn_03_channel_lifecycle::{ErrorKind, ProposalStatus};
use shared_types::{ChannelState, PaymentOrigin};

#[tokio::test]
async fn test_channel_from_proposal_to_withdrawal() {
    let cluster = TestCluster::new();
    let (alice, bob) = cluster.connected_pair().await;

    // Propose 10; Bob learns about it.
    let proposed = alice
        .create_proposal(bob.node_address(), amount(10))
        .await
        .unwrap();
    assert!(proposed.delivery.all_delivered());
    let proposal_id = proposed.value.id;
    assert_eq!(
        bob.get_proposal(&proposal_id).unwrap().status,
        ProposalStatus::Proposed
    );

    // Bob accepts; Alice sees it.
    bob.accept_proposal(&proposal_id).await.unwrap();
    assert_eq!(
        alice.get_proposal(&proposal_id).unwrap().status,
        ProposalStatus::Accepted
    );

    // Deployment splits the amount evenly.
    let channel = alice.materialize_channel(&proposal_id).await.unwrap().value;
    let mirrored = bob.get_channel(&channel.id).unwrap();
    assert_eq!(mirrored.state, ChannelState::Empty);
    assert_eq!((mirrored.balance_a, mirrored.balance_b), (amount(5), amount(5)));
    assert_eq!(mirrored.contract_address, channel.contract_address);
    assert_eq!(
        bob.get_proposal(&proposal_id).unwrap().status,
        ProposalStatus::Created
    );

    // One deposit is not enough.
    let first = alice.fund(&channel.id).await.unwrap().value;
    assert_eq!(first.state, ChannelState::Empty);
    assert!(bob.get_channel(&channel.id).unwrap().funded_a);

    let second = bob.fund(&channel.id).await.unwrap().value;
    assert_eq!(second.state, ChannelState::Active);
    assert!(second.both_funded);
    assert_eq!(
        alice.get_channel(&channel.id).unwrap().state,
        ChannelState::Active
    );

    // Alice pays 2.
    let payment = alice.pay(&channel.id, amount(2)).await.unwrap();
    assert!(payment.delivery.all_delivered());
    for node in [&alice, &bob] {
        let view = node.get_channel(&channel.id).unwrap();
        assert_eq!((view.balance_a, view.balance_b), (amount(3), amount(7)));
        assert_eq!(view.nonce, 1);
    }
    let received = bob.list_payments(&channel.id).unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].origin, PaymentOrigin::Remote);

    // Close at block 100; the window is 24 blocks.
    cluster.ledger.set_height(100);
    let closing = alice.close(&channel.id).await.unwrap().value;
    assert_eq!(closing.closing_block, 100);
    let bob_view = bob.get_channel(&channel.id).unwrap();
    assert_eq!(bob_view.state, ChannelState::Closing);
    assert_eq!(bob_view.closing_block, Some(100));

    cluster.ledger.set_height(110);
    let err = alice.withdraw(&channel.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ChallengePeriodActive);
    assert_eq!(
        alice.get_channel(&channel.id).unwrap().state,
        ChannelState::Closing
    );

    cluster.ledger.set_height(125);
    let withdrawn = alice.withdraw(&channel.id).await.unwrap();
    assert!(withdrawn.delivery.all_delivered());
    for node in [&alice, &bob] {
        let view = node.get_channel(&channel.id).unwrap();
        assert_eq!(view.state, ChannelState::Closed);
        assert_eq!((view.balance_a, view.balance_b), (amount(3), amount(7)));
    }
}

#[tokio::test]
async fn test_payments_in_both_directions_keep_nodes_in_step() {
    let cluster = TestCluster::new();
    let (alice, bob) = cluster.connected_pair().await;
    let channel_id = open_channel(&alice, &bob, 20).await;

    alice.pay(&channel_id, amount(4)).await.unwrap();
    bob.pay(&channel_id, amount(1)).await.unwrap();
    alice.pay(&channel_id, amount(2)).await.unwrap();
    bob.pay(&channel_id, amount(10)).await.unwrap();

    let a = alice.get_channel(&channel_id).unwrap();
    let b = bob.get_channel(&channel_id).unwrap();
    assert_eq!(a.nonce, 4);
    assert_eq!(b.nonce, 4);
    assert_eq!((a.balance_a, a.balance_b), (amount(15), amount(5)));
    assert_eq!((a.balance_a, a.balance_b), (b.balance_a, b.balance_b));
    assert_eq!(a.balance_a + a.balance_b, a.amount);

    // Bob cannot send more than he holds.
    let err = bob.pay(&channel_id, amount(6)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
    assert_eq!(bob.get_channel(&channel_id).unwrap().nonce, 4);
}

#[tokio::test]
async fn test_counterparty_closes_with_received_state() {
    let cluster = TestCluster::new();
    let (alice, bob) = cluster.connected_pair().await;
    let channel_id = open_channel(&alice, &bob, 10).await;
    alice.pay(&channel_id, amount(3)).await.unwrap();

    // Bob's latest state carries Alice's signature.
    cluster.ledger.set_height(40);
    let closing = bob.close(&channel_id).await.unwrap().value;
    assert_eq!(closing.nonce, 1);
    assert_eq!((closing.balance_a, closing.balance_b), (amount(2), amount(8)));
    assert_eq!(
        alice.get_channel(&channel_id).unwrap().state,
        ChannelState::Closing
    );

    cluster.ledger.set_height(65);
    bob.withdraw(&channel_id).await.unwrap();
    assert_eq!(
        alice.get_channel(&channel_id).unwrap().state,
        ChannelState::Closed
    );
    // Already closed through Bob's notification; nothing to announce.
    let synced = alice.sync_channel(&channel_id).await.unwrap();
    assert!(!synced.value.changed());
    assert!(synced.delivery.outcomes.is_empty());
}

#[tokio::test]
async fn test_operations_out_of_order_are_refused() {
    let cluster = TestCluster::new();
    let (alice, bob) = cluster.connected_pair().await;

    let proposal = alice
        .create_proposal(bob.node_address(), amount(10))
        .await
        .unwrap()
        .value;

    // Not accepted yet.
    let err = alice.materialize_channel(&proposal.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);

    // Only the named acceptor may accept.
    let err = alice.accept_proposal(&proposal.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    bob.accept_proposal(&proposal.id).await.unwrap();
    let channel = alice.materialize_channel(&proposal.id).await.unwrap().value;

    // EMPTY channels cannot pay or close.
    assert_eq!(
        alice.pay(&channel.id, amount(1)).await.unwrap_err().kind(),
        ErrorKind::State
    );
    assert_eq!(
        alice.close(&channel.id).await.unwrap_err().kind(),
        ErrorKind::State
    );

    alice.fund(&channel.id).await.unwrap();
    assert_eq!(
        alice.fund(&channel.id).await.unwrap_err().kind(),
        ErrorKind::State
    );
}
