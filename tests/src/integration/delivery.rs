//! # Delivery
//!
//! Notifications are best effort. Local state is committed before sending,
//! duplicates are absorbed, and a node that missed messages catches up
//! from the next payment or from the ledger.

use super::fixtures::{amount, open_channel, TestCluster};
use cn_04_message_dispatcher::DispatchOutcome;
use shared_types::{ChannelState, DeliveryResult};

#[tokio::test]
async fn test_duplicated_payment_is_applied_once() {
    let cluster = TestCluster::new();
    let (alice, bob) = cluster.connected_pair().await;
    let channel_id = open_channel(&alice, &bob, 10).await;

    cluster.network.duplicate_next(bob.peer_address(), 1);
    alice.pay(&channel_id, amount(2)).await.unwrap();

    let view = bob.get_channel(&channel_id).unwrap();
    assert_eq!(view.nonce, 1);
    assert_eq!(view.payments.len(), 1);
    assert_eq!((view.balance_a, view.balance_b), (amount(3), amount(7)));
    assert_eq!(bob.dispatcher().stats().duplicates, 1);
}

#[tokio::test]
async fn test_replayed_envelope_is_dropped_by_the_window() {
    let cluster = TestCluster::new();
    let (alice, bob) = cluster.connected_pair().await;
    let channel_id = open_channel(&alice, &bob, 10).await;

    let payment = alice.pay(&channel_id, amount(1)).await.unwrap();
    let message_id = payment.delivery.outcomes[0].message_id;

    // Re-submit the very same envelope straight to Bob's dispatcher.
    let mut replay = alice
        .transport()
        .message(&shared_types::PaymentPayload {
            channel_id,
            payment: payment.value.clone(),
        })
        .unwrap();
    replay.message_id = message_id;
    assert_eq!(
        bob.dispatcher().dispatch(replay).await.unwrap(),
        DispatchOutcome::Duplicate
    );
    assert_eq!(bob.get_channel(&channel_id).unwrap().nonce, 1);
}

#[tokio::test]
async fn test_unreachable_peer_does_not_undo_local_payment() {
    let cluster = TestCluster::new();
    let (alice, bob) = cluster.connected_pair().await;
    let channel_id = open_channel(&alice, &bob, 10).await;

    cluster.network.set_unreachable(bob.peer_address(), true);
    let lost = alice.pay(&channel_id, amount(2)).await.unwrap();
    assert!(!lost.delivery.all_delivered());
    assert!(matches!(
        lost.delivery.outcomes[0].result,
        DeliveryResult::Failed(_)
    ));
    assert_eq!(alice.get_channel(&channel_id).unwrap().nonce, 1);
    assert_eq!(bob.get_channel(&channel_id).unwrap().nonce, 0);

    // The peer is marked unreachable but kept.
    let peer = alice.transport().peer(bob.peer_address()).unwrap();
    assert!(!peer.alive);

    // The next payment carries the full state, so Bob jumps straight to it.
    cluster.network.set_unreachable(bob.peer_address(), false);
    let delivered = alice.pay(&channel_id, amount(1)).await.unwrap();
    assert!(delivered.delivery.all_delivered());

    let view = bob.get_channel(&channel_id).unwrap();
    assert_eq!(view.nonce, 2);
    assert_eq!((view.balance_a, view.balance_b), (amount(2), amount(8)));
    assert!(alice.transport().peer(bob.peer_address()).unwrap().alive);
}

#[tokio::test]
async fn test_missed_withdrawal_is_recovered_from_ledger() {
    let cluster = TestCluster::new();
    let (alice, bob) = cluster.connected_pair().await;
    let channel_id = open_channel(&alice, &bob, 10).await;

    cluster.ledger.set_height(10);
    alice.close(&channel_id).await.unwrap();
    cluster.ledger.set_height(35);

    cluster.network.drop_next(bob.peer_address(), 1);
    let withdrawn = alice.withdraw(&channel_id).await.unwrap();
    assert!(!withdrawn.delivery.all_delivered());
    assert_eq!(
        bob.get_channel(&channel_id).unwrap().state,
        ChannelState::Closing
    );

    // Bob finds out from the ledger and tells Alice.
    let synced = bob.sync_channel(&channel_id).await.unwrap();
    assert_eq!(synced.value.previous, ChannelState::Closing);
    assert_eq!(synced.value.current, ChannelState::Closed);
    assert!(synced.delivery.all_delivered());
    assert_eq!(
        bob.get_channel(&channel_id).unwrap().state,
        ChannelState::Closed
    );
}

#[tokio::test]
async fn test_withdrawal_notice_cannot_skip_missed_closing() {
    let cluster = TestCluster::new();
    let (alice, bob) = cluster.connected_pair().await;
    let channel_id = open_channel(&alice, &bob, 10).await;

    cluster.ledger.set_height(10);
    cluster.network.drop_next(bob.peer_address(), 1);
    let closing = alice.close(&channel_id).await.unwrap();
    assert!(!closing.delivery.all_delivered());

    // Bob is still ACTIVE, so the notice alone may not close his channel.
    cluster.ledger.set_height(35);
    alice.withdraw(&channel_id).await.unwrap();
    assert_eq!(
        bob.get_channel(&channel_id).unwrap().state,
        ChannelState::Active
    );

    let synced = bob.sync_channel(&channel_id).await.unwrap();
    assert_eq!(synced.value.previous, ChannelState::Active);
    assert_eq!(synced.value.current, ChannelState::Closed);
    assert_eq!(
        bob.get_channel(&channel_id).unwrap().state,
        ChannelState::Closed
    );
}
