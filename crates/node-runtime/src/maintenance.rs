//! # Maintenance Loop
//!
//! Periodic liveness probing and garbage collection. Each tick runs one
//! [`ChannelNode::run_maintenance`] pass.

use crate::node::ChannelNode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

pub fn spawn_maintenance(
    node: Arc<ChannelNode>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = node.run_maintenance().await;
                    if !report.probe.expired.is_empty() || !report.purged_proposals.is_empty() {
                        info!(
                            expired_peers = report.probe.expired.len(),
                            purged_proposals = report.purged_proposals.len(),
                            "[node] maintenance removed stale state"
                        );
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("[node] maintenance loop stopped");
                        break;
                    }
                }
            }
        }
    })
}
