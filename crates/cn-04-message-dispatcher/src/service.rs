//! # Dispatcher Service
//!
//! Dedup, bookkeeping and routing for inbound envelopes. The window lock is
//! held only for the check-and-record step, never across a handler.

use crate::domain::{
    DispatchConfig, DispatchError, DispatchOutcome, DispatchStats, InboundMessageRecord,
    SeenMessageWindow,
};
use async_trait::async_trait;
use cn_01_peer_transport::{HealthInfo, InboundHandler, PeerTransportApi, PeerTransportService};
use cn_02_proposal_resolver::ProposalResolver;
use cn_03_channel_lifecycle::ChannelReconciler;
use parking_lot::Mutex;
use shared_types::{TimeSource, WireMessage};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    duplicates: AtomicU64,
    malformed: AtomicU64,
}

pub struct MessageDispatcher {
    pub(crate) reconciler: Arc<dyn ChannelReconciler>,
    pub(crate) resolver: Arc<ProposalResolver>,
    pub(crate) transport: Arc<PeerTransportService>,
    window: Mutex<SeenMessageWindow>,
    counters: Counters,
    config: DispatchConfig,
    time_source: Arc<dyn TimeSource>,
}

impl MessageDispatcher {
    pub fn new(
        reconciler: Arc<dyn ChannelReconciler>,
        resolver: Arc<ProposalResolver>,
        transport: Arc<PeerTransportService>,
        config: DispatchConfig,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            reconciler,
            resolver,
            transport,
            window: Mutex::new(SeenMessageWindow::new(config.window_capacity)),
            counters: Counters::default(),
            config,
            time_source,
        }
    }

    /// Process one inbound envelope.
    pub async fn dispatch(&self, message: WireMessage) -> Result<DispatchOutcome, DispatchError> {
        self.counters.received.fetch_add(1, Ordering::Relaxed);

        let fresh = self.window.lock().record(InboundMessageRecord {
            message_id: message.message_id,
            received_at: self.time_source.now(),
            sender: message.from.clone(),
            kind: message.kind,
        });
        if !fresh {
            self.counters.duplicates.fetch_add(1, Ordering::Relaxed);
            debug!(message_id = %message.message_id, kind = %message.kind, from = %message.from, "[cn-04] duplicate dropped");
            return Ok(DispatchOutcome::Duplicate);
        }

        self.resolver.note_inbound(&message.from);
        self.transport.note_seen(&message.from);
        debug!(message_id = %message.message_id, kind = %message.kind, from = %message.from, "[cn-04] dispatching");

        let outcome = self.route(&message).await;
        if let Err(e) = &outcome {
            self.counters.malformed.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "[cn-04] message rejected");
        }
        outcome
    }

    /// Drop window records past the configured max age.
    pub fn evict_expired(&self) -> usize {
        let now = self.time_source.now();
        let evicted = self
            .window
            .lock()
            .evict_older_than(now, self.config.max_age_ms);
        if evicted > 0 {
            debug!(evicted, "[cn-04] dedup window trimmed");
        }
        evicted
    }

    pub fn stats(&self) -> DispatchStats {
        let window = self.window.lock();
        DispatchStats {
            received: self.counters.received.load(Ordering::Relaxed),
            duplicates: self.counters.duplicates.load(Ordering::Relaxed),
            malformed: self.counters.malformed.load(Ordering::Relaxed),
            window_len: window.len(),
            window_capacity: window.capacity(),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }
}

#[async_trait]
impl InboundHandler for MessageDispatcher {
    async fn on_message(&self, message: WireMessage) {
        // Errors are already logged; the sender only gets a receipt.
        let _ = self.dispatch(message).await;
    }

    fn health(&self) -> HealthInfo {
        self.transport.local_health()
    }
}
