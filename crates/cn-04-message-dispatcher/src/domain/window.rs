//! # Seen-Message Window
//!
//! Bounded record of recently received message ids. It only suppresses
//! duplicates and holds no authoritative state, so losing an entry costs at
//! most one redundant (idempotent) handler run.

use shared_types::{MessageId, MessageType, PeerAddress, Timestamp};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessageRecord {
    pub message_id: MessageId,
    /// When this node received it.
    pub received_at: Timestamp,
    pub sender: PeerAddress,
    pub kind: MessageType,
}

/// Message ids in arrival order; the oldest is evicted first.
#[derive(Debug)]
pub struct SeenMessageWindow {
    records: HashMap<MessageId, InboundMessageRecord>,
    order: VecDeque<MessageId>,
    capacity: usize,
}

impl SeenMessageWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.records.contains_key(id)
    }

    pub fn get(&self, id: &MessageId) -> Option<&InboundMessageRecord> {
        self.records.get(id)
    }

    /// Record a message. Returns `false` if its id is already present.
    pub fn record(&mut self, record: InboundMessageRecord) -> bool {
        if self.records.contains_key(&record.message_id) {
            return false;
        }
        while self.records.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.records.remove(&oldest);
                }
                None => break,
            }
        }
        if self.capacity == 0 {
            return true;
        }
        self.order.push_back(record.message_id);
        self.records.insert(record.message_id, record);
        true
    }

    /// Drop records received more than `max_age_ms` before `now`.
    pub fn evict_older_than(&mut self, now: Timestamp, max_age_ms: u64) -> usize {
        let mut evicted = 0;
        while let Some(oldest) = self.order.front() {
            let expired = self
                .records
                .get(oldest)
                .map_or(true, |r| now.saturating_since(r.received_at) > max_age_ms);
            if !expired {
                break;
            }
            if let Some(id) = self.order.pop_front() {
                self.records.remove(&id);
                evicted += 1;
            }
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
