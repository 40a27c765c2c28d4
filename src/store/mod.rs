//! Bounded in-memory message store.
//!
//! Every inbound provider event lands here as an immutable [`MessageRecord`]
//! with a process-unique, strictly increasing id. The store holds at most
//! `capacity` records; overflow evicts from the head (oldest first) and never
//! reorders survivors. One mutex guards the record ring and the id counter,
//! so appends and evictions are atomic with respect to snapshots: a reader
//! never observes a half-applied insert or a torn eviction.
//!
//! Ids come from a monotonic counter, not the wall clock — two events landing
//! in the same millisecond still get distinct, ordered ids. An id is never
//! reused, including after eviction.

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;

/// Record capacity used when `[store] capacity` is not configured.
pub const DEFAULT_CAPACITY: usize = 1000;

/// One buffered inbound message. Immutable after ingestion; removed only by
/// capacity eviction.
#[derive(Debug, Clone, Serialize)]
pub struct MessageRecord {
    /// Opaque id, strictly increasing in insertion order.
    pub id: String,
    /// Milliseconds since the Unix epoch, stamped at ingestion.
    pub timestamp: i64,
    /// Resolved remote-party identifier.
    pub peer_id: String,
    /// Raw provider payload, preserved verbatim.
    pub payload: Value,
}

struct StoreInner {
    records: VecDeque<MessageRecord>,
    next_seq: u64,
}

/// Bounded, ordered, append-only store of inbound message records.
pub struct MessageStore {
    capacity: usize,
    inner: Mutex<StoreInner>,
}

impl MessageStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(StoreInner {
                records: VecDeque::new(),
                next_seq: 0,
            }),
        }
    }

    /// Ingest a raw provider event: resolve its peer id, stamp id and
    /// timestamp, append at the tail, and evict from the head while over
    /// capacity. Returns the stored record.
    pub fn append(&self, raw: Value) -> MessageRecord {
        let peer_id = resolve_peer_id(&raw).unwrap_or_else(|| "unknown".to_string());

        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;

        let record = MessageRecord {
            // Zero-padded so lexicographic order matches insertion order.
            id: format!("{seq:020}"),
            timestamp: Utc::now().timestamp_millis(),
            peer_id,
            payload: raw,
        };

        inner.records.push_back(record.clone());
        while inner.records.len() > self.capacity {
            inner.records.pop_front();
        }

        record
    }

    /// Point-in-time copy of the buffered records, insertion order.
    pub fn snapshot(&self) -> Vec<MessageRecord> {
        self.inner.lock().records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Resolve the remote-party identifier from a raw provider payload.
///
/// Providers place the sender under different keys depending on message type
/// (direct chat, group message, bridge-wrapped). Checked in order; first
/// match wins:
///
/// 1. top-level `from`
/// 2. top-level `author`
/// 3. nested `sender.id`
/// 4. nested `key.remoteJid`
fn resolve_peer_id(raw: &Value) -> Option<String> {
    let candidates = [
        raw.get("from"),
        raw.get("author"),
        raw.get("sender").and_then(|s| s.get("id")),
        raw.get("key").and_then(|k| k.get("remoteJid")),
    ];

    candidates
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str())
        .map(|s| s.to_string())
}
