//! Read-only operations over the message store.
//!
//! Every operation works on a single [`MessageStore::snapshot`] call, so each
//! result is internally consistent even while the ingest path keeps writing.

use crate::store::{MessageRecord, MessageStore};
use std::sync::Arc;

/// Invalid query input, rejected before touching any component state.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("search term must not be empty")]
    EmptySearchTerm,
}

/// Pure read facade over the store. Holds no state of its own.
pub struct QueryService {
    store: Arc<MessageStore>,
}

impl QueryService {
    pub fn new(store: Arc<MessageStore>) -> Self {
        Self { store }
    }

    /// Full current snapshot, insertion order.
    pub fn list_all(&self) -> Vec<MessageRecord> {
        self.store.snapshot()
    }

    /// Records strictly after the one whose id equals `cursor`.
    ///
    /// An unknown cursor (never issued, or already evicted) degrades to the
    /// full snapshot: cursor loss is an expected operating condition and the
    /// caller's recovery is a full resync either way.
    pub fn list_since(&self, cursor: &str) -> Vec<MessageRecord> {
        let snapshot = self.store.snapshot();
        match snapshot.iter().position(|r| r.id == cursor) {
            Some(idx) => snapshot[idx + 1..].to_vec(),
            None => snapshot,
        }
    }

    /// Records whose resolved peer id contains `term` as a literal,
    /// case-sensitive substring, insertion order preserved.
    pub fn search_by_peer(&self, term: &str) -> Result<Vec<MessageRecord>, QueryError> {
        if term.is_empty() {
            return Err(QueryError::EmptySearchTerm);
        }

        Ok(self
            .store
            .snapshot()
            .into_iter()
            .filter(|r| r.peer_id.contains(term))
            .collect())
    }
}
