//! End-to-end exercise of the core pipeline: provider events through the
//! single-writer router into the store, then queried and dispatched the way
//! the HTTP boundary does it.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use waygate::provider::{spawn_event_router, EVENT_QUEUE_DEPTH};
use waygate::{
    ConnectionMonitor, DispatchError, Dispatcher, MessageStore, Provider, ProviderEvent,
    QueryService,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test double
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingProvider {
    transmits: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Provider for RecordingProvider {
    fn name(&self) -> &str {
        "recording"
    }

    async fn run(&self, _events: mpsc::Sender<ProviderEvent>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn transmit(&self, peer_id: &str, text: &str) -> anyhow::Result<()> {
        self.transmits
            .lock()
            .push((peer_id.to_string(), text.to_string()));
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Buffer + query contract
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn capacity_three_scenario_matches_the_polling_contract() {
    let store = Arc::new(MessageStore::new(3));
    let record_a = store.append(json!({"from": "alpha-100", "body": "A"}));
    let record_b = store.append(json!({"from": "beta-200", "body": "B"}));
    let record_c = store.append(json!({"from": "gamma-300", "body": "C"}));
    let record_d = store.append(json!({"from": "delta-400", "body": "D"}));

    let query = QueryService::new(Arc::clone(&store));

    // A was evicted; survivors keep insertion order.
    let all = query.list_all();
    assert_eq!(
        all.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
        vec![&record_b.id, &record_c.id, &record_d.id],
        "snapshot after overflow must be the last three records in order"
    );

    // Incremental poll from B yields exactly C and D.
    let since_b = query.list_since(&record_b.id);
    assert_eq!(
        since_b.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
        vec![&record_c.id, &record_d.id]
    );

    // A's id was evicted with its record: stale cursor degrades to a full resync.
    let since_evicted = query.list_since(&record_a.id);
    assert_eq!(
        since_evicted.len(),
        3,
        "evicted cursor must return the full snapshot"
    );

    // Substring search hits only D's peer.
    let hits = query.search_by_peer("delta").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, record_d.id);
}

#[test]
fn ids_stay_strictly_increasing_across_eviction_bursts() {
    let store = Arc::new(MessageStore::new(5));
    let mut last_id = String::new();

    for i in 0..200 {
        let record = store.append(json!({"from": "burst", "body": i}));
        assert!(
            record.id > last_id,
            "id {} must be greater than its predecessor {}",
            record.id,
            last_id
        );
        last_id = record.id;
    }

    assert_eq!(store.len(), 5, "buffer must hold exactly capacity records");
}

// ─────────────────────────────────────────────────────────────────────────────
// Router pipeline
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn provider_events_flow_through_the_router_into_queries() {
    let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
    let monitor = Arc::new(ConnectionMonitor::new());
    let store = Arc::new(MessageStore::new(100));
    let router = spawn_event_router(
        rx,
        Arc::clone(&monitor),
        Arc::clone(&store),
        CancellationToken::new(),
    );

    tx.send(ProviderEvent::Ready).await.unwrap();
    for peer in ["59899123456", "54911222333", "59899123456"] {
        tx.send(ProviderEvent::Message(json!({"from": peer, "body": "hi"})))
            .await
            .unwrap();
    }
    drop(tx);
    router.await.unwrap();

    assert!(monitor.is_connected());

    let query = QueryService::new(store);
    assert_eq!(query.list_all().len(), 3);
    assert_eq!(query.search_by_peer("598").unwrap().len(), 2);
}

#[tokio::test]
async fn lifecycle_events_gate_dispatch_through_the_router() {
    let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
    let monitor = Arc::new(ConnectionMonitor::new());
    let store = Arc::new(MessageStore::new(10));
    let router = spawn_event_router(
        rx,
        Arc::clone(&monitor),
        Arc::clone(&store),
        CancellationToken::new(),
    );

    let provider = Arc::new(RecordingProvider::default());
    let dispatcher = Dispatcher::new(
        Arc::clone(&monitor),
        Arc::clone(&provider) as Arc<dyn Provider>,
    );

    tx.send(ProviderEvent::Ready).await.unwrap();
    tx.send(ProviderEvent::Disconnected).await.unwrap();
    drop(tx);
    router.await.unwrap();

    // The last lifecycle signal wins: sends must fail without a provider call.
    let result = dispatcher.send("59899123456", "hola").await;
    assert!(matches!(result, Err(DispatchError::NotConnected)));
    assert!(provider.transmits.lock().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatch contract
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn connected_send_transmits_exactly_once_with_the_given_arguments() {
    let monitor = Arc::new(ConnectionMonitor::new());
    monitor.on_ready();

    let provider = Arc::new(RecordingProvider::default());
    let dispatcher = Dispatcher::new(
        Arc::clone(&monitor),
        Arc::clone(&provider) as Arc<dyn Provider>,
    );

    dispatcher.send("59899123456", "hola").await.unwrap();

    let transmits = provider.transmits.lock();
    assert_eq!(
        transmits.as_slice(),
        &[("59899123456".to_string(), "hola".to_string())]
    );
}

#[test]
fn lifecycle_transitions_are_idempotent() {
    let monitor = ConnectionMonitor::new();

    monitor.on_ready();
    monitor.on_ready();
    assert!(monitor.is_connected(), "double ready must stay connected");

    monitor.on_disconnected();
    monitor.on_disconnected();
    assert!(
        !monitor.is_connected(),
        "double disconnect must stay disconnected"
    );
}
