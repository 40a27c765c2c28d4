//! Provider adapter boundary.
//!
//! A provider is the external messaging backend this process bridges. Each
//! adapter implements [`Provider`]: a long-running inbound event stream and
//! an outbound transmission primitive. Inbound events flow through a bounded
//! mpsc channel into a single router task, the only writer that touches the
//! connection monitor and the message store.
//!
//! The supervisor restarts a dead event stream with exponential backoff; the
//! connection state is forced to disconnected whenever the stream dies, and
//! the provider's own lifecycle signals drive it the rest of the time.

pub mod bridge;
pub mod console;

use crate::config::{ProviderConfig, ProviderKind};
use crate::connection::ConnectionMonitor;
use crate::store::MessageStore;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Depth of the inbound event queue between the adapter and the router.
pub const EVENT_QUEUE_DEPTH: usize = 100;

const DEFAULT_INITIAL_BACKOFF_SECS: u64 = 2;
const DEFAULT_MAX_BACKOFF_SECS: u64 = 60;

/// One signal from the provider, delivered in arrival order.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    /// Provider session is usable; outbound sends may proceed.
    Ready,
    /// Provider session is unusable; outbound sends must fail fast.
    Disconnected,
    /// Inbound message carrying the raw provider payload.
    Message(serde_json::Value),
}

/// Core provider trait — implement for any messaging backend.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable adapter name, used in logs and component health.
    fn name(&self) -> &str;

    /// Run the inbound event stream (long-running). Lifecycle signals and
    /// messages are pushed through `events` in arrival order. Returning (Ok
    /// or Err) means the stream died; the supervisor decides what happens
    /// next.
    async fn run(&self, events: mpsc::Sender<ProviderEvent>) -> Result<()>;

    /// Hand one outbound message to the provider for delivery. Returns as
    /// soon as the hand-off is accepted; delivery confirmation is not part
    /// of this contract.
    async fn transmit(&self, peer_id: &str, text: &str) -> Result<()>;
}

/// Instantiate the configured provider adapter.
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn Provider>> {
    match config.kind {
        ProviderKind::Console => Ok(Arc::new(console::ConsoleProvider::new())),
        ProviderKind::Bridge => {
            let url = config
                .bridge_url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("provider.bridge_url is required for kind = \"bridge\""))?;
            Ok(Arc::new(bridge::BridgeProvider::new(url)))
        }
    }
}

/// Consume provider events and apply them to the core.
///
/// This task is the single writer for both the connection monitor and the
/// message store. It exits when the event channel closes or `shutdown` fires.
pub fn spawn_event_router(
    mut events: mpsc::Receiver<ProviderEvent>,
    monitor: Arc<ConnectionMonitor>,
    store: Arc<MessageStore>,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        crate::health::mark_component_ok("router");

        loop {
            let event = tokio::select! {
                () = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            match event {
                ProviderEvent::Ready => monitor.on_ready(),
                ProviderEvent::Disconnected => monitor.on_disconnected(),
                ProviderEvent::Message(raw) => {
                    let record = store.append(raw);
                    tracing::debug!(
                        id = %record.id,
                        peer = %record.peer_id,
                        buffered = store.len(),
                        "message ingested"
                    );
                }
            }
        }

        tracing::debug!("event router stopped");
    })
}

/// Run the provider's event stream under supervision, restarting it with
/// exponential backoff when it dies. The connection monitor is forced to
/// disconnected on every death so sends fail fast while the stream is down.
pub fn spawn_supervised_provider(
    provider: Arc<dyn Provider>,
    events: mpsc::Sender<ProviderEvent>,
    monitor: Arc<ConnectionMonitor>,
) -> tokio::task::JoinHandle<()> {
    spawn_supervised_provider_with_backoff(
        provider,
        events,
        monitor,
        DEFAULT_INITIAL_BACKOFF_SECS,
        DEFAULT_MAX_BACKOFF_SECS,
    )
}

fn spawn_supervised_provider_with_backoff(
    provider: Arc<dyn Provider>,
    events: mpsc::Sender<ProviderEvent>,
    monitor: Arc<ConnectionMonitor>,
    initial_backoff_secs: u64,
    max_backoff_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let component = format!("provider:{}", provider.name());
        let mut backoff = initial_backoff_secs.max(1);
        let max_backoff = max_backoff_secs.max(backoff);

        loop {
            crate::health::mark_component_ok(&component);
            let result = provider.run(events.clone()).await;

            // The stream is gone; whatever the provider last claimed, the
            // session is unusable until a fresh Ready arrives.
            monitor.on_disconnected();

            if events.is_closed() {
                break;
            }

            match result {
                Ok(()) => {
                    tracing::warn!("provider {} stream ended; restarting", provider.name());
                    crate::health::mark_component_error(&component, "stream ended");
                    // Clean exit — reset backoff since the stream ran successfully
                    backoff = initial_backoff_secs.max(1);
                }
                Err(e) => {
                    tracing::error!("provider {} error: {e}; restarting", provider.name());
                    crate::health::mark_component_error(&component, e.to_string());
                }
            }

            crate::health::bump_component_restart(&component);
            tokio::time::sleep(Duration::from_secs(backoff)).await;
            // Double backoff AFTER sleeping so the first restart uses the initial delay
            backoff = backoff.saturating_mul(2).min(max_backoff);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn router_applies_lifecycle_events_to_the_monitor() {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let monitor = Arc::new(ConnectionMonitor::new());
        let store = Arc::new(MessageStore::new(10));
        let shutdown = CancellationToken::new();
        let handle = spawn_event_router(rx, Arc::clone(&monitor), store, shutdown.clone());

        tx.send(ProviderEvent::Ready).await.unwrap();
        tx.send(ProviderEvent::Disconnected).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert!(!monitor.is_connected());
    }

    #[tokio::test]
    async fn router_ingests_messages_in_arrival_order() {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let monitor = Arc::new(ConnectionMonitor::new());
        let store = Arc::new(MessageStore::new(10));
        let shutdown = CancellationToken::new();
        let handle = spawn_event_router(rx, monitor, Arc::clone(&store), shutdown);

        for i in 0..3 {
            tx.send(ProviderEvent::Message(json!({"from": "p", "body": i})))
                .await
                .unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 3);
        let bodies: Vec<i64> = snapshot
            .iter()
            .map(|r| r.payload["body"].as_i64().unwrap())
            .collect();
        assert_eq!(bodies, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn router_stops_on_shutdown_signal() {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let monitor = Arc::new(ConnectionMonitor::new());
        let store = Arc::new(MessageStore::new(10));
        let shutdown = CancellationToken::new();
        let handle = spawn_event_router(rx, monitor, store, shutdown.clone());

        shutdown.cancel();
        handle.await.unwrap();
        drop(tx);
    }

    #[test]
    fn create_provider_requires_bridge_url_for_bridge_kind() {
        let config = ProviderConfig {
            kind: ProviderKind::Bridge,
            bridge_url: None,
        };
        assert!(create_provider(&config).is_err());
    }

    #[test]
    fn create_provider_builds_console_adapter() {
        let config = ProviderConfig::default();
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.name(), "console");
    }
}
