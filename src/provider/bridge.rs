//! WebSocket bridge provider.
//!
//! Connects to a bridge process that owns the actual messaging session
//! (QR/session bootstrap happens over there) and relays its single event
//! stream as JSON text frames:
//!
//! - inbound: `{"type":"ready"}`, `{"type":"disconnected"}`,
//!   `{"type":"message","data":{...}}`, `{"type":"ping","id":...}`
//! - outbound: `{"type":"pong","id":...}`, `{"type":"send","to":"...","body":"..."}`
//!
//! Frame order on the socket is the arrival order the core sees; the bridge
//! guarantees a single, non-overlapping event stream.

use super::{Provider, ProviderEvent};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Depth of the outbound hand-off queue toward the socket writer.
const OUTBOUND_QUEUE_DEPTH: usize = 32;

struct OutboundSend {
    to: String,
    body: String,
}

pub struct BridgeProvider {
    url: String,
    /// Present only while a stream is active; `transmit` clones the sender out.
    outbound: Mutex<Option<mpsc::Sender<OutboundSend>>>,
}

impl BridgeProvider {
    pub fn new(url: String) -> Self {
        Self {
            url,
            outbound: Mutex::new(None),
        }
    }
}

fn frame_type(frame: &serde_json::Value) -> &str {
    frame.get("type").and_then(|t| t.as_str()).unwrap_or("")
}

fn pong_for(frame: &serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "type": "pong",
        "id": frame.get("id").cloned().unwrap_or(serde_json::Value::Null),
    })
}

fn send_frame(to: &str, body: &str) -> serde_json::Value {
    serde_json::json!({"type": "send", "to": to, "body": body})
}

#[async_trait]
impl Provider for BridgeProvider {
    fn name(&self) -> &str {
        "bridge"
    }

    async fn run(&self, events: mpsc::Sender<ProviderEvent>) -> Result<()> {
        tracing::info!("bridge: connecting to {}", self.url);
        let (ws_stream, _) = tokio_tungstenite::connect_async(&self.url).await?;
        let (mut write, mut read) = ws_stream.split();

        let (out_tx, mut out_rx) = mpsc::channel::<OutboundSend>(OUTBOUND_QUEUE_DEPTH);
        *self.outbound.lock() = Some(out_tx);
        tracing::info!("bridge: connected, relaying event stream");

        let result = loop {
            tokio::select! {
                frame = read.next() => {
                    let text = match frame {
                        Some(Ok(Message::Text(t))) => t,
                        Some(Ok(Message::Close(_))) | None => break Ok(()),
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => break Err(anyhow!("bridge stream error: {e}")),
                    };

                    let frame: serde_json::Value = match serde_json::from_str(text.as_ref()) {
                        Ok(v) => v,
                        Err(_) => continue,
                    };

                    match frame_type(&frame) {
                        "ready" => {
                            if events.send(ProviderEvent::Ready).await.is_err() {
                                break Ok(());
                            }
                        }
                        "disconnected" => {
                            if events.send(ProviderEvent::Disconnected).await.is_err() {
                                break Ok(());
                            }
                        }
                        "message" => {
                            let Some(data) = frame.get("data") else {
                                tracing::debug!("bridge: message frame without data payload");
                                continue;
                            };
                            if events
                                .send(ProviderEvent::Message(data.clone()))
                                .await
                                .is_err()
                            {
                                break Ok(());
                            }
                        }
                        "ping" => {
                            let pong = pong_for(&frame);
                            if let Err(e) = write.send(Message::Text(pong.to_string().into())).await {
                                break Err(anyhow!("bridge: failed to answer ping: {e}"));
                            }
                        }
                        other => {
                            tracing::debug!("bridge: ignoring frame type {other:?}");
                        }
                    }
                }
                out = out_rx.recv() => {
                    // out_rx cannot yield None while out_tx lives in self.outbound.
                    let Some(send) = out else { break Ok(()) };
                    let frame = send_frame(&send.to, &send.body);
                    if let Err(e) = write.send(Message::Text(frame.to_string().into())).await {
                        break Err(anyhow!("bridge: outbound send failed: {e}"));
                    }
                }
            }
        };

        *self.outbound.lock() = None;
        let _ = events.send(ProviderEvent::Disconnected).await;
        result
    }

    async fn transmit(&self, peer_id: &str, text: &str) -> Result<()> {
        let sender = self.outbound.lock().clone();
        let Some(sender) = sender else {
            anyhow::bail!("bridge not connected; no active event stream");
        };

        sender
            .send(OutboundSend {
                to: peer_id.to_string(),
                body: text.to_string(),
            })
            .await
            .map_err(|_| anyhow!("bridge stream closed during hand-off"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn frame_type_defaults_to_empty() {
        assert_eq!(frame_type(&json!({"data": {}})), "");
        assert_eq!(frame_type(&json!({"type": "ready"})), "ready");
    }

    #[test]
    fn pong_echoes_the_ping_id() {
        let pong = pong_for(&json!({"type": "ping", "id": 7}));
        assert_eq!(pong["type"], "pong");
        assert_eq!(pong["id"], 7);
    }

    #[test]
    fn pong_for_idless_ping_carries_null() {
        let pong = pong_for(&json!({"type": "ping"}));
        assert!(pong["id"].is_null());
    }

    #[test]
    fn send_frame_carries_recipient_and_body() {
        let frame = send_frame("59899123456", "hola");
        assert_eq!(frame["type"], "send");
        assert_eq!(frame["to"], "59899123456");
        assert_eq!(frame["body"], "hola");
    }

    #[tokio::test]
    async fn transmit_without_an_active_stream_fails() {
        let provider = BridgeProvider::new("ws://127.0.0.1:1/stream".into());
        let result = provider.transmit("59899123456", "hola").await;
        assert!(result.is_err());
    }
}
