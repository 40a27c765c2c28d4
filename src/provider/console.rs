//! Console provider — development adapter over stdin/stdout.
//!
//! Reads inbound messages as terminal lines (`<peer> <text>`, or bare text
//! for the default peer) and prints outbound transmissions. Useful for
//! exercising the full ingest/query/dispatch path without a real messaging
//! session.

use super::{Provider, ProviderEvent};
use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const DEFAULT_PEER: &str = "console";

pub struct ConsoleProvider {
    default_peer: String,
}

impl ConsoleProvider {
    pub fn new() -> Self {
        Self {
            default_peer: DEFAULT_PEER.to_string(),
        }
    }

    /// Split a line into `(peer, text)`. The first token is taken as the
    /// peer when it looks like a phone-style id (digits, `+`, `@`);
    /// otherwise the whole line is a message from the default peer.
    fn parse_line(&self, line: &str) -> Option<(String, String)> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let Some((first, rest)) = trimmed.split_once(char::is_whitespace) {
            let rest = rest.trim();
            let phone_like = !first.is_empty()
                && first
                    .chars()
                    .all(|c| c.is_ascii_digit() || c == '+' || c == '@' || c == '.' || c == '-');
            if phone_like && !rest.is_empty() {
                return Some((first.to_string(), rest.to_string()));
            }
        }

        Some((self.default_peer.clone(), trimmed.to_string()))
    }
}

impl Default for ConsoleProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for ConsoleProvider {
    fn name(&self) -> &str {
        "console"
    }

    async fn run(&self, events: mpsc::Sender<ProviderEvent>) -> Result<()> {
        events.send(ProviderEvent::Ready).await?;
        tracing::info!("console provider ready; type '<peer> <text>' and press Enter");

        let stdin = BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();

        while let Some(line) = lines.next_line().await? {
            let Some((peer, text)) = self.parse_line(&line) else {
                continue;
            };
            let payload = serde_json::json!({
                "from": peer,
                "body": text,
                "type": "chat",
            });
            if events.send(ProviderEvent::Message(payload)).await.is_err() {
                break;
            }
        }

        // stdin closed; the session is over.
        let _ = events.send(ProviderEvent::Disconnected).await;
        Ok(())
    }

    async fn transmit(&self, peer_id: &str, text: &str) -> Result<()> {
        println!("→ {peer_id}: {text}");
        Ok(())
    }
}
