//! Outbound message dispatch, gated on provider connectivity.
//!
//! One attempt per call: validation, state gate, hand-off. No retry and no
//! queueing — a rejected send is surfaced once and recovery belongs to the
//! caller.

use crate::connection::ConnectionMonitor;
use crate::provider::Provider;
use crate::util::truncate_with_ellipsis;
use std::sync::Arc;

/// Why a send was refused or failed.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("peer id must not be empty")]
    EmptyPeerId,

    #[error("message text must not be empty")]
    EmptyText,

    #[error("provider is not connected")]
    NotConnected,

    #[error("transmission hand-off failed: {0}")]
    Transport(anyhow::Error),
}

/// Hands outbound messages to the provider adapter while connected.
pub struct Dispatcher {
    monitor: Arc<ConnectionMonitor>,
    provider: Arc<dyn Provider>,
}

impl Dispatcher {
    pub fn new(monitor: Arc<ConnectionMonitor>, provider: Arc<dyn Provider>) -> Self {
        Self { monitor, provider }
    }

    /// Submit one outbound message.
    ///
    /// Inputs are validated before any state is consulted. While
    /// disconnected the provider is never called. On success exactly one
    /// transmission was handed to the provider; the call does not wait for
    /// delivery confirmation.
    pub async fn send(&self, peer_id: &str, text: &str) -> Result<(), DispatchError> {
        if peer_id.trim().is_empty() {
            return Err(DispatchError::EmptyPeerId);
        }
        if text.trim().is_empty() {
            return Err(DispatchError::EmptyText);
        }

        if !self.monitor.is_connected() {
            return Err(DispatchError::NotConnected);
        }

        self.provider
            .transmit(peer_id, text)
            .await
            .map_err(DispatchError::Transport)?;

        tracing::debug!(
            peer = %peer_id,
            text = %truncate_with_ellipsis(text, 40),
            "message dispatched"
        );
        Ok(())
    }
}
