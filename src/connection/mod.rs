//! Provider connectivity tracking.
//!
//! The provider adapter reports lifecycle signals ("ready" / "disconnected")
//! and the rest of the process reads the resulting state. Outbound sends are
//! gated on it; queries are not.

use parking_lot::Mutex;
use serde::Serialize;

/// Provider connectivity as seen by the rest of the process.
///
/// Two states only. Malformed provider signals are the adapter's concern and
/// never reach this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
        }
    }
}

/// Owns the connection state machine. Starts `Disconnected`; cycles freely
/// between the two states for the life of the process.
pub struct ConnectionMonitor {
    state: Mutex<ConnectionState>,
}

impl ConnectionMonitor {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ConnectionState::Disconnected),
        }
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn is_connected(&self) -> bool {
        self.current_state() == ConnectionState::Connected
    }

    /// Provider became usable. Idempotent: a no-op when already connected.
    pub fn on_ready(&self) {
        let mut state = self.state.lock();
        if *state != ConnectionState::Connected {
            *state = ConnectionState::Connected;
            tracing::info!("provider connected");
        }
    }

    /// Provider became unusable. Idempotent: a no-op when already disconnected.
    pub fn on_disconnected(&self) {
        let mut state = self.state.lock();
        if *state != ConnectionState::Disconnected {
            *state = ConnectionState::Disconnected;
            tracing::warn!("provider disconnected");
        }
    }
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new()
    }
}
