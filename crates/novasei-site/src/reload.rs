//! Live reload broadcasting over WebSocket.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Messages sent to connected pages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadMessage {
    /// Site was rebuilt; reload the page
    Reload,

    /// Rebuild failed; the page keeps its current content
    BuildFailed {
        /// Error text shown in the browser console
        error: String,
    },

    /// Connection established
    Connected,
}

/// Hub for broadcasting reload messages to all connected pages.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    sender: broadcast::Sender<ReloadMessage>,
}

impl ReloadHub {
    /// Create a new hub.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a message to all connected pages.
    pub fn send(&self, msg: ReloadMessage) {
        // No receivers is fine
        let _ = self.sender.send(msg);
    }

    /// Subscribe to reload messages.
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.sender.subscribe()
    }

    /// Number of connected pages.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}
