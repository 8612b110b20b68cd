use serde::Serialize;
use tokio::sync::broadcast;

/// A progress notice for whatever UI is watching the fill.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusUpdate {
    pub action: String,
    pub reason: String,
    pub value: String,
}

impl StatusUpdate {
    pub fn new(action: impl Into<String>, reason: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            reason: reason.into(),
            value: value.into(),
        }
    }

    /// The generic notice shown when a fill session fails.
    pub fn failure() -> Self {
        Self::new(
            "Autofill stopped",
            "Something went wrong while filling this page. Please review it manually.",
            "",
        )
    }
}

/// Fire-and-forget broadcast of status updates. Sending with no subscribers
/// is not an error.
#[derive(Debug, Clone)]
pub struct StatusChannel {
    sender: broadcast::Sender<StatusUpdate>,
}

impl StatusChannel {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.sender.subscribe()
    }

    pub fn send(&self, update: StatusUpdate) {
        tracing::info!(action = %update.action, value = %update.value, reason = %update.reason, "status");
        let _ = self.sender.send(update);
    }
}

impl Default for StatusChannel {
    fn default() -> Self {
        Self::new(64)
    }
}
