use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Handle returned by [`Channel::connect`](crate::channel::Channel::connect).
///
/// The adapter's receive loop runs on its own task; `Connection` only holds
/// what's needed to tell it to stop and wait for it to actually do so.
pub struct Connection {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Connection {
    pub fn new(cancel: CancellationToken, task: JoinHandle<()>) -> Self {
        Self { cancel, task }
    }

    /// Cancels the adapter's token and waits up to `grace` for the task to
    /// return on its own; past that it is detached (not force-aborted) —
    /// the task is expected to observe the token and exit promptly, so
    /// hitting the grace period indicates a misbehaving adapter worth
    /// logging rather than a normal path.
    pub async fn stop(self, grace: Duration) {
        self.cancel.cancel();
        if tokio::time::timeout(grace, self.task).await.is_err() {
            warn!(grace_ms = grace.as_millis() as u64, "channel task did not stop within grace period");
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
