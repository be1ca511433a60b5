use std::sync::Arc;
use std::time::Duration;

use tokio::select;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// One-shot readiness flag. Moves from not ready to ready exactly once and
/// never back.
#[derive(Clone, Debug)]
pub struct ReadyGate {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for ReadyGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadyGate {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Marks the gate ready. Returns `true` only for the call that performed
    /// the transition.
    pub fn mark_ready(&self) -> bool {
        self.tx.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        })
    }

    pub fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    /// Waits until the gate is ready with no deadline.
    pub async fn ready(&self) {
        let mut rx = self.tx.subscribe();
        // only fails once the sender is dropped, and `self` holds it
        let _ = rx.wait_for(|ready| *ready).await;
    }

    pub async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.ready())
            .await
            .map_err(|_| Error::Timeout(timeout))
    }

    pub async fn wait_ready_or_cancel(&self, cancel: &CancellationToken) -> Result<()> {
        select! {
            biased;
            _ = self.ready() => Ok(()),
            _ = cancel.cancelled() => Err(Error::Cancelled),
        }
    }
}
