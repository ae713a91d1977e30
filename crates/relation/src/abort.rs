//! Cooperative cancellation for the relation engine.
//!
//! A single [`AbortHandle`] is owned by whoever runs the control loop; any
//! number of [`AbortSignal`] clones are checked at suspension points.

use tokio::sync::watch;

/// Create a connected handle/signal pair.
pub fn abort_channel() -> (AbortHandle, AbortSignal) {
    let (tx, rx) = watch::channel(false);
    (AbortHandle { tx }, AbortSignal { rx })
}

/// Fires the abort signal.
#[derive(Debug)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Request that every holder of a connected signal stops.
    /// Aborting more than once is harmless.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    /// Another signal connected to this handle.
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Observes an [`AbortHandle`].
#[derive(Debug, Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    /// Whether the abort has already been requested.
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the abort is requested. If the handle is dropped
    /// without aborting, never resolves.
    pub async fn aborted(&mut self) {
        if self.rx.wait_for(|aborted| *aborted).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
