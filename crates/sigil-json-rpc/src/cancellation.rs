//! Cooperative per-call cancellation.
//!
//! Every inbound call gets its own handle. The connection cancels it when the
//! peer sends `rpc.cancel` for that call or disconnects; anything the handler is
//! awaiting (a secret prompt, typically) is dropped at that point.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

/// Cancellation signal of one in-flight call.
///
/// The connection keeps one clone in its table of running calls and hands
/// another to the handler through its `CallContext`.
#[derive(Clone, Debug)]
pub struct CancellationHandle {
    signal: Arc<watch::Sender<bool>>,
}

impl CancellationHandle {
    pub fn new() -> Self {
        Self {
            signal: Arc::new(watch::Sender::new(false)),
        }
    }

    /// Cancel the call; later calls are no-ops
    pub fn cancel(&self) {
        self.signal.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.signal.borrow()
    }

    /// Resolves once the call is cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.signal.subscribe();
        // The sender lives as long as self, so this only ends on cancel
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Drive `fut` to completion unless the call is cancelled first.
    ///
    /// Returns `None` when cancelled; `fut` is dropped in that case.
    pub async fn run_until_cancelled<F>(&self, fut: F) -> Option<F::Output>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

impl Default for CancellationHandle {
    fn default() -> Self {
        Self::new()
    }
}
