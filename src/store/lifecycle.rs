//! Stop signal and handle for the processing loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// One-shot stop flag observed at loop iteration boundaries.
#[derive(Clone, Default)]
pub(crate) struct LoopSignal {
    stopped: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl LoopSignal {
    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub(crate) fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    pub(crate) async fn wait(&self) {
        // Register before checking the flag so a concurrent stop() is not lost.
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_stopped() {
            return;
        }
        notified.await;
    }
}

/// Running processing loop.
pub(crate) struct LoopHandle {
    signal: LoopSignal,
    join: JoinHandle<()>,
}

impl LoopHandle {
    pub(crate) fn new(signal: LoopSignal, join: JoinHandle<()>) -> Self {
        Self { signal, join }
    }

    /// Signal the loop and wait until the in-flight action finishes.
    pub(crate) async fn stop(self) {
        self.signal.stop();
        if let Err(e) = self.join.await {
            if e.is_panic() {
                tracing::error!(error = %e, "Processing loop panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_returns_after_stop() {
        let signal = LoopSignal::default();
        let waiter = signal.clone();
        let task = tokio::spawn(async move { waiter.wait().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.stop();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("wait did not observe stop")
            .unwrap();
    }

    #[tokio::test]
    async fn wait_after_stop_is_immediate() {
        let signal = LoopSignal::default();
        signal.stop();
        tokio::time::timeout(Duration::from_millis(50), signal.wait())
            .await
            .expect("stopped signal should not block");
    }
}
