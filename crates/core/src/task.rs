//! Long-lived background threads with a stop signal and a bounded join.

use crate::error::{Error, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, warn};

/// Handed to the task body; tells it when to exit.
pub(crate) struct StopSignal {
    rx: Receiver<()>,
}

impl StopSignal {
    /// Sleep up to `timeout`, waking early on a stop request.
    ///
    /// Returns `true` if stop was requested.
    pub(crate) fn wait(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        }
    }

    /// Non-blocking check for a stop request.
    pub(crate) fn is_requested(&self) -> bool {
        match self.rx.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => true,
            Err(TryRecvError::Empty) => false,
        }
    }
}

/// A named background thread.
///
/// Dropping the handle signals stop but does not wait.
pub(crate) struct BackgroundTask {
    name: &'static str,
    stop_tx: Option<Sender<()>>,
    done_rx: Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundTask {
    pub(crate) fn spawn<F>(name: &'static str, body: F) -> Result<Self>
    where
        F: FnOnce(StopSignal) + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        // Never sent on; the receiver sees a disconnect once the thread exits.
        let (done_tx, done_rx) = bounded::<()>(0);

        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _done = done_tx;
                body(StopSignal { rx: stop_rx });
            })
            .map_err(|e| Error::Task(format!("spawn {name}: {e}")))?;

        debug!(task = name, "Background task started");
        Ok(Self {
            name,
            stop_tx: Some(stop_tx),
            done_rx,
            handle: Some(handle),
        })
    }

    /// Whether the thread body is still executing.
    pub(crate) fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal stop and wait up to `timeout` for the thread to exit.
    ///
    /// Returns `false` if the thread was still running when the wait
    /// expired; it is then detached and exits on its own.
    pub(crate) fn stop(mut self, timeout: Duration) -> bool {
        self.signal();
        match self.done_rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Disconnected) | Ok(()) => {
                if let Some(handle) = self.handle.take() {
                    if handle.join().is_err() {
                        warn!(task = self.name, "Background task panicked");
                    }
                }
                debug!(task = self.name, "Background task stopped");
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    task = self.name,
                    timeout_ms = timeout.as_millis() as u64,
                    "Background task did not stop in time; detaching"
                );
                self.handle.take();
                false
            }
        }
    }

    fn signal(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            // Full or disconnected both mean the task already knows.
            let _ = tx.try_send(());
        }
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        self.signal();
    }
}
