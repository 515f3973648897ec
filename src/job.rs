use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::solver::Solver;
use crate::types::{PackMode, PackingResult};

/// A packing run on a background thread that can be cancelled.
///
/// Cancellation is cooperative. The solver checks the flag between bands,
/// sheets and strategy attempts, and returns whatever it has placed so far.
pub struct PackJob {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<()>,
    rx: Receiver<PackingResult>,
}

impl PackJob {
    pub fn spawn(solver: Solver, mode: PackMode) -> Self {
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        let flag = Arc::clone(&cancel);
        let handle = thread::spawn(move || {
            let result = solver.solve_with_cancel(mode, &flag);
            // The receiver only goes away if the job was dropped
            let _ = tx.send(result);
        });
        Self { cancel, handle, rx }
    }

    /// Shared flag; storing `true` cancels the run.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the result. A panic on the packing thread is returned as `Err`.
    pub fn join(self) -> thread::Result<PackingResult> {
        let received = self.rx.recv();
        self.handle.join()?;
        received.map_err(|e| Box::new(e) as Box<dyn std::any::Any + Send>)
    }

    /// Waits up to `timeout`, then cancels and returns the partial result.
    pub fn wait_timeout(self, timeout: Duration) -> thread::Result<PackingResult> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => {
                self.handle.join()?;
                Ok(result)
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "packing timed out, cancelling"
                );
                self.cancel();
                self.join()
            }
            Err(RecvTimeoutError::Disconnected) => self.join(),
        }
    }
}
