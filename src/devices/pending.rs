// src/devices/pending.rs
//! One-shot completion signal for transitions executed on a worker

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

/// Outcome of a transition that may still be running on a worker.
///
/// Dropping it is fine: the worker finishes the transition regardless and the
/// result is simply discarded.
#[derive(Debug)]
pub struct PendingTransition {
    outcome: Receiver<bool>,
}

impl PendingTransition {
    /// A pending outcome plus the sender the worker completes it with
    pub(crate) fn channel() -> (Sender<bool>, Self) {
        let (sender, outcome) = bounded(1);
        (sender, Self { outcome })
    }

    /// An outcome known up front
    pub fn completed(success: bool) -> Self {
        let (sender, pending) = Self::channel();
        // Capacity 1 and the receiver is alive, cannot fail
        let _ = sender.send(success);
        pending
    }

    /// Block until the outcome arrives or `timeout` elapses.
    ///
    /// A timeout, or a worker that went away without answering, is reported as
    /// false.
    pub fn wait(&self, timeout: Duration) -> bool {
        self.wait_until(Instant::now() + timeout)
    }

    /// Like [`PendingTransition::wait`] against an absolute deadline, so several
    /// outcomes can share one bound.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        match self.outcome.recv_deadline(deadline) {
            Ok(success) => success,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!("transition not confirmed before the deadline");
                false
            }
            Err(RecvTimeoutError::Disconnected) => {
                tracing::warn!("worker stopped before confirming the transition");
                false
            }
        }
    }

    /// Outcome if already available, without blocking
    pub fn try_outcome(&self) -> Option<bool> {
        self.outcome.try_recv().ok()
    }
}
