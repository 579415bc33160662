//! Bounded dispatch channel carrying job ids from submitters to workers.
//!
//! Submission never blocks: a full channel surfaces as [`DispatchError::Full`]
//! and the caller turns it into a `QueueFull` rejection.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use compozit_core::types::JobId;

/// Why a non-blocking dispatch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// Every slot is taken.
    #[error("dispatch queue is full")]
    Full,
    /// The receiving side has shut down.
    #[error("dispatch queue is closed")]
    Closed,
}

impl<T> From<mpsc::error::TrySendError<T>> for DispatchError {
    fn from(err: mpsc::error::TrySendError<T>) -> Self {
        match err {
            mpsc::error::TrySendError::Full(_) => Self::Full,
            mpsc::error::TrySendError::Closed(_) => Self::Closed,
        }
    }
}

/// Create a dispatch channel holding at most `capacity` ids.
pub fn channel(capacity: usize) -> (DispatchSender, DispatchReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let closing = CancellationToken::new();
    (
        DispatchSender { tx },
        DispatchReceiver {
            rx: Arc::new(Mutex::new(rx)),
            closing,
        },
    )
}

/// Sending half. Cheap to clone.
#[derive(Debug, Clone)]
pub struct DispatchSender {
    tx: mpsc::Sender<JobId>,
}

/// A reserved slot on the channel; sending through it cannot fail.
#[derive(Debug)]
pub struct DispatchPermit<'a> {
    permit: mpsc::Permit<'a, JobId>,
}

impl DispatchPermit<'_> {
    /// Consume the slot.
    pub fn send(self, id: JobId) {
        self.permit.send(id);
    }
}

impl DispatchSender {
    /// Reserve one slot without blocking.
    pub fn try_reserve(&self) -> Result<DispatchPermit<'_>, DispatchError> {
        let permit = self.tx.try_reserve().map_err(|err| match err {
            mpsc::error::TrySendError::Full(()) => DispatchError::Full,
            mpsc::error::TrySendError::Closed(()) => DispatchError::Closed,
        })?;
        Ok(DispatchPermit { permit })
    }

    /// Send one id without blocking.
    pub fn try_dispatch(&self, id: JobId) -> Result<(), DispatchError> {
        self.tx.try_send(id).map_err(DispatchError::from)
    }

    /// Free slots right now.
    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }

    /// Configured capacity.
    pub fn max_capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Ids currently waiting for a worker.
    pub fn depth(&self) -> usize {
        self.max_capacity() - self.capacity()
    }
}

/// Receiving half, shared by every worker in the pool.
#[derive(Debug, Clone)]
pub struct DispatchReceiver {
    rx: Arc<Mutex<mpsc::Receiver<JobId>>>,
    closing: CancellationToken,
}

impl DispatchReceiver {
    /// Wait for the next id.
    ///
    /// Returns `None` once the channel is closed and the backlog is drained.
    pub async fn recv(&self) -> Option<JobId> {
        let mut rx = self.rx.lock().await;

        if self.closing.is_cancelled() {
            rx.close();
            return rx.recv().await;
        }

        tokio::select! {
            biased;
            id = rx.recv() => id,
            _ = self.closing.cancelled() => {
                rx.close();
                rx.recv().await
            }
        }
    }

    /// Stop accepting new ids. Already queued ids are still delivered.
    pub async fn close(&self) {
        self.closing.cancel();
        self.rx.lock().await.close();
    }
}
