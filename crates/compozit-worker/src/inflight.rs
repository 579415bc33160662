//! Cancellation tokens of jobs currently held by a worker.

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use compozit_core::types::JobId;

/// Map of job id to the token its processor observes.
///
/// Every token is a child of one root token, so cancelling the root stops
/// every in-flight processor at once.
#[derive(Debug)]
pub struct InFlightJobs {
    root: CancellationToken,
    tokens: DashMap<JobId, CancellationToken>,
}

impl InFlightJobs {
    /// Create an empty map with a fresh root token.
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            tokens: DashMap::new(),
        }
    }

    /// Register a job and return the token its processor must watch.
    pub fn register(&self, id: &JobId) -> CancellationToken {
        let token = self.root.child_token();
        self.tokens.insert(id.clone(), token.clone());
        token
    }

    /// Trigger the token of one job. Returns `false` if no worker holds it.
    pub fn cancel(&self, id: &JobId) -> bool {
        match self.tokens.get(id) {
            Some(entry) => {
                entry.value().cancel();
                true
            }
            None => false,
        }
    }

    /// Forget a job once its worker is done with it.
    pub fn remove(&self, id: &JobId) {
        self.tokens.remove(id);
    }

    /// Ids of every job currently held by a worker.
    pub fn ids(&self) -> Vec<JobId> {
        self.tokens.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of jobs currently held by workers.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether no job is in flight.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Cancel every in-flight job.
    pub fn cancel_all(&self) {
        self.root.cancel();
    }
}

impl Default for InFlightJobs {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_targets_one_job() {
        let inflight = InFlightJobs::new();
        let a = inflight.register(&JobId::from("a"));
        let b = inflight.register(&JobId::from("b"));

        assert!(inflight.cancel(&JobId::from("a")));
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());
        assert!(!inflight.cancel(&JobId::from("missing")));
    }

    #[test]
    fn test_cancel_all_reaches_every_child() {
        let inflight = InFlightJobs::new();
        let a = inflight.register(&JobId::from("a"));
        let b = inflight.register(&JobId::from("b"));
        inflight.cancel_all();
        assert!(a.is_cancelled() && b.is_cancelled());

        inflight.remove(&JobId::from("a"));
        assert_eq!(inflight.len(), 1);
        assert_eq!(inflight.ids(), vec![JobId::from("b")]);
    }
}
