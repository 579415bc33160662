//! Job event → notification mapping.
//!
//! Bridges lifecycle events from the job runtime into the hub. The runtime
//! publishes after its registry call has returned, so no registry lock is
//! ever held while the hub writes to sockets.

use std::sync::Arc;

use tracing;

use compozit_entity::{JobEvent, JobEventSink};

use crate::hub::NotificationHub;
use crate::message::builder;

/// Forwards job events to the connections of the job's owner.
#[derive(Debug, Clone)]
pub struct JobEventBridge {
    hub: Arc<NotificationHub>,
}

impl JobEventBridge {
    /// Create a new event bridge
    pub fn new(hub: Arc<NotificationHub>) -> Self {
        Self { hub }
    }
}

impl JobEventSink for JobEventBridge {
    fn publish(&self, event: JobEvent) {
        let message = builder::build_job_event(&event);
        let delivered = self.hub.notify(&event.job.owner_id, &message);

        tracing::trace!(
            job_id = %event.job.id,
            owner_id = %event.job.owner_id,
            kind = ?event.kind,
            delivered,
            "Job event published"
        );
    }
}
