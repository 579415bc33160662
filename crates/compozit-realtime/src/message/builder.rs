//! Builder helpers for constructing outbound hub messages.

use serde_json::{Value, json};

use compozit_core::types::UserId;
use compozit_entity::{JobEvent, JobEventKind};

use super::types::{HubMessage, MessageType};

use crate::connection::handle::ConnectionId;

/// Build the welcome message sent to a freshly registered connection
pub fn build_connected(conn_id: ConnectionId, owner_id: &UserId) -> HubMessage {
    let mut msg = HubMessage::new(
        MessageType::Connected,
        json!({
            "connection_id": conn_id,
            "message": "Connected to job notifications",
        }),
    );
    msg.owner_id = Some(owner_id.clone());
    msg
}

/// Build an operator broadcast
pub fn build_system(message: &str, details: Option<Value>) -> HubMessage {
    let mut data = json!({ "message": message });
    if let Some(details) = details {
        data["details"] = details;
    }
    HubMessage::new(MessageType::System, data)
}

/// Build the notification for a job lifecycle event
pub fn build_job_event(event: &JobEvent) -> HubMessage {
    let job = &event.job;
    let kind = match event.kind {
        JobEventKind::Queued => MessageType::Queued,
        JobEventKind::Updated => MessageType::Updated,
        JobEventKind::Completed => MessageType::Completed,
        JobEventKind::Failed => MessageType::Failed,
        JobEventKind::Cancelled => MessageType::Cancelled,
    };

    let mut data = json!({ "job": job });
    match event.kind {
        JobEventKind::Completed => {
            data["result"] = job.result.clone().unwrap_or(Value::Null);
        }
        JobEventKind::Failed => {
            data["error"] = json!(job.error);
        }
        _ => {}
    }

    HubMessage::new(kind, data).for_job(job.id.clone(), job.owner_id.clone())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use compozit_entity::{Job, JobKind, JobStatus, NewJob};

    use super::*;

    fn job() -> Job {
        Job::from_new(UserId::from("u1"), NewJob::new(JobKind::Export), 3)
    }

    #[test]
    fn test_completed_carries_result() {
        let mut job = job();
        job.status = JobStatus::Completed;
        job.result = Some(json!({"export_url": "/x.pdf"}));

        let msg = build_job_event(&JobEvent::new(JobEventKind::Completed, job.clone()));
        assert_eq!(msg.kind, MessageType::Completed);
        assert_eq!(msg.job_id.as_ref(), Some(&job.id));
        assert_eq!(msg.data["result"], json!({"export_url": "/x.pdf"}));
        assert_eq!(msg.data["job"]["status"], json!("completed"));
    }

    #[test]
    fn test_failed_carries_error() {
        let mut job = job();
        job.status = JobStatus::Failed;
        job.error = Some("boom".into());

        let msg = build_job_event(&JobEvent::new(JobEventKind::Failed, job));
        assert_eq!(msg.kind, MessageType::Failed);
        assert_eq!(msg.data["error"], json!("boom"));
    }

    #[test]
    fn test_system_details() {
        let msg = build_system("restarting", Some(json!({"in_seconds": 30})));
        assert_eq!(msg.data["message"], json!("restarting"));
        assert_eq!(msg.data["details"]["in_seconds"], json!(30));
    }
}
