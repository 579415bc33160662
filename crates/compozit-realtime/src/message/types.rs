//! Inbound and outbound WebSocket message type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use compozit_core::types::{JobId, UserId};

/// Kind of a server-to-client message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Welcome message sent right after registration.
    Connected,
    /// A job was accepted.
    Queued,
    /// A job was claimed, progressed, or re-queued for retry.
    Updated,
    /// A job finished successfully.
    Completed,
    /// A job failed terminally.
    Failed,
    /// A job was cancelled.
    Cancelled,
    /// Operator broadcast.
    System,
}

/// Envelope of every message pushed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubMessage {
    /// Message kind.
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// Job the message refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    /// Owner of that job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<UserId>,
    /// Kind-specific payload.
    #[serde(default)]
    pub data: Value,
    /// When the message was built.
    pub timestamp: DateTime<Utc>,
}

impl HubMessage {
    /// Create a message with no job reference.
    pub fn new(kind: MessageType, data: Value) -> Self {
        Self {
            kind,
            job_id: None,
            owner_id: None,
            data,
            timestamp: Utc::now(),
        }
    }

    /// Attach the job reference.
    pub fn for_job(mut self, job_id: JobId, owner_id: UserId) -> Self {
        self.job_id = Some(job_id);
        self.owner_id = Some(owner_id);
        self
    }

    /// Serialize to the JSON text sent on the wire.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Messages sent by the client to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Application-level pong, for clients that cannot answer ping frames.
    Pong {
        /// Echoed timestamp.
        #[serde(default)]
        timestamp: Option<i64>,
    },
}

/// A frame queued for one connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// JSON text message.
    Text(String),
    /// Heartbeat ping.
    Ping,
    /// Close the socket.
    Close,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_envelope_shape() {
        let msg = HubMessage::new(MessageType::Completed, json!({"result": {"ok": true}}))
            .for_job(JobId::from("job_1"), UserId::from("u1"));
        let value = serde_json::to_value(&msg).expect("serialize");

        assert_eq!(value["type"], json!("completed"));
        assert_eq!(value["job_id"], json!("job_1"));
        assert_eq!(value["owner_id"], json!("u1"));
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_system_message_omits_job_fields() {
        let msg = HubMessage::new(MessageType::System, json!({"message": "maintenance"}));
        let value = serde_json::to_value(&msg).expect("serialize");
        assert!(value.get("job_id").is_none());
        assert!(value.get("owner_id").is_none());
    }

    #[test]
    fn test_parse_pong() {
        let msg: InboundMessage = serde_json::from_str(r#"{"type":"pong"}"#).expect("parse");
        assert_eq!(msg, InboundMessage::Pong { timestamp: None });
        assert!(serde_json::from_str::<InboundMessage>(r#"{"type":"subscribe"}"#).is_err());
    }
}
