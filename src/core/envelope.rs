use serde::Serialize;
use serde_json::Value;

use crate::core::collector::{Tier0, Tier1};
use crate::core::workflow::WorkflowMetadata;

/// The record posted to the collection server for one hook event, and the
/// unit persisted in the durable queue.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    pub source_app: String,
    pub session_id: String,
    pub hook_event_type: String,
    pub payload: Value,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub model_name: String,
    pub agent_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_version: Option<String>,
    #[serde(flatten)]
    pub tier0: Option<Tier0>,
    #[serde(flatten)]
    pub tier1: Option<Tier1>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<WorkflowMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl EventEnvelope {
    pub fn new(
        source_app: &str,
        hook_event_type: &str,
        session_id: &str,
        payload: Value,
        timestamp: i64,
    ) -> Self {
        EventEnvelope {
            source_app: source_app.to_string(),
            session_id: session_id.to_string(),
            hook_event_type: hook_event_type.to_string(),
            payload,
            timestamp,
            model_name: String::new(),
            agent_type: "claude".to_string(),
            agent_version: None,
            tier0: None,
            tier1: None,
            workflow: None,
            chat: None,
            summary: None,
        }
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}
