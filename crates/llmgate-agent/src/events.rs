use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Session-scoped events, serialized onto the SSE wire as
/// `{"event_type": ..., "payload": ...}`.
///
/// The variant set is closed; wire names are part of the client contract
/// and must not drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "payload")]
pub enum AgentEvent {
    #[serde(rename = "worker_ack")]
    WorkerAck { session_id: String },
    #[serde(rename = "AgentThoughtStream")]
    ThoughtStream { text: String },
    #[serde(rename = "AgentThoughtEnd")]
    ThoughtEnd {},
    #[serde(rename = "AgentToolCallStart")]
    ToolCallStart { tool_name: String, arguments: Value },
    #[serde(rename = "AgentToolCallEnd")]
    ToolCallEnd { tool_name: String },
    #[serde(rename = "AgentObservation")]
    Observation { content: Value },
    #[serde(rename = "FinalAnswerStream")]
    FinalAnswerStream { text: String },
    #[serde(rename = "FinalAnswerStreamEnd")]
    FinalAnswerStreamEnd {},
    #[serde(rename = "error")]
    Error {
        kind: SessionErrorKind,
        message: String,
    },
}

impl AgentEvent {
    /// Terminal events end the session; the delivery stream closes after
    /// forwarding one.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentEvent::FinalAnswerStreamEnd {} | AgentEvent::Error { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionErrorKind {
    ParseFailure,
    StepLimitExceeded,
    LlmUnavailable,
    UnknownPattern,
}
