//! Agent events streamed to API consumers.
//!
//! A run emits zero or more non-terminal events (`thought`, `tool_call`)
//! followed by exactly one terminal event (`final_response` or `error`).
//! Consumers stop reading at the first terminal event.

use serde::{Deserialize, Serialize};

/// One event of an agent run, serialized as `{"type": ..., "data": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Progress narration: stage transitions, model text between tool calls.
    Thought(String),
    /// The model asked the host to invoke a tool.
    ToolCall {
        name: String,
        args: serde_json::Value,
    },
    /// The formatted answer: photo-location strings, possibly empty.
    FinalResponse(Vec<String>),
    /// The run failed. The message is safe to show to end users.
    Error { message: String },
}

impl AgentEvent {
    pub fn thought(text: impl Into<String>) -> Self {
        Self::Thought(text.into())
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::FinalResponse(_) | Self::Error { .. })
    }

    /// The SSE event name for this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Thought(_) => "thought",
            Self::ToolCall { .. } => "tool_call",
            Self::FinalResponse(_) => "final_response",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_wire_format() {
        let event = AgentEvent::FinalResponse(vec!["gs://bucket/goa.jpeg".to_string()]);
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"final_response","data":["gs://bucket/goa.jpeg"]}"#);

        let event = AgentEvent::thought("Resolving relationship FAMILY");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"thought\""));

        let event = AgentEvent::Error {
            message: "could not process that request".to_string(),
        };
        let back: AgentEvent = serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(back, event);
    }
}
