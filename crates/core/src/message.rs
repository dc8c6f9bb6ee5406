//! Wire-level message types for the completion service.
//!
//! These are the value objects a strategy assembles from a transcript and
//! hands to the completion service: system instructions, the task, prior
//! model turns, and tool results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user (the task).
    User,
    /// The model.
    Assistant,
    /// System instructions (loop conventions, tool listings).
    System,
    /// Tool execution result.
    Tool,
}

/// A single message sent to or received from the completion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID.
    pub id: String,

    /// Who sent this message.
    pub role: Role,

    /// The text content.
    pub content: String,

    /// Structured calls requested by the model (if any).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ModelToolCall>,

    /// If this is a tool result, which call it responds to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp.
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::Tool, content);
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    /// Attach structured calls to this message.
    pub fn with_tool_calls(mut self, calls: Vec<ModelToolCall>) -> Self {
        self.tool_calls = calls;
        self
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }
}

/// A structured call embedded in an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelToolCall {
    /// Unique ID for this call.
    pub id: String,

    /// Name of the callable (a meta-tool or a registered tool).
    pub name: String,

    /// Arguments as a JSON string, exactly as the provider produced them.
    pub arguments: String,
}

impl ModelToolCall {
    /// Build a call with serialized arguments.
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: &serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.to_string(),
        }
    }

    /// Decode the argument payload. Returns an empty object for an empty
    /// payload, an error description for malformed JSON.
    pub fn decode_arguments(&self) -> std::result::Result<serde_json::Value, String> {
        if self.arguments.trim().is_empty() {
            return Ok(serde_json::json!({}));
        }
        serde_json::from_str(&self.arguments)
            .map_err(|e| format!("malformed arguments for '{}': {e}", self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Evaluate 2+2");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Evaluate 2+2");
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn tool_result_carries_call_id() {
        let msg = Message::tool_result("call_3", "4");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_3"));
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message::assistant("thinking").with_tool_calls(vec![ModelToolCall::new(
            "call_1",
            "use_tool",
            &serde_json::json!({"tool_name": "math"}),
        )]);
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.tool_calls.len(), 1);
        assert_eq!(back.tool_calls[0].name, "use_tool");
    }

    #[test]
    fn decode_arguments_tolerates_empty_payload() {
        let call = ModelToolCall {
            id: "c".into(),
            name: "think".into(),
            arguments: "".into(),
        };
        assert_eq!(call.decode_arguments().unwrap(), serde_json::json!({}));
    }

    #[test]
    fn decode_arguments_reports_malformed_json() {
        let call = ModelToolCall {
            id: "c".into(),
            name: "use_tool".into(),
            arguments: "{not json".into(),
        };
        let err = call.decode_arguments().unwrap_err();
        assert!(err.contains("use_tool"));
    }
}
