//! CompletionService trait — the abstraction over language-model backends.
//!
//! A completion service knows how to take an assembled conversation and
//! return the model's next turn. Provider HTTP clients, authentication,
//! retry, and rate limiting all live behind this trait; the engine never
//! sees them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::ExecContext;
use crate::error::ServiceError;
use crate::message::Message;

/// How the model is steered toward (or away from) tool use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model decides whether to call tools.
    Auto,
    /// The model must call a tool before answering.
    Required,
    /// No registered tools are offered.
    None,
}

/// A callable schema sent to the model so it knows what it can invoke.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// The callable name.
    pub name: String,

    /// Description of what it does.
    pub description: String,

    /// JSON Schema describing the parameters.
    pub parameters: serde_json::Value,
}

/// One request to the completion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The assembled conversation.
    pub messages: Vec<Message>,

    /// Callables offered to the model (meta-tools plus registered tools
    /// in native mode; empty in text mode).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSchema>,

    /// Tool-use steering for this request.
    pub tool_choice: ToolChoice,
}

/// Token usage for one model turn.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    /// Accumulate another turn's usage into this total.
    pub fn absorb(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// The model's next turn: text content and/or structured calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelTurn {
    /// The generated message.
    pub message: Message,

    /// Token usage for this turn, when the provider reports it.
    pub usage: Option<Usage>,
}

/// The narrow interface the engine consumes. One operation: given the
/// assembled conversation and offered callables, return exactly one next
/// turn or a provider-level failure.
///
/// Provider failures are fatal at the engine layer; any retry or backoff
/// policy belongs to the implementation behind this trait.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// A human-readable name for this service (e.g. "anthropic", "mock").
    fn name(&self) -> &str;

    /// Produce the model's next turn. Implementations should observe
    /// `ctx.cancellation` and abandon work cooperatively when it fires.
    async fn complete(
        &self,
        request: CompletionRequest,
        ctx: &ExecContext,
    ) -> std::result::Result<ModelTurn, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_choice_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ToolChoice::Required).unwrap(),
            r#""required""#
        );
    }

    #[test]
    fn usage_accumulates() {
        let mut total = Usage::default();
        total.absorb(&Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        });
        total.absorb(&Usage {
            prompt_tokens: 20,
            completion_tokens: 10,
            total_tokens: 30,
        });
        assert_eq!(total.prompt_tokens, 30);
        assert_eq!(total.total_tokens, 45);
    }

    #[test]
    fn tool_schema_serialization() {
        let schema = ToolSchema {
            name: "math".into(),
            description: "Evaluate a mathematical expression".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "expression": { "type": "string", "description": "Expression to evaluate" }
                },
                "required": ["expression"]
            }),
        };
        let json = serde_json::to_string(&schema).unwrap();
        assert!(json.contains("math"));
        assert!(json.contains("expression"));
    }
}
