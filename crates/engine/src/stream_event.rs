//! Streaming step events.
//!
//! `StepEvent` wraps loop steps into a serializable protocol the engine
//! delivers incrementally through the receiver returned by
//! [`Engine::stream`](crate::runner::Engine::stream), preserving
//! transcript order.

use serde::{Deserialize, Serialize};

use cogwork_core::step::{Step, TerminationReason};

/// Events emitted during a streaming execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepEvent {
    /// The model recorded intermediate reasoning.
    Thought { text: String },

    /// The model requested a tool invocation.
    Action {
        tool: String,
        arguments: serde_json::Value,
    },

    /// A tool produced a result (or error).
    Observation {
        tool: String,
        output: String,
        is_error: bool,
    },

    /// The model produced the final answer.
    Final {
        answer: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        confidence: Option<f32>,
    },

    /// The run ended — final metadata.
    Done {
        termination_reason: TerminationReason,
        iterations_used: u32,
        tool_call_count: usize,
        success: bool,
    },

    /// The run ended fatally mid-stream.
    Error { message: String },
}

impl StepEvent {
    /// Wire name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Thought { .. } => "thought",
            Self::Action { .. } => "action",
            Self::Observation { .. } => "observation",
            Self::Final { .. } => "final",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}

impl From<&Step> for StepEvent {
    fn from(step: &Step) -> Self {
        match step {
            Step::Thought { text } => StepEvent::Thought { text: text.clone() },
            Step::Action { tool, arguments } => StepEvent::Action {
                tool: tool.clone(),
                arguments: arguments.clone(),
            },
            Step::Observation {
                tool,
                output,
                is_error,
            } => StepEvent::Observation {
                tool: tool.clone(),
                output: output.clone(),
                is_error: *is_error,
            },
            Step::Final { answer, confidence } => StepEvent::Final {
                answer: answer.clone(),
                confidence: *confidence,
            },
        }
    }
}
