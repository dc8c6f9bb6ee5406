//! Native strategy — structured function calling via meta-tools.
//!
//! Each iteration issues one completion request carrying the transcript
//! plus a fixed schema of three meta-tools (`think`, `use_tool`,
//! `final_answer`) and every registered tool's schema. The provider's
//! structured response yields the step kind directly; no text decoding is
//! performed, which eliminates the malformed-line failures text mode has
//! to tolerate.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use cogwork_core::context::ExecContext;
use cogwork_core::error::{Error, ToolError};
use cogwork_core::message::{Message, ModelToolCall};
use cogwork_core::service::{
    CompletionRequest, CompletionService, ModelTurn, ToolChoice, ToolSchema,
};
use cogwork_core::step::{Step, Transcript};
use cogwork_core::tool::ToolRegistry;

use crate::config::ExecutionMode;
use crate::strategy::{NextStep, Strategy};

/// Meta-tool for intermediate reasoning.
pub const META_THINK: &str = "think";
/// Meta-tool for invoking a registered tool.
pub const META_USE_TOOL: &str = "use_tool";
/// Meta-tool for emitting the final answer.
pub const META_FINAL_ANSWER: &str = "final_answer";

const SYSTEM_PROMPT: &str = "\
You are a reasoning agent that solves tasks step by step.\n\
Use the `think` call to record intermediate reasoning, the `use_tool` call \
to invoke one of the available tools, and the `final_answer` call when you \
have enough information to answer. Always finish with `final_answer`.";

/// The Native execution strategy.
pub struct NativeStrategy {
    service: Arc<dyn CompletionService>,
    registry: Arc<ToolRegistry>,
    tool_choice: ToolChoice,
}

impl NativeStrategy {
    pub fn new(
        service: Arc<dyn CompletionService>,
        registry: Arc<ToolRegistry>,
        tool_choice: ToolChoice,
    ) -> Self {
        Self {
            service,
            registry,
            tool_choice,
        }
    }

    /// The fixed meta-tool schemas plus one entry per registered tool.
    /// With `ToolChoice::None` the registered tools (and `use_tool`) are
    /// withheld; the model can only think and answer.
    fn callable_schemas(&self) -> Vec<ToolSchema> {
        let mut schemas = vec![
            ToolSchema {
                name: META_THINK.into(),
                description: "Record an intermediate reasoning step.".into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "reasoning": { "type": "string", "description": "The reasoning step" }
                    },
                    "required": ["reasoning"]
                }),
            },
            ToolSchema {
                name: META_FINAL_ANSWER.into(),
                description: "Provide the final answer when you have enough information.".into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "answer": { "type": "string", "description": "The final answer" },
                        "confidence": {
                            "type": "number",
                            "description": "Optional confidence between 0 and 1"
                        }
                    },
                    "required": ["answer"]
                }),
            },
        ];

        if self.tool_choice != ToolChoice::None && !self.registry.is_empty() {
            schemas.push(ToolSchema {
                name: META_USE_TOOL.into(),
                description: "Invoke one of the registered tools by name.".into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "tool_name": {
                            "type": "string",
                            "enum": self.registry.names(),
                            "description": "Name of the tool to invoke"
                        },
                        "tool_arguments": {
                            "type": "object",
                            "description": "Arguments matching the tool's schema"
                        }
                    },
                    "required": ["tool_name", "tool_arguments"]
                }),
            });
            schemas.extend(self.registry.schemas());
        }

        schemas
    }

    /// Render the transcript as provider messages. Actions become
    /// assistant turns with structured calls; their observations become
    /// tool results referencing the same call id. Orphan error
    /// observations (degraded decode failures) become user turns.
    fn render_messages(&self, task: &str, transcript: &Transcript) -> Vec<Message> {
        let mut messages = vec![Message::system(SYSTEM_PROMPT), Message::user(task)];
        let mut pending_call_id: Option<String> = None;

        for (index, entry) in transcript.entries().iter().enumerate() {
            match &entry.step {
                Step::Thought { text } => {
                    messages.push(Message::assistant(text.clone()));
                }
                Step::Action { tool, arguments } => {
                    let call_id = format!("call_{index}");
                    messages.push(Message::assistant("").with_tool_calls(vec![
                        ModelToolCall::new(call_id.clone(), tool.clone(), arguments),
                    ]));
                    pending_call_id = Some(call_id);
                }
                Step::Observation {
                    tool,
                    output,
                    is_error,
                } => match pending_call_id.take() {
                    Some(call_id) => {
                        messages.push(Message::tool_result(call_id, output.clone()));
                    }
                    None => {
                        let label = if *is_error { "error from" } else { "result of" };
                        messages.push(Message::user(format!(
                            "OBSERVATION ({label} {tool}): {output}"
                        )));
                    }
                },
                Step::Final { .. } => {}
            }
        }
        messages
    }
}

#[async_trait]
impl Strategy for NativeStrategy {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Native
    }

    async fn next_step(
        &self,
        task: &str,
        transcript: &Transcript,
        ctx: &ExecContext,
    ) -> Result<NextStep, Error> {
        let request = CompletionRequest {
            messages: self.render_messages(task, transcript),
            tools: self.callable_schemas(),
            tool_choice: self.tool_choice,
        };

        let turn = self.service.complete(request, ctx).await?;
        debug!(
            calls = turn.message.tool_calls.len(),
            "native strategy received model turn"
        );
        Ok(NextStep {
            step: decode_turn(&turn)?,
            usage: turn.usage,
        })
    }
}

/// Decode a structured model turn into exactly one step.
///
/// Precedence: `final_answer` wins over everything bundled in the same
/// turn, then `use_tool`, then a direct call to a registered tool, then
/// `think`. A turn with no calls at all is a plain-text final answer.
pub fn decode_turn(turn: &ModelTurn) -> Result<Step, Error> {
    let calls = &turn.message.tool_calls;

    if let Some(call) = calls.iter().find(|c| c.name == META_FINAL_ANSWER) {
        let args = decode_call_args(call)?;
        let answer = args
            .get("answer")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| turn.message.content.clone());
        let confidence = args
            .get("confidence")
            .and_then(|v| v.as_f64())
            .map(|v| v as f32);
        return Ok(Step::Final { answer, confidence });
    }

    if let Some(call) = calls.iter().find(|c| c.name == META_USE_TOOL) {
        let args = decode_call_args(call)?;
        let Some(tool) = args.get("tool_name").and_then(|v| v.as_str()) else {
            return Err(Error::Tool(ToolError::InvalidArguments {
                tool_name: META_USE_TOOL.into(),
                reason: "missing required field 'tool_name'".into(),
            }));
        };
        let arguments = args
            .get("tool_arguments")
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}));
        return Ok(Step::Action {
            tool: tool.to_string(),
            arguments,
        });
    }

    if let Some(call) = calls.iter().find(|c| c.name == META_THINK) {
        let args = decode_call_args(call)?;
        let text = args
            .get("reasoning")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| turn.message.content.clone());
        return Ok(Step::Thought { text });
    }

    // Some providers call registered tools directly instead of going
    // through `use_tool`. Accept that as an action.
    if let Some(call) = calls.first() {
        let arguments = decode_call_args(call)?;
        return Ok(Step::Action {
            tool: call.name.clone(),
            arguments,
        });
    }

    // A text-only turn ends the loop.
    Ok(Step::Final {
        answer: turn.message.content.trim().to_string(),
        confidence: None,
    })
}

fn decode_call_args(call: &ModelToolCall) -> Result<serde_json::Value, Error> {
    call.decode_arguments().map_err(|reason| {
        Error::Tool(ToolError::InvalidArguments {
            tool_name: call.name.clone(),
            reason,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cogwork_core::service::Usage;

    fn turn_with_calls(content: &str, calls: Vec<ModelToolCall>) -> ModelTurn {
        ModelTurn {
            message: Message::assistant(content).with_tool_calls(calls),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
        }
    }

    #[test]
    fn think_call_yields_thought() {
        let turn = turn_with_calls(
            "",
            vec![ModelToolCall::new(
                "c1",
                META_THINK,
                &serde_json::json!({"reasoning": "I need the weather"}),
            )],
        );
        match decode_turn(&turn).unwrap() {
            Step::Thought { text } => assert_eq!(text, "I need the weather"),
            other => panic!("Expected Thought, got {other:?}"),
        }
    }

    #[test]
    fn use_tool_call_yields_action() {
        let turn = turn_with_calls(
            "",
            vec![ModelToolCall::new(
                "c1",
                META_USE_TOOL,
                &serde_json::json!({
                    "tool_name": "math",
                    "tool_arguments": {"expression": "2+2"}
                }),
            )],
        );
        match decode_turn(&turn).unwrap() {
            Step::Action { tool, arguments } => {
                assert_eq!(tool, "math");
                assert_eq!(arguments["expression"], "2+2");
            }
            other => panic!("Expected Action, got {other:?}"),
        }
    }

    #[test]
    fn final_answer_wins_over_simultaneous_use_tool() {
        let turn = turn_with_calls(
            "",
            vec![
                ModelToolCall::new(
                    "c1",
                    META_USE_TOOL,
                    &serde_json::json!({"tool_name": "math", "tool_arguments": {}}),
                ),
                ModelToolCall::new(
                    "c2",
                    META_FINAL_ANSWER,
                    &serde_json::json!({"answer": "4", "confidence": 0.95}),
                ),
            ],
        );
        match decode_turn(&turn).unwrap() {
            Step::Final { answer, confidence } => {
                assert_eq!(answer, "4");
                assert!((confidence.unwrap() - 0.95).abs() < 1e-6);
            }
            other => panic!("Expected Final, got {other:?}"),
        }
    }

    #[test]
    fn text_only_turn_is_a_final_answer() {
        let turn = turn_with_calls("The answer is 4.", vec![]);
        match decode_turn(&turn).unwrap() {
            Step::Final { answer, confidence } => {
                assert_eq!(answer, "The answer is 4.");
                assert!(confidence.is_none());
            }
            other => panic!("Expected Final, got {other:?}"),
        }
    }

    #[test]
    fn direct_registered_tool_call_is_an_action() {
        let turn = turn_with_calls(
            "",
            vec![ModelToolCall::new(
                "c1",
                "weather_lookup",
                &serde_json::json!({"location": "Tokyo"}),
            )],
        );
        match decode_turn(&turn).unwrap() {
            Step::Action { tool, arguments } => {
                assert_eq!(tool, "weather_lookup");
                assert_eq!(arguments["location"], "Tokyo");
            }
            other => panic!("Expected Action, got {other:?}"),
        }
    }

    #[test]
    fn use_tool_without_tool_name_is_a_recoverable_error() {
        let turn = turn_with_calls(
            "",
            vec![ModelToolCall::new(
                "c1",
                META_USE_TOOL,
                &serde_json::json!({"tool_arguments": {}}),
            )],
        );
        let err = decode_turn(&turn).unwrap_err();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("tool_name"));
    }

    #[test]
    fn malformed_call_payload_is_a_recoverable_error() {
        let mut call = ModelToolCall::new("c1", META_USE_TOOL, &serde_json::json!({}));
        call.arguments = "{broken".into();
        let turn = turn_with_calls("", vec![call]);
        let err = decode_turn(&turn).unwrap_err();
        assert!(err.is_recoverable());
    }
}
