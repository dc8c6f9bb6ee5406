//! Shared test helpers for engine tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cogwork_core::context::ExecContext;
use cogwork_core::error::{ServiceError, ToolError};
use cogwork_core::message::{Message, ModelToolCall};
use cogwork_core::service::{CompletionRequest, CompletionService, ModelTurn, Usage};
use cogwork_core::tool::{ParamSpec, ParamType, Tool, ToolOutput, ToolRegistry};

/// A mock completion service that returns a sequence of scripted turns.
///
/// Each call to `complete` returns the next turn in the queue. Panics if
/// more calls are made than turns provided.
pub struct SequentialMockService {
    turns: Mutex<Vec<ModelTurn>>,
    calls: Arc<Mutex<usize>>,
    failure: Option<String>,
}

impl SequentialMockService {
    pub fn new(turns: Vec<ModelTurn>) -> Self {
        Self {
            turns: Mutex::new(turns),
            calls: Arc::new(Mutex::new(0)),
            failure: None,
        }
    }

    /// A service whose every call fails with a network error.
    pub fn failing(message: &str) -> Self {
        Self {
            turns: Mutex::new(Vec::new()),
            calls: Arc::new(Mutex::new(0)),
            failure: Some(message.to_string()),
        }
    }

    /// Shared handle to the number of `complete` calls made.
    pub fn call_count_handle(&self) -> Arc<Mutex<usize>> {
        self.calls.clone()
    }
}

#[async_trait]
impl CompletionService for SequentialMockService {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(
        &self,
        _request: CompletionRequest,
        _ctx: &ExecContext,
    ) -> Result<ModelTurn, ServiceError> {
        let mut count = self.calls.lock().unwrap();
        *count += 1;

        if let Some(message) = &self.failure {
            return Err(ServiceError::Network(message.clone()));
        }

        let turns = self.turns.lock().unwrap();
        if *count > turns.len() {
            panic!(
                "SequentialMockService: no more turns (call #{}, have {})",
                *count,
                turns.len()
            );
        }
        Ok(turns[*count - 1].clone())
    }
}

fn fixed_usage() -> Usage {
    Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    }
}

/// A turn with plain text content and no structured calls.
pub fn text_turn(content: &str) -> ModelTurn {
    ModelTurn {
        message: Message::assistant(content),
        usage: Some(fixed_usage()),
    }
}

/// A turn calling the `think` meta-tool.
pub fn think_turn(reasoning: &str) -> ModelTurn {
    ModelTurn {
        message: Message::assistant("").with_tool_calls(vec![ModelToolCall::new(
            "call_think",
            "think",
            &serde_json::json!({"reasoning": reasoning}),
        )]),
        usage: Some(fixed_usage()),
    }
}

/// A turn calling the `use_tool` meta-tool.
pub fn use_tool_turn(tool: &str, arguments: serde_json::Value) -> ModelTurn {
    ModelTurn {
        message: Message::assistant("").with_tool_calls(vec![ModelToolCall::new(
            "call_use",
            "use_tool",
            &serde_json::json!({"tool_name": tool, "tool_arguments": arguments}),
        )]),
        usage: Some(fixed_usage()),
    }
}

/// A turn calling the `final_answer` meta-tool.
pub fn final_turn(answer: &str, confidence: Option<f32>) -> ModelTurn {
    let mut args = serde_json::json!({"answer": answer});
    if let Some(c) = confidence {
        args["confidence"] = serde_json::json!(c);
    }
    ModelTurn {
        message: Message::assistant("").with_tool_calls(vec![ModelToolCall::new(
            "call_final",
            "final_answer",
            &args,
        )]),
        usage: Some(fixed_usage()),
    }
}

/// A registry with a single `adder` tool.
pub fn test_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(AdderTool));
    registry
}

/// Adds two integers. The standard test tool.
pub struct AdderTool;

#[async_trait]
impl Tool for AdderTool {
    fn name(&self) -> &str {
        "adder"
    }
    fn description(&self) -> &str {
        "Add two integers"
    }
    fn parameters(&self) -> BTreeMap<String, ParamSpec> {
        BTreeMap::from([
            (
                "a".to_string(),
                ParamSpec::required(ParamType::Integer, "First operand"),
            ),
            (
                "b".to_string(),
                ParamSpec::required(ParamType::Integer, "Second operand"),
            ),
        ])
    }
    async fn execute(
        &self,
        arguments: serde_json::Value,
        _ctx: &ExecContext,
    ) -> Result<ToolOutput, ToolError> {
        let a = arguments["a"].as_i64().unwrap_or(0);
        let b = arguments["b"].as_i64().unwrap_or(0);
        Ok(ToolOutput::ok((a + b).to_string()))
    }
}

/// A tool that sleeps before answering, for deadline tests.
pub struct SlowTool {
    delay: Duration,
}

impl SlowTool {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &str {
        "slow"
    }
    fn description(&self) -> &str {
        "Sleeps, then answers"
    }
    fn parameters(&self) -> BTreeMap<String, ParamSpec> {
        BTreeMap::new()
    }
    async fn execute(
        &self,
        _arguments: serde_json::Value,
        _ctx: &ExecContext,
    ) -> Result<ToolOutput, ToolError> {
        tokio::time::sleep(self.delay).await;
        Ok(ToolOutput::ok("finally done"))
    }
}
