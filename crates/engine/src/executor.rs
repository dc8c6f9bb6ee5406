//! Tool executor — resolves a requested tool and invokes its handler.
//!
//! Every failure mode (unknown name, bad arguments, handler failure)
//! yields a distinct error observation fed back into the transcript;
//! nothing here is raised to the caller directly. No retry is performed
//! at this layer — a retry is a reasoning-level decision the model makes
//! by re-issuing a corrected action on a later turn.

use std::sync::Arc;
use tracing::{debug, warn};

use cogwork_core::context::ExecContext;
use cogwork_core::error::ToolError;
use cogwork_core::step::Step;
use cogwork_core::tool::{ToolDescriptor, ToolRegistry};

/// The outcome of one dispatch: the observation to append, the error that
/// produced it (if any), and how long the handler ran.
#[derive(Debug)]
pub struct ExecutorOutcome {
    pub observation: Step,
    pub error: Option<ToolError>,
    pub duration_ms: u64,
}

/// Resolves tool identifiers against the registry and dispatches calls.
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    namespace_prefixes: Vec<String>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, namespace_prefixes: Vec<String>) -> Self {
        Self {
            registry,
            namespace_prefixes,
        }
    }

    /// Strip recognized leading namespace prefixes from a qualified
    /// identifier. `functions.math` resolves to `math`; unrecognized
    /// segments are kept, so a tool legitimately named `a.b` still
    /// resolves when registered under that exact name.
    pub fn normalize<'a>(&self, raw: &'a str) -> &'a str {
        let mut name = raw;
        while let Some((head, rest)) = name.split_once('.') {
            if self.namespace_prefixes.iter().any(|p| p == head) {
                name = rest;
            } else {
                break;
            }
        }
        name
    }

    /// Execute one requested action, producing the observation to feed
    /// back into the transcript.
    pub async fn dispatch(
        &self,
        requested: &str,
        arguments: &serde_json::Value,
        ctx: &ExecContext,
    ) -> ExecutorOutcome {
        let name = self.normalize(requested);

        let Some(tool) = self.registry.get(name) else {
            warn!(requested, normalized = name, "tool not found");
            let error = ToolError::NotFound(name.to_string());
            return ExecutorOutcome {
                observation: error_observation(requested, &error),
                error: Some(error),
                duration_ms: 0,
            };
        };

        let descriptor = tool.descriptor();
        if let Err(reason) = check_arguments(&descriptor, arguments) {
            let error = ToolError::InvalidArguments {
                tool_name: name.to_string(),
                reason,
            };
            return ExecutorOutcome {
                observation: error_observation(name, &error),
                error: Some(error),
                duration_ms: 0,
            };
        }

        debug!(tool = name, "dispatching tool");
        let start = std::time::Instant::now();
        let result = tool.execute(arguments.clone(), ctx).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(output) if output.success => ExecutorOutcome {
                observation: Step::Observation {
                    tool: name.to_string(),
                    output: output.output,
                    is_error: false,
                },
                error: None,
                duration_ms,
            },
            Ok(output) => {
                // The handler ran but reported failure.
                let error = ToolError::ExecutionFailed {
                    tool_name: name.to_string(),
                    reason: output.output.clone(),
                };
                ExecutorOutcome {
                    observation: Step::Observation {
                        tool: name.to_string(),
                        output: output.output,
                        is_error: true,
                    },
                    error: Some(error),
                    duration_ms,
                }
            }
            Err(error) => ExecutorOutcome {
                observation: error_observation(name, &error),
                error: Some(error),
                duration_ms,
            },
        }
    }
}

/// Validate arguments against the tool's declared parameter schema.
fn check_arguments(
    descriptor: &ToolDescriptor,
    arguments: &serde_json::Value,
) -> Result<(), String> {
    let object = match arguments {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null if descriptor.parameters.values().all(|p| !p.required) => {
            return Ok(());
        }
        other => {
            return Err(format!(
                "arguments must be an object, got {}",
                json_type_name(other)
            ));
        }
    };

    for (name, spec) in &descriptor.parameters {
        match object.get(name) {
            Some(value) => {
                if !spec.param_type.accepts(value) {
                    return Err(format!(
                        "parameter '{name}' expects {}, got {}",
                        spec.param_type.json_name(),
                        json_type_name(value)
                    ));
                }
            }
            None if spec.required => {
                return Err(format!("missing required parameter '{name}'"));
            }
            None => {}
        }
    }
    Ok(())
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Build the error observation fed back to the model. Carries the name as
/// the model referred to it, so it can self-correct.
fn error_observation(tool: &str, error: &ToolError) -> Step {
    Step::Observation {
        tool: tool.to_string(),
        output: format!("Error: {error}"),
        is_error: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cogwork_core::tool::{ParamSpec, ParamType, Tool, ToolOutput};
    use std::collections::BTreeMap;

    struct AddTool;

    #[async_trait]
    impl Tool for AddTool {
        fn name(&self) -> &str {
            "add"
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

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "flaky"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn parameters(&self) -> BTreeMap<String, ParamSpec> {
            BTreeMap::new()
        }
        async fn execute(
            &self,
            _arguments: serde_json::Value,
            _ctx: &ExecContext,
        ) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::fail("upstream service unavailable"))
        }
    }

    fn executor() -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(AddTool));
        registry.register(Box::new(FailingTool));
        ToolExecutor::new(
            Arc::new(registry),
            vec!["functions".into(), "tools".into()],
        )
    }

    #[test]
    fn normalize_strips_recognized_prefixes() {
        let ex = executor();
        assert_eq!(ex.normalize("functions.add"), "add");
        assert_eq!(ex.normalize("tools.functions.add"), "add");
        assert_eq!(ex.normalize("add"), "add");
        // Unrecognized segments stay put.
        assert_eq!(ex.normalize("custom.add"), "custom.add");
        assert_eq!(ex.normalize("functions.custom.add"), "custom.add");
    }

    #[tokio::test]
    async fn dispatch_qualified_name_resolves_and_runs() {
        let ex = executor();
        let ctx = ExecContext::new();
        let outcome = ex
            .dispatch("functions.add", &serde_json::json!({"a": 2, "b": 3}), &ctx)
            .await;
        assert!(outcome.error.is_none());
        match outcome.observation {
            Step::Observation {
                tool,
                output,
                is_error,
            } => {
                assert_eq!(tool, "add");
                assert_eq!(output, "5");
                assert!(!is_error);
            }
            other => panic!("Expected Observation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_tool_yields_not_found_observation_with_requested_name() {
        let ex = executor();
        let ctx = ExecContext::new();
        let outcome = ex
            .dispatch("functions.subtract", &serde_json::json!({}), &ctx)
            .await;
        assert!(matches!(outcome.error, Some(ToolError::NotFound(_))));
        match outcome.observation {
            Step::Observation {
                tool, is_error, ..
            } => {
                assert_eq!(tool, "functions.subtract");
                assert!(is_error);
            }
            other => panic!("Expected Observation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_required_argument_is_invalid_arguments() {
        let ex = executor();
        let ctx = ExecContext::new();
        let outcome = ex.dispatch("add", &serde_json::json!({"a": 2}), &ctx).await;
        match &outcome.error {
            Some(ToolError::InvalidArguments { reason, .. }) => {
                assert!(reason.contains("'b'"));
            }
            other => panic!("Expected InvalidArguments, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn type_mismatch_is_invalid_arguments() {
        let ex = executor();
        let ctx = ExecContext::new();
        let outcome = ex
            .dispatch("add", &serde_json::json!({"a": 2, "b": "three"}), &ctx)
            .await;
        match &outcome.error {
            Some(ToolError::InvalidArguments { reason, .. }) => {
                assert!(reason.contains("integer"));
                assert!(reason.contains("string"));
            }
            other => panic!("Expected InvalidArguments, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn handler_reported_failure_is_execution_failed() {
        let ex = executor();
        let ctx = ExecContext::new();
        let outcome = ex.dispatch("flaky", &serde_json::json!({}), &ctx).await;
        assert!(matches!(
            outcome.error,
            Some(ToolError::ExecutionFailed { .. })
        ));
        match outcome.observation {
            Step::Observation {
                output, is_error, ..
            } => {
                assert!(is_error);
                assert!(output.contains("upstream service unavailable"));
            }
            other => panic!("Expected Observation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn null_arguments_accepted_when_nothing_is_required() {
        let ex = executor();
        let ctx = ExecContext::new();
        let outcome = ex.dispatch("flaky", &serde_json::Value::Null, &ctx).await;
        // Reaches the handler (which then reports its own failure).
        assert!(matches!(
            outcome.error,
            Some(ToolError::ExecutionFailed { .. })
        ));
    }
}
