//! Echo tool — returns its input unchanged.
//!
//! Mostly useful for wiring tests and demos: it exercises the full
//! dispatch path (schema validation, invocation, observation) with no
//! external effects.

use async_trait::async_trait;
use std::collections::BTreeMap;

use cogwork_core::context::ExecContext;
use cogwork_core::error::ToolError;
use cogwork_core::tool::{ParamSpec, ParamType, Tool, ToolOutput};

pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Return the given text unchanged. Optionally repeat it."
    }

    fn parameters(&self) -> BTreeMap<String, ParamSpec> {
        BTreeMap::from([
            (
                "text".to_string(),
                ParamSpec::required(ParamType::String, "The text to echo back"),
            ),
            (
                "repeat".to_string(),
                ParamSpec::optional(ParamType::Integer, "How many times to repeat (default 1)"),
            ),
        ])
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        _ctx: &ExecContext,
    ) -> Result<ToolOutput, ToolError> {
        let text = arguments["text"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments {
                tool_name: "echo".into(),
                reason: "missing 'text' argument".into(),
            })?;
        let repeat = arguments["repeat"].as_u64().unwrap_or(1).clamp(1, 100) as usize;

        let output = std::iter::repeat_n(text, repeat)
            .collect::<Vec<_>>()
            .join(" ");
        Ok(ToolOutput::ok(output))
    }
}
