//! Execution configuration for one loop run.

use cogwork_core::service::ToolChoice;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The step-decoding strategy used for a run. Selected once at
/// configuration time; never switched mid-execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Structured function calling via the three meta-tools
    /// (`think`, `use_tool`, `final_answer`).
    Native,
    /// Free-text line convention (`THOUGHT:` / `ACTION:` / `FINAL:`)
    /// decoded by the action parser.
    Text,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Native => "native",
            ExecutionMode::Text => "text",
        }
    }
}

/// Configuration for one loop execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Which strategy decodes model output into steps.
    pub mode: ExecutionMode,

    /// Maximum number of iterations (tool dispatches and degraded
    /// failures) before the run terminates `Exhausted`.
    pub max_iterations: u32,

    /// Wall-clock budget for the whole run.
    pub timeout: Duration,

    /// Abort on recoverable errors instead of degrading them to error
    /// observations.
    pub strict: bool,

    /// Tool-use steering passed through to the completion service.
    pub tool_choice: ToolChoice,

    /// Namespace prefixes recognized (and stripped) when normalizing tool
    /// identifiers, e.g. `functions` in `functions.math`. Nothing beyond
    /// this list is ever inferred.
    pub namespace_prefixes: Vec<String>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Native,
            max_iterations: 10,
            timeout: Duration::from_secs(120),
            strict: false,
            tool_choice: ToolChoice::Auto,
            namespace_prefixes: vec!["functions".into(), "tools".into()],
        }
    }
}

impl ExecutionConfig {
    /// Config for text-mode execution with defaults otherwise.
    pub fn text() -> Self {
        Self {
            mode: ExecutionMode::Text,
            ..Self::default()
        }
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = choice;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ExecutionConfig::default();
        assert_eq!(config.mode, ExecutionMode::Native);
        assert_eq!(config.max_iterations, 10);
        assert!(!config.strict);
        assert_eq!(config.tool_choice, ToolChoice::Auto);
        assert_eq!(config.namespace_prefixes, vec!["functions", "tools"]);
    }

    #[test]
    fn builder_chain() {
        let config = ExecutionConfig::text()
            .with_max_iterations(3)
            .with_strict(true)
            .with_tool_choice(ToolChoice::None);
        assert_eq!(config.mode, ExecutionMode::Text);
        assert_eq!(config.max_iterations, 3);
        assert!(config.strict);
        assert_eq!(config.tool_choice, ToolChoice::None);
    }

    #[test]
    fn config_serialization_roundtrip() {
        let config = ExecutionConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: ExecutionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.mode, ExecutionMode::Native);
        assert_eq!(back.timeout, Duration::from_secs(120));
    }
}
