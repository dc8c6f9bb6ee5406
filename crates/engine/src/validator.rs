//! Pre-flight configuration validation.
//!
//! Runs exactly once, before the first completion request, and performs no
//! network or tool I/O. Every violation names the broken rule and carries
//! a corrective suggestion, so a bad setup fails fast at zero cost.

use cogwork_core::error::ConfigError;
use cogwork_core::service::ToolChoice;
use cogwork_core::tool::ToolRegistry;

use crate::config::{ExecutionConfig, ExecutionMode};

/// Validate a configuration against the registry it will run with.
pub fn validate(config: &ExecutionConfig, registry: &ToolRegistry) -> Result<(), ConfigError> {
    if config.max_iterations == 0 {
        return Err(ConfigError {
            rule: "max_iterations_positive",
            message: "max_iterations is 0; the loop could never run".into(),
            suggestion: "set max_iterations to at least 1".into(),
        });
    }

    if config.timeout.is_zero() {
        return Err(ConfigError {
            rule: "timeout_nonzero",
            message: "timeout is zero; every run would time out immediately".into(),
            suggestion: "set a positive timeout (the default is 120s)".into(),
        });
    }

    if registry.is_empty()
        && matches!(config.tool_choice, ToolChoice::Required | ToolChoice::None)
    {
        return Err(ConfigError {
            rule: "tool_choice_requires_tools",
            message: format!(
                "tool_choice is {:?} but the tool registry is empty",
                config.tool_choice
            ),
            suggestion: "register at least one tool, or use ToolChoice::Auto with an empty registry"
                .into(),
        });
    }

    // Mode contract: the free-text convention cannot force a tool call,
    // so requiring one in text mode is unsatisfiable.
    if config.mode == ExecutionMode::Text && config.tool_choice == ToolChoice::Required {
        return Err(ConfigError {
            rule: "text_mode_tool_choice",
            message: "text mode cannot enforce ToolChoice::Required".into(),
            suggestion: "use ExecutionMode::Native with Required, or ToolChoice::Auto in text mode"
                .into(),
        });
    }

    Ok(())
}
