//! Error types for the Cogwork domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant. Errors are plain
//! structured data carried as return values — there is no process-wide
//! error state anywhere in the engine.

use thiserror::Error;

/// The top-level error type for all Cogwork operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Configuration errors (pre-flight only) ---
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // --- Completion service errors ---
    #[error("Completion service error: {0}")]
    Service(#[from] ServiceError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Text-mode decode errors ---
    #[error("Parse error: {0}")]
    Parse(String),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the loop may continue after this error by degrading it to an
    /// error observation (non-strict mode). Service failures and
    /// configuration errors are always fatal.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Parse(_) | Error::Tool(_))
    }
}

// --- Bounded context errors ---

/// A pre-flight configuration violation.
///
/// Carries the violated rule, a human-readable message, and a corrective
/// suggestion so callers can fix their setup without reading engine source.
#[derive(Debug, Clone, Error)]
#[error("rule '{rule}' violated: {message} (suggestion: {suggestion})")]
pub struct ConfigError {
    /// Stable identifier of the violated rule.
    pub rule: &'static str,

    /// What went wrong.
    pub message: String,

    /// How to fix it.
    pub suggestion: String,
}

#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Service not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Response interrupted: {0}")]
    Interrupted(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {tool_name}: {reason}")]
    InvalidArguments { tool_name: String, reason: String },

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

impl ToolError {
    /// The tool name this error refers to.
    pub fn tool_name(&self) -> &str {
        match self {
            ToolError::NotFound(name) => name,
            ToolError::InvalidArguments { tool_name, .. } => tool_name,
            ToolError::ExecutionFailed { tool_name, .. } => tool_name,
        }
    }
}
