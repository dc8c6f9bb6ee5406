//! Tool trait — the abstraction over the engine's capabilities.
//!
//! Tools are what give the reasoning loop the ability to act in the world.
//! Each tool declares a typed parameter schema; the executor validates the
//! model's arguments against it before the handler runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::context::ExecContext;
use crate::error::ToolError;
use crate::service::ToolSchema;

/// The declared type of one tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    /// The JSON Schema type name.
    pub fn json_name(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
        }
    }

    /// Whether a JSON value conforms to this type.
    pub fn accepts(&self, value: &serde_json::Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Object => value.is_object(),
            ParamType::Array => value.is_array(),
        }
    }
}

/// Declaration of one tool parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
}

impl ParamSpec {
    /// A required parameter.
    pub fn required(param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            param_type,
            description: description.into(),
            required: true,
        }
    }

    /// An optional parameter.
    pub fn optional(param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            param_type,
            description: description.into(),
            required: false,
        }
    }
}

/// Everything the engine needs to know about a tool without invoking it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique name within the registry.
    pub name: String,

    /// Human description (sent to the model).
    pub description: String,

    /// Parameter declarations, keyed by parameter name. Ordered so the
    /// rendered schema is deterministic.
    pub parameters: BTreeMap<String, ParamSpec>,
}

impl ToolDescriptor {
    /// Render the JSON Schema the completion service expects.
    pub fn json_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for (name, spec) in &self.parameters {
            properties.insert(
                name.clone(),
                serde_json::json!({
                    "type": spec.param_type.json_name(),
                    "description": spec.description,
                }),
            );
            if spec.required {
                required.push(serde_json::Value::String(name.clone()));
            }
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Convert into the wire schema sent to the model.
    pub fn to_schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.json_schema(),
        }
    }
}

/// The result of a tool handler invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Whether the handler succeeded.
    pub success: bool,

    /// The output text fed back into the transcript.
    pub output: String,

    /// Optional structured data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolOutput {
    /// A successful output.
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            data: None,
        }
    }

    /// A handler-reported failure.
    pub fn fail(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            data: None,
        }
    }

    /// Attach structured data.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// The core Tool trait.
///
/// Tools are registered in the [`ToolRegistry`] and dispatched by the
/// engine's executor when the model requests them.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g. "math", "echo").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// Parameter declarations for this tool.
    fn parameters(&self) -> BTreeMap<String, ParamSpec>;

    /// Execute the tool with validated arguments. Long-running handlers
    /// should observe `ctx.cancellation` and bail out cooperatively.
    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &ExecContext,
    ) -> std::result::Result<ToolOutput, ToolError>;

    /// Full descriptor for this tool.
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// A registry of available tools.
///
/// Constructed once before a loop starts and read-only for the lifetime of
/// every execution that shares it, so concurrent runs need no locking.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by exact name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Descriptor for a tool by exact name.
    pub fn descriptor(&self, name: &str) -> Option<ToolDescriptor> {
        self.get(name).map(|t| t.descriptor())
    }

    /// All wire schemas (for sending to the model).
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> =
            self.tools.values().map(|t| t.descriptor().to_schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// All registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
