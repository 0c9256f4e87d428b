//! Tool layer: a fixed registry mapping tool names to typed adapters, validated at registration.
//!
//! The orchestrator only sees [`ToolExecutor`]; [`ToolRegistry`] is the production implementation.

mod fetch_page;
mod html;
mod transcript;
mod web_search;

pub use crate::llm::ToolDefinition;
pub use fetch_page::FetchPageTool;
pub use transcript::TranscriptTool;
pub use web_search::WebSearchTool;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ToolsConfig;
use crate::llm::ToolFunctionDefinition;

/// Upper bound for any single tool result placed in the model context.
/// Adapters cap their own bodies at [`ADAPTER_BODY_CHARS`]; this leaves room for their prefix and marker.
pub const MAX_TOOL_RESULT_CHARS: usize = 16_000;

/// Body cap used by the page and transcript adapters.
pub const ADAPTER_BODY_CHARS: usize = 15_000;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
    #[error("{0}")]
    Failed(String),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("cannot register tool: {0}")]
    Registration(String),
}

/// One content-acquisition tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description and JSON-schema parameters sent to the model.
    fn definition(&self) -> ToolDefinition;

    /// Run with already-decoded arguments. Graceful "nothing found" outcomes are `Ok` text.
    async fn call(&self, args: &Map<String, Value>) -> Result<String, ToolError>;

    /// Pause the invocation must take after calling this tool.
    fn cooldown(&self) -> Option<Duration> {
        None
    }
}

/// Executes tools by name for the orchestrator.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    fn definitions(&self) -> Vec<ToolDefinition>;
    async fn execute(&self, name: &str, args: &Map<String, Value>) -> Result<String, ToolError>;
    fn cooldown(&self, name: &str) -> Option<Duration>;
}

/// Name -> tool mapping. Definitions keep registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with web_search, get_transcript and fetch_page.
    pub fn with_default_tools(config: &ToolsConfig) -> Result<Self, ToolError> {
        let mut registry = Self::new();
        registry.register(Arc::new(WebSearchTool::new(config)))?;
        registry.register(Arc::new(TranscriptTool::new()))?;
        registry.register(Arc::new(FetchPageTool::new()))?;
        Ok(registry)
    }

    /// Add a tool after checking its schema. Names must be unique.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let def = tool.definition();
        validate_definition(&def)?;
        let name = def.function.name.clone();
        if self.by_name.contains_key(&name) {
            return Err(ToolError::Registration(format!("duplicate tool name {}", name)));
        }
        self.by_name.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn names(&self) -> Vec<String> {
        self.tools
            .iter()
            .map(|t| t.definition().function.name)
            .collect()
    }

    fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.by_name.get(name).and_then(|&i| self.tools.get(i))
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    async fn execute(&self, name: &str, args: &Map<String, Value>) -> Result<String, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        check_required(&tool.definition(), args)?;
        tool.call(args).await
    }

    fn cooldown(&self, name: &str) -> Option<Duration> {
        self.get(name).and_then(|t| t.cooldown())
    }
}

/// Schema must be an object schema whose required keys are all declared properties.
fn validate_definition(def: &ToolDefinition) -> Result<(), ToolError> {
    let name = def.function.name.trim();
    if name.is_empty() {
        return Err(ToolError::Registration("tool name is empty".to_string()));
    }
    let params = &def.function.parameters;
    if params.get("type").and_then(Value::as_str) != Some("object") {
        return Err(ToolError::Registration(format!(
            "{}: parameters must be an object schema",
            name
        )));
    }
    let properties = params
        .get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| ToolError::Registration(format!("{}: parameters.properties missing", name)))?;
    for key in required_keys(params) {
        if !properties.contains_key(key) {
            return Err(ToolError::Registration(format!(
                "{}: required parameter {} is not declared",
                name, key
            )));
        }
    }
    Ok(())
}

fn required_keys(params: &Value) -> impl Iterator<Item = &str> {
    params
        .get("required")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

fn check_required(def: &ToolDefinition, args: &Map<String, Value>) -> Result<(), ToolError> {
    for key in required_keys(&def.function.parameters) {
        if args.get(key).map_or(true, Value::is_null) {
            return Err(ToolError::InvalidArguments {
                tool: def.function.name.clone(),
                message: format!("missing required parameter {}", key),
            });
        }
    }
    Ok(())
}

/// Build a function-tool definition.
pub fn function_definition(name: &str, description: &str, parameters: Value) -> ToolDefinition {
    ToolDefinition {
        typ: "function".to_string(),
        function: ToolFunctionDefinition {
            name: name.to_string(),
            description: Some(description.to_string()),
            parameters,
        },
    }
}

/// Required string argument, trimmed and non-empty.
pub(crate) fn string_arg<'a>(
    tool: &str,
    args: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::InvalidArguments {
            tool: tool.to_string(),
            message: format!("{} must be a non-empty string", key),
        })
}

/// Cut `text` to `max` chars and append a `[<what> truncated at N characters]` marker.
pub fn truncate_chars(text: &str, max: usize, what: &str) -> String {
    match text.char_indices().nth(max) {
        None => text.to_string(),
        Some((end, _)) => format!(
            "{}\n\n[{} truncated at {} characters]",
            &text[..end],
            what,
            group_thousands(max)
        ),
    }
}

/// Uniform cap applied to every tool result before it enters the model context.
pub fn truncate_tool_result(text: &str) -> String {
    truncate_chars(text, MAX_TOOL_RESULT_CHARS, "Tool output")
}

fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
