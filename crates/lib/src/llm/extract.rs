//! Tool-call extraction from a model reply.
//!
//! Native mode trusts the structured `tool_calls` field only. Fallback mode also accepts
//! `<tool_call>{"name": .., "arguments": {..}}</tool_call>` blocks embedded in the text,
//! for models served without function-calling support. Both produce [`ToolRequest`]s.

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::llm::ChatMessage;

/// One tool invocation requested by the model, with arguments decoded to an object.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolRequest {
    pub name: String,
    pub arguments: Map<String, Value>,
}

/// How tool calls are read out of a model reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolCallExtractor {
    /// Structured `tool_calls` only.
    #[default]
    Native,
    /// Structured `tool_calls` when present, otherwise `<tool_call>` blocks in the text.
    TextFallback,
}

impl ToolCallExtractor {
    pub fn from_fallback_flag(tool_use_fallback: bool) -> Self {
        if tool_use_fallback {
            Self::TextFallback
        } else {
            Self::Native
        }
    }

    /// Tool requests in this reply; empty means the reply is a candidate final answer.
    pub fn extract(&self, message: &ChatMessage) -> Vec<ToolRequest> {
        let native: Vec<ToolRequest> = message
            .tool_calls
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .filter(|c| !c.function.name.trim().is_empty())
            .map(|c| ToolRequest {
                name: c.function.name.trim().to_string(),
                arguments: decode_arguments(&c.function.arguments),
            })
            .collect();
        if !native.is_empty() {
            return native;
        }
        match self {
            Self::Native => Vec::new(),
            Self::TextFallback => parse_tool_calls_from_text(&message.content),
        }
    }
}

/// Arguments may arrive as an object or as a JSON-encoded string; anything else is empty.
fn decode_arguments(raw: &Value) -> Map<String, Value> {
    match raw {
        Value::Object(map) => map.clone(),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => map,
            _ => {
                log::warn!("tool call arguments are not a JSON object, using none");
                Map::new()
            }
        },
        _ => Map::new(),
    }
}

#[derive(Debug, Deserialize)]
struct TextToolCall {
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: Value,
}

fn tool_call_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?s)<tool_call>(.*?)</tool_call>").ok())
        .as_ref()
}

/// Extract `<tool_call>{..}</tool_call>` blocks. Malformed blocks are logged and skipped.
pub fn parse_tool_calls_from_text(text: &str) -> Vec<ToolRequest> {
    let Some(pattern) = tool_call_pattern() else {
        return Vec::new();
    };
    pattern
        .captures_iter(text)
        .filter_map(|cap| {
            let raw = cap.get(1)?.as_str().trim();
            match serde_json::from_str::<TextToolCall>(raw) {
                Ok(call) if !call.name.trim().is_empty() => Some(ToolRequest {
                    name: call.name.trim().to_string(),
                    arguments: decode_arguments(&call.arguments),
                }),
                Ok(_) => {
                    log::warn!("tool_call block without a name, skipping");
                    None
                }
                Err(e) => {
                    log::warn!("failed to parse tool_call block: {}", e);
                    None
                }
            }
        })
        .collect()
}
