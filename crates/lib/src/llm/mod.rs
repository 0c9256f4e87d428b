//! LLM abstraction and Ollama client.
//!
//! The tool loop talks to any [`LlmBackend`]; [`OllamaClient`] is the production one.
//! [`ToolCallExtractor`] turns a model reply into tool requests, either from native
//! structured `tool_calls` or, in fallback mode, from `<tool_call>` blocks in the text.

mod extract;
mod ollama;

use async_trait::async_trait;
use std::time::Duration;

pub use extract::{ToolCallExtractor, ToolRequest};
pub use ollama::{
    ChatMessage, ChatResponse, OllamaClient, OllamaModel, ToolCall, ToolCallFunction,
    ToolDefinition, ToolFunctionDefinition,
};

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("model request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("model api error: {0}")]
    Api(String),
    #[error("model request timed out after {0:?}")]
    Timeout(Duration),
}

/// A chat-completion endpoint with optional function calling.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// One non-streaming completion. `tools: None` forces a text-only answer.
    async fn chat(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        tools: Option<Vec<ToolDefinition>>,
    ) -> Result<ChatResponse, LlmError>;
}
