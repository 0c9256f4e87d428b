//! Tool loop: call the model with tools attached, run any requested tools, feed results back,
//! until the model answers in text or the iteration cap is reached.
//!
//! At the cap one more call is made with tools withheld, so a run makes at most
//! `max_iterations + 1` model calls. Each model call is bounded by a timeout; a model failure
//! ends the run, a tool failure becomes text the model can see.

use serde_json::{Map, Value};
use std::time::Duration;

use crate::config::AgentConfig;
use crate::llm::{ChatMessage, LlmBackend, LlmError, ToolCallExtractor, ToolDefinition};
use crate::tools::{truncate_tool_result, ToolError, ToolExecutor};

/// One tool invocation made during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRecord {
    pub name: String,
    pub arguments: Map<String, Value>,
    /// Result text as placed in context (already truncated).
    pub result: String,
    /// Model round-trip (0-based) that requested the call.
    pub iteration_index: usize,
}

/// Outcome of one run.
#[derive(Debug, Clone)]
pub struct AgentTurnResult {
    pub content: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub model_calls: usize,
    /// True when the answer came from the forced text-only call.
    pub hit_iteration_cap: bool,
}

/// Per-run knobs, taken from config.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub model: String,
    pub max_iterations: usize,
    pub model_timeout: Duration,
    pub extractor: ToolCallExtractor,
}

impl LoopSettings {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            model: config.model.trim().to_string(),
            max_iterations: config.max_tool_iterations.max(1),
            model_timeout: Duration::from_secs(config.model_timeout_secs),
            extractor: ToolCallExtractor::from_fallback_flag(config.tool_use_fallback),
        }
    }
}

async fn call_model(
    backend: &dyn LlmBackend,
    settings: &LoopSettings,
    messages: &[ChatMessage],
    tools: Option<Vec<ToolDefinition>>,
) -> Result<ChatMessage, LlmError> {
    let res = tokio::time::timeout(
        settings.model_timeout,
        backend.chat(&settings.model, messages.to_vec(), tools),
    )
    .await
    .map_err(|_| LlmError::Timeout(settings.model_timeout))??;
    Ok(res
        .message
        .unwrap_or_else(|| ChatMessage::assistant("", None)))
}

/// Text the model sees for a failed tool call.
fn tool_error_text(err: &ToolError) -> String {
    match err {
        ToolError::UnknownTool(_) => err.to_string(),
        _ => format!("Tool error: {}", err),
    }
}

/// Run the loop over an initial message set. `tag` prefixes log lines for this invocation.
pub async fn run_tool_loop(
    backend: &dyn LlmBackend,
    tools: &dyn ToolExecutor,
    settings: &LoopSettings,
    mut messages: Vec<ChatMessage>,
    tag: &str,
) -> Result<AgentTurnResult, LlmError> {
    let definitions = tools.definitions();
    let mut records: Vec<ToolCallRecord> = Vec::new();
    log::info!("[{}] agent: model {} with {} tools", tag, settings.model, definitions.len());

    for iteration in 0..settings.max_iterations {
        let reply = call_model(backend, settings, &messages, Some(definitions.clone())).await?;
        let requests = settings.extractor.extract(&reply);
        if requests.is_empty() {
            log::info!("[{}] agent: answer after {} model call(s)", tag, iteration + 1);
            return Ok(AgentTurnResult {
                content: reply.content.trim().to_string(),
                tool_calls: records,
                model_calls: iteration + 1,
                hit_iteration_cap: false,
            });
        }

        log::info!("[{}] agent: round {} requested {} tool call(s)", tag, iteration, requests.len());
        messages.push(ChatMessage::assistant(reply.content.clone(), reply.tool_calls.clone()));

        for request in requests {
            let result = match tools.execute(&request.name, &request.arguments).await {
                Ok(out) => out,
                Err(e) => {
                    log::warn!("[{}] agent: tool {} failed: {}", tag, request.name, e);
                    tool_error_text(&e)
                }
            };
            let result = truncate_tool_result(&result);
            log::debug!("[{}] agent: tool {} returned {} chars", tag, request.name, result.len());
            messages.push(ChatMessage::tool(request.name.clone(), result.clone()));

            if let Some(pause) = tools.cooldown(&request.name) {
                log::debug!("[{}] agent: cooling down {:?} after {}", tag, pause, request.name);
                tokio::time::sleep(pause).await;
            }
            records.push(ToolCallRecord {
                name: request.name,
                arguments: request.arguments,
                result,
                iteration_index: iteration,
            });
        }
    }

    log::warn!(
        "[{}] agent: reached {} tool iterations, final call without tools",
        tag,
        settings.max_iterations
    );
    let reply = call_model(backend, settings, &messages, None).await?;
    Ok(AgentTurnResult {
        content: reply.content.trim().to_string(),
        tool_calls: records,
        model_calls: settings.max_iterations + 1,
        hit_iteration_cap: true,
    })
}
