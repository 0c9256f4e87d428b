//! Ollama API client (http://localhost:11434 by default).

use crate::llm::{LlmBackend, LlmError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
/// Bound for the startup model listing; chat calls are bounded by the agent loop instead.
const TAGS_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for Ollama HTTP API.
#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
    tags_timeout: Duration,
}

impl OllamaClient {
    pub fn new(base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            client: reqwest::Client::new(),
            tags_timeout: TAGS_TIMEOUT,
        }
    }

    /// Override the model listing timeout.
    pub fn with_tags_timeout(mut self, timeout: Duration) -> Self {
        self.tags_timeout = timeout;
        self
    }

    /// GET /api/tags: list installed models.
    pub async fn list_models(&self) -> Result<Vec<OllamaModel>, LlmError> {
        let url = format!("{}/api/tags", self.base_url);
        let res = self
            .client
            .get(&url)
            .timeout(self.tags_timeout)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("{} {}", status, body)));
        }
        let data: TagsResponse = res.json().await?;
        Ok(data.models.unwrap_or_default())
    }

    /// POST /api/chat: non-streaming chat completion. Optionally pass tools for function calling.
    pub async fn chat(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        tools: Option<Vec<ToolDefinition>>,
    ) -> Result<ChatResponse, LlmError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model: model.to_string(),
            messages,
            stream: false,
            tools: tools.filter(|t| !t.is_empty()),
        };
        let res = self.client.post(&url).json(&body).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("{} {}", status, body)));
        }
        let data: ChatResponse = res.json().await?;
        Ok(data)
    }
}

#[async_trait]
impl LlmBackend for OllamaClient {
    async fn chat(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        tools: Option<Vec<ToolDefinition>>,
    ) -> Result<ChatResponse, LlmError> {
        OllamaClient::chat(self, model, messages, tools).await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaModel {
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Option<Vec<OllamaModel>>,
}

/// One tool/function call in an assistant message (Ollama format).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(rename = "type", default = "function_type")]
    pub typ: String,
    pub function: ToolCallFunction,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFunction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    pub name: String,
    /// Arguments as JSON object or string (model-dependent).
    #[serde(default)]
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// When role is "tool", the name of the tool this result is for (Ollama expects "tool_name").
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "tool_name")]
    pub tool_name: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
            tool_calls: None,
            tool_name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
            tool_calls: None,
            tool_name: None,
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Option<Vec<ToolCall>>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
            tool_calls,
            tool_name: None,
        }
    }

    pub fn tool(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: content.into(),
            tool_calls: None,
            tool_name: Some(name.into()),
        }
    }
}

/// Tool definition for Ollama chat (function-calling).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub typ: String,
    pub function: ToolFunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFunctionDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDefinition>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub message: Option<ChatMessage>,
    #[serde(default)]
    pub done: bool,
}

impl ChatResponse {
    /// Plain-text assistant reply (for tests and scripted backends).
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            message: Some(ChatMessage::assistant(content, None)),
            done: true,
        }
    }

    /// Text content of the assistant message, if any.
    pub fn content(&self) -> &str {
        self.message
            .as_ref()
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }

    /// Parsed tool/function calls from the assistant message, if any.
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.message
            .as_ref()
            .and_then(|m| m.tool_calls.as_deref())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn chat_sends_tools_and_parses_tool_calls() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/chat")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({ "model": "m1", "stream": false })),
                Matcher::Regex(r#""tools":\[\{"type":"function","function":\{"name":"web_search""#.to_string()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "message": {
                        "role": "assistant",
                        "content": "",
                        "tool_calls": [{ "function": { "name": "web_search", "arguments": { "query": "rust" } } }]
                    },
                    "done": true
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = OllamaClient::new(Some(format!("{}/", server.url())));
        let tools = vec![ToolDefinition {
            typ: "function".to_string(),
            function: ToolFunctionDefinition {
                name: "web_search".to_string(),
                description: None,
                parameters: json!({ "type": "object", "properties": {} }),
            },
        }];
        let res = client
            .chat("m1", vec![ChatMessage::user("hi")], Some(tools))
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(res.tool_calls().len(), 1);
        assert_eq!(res.tool_calls()[0].typ, "function");
        assert_eq!(res.tool_calls()[0].function.name, "web_search");
        assert_eq!(res.tool_calls()[0].function.arguments["query"], "rust");
    }

    #[tokio::test]
    async fn chat_without_tools_omits_the_field() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/chat")
            .match_body(Matcher::Json(json!({
                "model": "m1",
                "messages": [{ "role": "user", "content": "hi" }],
                "stream": false
            })))
            .with_body(json!({ "message": { "role": "assistant", "content": "hello" }, "done": true }).to_string())
            .create_async()
            .await;
        let client = OllamaClient::new(Some(server.url()));
        let res = client.chat("m1", vec![ChatMessage::user("hi")], None).await.unwrap();
        mock.assert_async().await;
        assert_eq!(res.content(), "hello");
        assert!(res.tool_calls().is_empty());
    }

    #[tokio::test]
    async fn api_error_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/chat")
            .with_status(500)
            .with_body("model not found")
            .create_async()
            .await;
        let client = OllamaClient::new(Some(server.url()));
        let err = client.chat("m1", vec![], None).await.unwrap_err();
        assert!(matches!(err, LlmError::Api(ref s) if s.contains("model not found")));
    }

    #[tokio::test]
    async fn list_models_reads_tags() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/tags")
            .with_body(json!({ "models": [{ "name": "glm-4.7-flash:latest", "size": 10 }] }).to_string())
            .create_async()
            .await;
        let client = OllamaClient::new(Some(server.url()));
        let models = client.list_models().await.unwrap();
        assert_eq!(models[0].name, "glm-4.7-flash:latest");
    }

    #[tokio::test]
    async fn list_models_gives_up_on_a_silent_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let silent = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = OllamaClient::new(Some(format!("http://{}", addr)))
            .with_tags_timeout(Duration::from_millis(200));
        let started = std::time::Instant::now();
        let err = client.list_models().await.unwrap_err();
        assert!(matches!(err, LlmError::Request(ref e) if e.is_timeout()));
        assert!(started.elapsed() < Duration::from_secs(5));
        silent.abort();
    }
}
