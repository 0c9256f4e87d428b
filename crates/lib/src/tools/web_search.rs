//! `web_search`: Brave Search web results as a numbered list.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::time::Duration;

use super::{function_definition, string_arg, Tool, ToolDefinition, ToolError};
use crate::config::ToolsConfig;

const BRAVE_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";
const DEFAULT_RESULTS: i64 = 5;
/// Hard cap on results requested downstream, whatever the model asks for.
pub const MAX_RESULTS: i64 = 10;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// Brave allows one request per second; configured pauses below this are raised to it.
pub const MIN_SEARCH_COOLDOWN: Duration = Duration::from_secs(1);

pub struct WebSearchTool {
    api_key: Option<String>,
    endpoint: String,
    cooldown: Duration,
    client: reqwest::Client,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SearchResult {
    title: String,
    url: String,
    description: String,
}

impl WebSearchTool {
    pub fn new(config: &ToolsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            api_key: config.brave_api_key.clone().filter(|k| !k.trim().is_empty()),
            endpoint: BRAVE_ENDPOINT.to_string(),
            cooldown: Duration::from_millis(config.search_cooldown_ms).max(MIN_SEARCH_COOLDOWN),
            client,
        }
    }

    /// Point at a different search endpoint (tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn search(&self, query: &str, count: i64) -> Result<Vec<SearchResult>, ToolError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ToolError::Failed("BRAVE_API_KEY is not configured".to_string()))?;
        log::debug!("web_search: count={} query_len={}", count, query.len());
        let res = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query.to_string()), ("count", count.to_string())])
            .header("X-Subscription-Token", api_key)
            .header("Accept", "application/json")
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            let head: String = body.chars().take(200).collect();
            return Err(ToolError::Failed(format!("Brave Search returned {}: {}", status, head)));
        }
        let body: Value = res.json().await?;
        Ok(parse_brave_results(&body))
    }
}

/// Requested result count clamped to 1..=10; missing or non-numeric means the default.
fn clamp_count(raw: Option<&Value>) -> i64 {
    let requested = raw
        .and_then(|v| {
            v.as_i64()
                .or_else(|| v.as_f64().map(|f| f as i64))
                .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
        })
        .unwrap_or(DEFAULT_RESULTS);
    requested.clamp(1, MAX_RESULTS)
}

fn parse_brave_results(body: &Value) -> Vec<SearchResult> {
    body.get("web")
        .and_then(|web| web.get("results"))
        .and_then(Value::as_array)
        .map(|results| {
            results
                .iter()
                .filter_map(|r| {
                    let field = |k: &str| r.get(k).and_then(Value::as_str).map(str::trim).unwrap_or("");
                    let (title, url) = (field("title"), field("url"));
                    if title.is_empty() && url.is_empty() {
                        return None;
                    }
                    Some(SearchResult {
                        title: title.to_string(),
                        url: url.to_string(),
                        description: field("description").to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn format_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No results found.".to_string();
    }
    results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {}\n   {}\n   {}", i + 1, r.title, r.url, r.description))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl Tool for WebSearchTool {
    fn definition(&self) -> ToolDefinition {
        function_definition(
            "web_search",
            "Search the web for current information on a topic.",
            json!({
                "type": "object",
                "required": ["query"],
                "properties": {
                    "query": { "type": "string", "description": "The search query" },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum number of results to return (1-10)",
                        "default": DEFAULT_RESULTS
                    }
                }
            }),
        )
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let query = string_arg("web_search", args, "query")?;
        let count = clamp_count(args.get("max_results"));
        let results = self.search(query, count).await?;
        log::info!("web_search: {} results", results.len());
        Ok(format_results(&results))
    }

    fn cooldown(&self) -> Option<Duration> {
        Some(self.cooldown)
    }
}
