//! `fetch_page`: readable text of a web page.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::time::Duration;
use url::Url;

use super::html::html_to_text;
use super::{function_definition, string_arg, truncate_chars, Tool, ToolDefinition, ToolError, ADAPTER_BODY_CHARS};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_REDIRECTS: usize = 10;
const USER_AGENT: &str = "Mozilla/5.0 (compatible; chat-helper/1.0)";

/// Plain GET with a generic user agent; no cookies or credentials are sent.
pub struct FetchPageTool {
    client: reqwest::Client,
}

impl FetchPageTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    async fn fetch(&self, url: &str) -> Result<String, ToolError> {
        let parsed = Url::parse(url).map_err(|e| ToolError::InvalidArguments {
            tool: "fetch_page".to_string(),
            message: format!("not a valid URL: {}", e),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ToolError::InvalidArguments {
                tool: "fetch_page".to_string(),
                message: format!("unsupported URL scheme: {}", parsed.scheme()),
            });
        }
        log::info!("fetch_page: GET {}", parsed.host_str().unwrap_or(""));

        let res = self.client.get(parsed).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Ok(format!("HTTP error {} fetching {}", status.as_u16(), url));
        }
        let content_type = res
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        if !content_type.contains("html") && !content_type.contains("text") {
            return Ok(format!("Unsupported content type: {}", content_type));
        }
        let body = res.text().await?;
        let text = if content_type.contains("html") {
            html_to_text(&body)
        } else {
            body.lines()
                .map(str::trim_end)
                .filter(|l| !l.trim().is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        };
        log::info!("fetch_page: {} chars", text.chars().count());
        let text = truncate_chars(&text, ADAPTER_BODY_CHARS, "Page");
        Ok(format!("[Page content — {}]\n\n{}", url, text))
    }
}

impl Default for FetchPageTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FetchPageTool {
    fn definition(&self) -> ToolDefinition {
        function_definition(
            "fetch_page",
            "Fetch a web page and return its readable text. Use this for article and web page links (not YouTube).",
            json!({
                "type": "object",
                "required": ["url"],
                "properties": {
                    "url": { "type": "string", "description": "The http(s) URL of the page" }
                }
            }),
        )
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let url = string_arg("fetch_page", args, "url")?;
        self.fetch(url).await
    }
}
