//! `get_transcript`: caption text of a YouTube video.
//!
//! Loads the watch page, reads `captionTracks` from the embedded player response, prefers an
//! English track and joins the timed-text segments. Videos without usable captions produce a
//! plain explanation for the model rather than an error.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::OnceLock;
use std::time::Duration;
use url::Url;

use super::html::decode_entities;
use super::{function_definition, string_arg, truncate_chars, Tool, ToolDefinition, ToolError, ADAPTER_BODY_CHARS};
use crate::content::youtube_video_id;

const YOUTUBE_BASE: &str = "https://www.youtube.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const USER_AGENT: &str = "Mozilla/5.0 (compatible; chat-helper/1.0)";

pub const CAPTIONS_DISABLED: &str = "Transcripts are disabled for this video.";
pub const NO_TRANSCRIPT: &str =
    "No transcript is available for this video (try a video with captions enabled).";

pub struct TranscriptTool {
    watch_base: String,
    client: reqwest::Client,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTrack {
    #[serde(default)]
    base_url: String,
    #[serde(default)]
    language_code: String,
    #[serde(default)]
    kind: Option<String>,
}

impl TranscriptTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            watch_base: YOUTUBE_BASE.to_string(),
            client,
        }
    }

    /// Load watch pages from a different host (tests).
    pub fn with_watch_base(mut self, base: impl Into<String>) -> Self {
        self.watch_base = base.into().trim_end_matches('/').to_string();
        self
    }

    async fn get_text(&self, url: &str) -> Result<String, ToolError> {
        let res = self
            .client
            .get(url)
            .header("Accept-Language", "en-US,en;q=0.8")
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(ToolError::Failed(format!(
                "HTTP error {} fetching {}",
                res.status().as_u16(),
                url
            )));
        }
        Ok(res.text().await?)
    }

    async fn transcript(&self, url: &str) -> Result<String, ToolError> {
        let Some(video_id) = Url::parse(url).ok().as_ref().and_then(youtube_video_id) else {
            return Ok(format!("Could not extract a video ID from: {}", url));
        };
        log::info!("get_transcript: video {}", video_id);

        let watch_url = format!("{}/watch?v={}", self.watch_base, urlencoding::encode(&video_id));
        let page = self.get_text(&watch_url).await?;

        if let Some(status) = playability_status(&page).filter(|s| s != "OK") {
            return Ok(format!(
                "This video cannot be played here (status: {}); it may be private, age-restricted or removed.",
                status
            ));
        }
        let tracks = match caption_tracks(&page) {
            Some(tracks) if !tracks.is_empty() => tracks,
            _ => return Ok(CAPTIONS_DISABLED.to_string()),
        };
        let Some(track) = pick_track(&tracks) else {
            return Ok(NO_TRANSCRIPT.to_string());
        };
        log::debug!(
            "get_transcript: using track lang={} kind={:?}",
            track.language_code,
            track.kind
        );

        let xml = self.get_text(&track.base_url).await?;
        let text = timed_text_to_plain(&xml);
        if text.is_empty() {
            return Ok(NO_TRANSCRIPT.to_string());
        }
        log::info!("get_transcript: {} chars", text.chars().count());
        let text = truncate_chars(&text, ADAPTER_BODY_CHARS, "Transcript");
        Ok(format!("[YouTube transcript — {}]\n\n{}", url, text))
    }
}

impl Default for TranscriptTool {
    fn default() -> Self {
        Self::new()
    }
}

fn playability_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#""playabilityStatus"\s*:\s*\{\s*"status"\s*:\s*"([A-Z_]+)""#).ok())
        .as_ref()
}

fn playability_status(page: &str) -> Option<String> {
    playability_pattern()?
        .captures(page)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// The JSON array following `"captionTracks":`, if the page has one.
fn caption_tracks(page: &str) -> Option<Vec<CaptionTrack>> {
    let key = "\"captionTracks\":";
    let start = page.find(key)? + key.len();
    let array = balanced_json_array(&page[start..])?;
    match serde_json::from_str::<Vec<CaptionTrack>>(array) {
        Ok(tracks) => Some(tracks),
        Err(e) => {
            log::warn!("get_transcript: unreadable captionTracks: {}", e);
            None
        }
    }
}

/// Slice `[...]` at the start of `s` (after optional whitespace), respecting JSON strings.
fn balanced_json_array(s: &str) -> Option<&str> {
    let offset = s.len() - s.trim_start().len();
    let s = &s[offset..];
    if !s.starts_with('[') {
        return None;
    }
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, b) in s.bytes().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' | b'{' => depth += 1,
            b']' | b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Manual English, then any English, then manual anything, then whatever is first.
fn pick_track(tracks: &[CaptionTrack]) -> Option<&CaptionTrack> {
    fn is_en(t: &CaptionTrack) -> bool {
        t.language_code.starts_with("en")
    }
    fn is_manual(t: &CaptionTrack) -> bool {
        t.kind.as_deref() != Some("asr")
    }
    let usable: Vec<&CaptionTrack> = tracks.iter().filter(|t| !t.base_url.is_empty()).collect();
    let find = |pred: fn(&CaptionTrack) -> bool| usable.iter().copied().find(|t| pred(*t));
    find(|t| is_en(t) && is_manual(t))
        .or_else(|| find(is_en))
        .or_else(|| find(is_manual))
        .or_else(|| usable.first().copied())
}

fn segment_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?s)<(text|p)\b[^>]*>(.*?)</(?:text|p)>").ok())
        .as_ref()
}

fn inner_tag_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]+>").ok()).as_ref()
}

/// Join timed-text segments (`<text>` or `<p>` format) into one line of plain text.
fn timed_text_to_plain(xml: &str) -> String {
    let (Some(segments), Some(inner_tags)) = (segment_pattern(), inner_tag_pattern()) else {
        return String::new();
    };
    segments
        .captures_iter(xml)
        .filter_map(|c| c.get(2))
        .map(|m| {
            let raw = inner_tags.replace_all(m.as_str(), "");
            // Timed text is usually escaped twice (`&amp;#39;`).
            let once = decode_entities(&raw);
            decode_entities(&once)
        })
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl Tool for TranscriptTool {
    fn definition(&self) -> ToolDefinition {
        function_definition(
            "get_transcript",
            "Fetch the spoken transcript of a YouTube video. Use this for youtube.com or youtu.be links.",
            json!({
                "type": "object",
                "required": ["url"],
                "properties": {
                    "url": { "type": "string", "description": "The YouTube video URL" }
                }
            }),
        )
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let url = string_arg("get_transcript", args, "url")?;
        self.transcript(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(url: &str) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("url".to_string(), Value::String(url.to_string()));
        m
    }

    fn watch_page(player_response: &str) -> String {
        format!(
            "<html><script>var ytInitialPlayerResponse = {};</script></html>",
            player_response
        )
    }

    #[test]
    fn caption_tracks_are_read_from_nested_json() {
        let page = watch_page(
            r#"{"playabilityStatus":{"status":"OK"},"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"https://x/api/timedtext?v=a&lang=de","name":{"runs":[{"text":"German ]"}]},"languageCode":"de"},{"baseUrl":"https://x/api/timedtext?v=a&lang=en","languageCode":"en","kind":"asr"}]}}}"#,
        );
        assert_eq!(playability_status(&page).as_deref(), Some("OK"));
        let tracks = caption_tracks(&page).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].base_url, "https://x/api/timedtext?v=a&lang=de");
        assert_eq!(pick_track(&tracks).unwrap().language_code, "en");
    }

    #[test]
    fn track_preference() {
        let t = |lang: &str, kind: Option<&str>| CaptionTrack {
            base_url: format!("u-{}", lang),
            language_code: lang.to_string(),
            kind: kind.map(str::to_string),
        };
        let tracks = vec![t("fr", Some("asr")), t("en", Some("asr")), t("en-GB", None)];
        assert_eq!(pick_track(&tracks).unwrap().language_code, "en-GB");
        let tracks = vec![t("fr", Some("asr")), t("de", None)];
        assert_eq!(pick_track(&tracks).unwrap().language_code, "de");
        assert!(pick_track(&[]).is_none());
    }

    #[test]
    fn timed_text_formats() {
        let xml = r#"<?xml version="1.0"?><transcript><text start="0" dur="1">Hello &amp;amp; welcome</text><text start="1" dur="2">it&amp;#39;s
            here</text></transcript>"#;
        assert_eq!(timed_text_to_plain(xml), "Hello & welcome it's here");
        let xml = r#"<timedtext format="3"><body><p t="0" d="10"><s>one</s><s> two</s></p><p t="10" d="5"></p></body></timedtext>"#;
        assert_eq!(timed_text_to_plain(xml), "one two");
    }

    #[test]
    fn unbalanced_array_is_rejected() {
        assert_eq!(balanced_json_array(" [1,[2]] rest"), Some("[1,[2]]"));
        assert_eq!(balanced_json_array("[1, \"]\"]"), Some("[1, \"]\"]"));
        assert_eq!(balanced_json_array("[1, 2"), None);
        assert_eq!(balanced_json_array("{}"), None);
    }

    #[tokio::test]
    async fn no_video_id_is_a_message_not_an_error() {
        let out = TranscriptTool::new()
            .call(&args("https://example.com/watch?v=x"))
            .await
            .unwrap();
        assert_eq!(out, "Could not extract a video ID from: https://example.com/watch?v=x");
    }

    #[tokio::test]
    async fn fetches_and_joins_captions() {
        let mut server = mockito::Server::new_async().await;
        let player = format!(
            r#"{{"playabilityStatus":{{"status":"OK"}},"captions":{{"playerCaptionsTracklistRenderer":{{"captionTracks":[{{"baseUrl":"{}/api/timedtext?v=abc123","languageCode":"en"}}]}}}}}}"#,
            server.url()
        );
        let _page = server
            .mock("GET", "/watch")
            .match_query(mockito::Matcher::UrlEncoded("v".into(), "abc123".into()))
            .with_body(watch_page(&player))
            .create_async()
            .await;
        let _captions = server
            .mock("GET", "/api/timedtext")
            .match_query(mockito::Matcher::Any)
            .with_body(r#"<transcript><text start="0">first line</text><text start="2">second</text></transcript>"#)
            .create_async()
            .await;
        let out = TranscriptTool::new()
            .with_watch_base(server.url())
            .call(&args("https://youtu.be/abc123"))
            .await
            .unwrap();
        assert_eq!(out, "[YouTube transcript — https://youtu.be/abc123]\n\nfirst line second");
    }

    #[tokio::test]
    async fn disabled_and_unplayable_videos_explain_themselves() {
        let mut server = mockito::Server::new_async().await;
        let _no_captions = server
            .mock("GET", "/watch")
            .match_query(mockito::Matcher::UrlEncoded("v".into(), "nocap".into()))
            .with_body(watch_page(r#"{"playabilityStatus":{"status":"OK"}}"#))
            .create_async()
            .await;
        let _private = server
            .mock("GET", "/watch")
            .match_query(mockito::Matcher::UrlEncoded("v".into(), "priv".into()))
            .with_body(watch_page(r#"{"playabilityStatus":{"status":"LOGIN_REQUIRED"}}"#))
            .create_async()
            .await;
        let tool = TranscriptTool::new().with_watch_base(server.url());
        let out = tool.call(&args("https://www.youtube.com/watch?v=nocap")).await.unwrap();
        assert_eq!(out, CAPTIONS_DISABLED);
        let out = tool.call(&args("https://www.youtube.com/shorts/priv")).await.unwrap();
        assert!(out.contains("LOGIN_REQUIRED"));
    }
}
