//! Decide what a command acts on: the quoted message, inline text, or an inline URL.

use url::Url;

/// Which tool route an inline URL takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlClass {
    /// A YouTube video; goes to the transcript tool.
    YouTube,
    /// Any other web page; goes to the page fetch tool.
    Generic,
}

/// Content resolved for an Expand/Condense command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedContent {
    Quote(String),
    InlineText(String),
    InlineUrl { url: String, class: UrlClass },
}

impl ResolvedContent {
    /// Short label for logs.
    pub fn source_kind(&self) -> &'static str {
        match self {
            ResolvedContent::Quote(_) => "quote",
            ResolvedContent::InlineText(_) => "inline text",
            ResolvedContent::InlineUrl { .. } => "inline url",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ResolvedContent::Quote(t) | ResolvedContent::InlineText(t) => t.len(),
            ResolvedContent::InlineUrl { url, .. } => url.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Quote wins over everything; then a lone URL; then free text. None when there is nothing to act on.
pub fn resolve_content(quoted_text: Option<&str>, remainder_text: &str) -> Option<ResolvedContent> {
    if let Some(q) = quoted_text.filter(|q| !q.trim().is_empty()) {
        return Some(ResolvedContent::Quote(q.to_string()));
    }
    let rest = remainder_text.trim();
    if rest.is_empty() {
        return None;
    }
    if let Some(url) = parse_web_url(rest) {
        return Some(ResolvedContent::InlineUrl {
            url: rest.to_string(),
            class: classify_url(&url),
        });
    }
    Some(ResolvedContent::InlineText(rest.to_string()))
}

/// A single token that parses as an absolute http(s) URL with a host.
pub fn parse_web_url(s: &str) -> Option<Url> {
    if s.split_whitespace().nth(1).is_some() {
        return None;
    }
    let url = Url::parse(s).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(())?;
    url.host_str().filter(|h| !h.is_empty())?;
    Some(url)
}

fn is_youtube_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    host == "youtube.com" || host.ends_with(".youtube.com")
}

fn is_youtu_be_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    host == "youtu.be" || host == "www.youtu.be"
}

/// YouTube video id for `youtu.be/<id>`, `youtube.com/watch?v=<id>`, `/embed/<id>`, `/shorts/<id>`.
pub fn youtube_video_id(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let id = if is_youtu_be_host(host) {
        url.path_segments()?.next().map(str::to_string)
    } else if is_youtube_host(host) {
        let path = url.path();
        if path == "/watch" {
            url.query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned())
        } else if let Some(rest) = path.strip_prefix("/embed/") {
            rest.split('/').next().map(str::to_string)
        } else if let Some(rest) = path.strip_prefix("/shorts/") {
            rest.split('/').next().map(str::to_string)
        } else {
            None
        }
    } else {
        None
    };
    id.filter(|i| !i.is_empty())
}

/// YouTube only when a video id can be found; every other URL is Generic.
pub fn classify_url(url: &Url) -> UrlClass {
    if youtube_video_id(url).is_some() {
        UrlClass::YouTube
    } else {
        UrlClass::Generic
    }
}
