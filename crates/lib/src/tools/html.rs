//! Minimal HTML helpers: readable text extraction and entity decoding.

/// Elements whose whole subtree is dropped.
const SKIPPED_TAGS: &[&str] = &["script", "style", "nav", "header", "footer", "aside", "noscript"];

/// Elements that start a new line.
const BLOCK_TAGS: &[&str] = &[
    "br", "p", "div", "li", "ul", "ol", "tr", "table", "section", "article", "main", "h1", "h2",
    "h3", "h4", "h5", "h6", "blockquote", "pre", "title",
];

/// Strip tags, drop boilerplate elements, decode entities, one trimmed non-blank line per block.
pub fn html_to_text(html: &str) -> String {
    // ASCII lowering keeps byte offsets aligned with `html`.
    let lower = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len() / 2);
    let mut i = 0;

    while i < html.len() {
        let rest = &html[i..];
        if rest.starts_with("<!--") {
            i = lower[i..].find("-->").map_or(html.len(), |end| i + end + 3);
            continue;
        }
        if rest.starts_with('<') {
            let tag_end = rest.find('>').map_or(html.len(), |e| i + e + 1);
            let tag = &lower[i + 1..tag_end];
            let name = tag_name(tag);
            let closing = tag.starts_with('/');
            if !closing && SKIPPED_TAGS.contains(&name) && !tag.trim_end_matches('>').ends_with('/') {
                let close = format!("</{}", name);
                i = match lower[tag_end..].find(&close) {
                    Some(p) => {
                        let at = tag_end + p;
                        lower[at..].find('>').map_or(html.len(), |g| at + g + 1)
                    }
                    None => html.len(),
                };
                continue;
            }
            if BLOCK_TAGS.contains(&name) {
                out.push('\n');
            }
            i = tag_end;
            continue;
        }
        if rest.starts_with('&') {
            if let Some((ch, len)) = decode_entity(rest) {
                out.push(ch);
                i += len;
                continue;
            }
        }
        match rest.chars().next() {
            Some(ch) => {
                out.push(ch);
                i += ch.len_utf8();
            }
            None => break,
        }
    }

    out.lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn tag_name(tag: &str) -> &str {
    let tag = tag.trim_start_matches('/');
    let end = tag
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(tag.len());
    &tag[..end]
}

/// Decode one entity at the start of `s`. Returns the char and the entity's byte length.
fn decode_entity(s: &str) -> Option<(char, usize)> {
    let semi = s.get(..12).unwrap_or(s).find(';')?;
    let body = &s[1..semi];
    let ch = match body {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        _ => {
            let num = body.strip_prefix('#')?;
            let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)?
        }
    };
    Some((ch, semi + 1))
}

/// Decode all entities in `s`; unknown ones are left as written.
pub fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < s.len() {
        let rest = &s[i..];
        if rest.starts_with('&') {
            if let Some((ch, len)) = decode_entity(rest) {
                out.push(ch);
                i += len;
                continue;
            }
        }
        match rest.chars().next() {
            Some(ch) => {
                out.push(ch);
                i += ch.len_utf8();
            }
            None => break,
        }
    }
    out
}
