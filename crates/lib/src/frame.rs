//! Outbound text: the framed reply envelope, the acknowledgment marker and canned replies.

use crate::config::ReplyMode;

/// Every message this bridge sends starts with this.
const MARKER_PREFIX: &str = "〔🤖";
const TITLE: &str = "〔🤖 chat-helper〕";
const RULE_CHAR: char = '━';
const HEADER_RULE_LEN: usize = 16;
/// Footer rule width; matches the header's visual width.
const FOOTER_RULE_LEN: usize = 34;

/// Sent once a command has content, before the tool loop starts.
pub const ACK_TEXT: &str = "〔🤖🤔...〕";

pub const CONTENT_MISSING: &str =
    "Please reply to a message, or include text/URL alongside /e or /c.";

pub const MODEL_FAILURE: &str =
    "Sorry, I couldn't get an answer from the language model. Please try again later.";

pub const EMPTY_ANSWER: &str = "The model returned an empty answer. Try again or change the level.";

pub const HELP_TEXT: &str = "📖 Chat Helper

/e [1–10] — Expand & research a topic
  Reply to a message with /e  –or–  include text/URL in the same message
  e.g.  /e 3  •  /e https://example.com  •  some text /e 7
  1 = one sentence  •  10 = exhaustive deep-dive  •  Default: 5

/c [1–10] — Condense text
  Reply to a message with /c  –or–  include text/URL in the same message
  e.g.  /c 3  •  https://youtu.be/xxx /c  •  long text /c 8
  1 = light trim  •  10 = one to five words  •  Default: 5

/h — Show this help";

const ROUTING_OWNER_IN_CHANNEL: &str =
    "💬 Responses are sent as a DM, unless you're the owner — then they appear in-channel.";
const ROUTING_ALWAYS_DIRECT: &str = "💬 Responses are always sent to you as a DM.";

fn rule(len: usize) -> String {
    std::iter::repeat(RULE_CHAR).take(len).collect()
}

pub fn header() -> String {
    format!("{}{}", TITLE, rule(HEADER_RULE_LEN))
}

pub fn footer() -> String {
    rule(FOOTER_RULE_LEN)
}

/// Wrap text between the header and footer markers as one outbound block.
pub fn wrap(text: &str) -> String {
    format!("{}\n{}\n{}", header(), text.trim(), footer())
}

/// True for text this bridge produced (seen again as a sync copy from another device).
pub fn is_own_output(text: &str) -> bool {
    text.trim_start().starts_with(MARKER_PREFIX)
}

/// Framed help, ending with the routing rule in effect.
pub fn help(mode: ReplyMode) -> String {
    let routing = match mode {
        ReplyMode::OwnerInChannel => ROUTING_OWNER_IN_CHANNEL,
        ReplyMode::AlwaysDirect => ROUTING_ALWAYS_DIRECT,
    };
    wrap(&format!("{}\n\n{}", HELP_TEXT, routing))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_puts_text_between_markers() {
        let out = wrap("  answer  ");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "〔🤖 chat-helper〕━━━━━━━━━━━━━━━━");
        assert_eq!(lines[1], "answer");
        assert_eq!(lines[2], "━".repeat(34));
    }

    #[test]
    fn ack_is_not_framed() {
        assert!(!ACK_TEXT.contains(&footer()));
        assert!(ACK_TEXT.chars().count() < header().chars().count());
    }

    #[test]
    fn own_output_is_recognized() {
        assert!(is_own_output(ACK_TEXT));
        assert!(is_own_output(&help(ReplyMode::OwnerInChannel)));
        assert!(!is_own_output("/e 3"));
    }

    #[test]
    fn help_lists_every_command() {
        let h = help(ReplyMode::OwnerInChannel);
        for token in ["/e [1–10]", "/c [1–10]", "/h"] {
            assert!(h.contains(token), "{}", token);
        }
        assert!(h.starts_with(&header()));
        assert!(h.ends_with(&footer()));
        assert!(h.contains("unless you're the owner"));
        assert!(help(ReplyMode::AlwaysDirect).contains("always sent to you as a DM"));
    }
}
