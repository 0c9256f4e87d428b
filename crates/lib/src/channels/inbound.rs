//! Inbound message from a channel, normalized from the transport envelope.

/// One chat message, normalized. Built once per transport event and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Sender identity (phone number or opaque id).
    pub source_id: String,
    /// Conversation to answer in: group id for groups, the other party for 1:1 chats.
    pub chat_id: String,
    pub is_group: bool,
    /// Raw message body.
    pub text: String,
    /// Text of the message being replied to, when this message is a reply.
    pub quoted_text: Option<String>,
    /// Transport timestamp (ms since epoch).
    pub timestamp: i64,
}

impl InboundMessage {
    /// Quoted text if present and not blank, as sent.
    pub fn quote(&self) -> Option<&str> {
        self.quoted_text
            .as_deref()
            .filter(|q| !q.trim().is_empty())
    }
}
