//! Outbound side of a channel.

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("channel api error: {0}")]
    Api(String),
}

/// Handle to a running channel: stop it, or send text to a chat or a person.
#[async_trait]
pub trait ChannelHandle: Send + Sync {
    /// Stop the inbound connector.
    fn stop(&self);

    /// Send into a conversation: a group when `is_group`, otherwise a 1:1 chat with `chat_id`.
    async fn send_to_chat(&self, chat_id: &str, is_group: bool, text: &str) -> Result<(), ChannelError>;

    /// Send a direct message to one identity.
    async fn send_direct(&self, recipient: &str, text: &str) -> Result<(), ChannelError>;
}
