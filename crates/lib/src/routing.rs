//! Access and reply routing: who may trigger the bridge, and where each reply goes.
//!
//! The owner (the linked account) is answered in the originating chat; anyone else is answered
//! by direct message. Help always goes to the originating chat.

use std::collections::HashSet;

use crate::channels::InboundMessage;
use crate::config::{Config, ReplyMode};

/// Where an outbound message is delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// The originating chat (a group or the DM conversation it came from).
    Channel { chat_id: String, is_group: bool },
    /// A private message to one identity.
    DirectMessage { recipient: String },
}

impl Destination {
    pub fn kind(&self) -> &'static str {
        match self {
            Destination::Channel { .. } => "channel",
            Destination::DirectMessage { .. } => "dm",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Destination::Channel { chat_id, .. } => chat_id,
            Destination::DirectMessage { recipient } => recipient,
        }
    }

    fn channel_of(msg: &InboundMessage) -> Self {
        Destination::Channel {
            chat_id: msg.chat_id.clone(),
            is_group: msg.is_group,
        }
    }
}

/// Final outbound text and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReply {
    pub body: String,
    pub destination: Destination,
}

/// Allow-set plus owner identity. Built once from config.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    owner: String,
    allowed: HashSet<String>,
    reply_mode: ReplyMode,
}

impl AccessPolicy {
    pub fn new(
        owner: impl Into<String>,
        allowed: impl IntoIterator<Item = String>,
        reply_mode: ReplyMode,
    ) -> Self {
        Self {
            owner: owner.into().trim().to_string(),
            allowed: allowed
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            reply_mode,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.signal.phone_number.clone(),
            config.access.allowed_numbers.iter().cloned(),
            config.agent.reply_mode,
        )
    }

    pub fn reply_mode(&self) -> ReplyMode {
        self.reply_mode
    }

    /// Empty allow-set allows everyone.
    pub fn is_allowed(&self, source_id: &str) -> bool {
        self.allowed.is_empty() || self.allowed.contains(source_id)
    }

    pub fn is_owner(&self, source_id: &str) -> bool {
        !self.owner.is_empty() && source_id == self.owner
    }

    /// Destination for the acknowledgment, the result and error replies.
    pub fn route(&self, msg: &InboundMessage) -> Destination {
        match self.reply_mode {
            ReplyMode::OwnerInChannel if self.is_owner(&msg.source_id) => Destination::channel_of(msg),
            _ => Destination::DirectMessage {
                recipient: msg.source_id.clone(),
            },
        }
    }

    /// Help is visible to the whole chat regardless of sender.
    pub fn help_destination(&self, msg: &InboundMessage) -> Destination {
        Destination::channel_of(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &str = "+15550001";

    fn group_msg(source: &str) -> InboundMessage {
        InboundMessage {
            source_id: source.to_string(),
            chat_id: "group-abc".to_string(),
            is_group: true,
            text: "/e".to_string(),
            quoted_text: None,
            timestamp: 1,
        }
    }

    fn policy(allowed: &[&str], mode: ReplyMode) -> AccessPolicy {
        AccessPolicy::new(OWNER, allowed.iter().map(|s| s.to_string()), mode)
    }

    #[test]
    fn empty_allow_set_allows_everyone() {
        let p = policy(&[], ReplyMode::OwnerInChannel);
        assert!(p.is_allowed("+1999"));
        assert!(p.is_allowed(OWNER));
    }

    #[test]
    fn non_empty_allow_set_is_exact_membership() {
        let p = policy(&["+1999", " +1888 "], ReplyMode::OwnerInChannel);
        assert!(p.is_allowed("+1999"));
        assert!(p.is_allowed("+1888"));
        assert!(!p.is_allowed("+1777"));
        assert!(!p.is_allowed(OWNER));
    }

    #[test]
    fn owner_in_group_gets_the_group_others_get_dm() {
        let p = policy(&[], ReplyMode::OwnerInChannel);
        assert_eq!(
            p.route(&group_msg(OWNER)),
            Destination::Channel {
                chat_id: "group-abc".to_string(),
                is_group: true
            }
        );
        assert_eq!(
            p.route(&group_msg("+1999")),
            Destination::DirectMessage {
                recipient: "+1999".to_string()
            }
        );
    }

    #[test]
    fn help_is_always_in_channel() {
        for mode in [ReplyMode::OwnerInChannel, ReplyMode::AlwaysDirect] {
            let p = policy(&[], mode);
            let d = p.help_destination(&group_msg("+1999"));
            assert_eq!(d.kind(), "channel");
            assert_eq!(d.id(), "group-abc");
        }
    }

    #[test]
    fn always_direct_mode_dms_the_owner_too() {
        let p = policy(&[], ReplyMode::AlwaysDirect);
        assert_eq!(p.route(&group_msg(OWNER)).id(), OWNER);
        assert_eq!(p.route(&group_msg(OWNER)).kind(), "dm");
    }

    #[test]
    fn from_config_uses_phone_number_as_owner() {
        let mut c = Config::default();
        c.signal.phone_number = OWNER.to_string();
        c.access.allowed_numbers = vec!["+1999".to_string()];
        let p = AccessPolicy::from_config(&c);
        assert!(p.is_owner(OWNER));
        assert!(!p.is_owner("+1999"));
        assert!(p.is_allowed("+1999"));
    }
}
