//! Signal envelope normalization.
//!
//! signal-cli delivers two shapes we care about: a `dataMessage` (someone wrote to
//! the linked account) and a `syncMessage.sentMessage` (the owner wrote from another
//! device and the linked account sees a copy). Both become one [`InboundMessage`].
//! For the sync copy the envelope source is the owner, so the conversation is taken
//! from the destination instead: group, then destination number, then destination
//! uuid, then the source itself.

use serde::Deserialize;

use crate::channels::InboundMessage;

#[derive(Debug, Deserialize)]
struct Received {
    #[serde(default)]
    envelope: Option<Envelope>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(default)]
    source_number: Option<String>,
    #[serde(default)]
    source_uuid: Option<String>,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    data_message: Option<DataMessage>,
    #[serde(default)]
    sync_message: Option<SyncMessage>,
    #[serde(default)]
    typing_message: Option<serde_json::Value>,
    #[serde(default)]
    receipt_message: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncMessage {
    #[serde(default)]
    sent_message: Option<DataMessage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataMessage {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    group_info: Option<GroupInfo>,
    #[serde(default)]
    quote: Option<QuoteInfo>,
    /// Only present on sync copies.
    #[serde(default)]
    destination_number: Option<String>,
    #[serde(default)]
    destination_uuid: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupInfo {
    #[serde(default)]
    group_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QuoteInfo {
    #[serde(default)]
    text: Option<String>,
}

fn present(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Parse one raw websocket frame. Returns None for anything that is not a text chat
/// message (receipts, typing indicators, reactions, attachment-only messages, junk).
pub fn parse_envelope(raw: &str) -> Option<InboundMessage> {
    let received: Received = match serde_json::from_str(raw) {
        Ok(r) => r,
        Err(e) => {
            log::debug!("envelope: not a receive frame: {}", e);
            return None;
        }
    };
    let envelope = received.envelope?;
    if envelope.typing_message.is_some() || envelope.receipt_message.is_some() {
        return None;
    }

    let source_id = present(&envelope.source_number)
        .or_else(|| present(&envelope.source_uuid))?
        .to_string();

    let (data, is_sync) = match (envelope.data_message, envelope.sync_message) {
        (Some(d), _) => (d, false),
        (None, Some(SyncMessage { sent_message: Some(d) })) => (d, true),
        _ => return None,
    };

    let text = data.message.clone().unwrap_or_default();
    if text.trim().is_empty() {
        return None;
    }

    let group_id = data
        .group_info
        .as_ref()
        .and_then(|g| present(&g.group_id))
        .map(str::to_string);

    let (chat_id, is_group) = match group_id {
        Some(g) => (g, true),
        None if is_sync => {
            let dest = present(&data.destination_number)
                .or_else(|| present(&data.destination_uuid))
                .unwrap_or(source_id.as_str())
                .to_string();
            (dest, false)
        }
        None => (source_id.clone(), false),
    };

    let quoted_text = data.quote.and_then(|q| q.text);

    Some(InboundMessage {
        source_id,
        chat_id,
        is_group,
        text,
        quoted_text,
        timestamp: envelope.timestamp.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(v: serde_json::Value) -> String {
        v.to_string()
    }

    #[test]
    fn direct_message() {
        let raw = frame(json!({
            "envelope": {
                "sourceNumber": "+111",
                "timestamp": 42,
                "dataMessage": { "message": "hello /e" }
            }
        }));
        let msg = parse_envelope(&raw).unwrap();
        assert_eq!(msg.source_id, "+111");
        assert_eq!(msg.chat_id, "+111");
        assert!(!msg.is_group);
        assert_eq!(msg.text, "hello /e");
        assert_eq!(msg.quoted_text, None);
        assert_eq!(msg.timestamp, 42);
    }

    #[test]
    fn group_message_with_quote() {
        let raw = frame(json!({
            "envelope": {
                "sourceNumber": "+111",
                "dataMessage": {
                    "message": "/c 3",
                    "groupInfo": { "groupId": "grp==", "type": "DELIVER" },
                    "quote": { "id": 7, "authorNumber": "+222", "text": "long text" }
                }
            }
        }));
        let msg = parse_envelope(&raw).unwrap();
        assert_eq!(msg.chat_id, "grp==");
        assert!(msg.is_group);
        assert_eq!(msg.quote(), Some("long text"));
    }

    #[test]
    fn sync_copy_uses_destination_precedence() {
        let group = frame(json!({
            "envelope": {
                "sourceNumber": "+owner",
                "syncMessage": { "sentMessage": {
                    "message": "/e",
                    "groupInfo": { "groupId": "g1" },
                    "destinationNumber": "+333"
                }}
            }
        }));
        let m = parse_envelope(&group).unwrap();
        assert_eq!((m.chat_id.as_str(), m.is_group), ("g1", true));
        assert_eq!(m.source_id, "+owner");

        let number = frame(json!({
            "envelope": {
                "sourceNumber": "+owner",
                "syncMessage": { "sentMessage": {
                    "message": "/e",
                    "destinationNumber": "+333",
                    "destinationUuid": "uuid-333"
                }}
            }
        }));
        assert_eq!(parse_envelope(&number).unwrap().chat_id, "+333");

        let uuid = frame(json!({
            "envelope": {
                "sourceNumber": "+owner",
                "syncMessage": { "sentMessage": {
                    "message": "/e",
                    "destinationUuid": "uuid-333"
                }}
            }
        }));
        assert_eq!(parse_envelope(&uuid).unwrap().chat_id, "uuid-333");

        let fallback = frame(json!({
            "envelope": {
                "sourceNumber": "+owner",
                "syncMessage": { "sentMessage": { "message": "/e" } }
            }
        }));
        assert_eq!(parse_envelope(&fallback).unwrap().chat_id, "+owner");
    }

    #[test]
    fn direct_and_sync_normalize_identically() {
        let direct = frame(json!({
            "envelope": {
                "sourceNumber": "+111",
                "timestamp": 5,
                "dataMessage": { "message": "/c", "groupInfo": { "groupId": "g" }, "quote": { "text": "q" } }
            }
        }));
        let sync = frame(json!({
            "envelope": {
                "sourceNumber": "+111",
                "timestamp": 5,
                "syncMessage": { "sentMessage": { "message": "/c", "groupInfo": { "groupId": "g" }, "quote": { "text": "q" } } }
            }
        }));
        assert_eq!(parse_envelope(&direct), parse_envelope(&sync));
    }

    #[test]
    fn ignores_non_chat_events() {
        let receipt = frame(json!({
            "envelope": { "sourceNumber": "+1", "receiptMessage": { "isDelivery": true } }
        }));
        let typing = frame(json!({
            "envelope": { "sourceNumber": "+1", "typingMessage": { "action": "STARTED" } }
        }));
        let reaction = frame(json!({
            "envelope": { "sourceNumber": "+1", "dataMessage": { "message": null, "reaction": { "emoji": "👍" } } }
        }));
        let empty_sync = frame(json!({
            "envelope": { "sourceNumber": "+1", "syncMessage": { "readMessages": [] } }
        }));
        assert!(parse_envelope(&receipt).is_none());
        assert!(parse_envelope(&typing).is_none());
        assert!(parse_envelope(&reaction).is_none());
        assert!(parse_envelope(&empty_sync).is_none());
        assert!(parse_envelope("not json").is_none());
        assert!(parse_envelope("{}").is_none());
    }

    #[test]
    fn falls_back_to_source_uuid() {
        let raw = frame(json!({
            "envelope": { "sourceUuid": "abc-uuid", "dataMessage": { "message": "/h" } }
        }));
        let m = parse_envelope(&raw).unwrap();
        assert_eq!(m.source_id, "abc-uuid");
        assert_eq!(m.chat_id, "abc-uuid");
    }

    #[test]
    fn missing_sender_is_dropped() {
        let raw = frame(json!({ "envelope": { "dataMessage": { "message": "/h" } } }));
        assert!(parse_envelope(&raw).is_none());
    }
}
