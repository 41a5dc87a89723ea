use serde_json::Value;
use tracing::debug;

use super::{IRC_NICK_CONTENT_KEY, MatrixContent, MatrixIdentity, MatrixTimelineEvent};

/// Events older than this are not relayed.
pub const AGE_LIMIT_MS: i64 = 120_000;

/// Raw timeline event as it appears in a `/sync` or `/event` response,
/// before the sender's display name is known.
#[derive(Debug, Clone)]
pub struct RawTimelineEvent {
    pub event_id: String,
    pub room_id: String,
    pub sender: String,
    pub event_type: String,
    pub content: Value,
    pub timestamp_ms: i64,
}

impl RawTimelineEvent {
    pub fn parse(room_id: &str, event: &Value) -> Option<Self> {
        let event_id = event.get("event_id").and_then(Value::as_str)?;
        let sender = event.get("sender").and_then(Value::as_str)?;
        let event_type = event.get("type").and_then(Value::as_str)?;

        Some(Self {
            event_id: event_id.to_owned(),
            room_id: room_id.to_owned(),
            sender: sender.to_owned(),
            event_type: event_type.to_owned(),
            content: event.get("content").cloned().unwrap_or(Value::Null),
            timestamp_ms: event
                .get("origin_server_ts")
                .and_then(Value::as_i64)
                .unwrap_or_default(),
        })
    }

    pub fn into_timeline_event(
        self,
        display_name: String,
        backfill: bool,
        live: bool,
    ) -> MatrixTimelineEvent {
        let content = MatrixContent::decode(&self.event_type, &self.content);
        let reply_to = reply_target(&self.content);
        MatrixTimelineEvent {
            event_id: self.event_id,
            room_id: self.room_id,
            sender: MatrixIdentity {
                user_id: self.sender,
                display_name,
            },
            content,
            timestamp_ms: self.timestamp_ms,
            reply_to,
            backfill,
            live,
        }
    }

    pub fn irc_nick(&self) -> Option<String> {
        self.content
            .get(IRC_NICK_CONTENT_KEY)
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
    }
}

impl MatrixContent {
    /// Decodes the content of an `m.room.message` or `m.sticker` event.
    /// Anything else, or a message without a body, yields `None`.
    pub fn decode(event_type: &str, content: &Value) -> Option<Self> {
        let body = content.get("body").and_then(Value::as_str)?.to_owned();
        let url = || {
            content
                .get("url")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned)
        };

        match event_type {
            "m.sticker" => Some(Self::Sticker { body, url: url()? }),
            "m.room.message" => {
                let msgtype = content.get("msgtype").and_then(Value::as_str)?;
                match msgtype {
                    "m.emote" => Some(Self::Emote { body }),
                    "m.image" | "m.audio" | "m.file" | "m.video" => {
                        Some(Self::Media { body, url: url()? })
                    }
                    "m.text" | "m.notice" => Some(Self::PlainText { body }),
                    other => {
                        debug!("ignoring unsupported msgtype {}", other);
                        None
                    }
                }
            }
            _ => None,
        }
    }
}

fn reply_target(content: &Value) -> Option<String> {
    content
        .pointer("/m.relates_to/m.in_reply_to/event_id")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
}

/// Whether an event is too old to relay. Events stamped in the future are
/// never stale.
pub fn is_stale(timestamp_ms: i64, now_ms: i64, limit_ms: i64) -> bool {
    now_ms - timestamp_ms > limit_ms
}
