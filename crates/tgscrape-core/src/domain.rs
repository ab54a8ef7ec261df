use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One token-bounded slice of a single message's text.
///
/// A message shorter than the token limit produces exactly one chunk;
/// longer messages split into consecutive windows with `chunk_index`
/// counting from 1 in message order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageChunk {
    #[serde(rename = "messageid")]
    pub message_id: i32,
    pub date: DateTime<Utc>,
    pub text: String,
    pub chunk_index: usize,
    pub is_reply: bool,
    pub reply_to_msg_id: Option<i32>,
}

/// Snapshot of one channel, rebuilt from scratch on every scrape and
/// upserted wholesale keyed by `channel_id`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChannelRecord {
    #[serde(rename = "channelid")]
    pub channel_id: String,
    pub channel_username: String,
    pub name: String,
    pub description: String,
    pub subscribers: i64,
    pub avatar: String,
    pub messages: Vec<MessageChunk>,
    pub scraped_at: DateTime<Utc>,
}

impl ChannelRecord {
    /// Public avatar reference for a channel id, matching the HTTP route.
    pub fn avatar_ref(channel_id: i64) -> String {
        format!("/api/avatar/{channel_id}")
    }
}
