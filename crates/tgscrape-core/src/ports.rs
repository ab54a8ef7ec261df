use std::path::Path;

use chrono::{DateTime, Utc};

use crate::Result;

/// A resolved handle to a channel, carrying whatever metadata the client
/// library caches on resolution. These fields are the degraded fallback when
/// the enriched detail fetch fails.
#[derive(Clone, Debug)]
pub struct ResolvedChannel {
    pub id: i64,
    pub title: String,
    pub username: Option<String>,
    /// Last-known participant count, if the resolver had one cached.
    pub participants_hint: Option<i64>,
    pub has_photo: bool,
}

/// Enriched channel metadata from a full-channel request.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelDetails {
    pub name: String,
    pub username: String,
    pub description: String,
    pub subscribers: i64,
}

/// One raw message as handed over by the client library, before filtering
/// and chunking.
#[derive(Clone, Debug)]
pub struct SourceMessage {
    pub id: i32,
    pub date: Option<DateTime<Utc>>,
    pub text: String,
    pub reply_to_msg_id: Option<i32>,
}

/// Pull-based message iteration, newest first. Mirrors the client library's
/// paged iterators so the cutoff check can stop paging early.
#[async_trait::async_trait]
pub trait MessageIter: Send {
    async fn next(&mut self) -> Result<Option<SourceMessage>>;
}

/// Hexagonal port for the Telegram side. Implemented by the grammers adapter
/// and by in-memory fakes in tests.
#[async_trait::async_trait]
pub trait ChannelSource: Send + Sync {
    /// Resolve a channel username to an entity handle.
    async fn resolve(&self, username: &str) -> Result<ResolvedChannel>;

    /// Enriched metadata fetch (about text, live participant count).
    /// Callers must treat failure as recoverable.
    async fn full_details(&self, channel: &ResolvedChannel) -> Result<ChannelDetails>;

    /// Recent messages, newest first, capped at `limit`.
    fn messages(&self, channel: &ResolvedChannel, limit: usize) -> Box<dyn MessageIter>;

    /// Download the channel's profile photo to `dest`. Returns `false` when
    /// the channel has no photo to download.
    async fn download_avatar(&self, channel: &ResolvedChannel, dest: &Path) -> Result<bool>;
}

/// Hexagonal port for persistence: insert-or-update keyed by channel id.
#[async_trait::async_trait]
pub trait ChannelStore: Send + Sync {
    async fn upsert(&self, record: &crate::domain::ChannelRecord) -> Result<()>;
}
