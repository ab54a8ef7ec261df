//! Per-channel scrape pipeline and bounded fan-out.
//!
//! One task per channel, all gated by a single semaphore so the upstream
//! client sees at most `concurrency_limit` request streams at once. A failing
//! channel becomes an explicit `Skipped` outcome; it never aborts siblings.

use std::{path::PathBuf, sync::Arc, time::Duration};

use chrono::Utc;
use rand::Rng;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::{
    chunker::TokenChunker,
    config::Config,
    domain::{ChannelRecord, MessageChunk},
    ports::{ChannelDetails, ChannelSource, ChannelStore, ResolvedChannel},
    Result,
};

/// Outcome of one per-channel task.
///
/// `Skipped` replaces the null-result convention: callers can tell "failed
/// and omitted" apart from "legitimately empty".
#[derive(Debug)]
pub enum ScrapeOutcome {
    Scraped(ChannelRecord),
    Skipped { channel: String, reason: String },
}

impl ScrapeOutcome {
    pub fn into_record(self) -> Option<ChannelRecord> {
        match self {
            ScrapeOutcome::Scraped(r) => Some(r),
            ScrapeOutcome::Skipped { .. } => None,
        }
    }
}

/// Collapse outcomes to the successful records, dropping skips.
/// This is the shape the HTTP and CLI surfaces return.
pub fn successes(outcomes: Vec<ScrapeOutcome>) -> Vec<ChannelRecord> {
    outcomes.into_iter().filter_map(ScrapeOutcome::into_record).collect()
}

/// Tunables for one scrape run.
#[derive(Clone, Debug)]
pub struct ScrapeLimits {
    /// Look-back window; messages must be strictly newer than `now - days_back`.
    pub days_back: i64,
    /// Hard cap on messages pulled per channel.
    pub message_cap: usize,
    /// Jittered pause bounds between metadata fetch and message paging.
    pub pause_min: Duration,
    pub pause_max: Duration,
}

impl ScrapeLimits {
    pub fn from_config(cfg: &Config) -> Self {
        let (pause_min, pause_max) = cfg.scrape_pause();
        Self {
            days_back: cfg.days_back,
            message_cap: cfg.message_cap,
            pause_min,
            pause_max,
        }
    }
}

#[derive(Clone)]
pub struct Scraper {
    inner: Arc<ScraperInner>,
}

struct ScraperInner {
    source: Arc<dyn ChannelSource>,
    store: Option<Arc<dyn ChannelStore>>,
    chunker: TokenChunker,
    limits: ScrapeLimits,
    avatar_dir: PathBuf,
    gate: Arc<Semaphore>,
}

impl Scraper {
    pub fn new(
        source: Arc<dyn ChannelSource>,
        store: Option<Arc<dyn ChannelStore>>,
        chunker: TokenChunker,
        limits: ScrapeLimits,
        avatar_dir: PathBuf,
        concurrency_limit: usize,
    ) -> Self {
        Self {
            inner: Arc::new(ScraperInner {
                source,
                store,
                chunker,
                limits,
                avatar_dir,
                gate: Arc::new(Semaphore::new(concurrency_limit.max(1))),
            }),
        }
    }

    /// Run scrape tasks for every channel under the concurrency gate and wait
    /// for all of them. Outcomes come back in spawn order; a panicking or
    /// failing task yields `Skipped` for its channel only.
    pub async fn scrape_all(&self, channels: &[String]) -> Vec<ScrapeOutcome> {
        let mut handles = Vec::with_capacity(channels.len());
        for channel in channels {
            let scraper = self.clone();
            let channel = channel.clone();
            handles.push(tokio::spawn(async move {
                scraper.scrape_channel(&channel).await
            }));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (handle, channel) in handles.into_iter().zip(channels) {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => outcomes.push(ScrapeOutcome::Skipped {
                    channel: channel.clone(),
                    reason: format!("task failed: {e}"),
                }),
            }
        }
        outcomes
    }

    /// Scrape a single channel. Every failure is caught here and converted
    /// into a skip; nothing propagates to the caller.
    pub async fn scrape_channel(&self, username: &str) -> ScrapeOutcome {
        let _permit = match Arc::clone(&self.inner.gate).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return ScrapeOutcome::Skipped {
                    channel: username.to_string(),
                    reason: "concurrency gate closed".to_string(),
                }
            }
        };

        match self.try_scrape(username).await {
            Ok(record) => {
                info!(channel = username, messages = record.messages.len(), "channel scraped");
                ScrapeOutcome::Scraped(record)
            }
            Err(e) => {
                warn!(channel = username, error = %e, "channel skipped");
                ScrapeOutcome::Skipped {
                    channel: username.to_string(),
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn try_scrape(&self, username: &str) -> Result<ChannelRecord> {
        let channel = self.inner.source.resolve(username).await?;
        let details = self.details_or_cached(&channel).await;

        self.fetch_avatar(&channel).await;
        self.pause().await;

        let messages = self.collect_chunks(&channel).await?;

        let record = ChannelRecord {
            channel_id: channel.id.to_string(),
            channel_username: username.to_string(),
            name: details.name,
            description: details.description,
            subscribers: details.subscribers,
            avatar: ChannelRecord::avatar_ref(channel.id),
            messages,
            scraped_at: Utc::now(),
        };

        self.persist(&record).await;
        Ok(record)
    }

    /// Enriched detail fetch with graceful degradation: on failure, fall back
    /// to the fields cached on the resolved handle. Never fails the scrape.
    async fn details_or_cached(&self, channel: &ResolvedChannel) -> ChannelDetails {
        match self.inner.source.full_details(channel).await {
            Ok(details) => details,
            Err(e) => {
                warn!(channel_id = channel.id, error = %e, "detail fetch failed, using cached fields");
                ChannelDetails {
                    name: channel.title.clone(),
                    username: channel.username.clone().unwrap_or_default(),
                    description: String::new(),
                    subscribers: channel.participants_hint.unwrap_or(0),
                }
            }
        }
    }

    /// Best-effort avatar download: skipped when the channel has no photo or
    /// the file is already cached; a failed download is logged and dropped.
    async fn fetch_avatar(&self, channel: &ResolvedChannel) {
        if !channel.has_photo {
            return;
        }
        let dest = self.inner.avatar_dir.join(format!("{}.jpg", channel.id));
        if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            return;
        }
        if let Err(e) = self.inner.source.download_avatar(channel, &dest).await {
            warn!(channel_id = channel.id, error = %e, "avatar download failed");
        }
    }

    async fn pause(&self) {
        let min = self.inner.limits.pause_min;
        let max = self.inner.limits.pause_max;
        if max.is_zero() {
            return;
        }
        let ms = rand::rng().random_range(min.as_millis() as u64..=max.as_millis() as u64);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    /// Page through recent messages newest-first, stop at the first message
    /// not strictly newer than the cutoff, skip messages without text or
    /// timestamp, and chunk the rest.
    async fn collect_chunks(&self, channel: &ResolvedChannel) -> Result<Vec<MessageChunk>> {
        let cutoff = Utc::now() - chrono::Duration::days(self.inner.limits.days_back);
        let mut iter = self.inner.source.messages(channel, self.inner.limits.message_cap);

        let mut chunks = Vec::new();
        while let Some(msg) = iter.next().await? {
            let Some(date) = msg.date else {
                continue;
            };
            if msg.text.is_empty() {
                continue;
            }
            if date <= cutoff {
                break;
            }

            let segments = match self.inner.chunker.chunk(&msg.text) {
                Ok(segments) => segments,
                Err(e) => {
                    warn!(channel_id = channel.id, message_id = msg.id, error = %e, "chunking failed, message skipped");
                    continue;
                }
            };

            for (idx, text) in segments.into_iter().enumerate() {
                chunks.push(MessageChunk {
                    message_id: msg.id,
                    date,
                    text,
                    chunk_index: idx + 1,
                    is_reply: msg.reply_to_msg_id.is_some(),
                    reply_to_msg_id: msg.reply_to_msg_id,
                });
            }
        }
        Ok(chunks)
    }

    /// Best-effort persistence: absence of a store, or a failing upsert,
    /// never fails the scrape.
    async fn persist(&self, record: &ChannelRecord) {
        let Some(store) = &self.inner.store else {
            return;
        };
        if let Err(e) = store.upsert(record).await {
            warn!(channel_id = %record.channel_id, error = %e, "upsert failed, result not persisted");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        path::Path,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use chrono::{DateTime, Utc};

    use super::*;
    use crate::{
        ports::{MessageIter, SourceMessage},
        Error,
    };

    struct FakeIter(std::vec::IntoIter<SourceMessage>);

    #[async_trait::async_trait]
    impl MessageIter for FakeIter {
        async fn next(&mut self) -> Result<Option<SourceMessage>> {
            Ok(self.0.next())
        }
    }

    struct FakeSource {
        failing: Vec<String>,
        msgs: Vec<SourceMessage>,
        details: Option<ChannelDetails>,
        hold: Duration,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl FakeSource {
        fn new(msgs: Vec<SourceMessage>) -> Self {
            Self {
                failing: Vec::new(),
                msgs,
                details: Some(ChannelDetails {
                    name: "Fake Channel".to_string(),
                    username: "fake".to_string(),
                    description: "about".to_string(),
                    subscribers: 99,
                }),
                hold: Duration::ZERO,
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl ChannelSource for FakeSource {
        async fn resolve(&self, username: &str) -> Result<ResolvedChannel> {
            if self.failing.iter().any(|f| f == username) {
                return Err(Error::Source(format!("no user has \"{username}\" as username")));
            }

            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            if !self.hold.is_zero() {
                tokio::time::sleep(self.hold).await;
            }
            self.active.fetch_sub(1, Ordering::SeqCst);

            Ok(ResolvedChannel {
                id: 42,
                title: "Cached Title".to_string(),
                username: Some(username.to_string()),
                participants_hint: Some(1234),
                has_photo: false,
            })
        }

        async fn full_details(&self, _channel: &ResolvedChannel) -> Result<ChannelDetails> {
            self.details
                .clone()
                .ok_or_else(|| Error::Source("GetFullChannel failed".to_string()))
        }

        fn messages(&self, _channel: &ResolvedChannel, limit: usize) -> Box<dyn MessageIter> {
            let msgs: Vec<_> = self.msgs.iter().take(limit).cloned().collect();
            Box::new(FakeIter(msgs.into_iter()))
        }

        async fn download_avatar(&self, _channel: &ResolvedChannel, _dest: &Path) -> Result<bool> {
            Ok(false)
        }
    }

    struct FailingStore;

    #[async_trait::async_trait]
    impl ChannelStore for FailingStore {
        async fn upsert(&self, _record: &ChannelRecord) -> Result<()> {
            Err(Error::Store("server selection timed out".to_string()))
        }
    }

    fn msg(id: i32, date: DateTime<Utc>, text: &str, reply_to: Option<i32>) -> SourceMessage {
        SourceMessage {
            id,
            date: Some(date),
            text: text.to_string(),
            reply_to_msg_id: reply_to,
        }
    }

    fn limits() -> ScrapeLimits {
        ScrapeLimits {
            days_back: 3,
            message_cap: 150,
            pause_min: Duration::ZERO,
            pause_max: Duration::ZERO,
        }
    }

    fn scraper(source: FakeSource, store: Option<Arc<dyn ChannelStore>>) -> Scraper {
        Scraper::new(
            Arc::new(source),
            store,
            TokenChunker::new(4096).unwrap(),
            limits(),
            std::env::temp_dir(),
            3,
        )
    }

    #[tokio::test]
    async fn unresolvable_channel_is_skipped_without_aborting_batch() {
        let mut source = FakeSource::new(vec![msg(1, Utc::now(), "hello", None)]);
        source.failing.push("missing".to_string());

        let scraper = scraper(source, None);
        let channels = ["alpha", "missing", "beta"].map(String::from);
        let outcomes = scraper.scrape_all(&channels).await;

        assert_eq!(outcomes.len(), 3);
        assert!(matches!(
            &outcomes[1],
            ScrapeOutcome::Skipped { channel, .. } if channel == "missing"
        ));
        assert_eq!(successes(outcomes).len(), 2);
    }

    #[tokio::test]
    async fn boundary_message_at_cutoff_is_excluded() {
        let now = Utc::now();
        let source = FakeSource::new(vec![
            msg(3, now - chrono::Duration::hours(1), "fresh", None),
            msg(2, now - chrono::Duration::days(3), "at cutoff", None),
            msg(1, now - chrono::Duration::days(10), "stale", None),
        ]);

        let record = scraper(source, None)
            .scrape_channel("alpha")
            .await
            .into_record()
            .unwrap();

        assert_eq!(record.messages.len(), 1);
        assert_eq!(record.messages[0].message_id, 3);
    }

    #[tokio::test]
    async fn reply_target_is_carried_and_null_for_non_replies() {
        let now = Utc::now();
        let source = FakeSource::new(vec![
            msg(2, now, "a reply", Some(7)),
            msg(1, now, "not a reply", None),
        ]);

        let record = scraper(source, None)
            .scrape_channel("alpha")
            .await
            .into_record()
            .unwrap();

        assert!(record.messages[0].is_reply);
        assert_eq!(record.messages[0].reply_to_msg_id, Some(7));
        assert!(!record.messages[1].is_reply);
        assert_eq!(record.messages[1].reply_to_msg_id, None);
    }

    #[tokio::test]
    async fn messages_without_text_or_timestamp_are_skipped() {
        let now = Utc::now();
        let mut no_date = msg(2, now, "undated", None);
        no_date.date = None;
        let source = FakeSource::new(vec![
            msg(3, now, "", None),
            no_date,
            msg(1, now, "kept", None),
        ]);

        let record = scraper(source, None)
            .scrape_channel("alpha")
            .await
            .into_record()
            .unwrap();

        assert_eq!(record.messages.len(), 1);
        assert_eq!(record.messages[0].message_id, 1);
    }

    #[tokio::test]
    async fn long_message_produces_indexed_chunks() {
        let source = FakeSource::new(vec![msg(
            1,
            Utc::now(),
            &"chunk me into token windows please ".repeat(20),
            None,
        )]);
        let scraper = Scraper::new(
            Arc::new(source),
            None,
            TokenChunker::new(16).unwrap(),
            limits(),
            std::env::temp_dir(),
            3,
        );

        let record = scraper.scrape_channel("alpha").await.into_record().unwrap();

        assert!(record.messages.len() > 1);
        for (i, chunk) in record.messages.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i + 1);
            assert_eq!(chunk.message_id, 1);
        }
    }

    #[tokio::test]
    async fn failing_store_does_not_fail_the_scrape() {
        let source = FakeSource::new(vec![msg(1, Utc::now(), "hello", None)]);
        let outcome = scraper(source, Some(Arc::new(FailingStore)))
            .scrape_channel("alpha")
            .await;
        assert!(outcome.into_record().is_some());
    }

    #[tokio::test]
    async fn detail_fallback_uses_cached_fields() {
        let mut source = FakeSource::new(vec![]);
        source.details = None;

        let record = scraper(source, None)
            .scrape_channel("alpha")
            .await
            .into_record()
            .unwrap();

        assert_eq!(record.name, "Cached Title");
        assert_eq!(record.subscribers, 1234);
        assert_eq!(record.description, "");
    }

    #[tokio::test]
    async fn fan_out_never_exceeds_the_concurrency_limit() {
        let mut source = FakeSource::new(vec![]);
        source.hold = Duration::from_millis(50);
        let source = Arc::new(source);

        let scraper = Scraper::new(
            source.clone(),
            None,
            TokenChunker::new(4096).unwrap(),
            limits(),
            std::env::temp_dir(),
            3,
        );

        let channels: Vec<String> = (0..8).map(|i| format!("chan{i}")).collect();
        let outcomes = scraper.scrape_all(&channels).await;

        assert_eq!(outcomes.len(), 8);
        assert!(source.max_active.load(Ordering::SeqCst) <= 3);
    }
}
