//! `ChannelSource` implementation over a connected grammers client.

use std::{
    collections::HashMap,
    path::Path,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use grammers_client::{types::Chat, Client};
use grammers_session::PackedType;
use grammers_tl_types as tl;

use tgscrape_core::{
    ports::{ChannelDetails, ChannelSource, MessageIter, ResolvedChannel, SourceMessage},
    Error, Result,
};

pub struct GrammersSource {
    client: Client,
    // Resolved entities are kept so later calls reuse their access hash.
    chats: Mutex<HashMap<i64, Chat>>,
}

impl GrammersSource {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            chats: Mutex::new(HashMap::new()),
        }
    }

    fn chats(&self) -> MutexGuard<'_, HashMap<i64, Chat>> {
        self.chats.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn cached_chat(&self, id: i64) -> Result<Chat> {
        self.chats()
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::Source(format!("channel {id} was not resolved first")))
    }
}

#[async_trait]
impl ChannelSource for GrammersSource {
    async fn resolve(&self, username: &str) -> Result<ResolvedChannel> {
        let chat = self
            .client
            .resolve_username(username)
            .await
            .map_err(|e| Error::Source(format!("resolve failed: {e}")))?
            .ok_or_else(|| Error::Source(format!("channel not found: {username}")))?;

        let resolved = ResolvedChannel {
            id: chat.id(),
            title: chat.name().to_string(),
            username: chat.username().map(str::to_string),
            participants_hint: cached_participants(&chat),
            has_photo: chat.photo_downloadable(true).is_some(),
        };
        self.chats().insert(chat.id(), chat);
        Ok(resolved)
    }

    async fn full_details(&self, channel: &ResolvedChannel) -> Result<ChannelDetails> {
        let chat = self.cached_chat(channel.id)?;
        let input = input_channel(&chat)
            .ok_or_else(|| Error::Source(format!("{} is not a channel", channel.id)))?;

        let full = self
            .client
            .invoke(&tl::functions::channels::GetFullChannel { channel: input })
            .await
            .map_err(|e| Error::Source(format!("GetFullChannel failed: {e}")))?;

        let tl::enums::messages::ChatFull::Full(full) = full;
        let (about, participants) = match full.full_chat {
            tl::enums::ChatFull::ChannelFull(cf) => (cf.about, cf.participants_count),
            tl::enums::ChatFull::Full(_) => (String::new(), None),
        };

        Ok(ChannelDetails {
            name: chat.name().to_string(),
            username: chat.username().unwrap_or_default().to_string(),
            description: about,
            subscribers: participants
                .map(i64::from)
                .or(channel.participants_hint)
                .unwrap_or(0),
        })
    }

    fn messages(&self, channel: &ResolvedChannel, limit: usize) -> Box<dyn MessageIter> {
        match self.cached_chat(channel.id) {
            Ok(chat) => Box::new(HistoryIter {
                inner: self.client.iter_messages(&chat).limit(limit),
            }),
            Err(e) => Box::new(FailedIter(Some(e))),
        }
    }

    async fn download_avatar(&self, channel: &ResolvedChannel, dest: &Path) -> Result<bool> {
        let chat = self.cached_chat(channel.id)?;
        let Some(photo) = chat.photo_downloadable(true) else {
            return Ok(false);
        };
        self.client
            .download_media(&photo, dest)
            .await
            .map_err(|e| Error::Source(format!("avatar download failed: {e}")))?;
        Ok(true)
    }
}

struct HistoryIter {
    inner: grammers_client::client::messages::MessageIter,
}

#[async_trait]
impl MessageIter for HistoryIter {
    async fn next(&mut self) -> Result<Option<SourceMessage>> {
        let msg = self
            .inner
            .next()
            .await
            .map_err(|e| Error::Source(format!("message fetch failed: {e}")))?;
        Ok(msg.map(|m| SourceMessage {
            id: m.id(),
            date: Some(m.date()),
            text: m.text().to_string(),
            reply_to_msg_id: m.reply_to_message_id(),
        }))
    }
}

/// Iterator standing in for a chat that was never resolved; yields the
/// resolution error on first poll.
struct FailedIter(Option<Error>);

#[async_trait]
impl MessageIter for FailedIter {
    async fn next(&mut self) -> Result<Option<SourceMessage>> {
        match self.0.take() {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }
}

fn cached_participants(chat: &Chat) -> Option<i64> {
    match chat {
        Chat::Channel(channel) => channel.raw.participants_count.map(i64::from),
        _ => None,
    }
}

fn input_channel(chat: &Chat) -> Option<tl::enums::InputChannel> {
    let packed = chat.pack();
    match packed.ty {
        PackedType::Broadcast | PackedType::Megagroup | PackedType::Gigagroup => Some(
            tl::types::InputChannel {
                channel_id: packed.id,
                access_hash: packed.access_hash.unwrap_or(0),
            }
            .into(),
        ),
        _ => None,
    }
}
