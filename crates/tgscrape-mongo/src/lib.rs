//! MongoDB adapter.
//!
//! Implements the `tgscrape-core` ChannelStore port: channel records are
//! upserted wholesale into one collection, keyed by `channelid`. The store is
//! optional at runtime; when the server is unreachable at startup the caller
//! drops persistence and keeps scraping.

use std::time::Duration;

use async_trait::async_trait;
use mongodb::{
    bson::{doc, to_document},
    options::ClientOptions,
    Client, Collection,
};
use tracing::info;

use tgscrape_core::{domain::ChannelRecord, ports::ChannelStore, Error, Result};

const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(2);

pub struct MongoStore {
    collection: Collection<ChannelRecord>,
}

impl MongoStore {
    /// Connect and verify the server responds. A short selection timeout
    /// keeps startup snappy when the store is down.
    pub async fn connect(uri: &str, db: &str, collection: &str) -> Result<Self> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| Error::Store(format!("invalid mongo uri: {e}")))?;
        options.server_selection_timeout = Some(SERVER_SELECTION_TIMEOUT);

        let client =
            Client::with_options(options).map_err(|e| Error::Store(format!("mongo client: {e}")))?;
        let database = client.database(db);
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| Error::Store(format!("mongo unreachable: {e}")))?;

        info!(db, collection, "mongo store connected");
        Ok(Self {
            collection: database.collection(collection),
        })
    }
}

#[async_trait]
impl ChannelStore for MongoStore {
    async fn upsert(&self, record: &ChannelRecord) -> Result<()> {
        let update = to_document(record).map_err(|e| Error::Store(format!("serialize: {e}")))?;
        self.collection
            .update_one(
                doc! { "channelid": &record.channel_id },
                doc! { "$set": update },
            )
            .upsert(true)
            .await
            .map_err(|e| Error::Store(format!("upsert failed: {e}")))?;
        Ok(())
    }
}
