use std::sync::Arc;

use clap::Parser;
use tracing::warn;

use tgscrape_api::AppState;
use tgscrape_core::{
    chunker::TokenChunker,
    config::Config,
    ports::{ChannelSource, ChannelStore},
    scrape::{successes, ScrapeLimits, Scraper},
};
use tgscrape_mongo::MongoStore;
use tgscrape_telegram::GrammersSource;

/// Scrape recent messages and metadata from Telegram channels.
#[derive(Debug, Parser)]
#[command(name = "tgscrape")]
struct Cli {
    /// Run the HTTP API instead of a one-shot scrape.
    #[arg(long)]
    serve: bool,

    /// Channel usernames to scrape (one-shot mode, JSON on stdout).
    channels: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), tgscrape_core::Error> {
    tgscrape_core::logging::init("tgscrape")?;

    let cli = Cli::parse();
    let cfg = Arc::new(Config::load()?);

    if !cli.serve && cli.channels.is_empty() {
        println!("[]");
        return Ok(());
    }

    let client = tgscrape_telegram::connect(&cfg).await?;
    tgscrape_telegram::auth::ensure_authorized(&client, &cfg).await?;
    let source: Arc<dyn ChannelSource> = Arc::new(GrammersSource::new(client));

    // Persistence is best-effort: an unreachable store downgrades the run to
    // scrape-only instead of aborting it.
    let store: Option<Arc<dyn ChannelStore>> =
        match MongoStore::connect(&cfg.mongo_uri, &cfg.mongo_db, &cfg.mongo_collection).await {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                warn!(error = %e, "store unavailable, results will not be persisted");
                None
            }
        };

    let scraper = Scraper::new(
        source,
        store,
        TokenChunker::new(cfg.max_tokens)?,
        ScrapeLimits::from_config(&cfg),
        cfg.avatar_dir.clone(),
        cfg.concurrency_limit,
    );

    if cli.serve {
        let state = Arc::new(AppState {
            scraper,
            avatar_dir: cfg.avatar_dir.clone(),
        });
        tgscrape_api::serve(cfg.http_addr, state).await?;
    } else {
        let outcomes = scraper.scrape_all(&cli.channels).await;
        println!("{}", serde_json::to_string(&successes(outcomes))?);
    }

    Ok(())
}
