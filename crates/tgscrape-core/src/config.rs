use std::{
    env, fs,
    net::SocketAddr,
    path::PathBuf,
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration for the scraper, loaded once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram API credentials
    pub api_id: i32,
    pub api_hash: String,
    pub phone: Option<String>,

    // Local state
    pub session_file: PathBuf,
    pub avatar_dir: PathBuf,

    // Persistence (optional at runtime; absence degrades to no-op)
    pub mongo_uri: String,
    pub mongo_db: String,
    pub mongo_collection: String,

    // MTProxy tunneling
    pub proxy_addr: Option<String>,
    pub proxy_secret: Option<String>,

    // Scrape limits
    pub days_back: i64,
    pub message_cap: usize,
    pub max_tokens: usize,
    pub concurrency_limit: usize,

    // HTTP API
    pub http_addr: SocketAddr,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let api_id = env_str("TG_API_ID")
            .and_then(|s| s.trim().parse::<i32>().ok())
            .ok_or_else(|| Error::Config("TG_API_ID environment variable is required".to_string()))?;
        let api_hash = env_str("TG_API_HASH")
            .and_then(non_empty)
            .ok_or_else(|| Error::Config("TG_API_HASH environment variable is required".to_string()))?;
        let phone = env_str("TG_PHONE").and_then(non_empty);

        let session_dir = env_path("SESSION_DIR").unwrap_or_else(|| PathBuf::from("sessions"));
        let avatar_dir = env_path("AVATAR_DIR").unwrap_or_else(|| PathBuf::from("channel_profiles"));
        fs::create_dir_all(&session_dir)?;
        fs::create_dir_all(&avatar_dir)?;
        let session_file = session_dir.join("scraper.session");

        let mongo_uri =
            env_str("MONGO_URI").unwrap_or_else(|| "mongodb://mymongo:27017".to_string());
        let mongo_db = env_str("MONGO_DB").unwrap_or_else(|| "telegram_scraper".to_string());
        let mongo_collection =
            env_str("MONGO_COLLECTION").unwrap_or_else(|| "channels".to_string());

        let proxy_addr = env_str("PROXY_ADDR").and_then(non_empty);
        let proxy_secret = env_str("PROXY_SECRET").and_then(non_empty);

        let days_back = env_i64("DAYS_BACK").unwrap_or(3);
        let message_cap = env_usize("MESSAGE_CAP").unwrap_or(150);
        let max_tokens = env_usize("MAX_TOKENS").unwrap_or(4096);
        let concurrency_limit = env_usize("CONCURRENCY_LIMIT").unwrap_or(3).max(1);

        let http_addr = env_str("HTTP_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8000".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| Error::Config(format!("invalid HTTP_ADDR: {e}")))?;

        Ok(Self {
            api_id,
            api_hash,
            phone,
            session_file,
            avatar_dir,
            mongo_uri,
            mongo_db,
            mongo_collection,
            proxy_addr,
            proxy_secret,
            days_back,
            message_cap,
            max_tokens,
            concurrency_limit,
            http_addr,
        })
    }

    /// Jittered pause inserted between the metadata fetch and message paging
    /// of each channel, to stay under upstream flood limits.
    pub fn scrape_pause(&self) -> (Duration, Duration) {
        (Duration::from_secs(1), Duration::from_secs(2))
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn env_i64(key: &str) -> Option<i64> {
    env_str(key).and_then(|s| s.trim().parse::<i64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
