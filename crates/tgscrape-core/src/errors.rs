/// Core error type for the scraper.
///
/// Adapter crates map their library errors into this type so the pipeline can
/// handle failures consistently (degraded fallback vs per-channel skip).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("telegram error: {0}")]
    Source(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("chunking error: {0}")]
    Chunk(String),
}

pub type Result<T> = std::result::Result<T, Error>;
