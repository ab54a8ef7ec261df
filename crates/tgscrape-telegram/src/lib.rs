//! Telegram adapter (grammers).
//!
//! Implements the `tgscrape-core` ChannelSource port over the grammers
//! MTProto client. Connection, encryption, flood control and pagination are
//! the library's job; this crate maps between its types and the core ports.

use grammers_client::{Client, Config as ClientConfig, InitParams};
use grammers_session::Session;
use tracing::{info, warn};

use tgscrape_core::{config::Config, Error, Result};

pub mod auth;
mod proxy;
mod source;

pub use source::GrammersSource;

/// Connect the MTProto client using the saved session, optionally tunneled
/// through the configured proxy. A malformed proxy config degrades to a
/// direct connection rather than failing startup.
pub async fn connect(cfg: &Config) -> Result<Client> {
    let session = Session::load_file_or_create(&cfg.session_file)?;

    let mut params = InitParams::default();
    match proxy::proxy_url(cfg) {
        Ok(Some(url)) => {
            info!(addr = cfg.proxy_addr.as_deref().unwrap_or_default(), "proxy configured");
            params.proxy_url = Some(url);
        }
        Ok(None) => {}
        Err(e) => {
            warn!(error = %e, "invalid proxy config, falling back to direct connection");
        }
    }

    let client = Client::connect(ClientConfig {
        session,
        api_id: cfg.api_id,
        api_hash: cfg.api_hash.clone(),
        params,
    })
    .await
    .map_err(|e| Error::Source(format!("connect failed: {e}")))?;

    Ok(client)
}
