//! Proxy URL construction.
//!
//! The shared secret arrives base64-encoded, often with its padding stripped
//! by whoever copied it around. Fix the padding, decode, and hex-encode it
//! into the form the tunnel expects. grammers speaks SOCKS5/HTTP proxies, so
//! the endpoint is addressed as a SOCKS5 tunnel with the decoded secret
//! carried in the URL userinfo.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use tgscrape_core::{config::Config, Error, Result};

/// Build the proxy URL from config, or `None` when no proxy is configured.
pub(crate) fn proxy_url(cfg: &Config) -> Result<Option<String>> {
    let Some(addr) = &cfg.proxy_addr else {
        return Ok(None);
    };

    let url = match &cfg.proxy_secret {
        Some(secret) => format!("socks5://{}@{addr}", decode_secret(secret)?),
        None => format!("socks5://{addr}"),
    };
    Ok(Some(url))
}

/// Decode a base64 secret (padding optional) to its hex form.
pub(crate) fn decode_secret(raw: &str) -> Result<String> {
    let padded = fix_base64_padding(raw);
    let bytes = STANDARD
        .decode(padded)
        .map_err(|e| Error::Config(format!("invalid proxy secret: {e}")))?;
    Ok(bytes.iter().map(|b| format!("{b:02x}")).collect())
}

fn fix_base64_padding(s: &str) -> String {
    let missing = (4 - s.len() % 4) % 4;
    let mut out = s.to_string();
    out.push_str(&"=".repeat(missing));
    out
}
