//! Core domain + orchestration logic for the Telegram channel scraper.
//!
//! This crate is intentionally framework-agnostic. Telegram / MongoDB live
//! behind ports (traits) implemented in adapter crates.

pub mod chunker;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod ports;
pub mod scrape;

pub use errors::{Error, Result};
