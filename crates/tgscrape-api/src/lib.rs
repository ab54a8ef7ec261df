//! HTTP front-end (axum).
//!
//! One batch endpoint that delegates to the fan-out orchestrator, plus the
//! avatar file route matching the `avatar` reference stored on records. No
//! auth and no validation beyond body shape; failed channels are simply
//! omitted from the response.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tracing::info;

use tgscrape_core::{
    domain::ChannelRecord,
    scrape::{successes, Scraper},
    Result,
};

pub struct AppState {
    pub scraper: Scraper,
    pub avatar_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct ScrapeRequest {
    pub channels: Vec<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/scrape", post(scrape))
        .route("/api/avatar/{id}", get(avatar))
        .with_state(state)
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}

pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "scrape API listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn scrape(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScrapeRequest>,
) -> Json<Vec<ChannelRecord>> {
    info!(channels = req.channels.len(), "scrape batch requested");
    let outcomes = state.scraper.scrape_all(&req.channels).await;
    Json(successes(outcomes))
}

async fn avatar(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> impl IntoResponse {
    let path = state.avatar_dir.join(format!("{id}.jpg"));
    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}
