//! HTTP surface: router, handlers, and the listener loop.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header::RANGE;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::transfer::{decide, Relayed};
use crate::upstream::{file_name, Fetch, HttpFetcher};

pub const DOWNLOAD_ROUTE: &str = "/api/filedownload/download";

#[derive(Clone)]
struct AppState {
    fetcher: Arc<dyn Fetch>,
}

#[derive(Debug, Deserialize)]
struct DownloadQuery {
    #[serde(rename = "fileUrl")]
    file_url: Option<String>,
}

/// Build the relay router around `fetcher`.
pub fn router(fetcher: Arc<dyn Fetch>) -> Router {
    Router::new()
        .route("/", get(greet))
        .route(DOWNLOAD_ROUTE, get(download))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { fetcher })
}

async fn greet() -> Json<Value> {
    Json(json!({ "message": "Hello, World!" }))
}

async fn download(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
    headers: HeaderMap,
) -> Result<Response> {
    let url = parse_file_url(query.file_url)?;

    let resource = state.fetcher.fetch(&url).await?;

    let range = match headers.get(RANGE) {
        Some(value) => match value.to_str() {
            Ok(text) => Some(text.to_string()),
            Err(_) => {
                let lossy = String::from_utf8_lossy(value.as_bytes()).into_owned();
                return Err(Error::MalformedRange(lossy));
            }
        },
        None => None,
    };

    let outcome = decide(range.as_deref(), resource.body, resource.total_length);

    Ok(Relayed::new(outcome)
        .content_type(resource.content_type)
        .file_name(file_name(&url).map(str::to_string))
        .into_response())
}

fn parse_file_url(file_url: Option<String>) -> Result<Url> {
    let raw = file_url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| Error::InvalidUrl(String::new()))?;
    match Url::parse(&raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(url),
        _ => Err(Error::InvalidUrl(raw)),
    }
}

/// Serve the relay on `config.bind_address` until Ctrl-C.
pub async fn serve(config: RelayConfig) -> Result<()> {
    let fetcher = HttpFetcher::new(&config)?;
    let app = router(Arc::new(fetcher));

    let listener = TcpListener::bind(config.bind_address).await?;
    tracing::info!(address = %config.bind_address, "range relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("range relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
