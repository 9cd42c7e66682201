// src/api.rs
//! HTTP surface: health, batch harvest, and a server-sent-events harvest stream.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::config::HarvestConfig;
use crate::harvest::{
    run_batch, stream_harvest, BatchResponse, HarvestError, HarvestRequest, Harvester,
    RemoteSourceClient,
};

#[derive(Clone)]
pub struct AppState {
    client_name: &'static str,
    batch: Harvester,
    streaming: Harvester,
}

impl AppState {
    pub fn new(client: Arc<dyn RemoteSourceClient>, cfg: &HarvestConfig) -> Self {
        Self {
            client_name: client.name(),
            batch: Harvester::new(client.clone(), cfg.batch.paging()),
            streaming: Harvester::new(client, cfg.streaming.paging()),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/harvest", post(harvest_batch))
        .route("/api/harvest/stream", post(harvest_stream))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Identifiers as a JSON array, or one newline/comma delimited string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SourceList {
    List(Vec<String>),
    Text(String),
}

impl SourceList {
    fn into_vec(self) -> Vec<String> {
        match self {
            SourceList::List(v) => v,
            SourceList::Text(s) => split_source_identifiers(&s),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitBody {
    source_identifiers: SourceList,
    #[serde(default)]
    member_limit: Option<usize>,
    #[serde(default)]
    exclude_bots: bool,
}

impl SubmitBody {
    fn into_request(self) -> HarvestRequest {
        HarvestRequest {
            source_identifiers: self.source_identifiers.into_vec(),
            member_limit: self.member_limit,
            exclude_bots: self.exclude_bots,
        }
    }
}

/// Split caller text on newlines and commas, dropping blanks.
pub fn split_source_identifiers(raw: &str) -> Vec<String> {
    raw.split(['\n', ','])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "message": "Member Harvester API" }))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy", "client": state.client_name }))
}

async fn harvest_batch(
    State(state): State<AppState>,
    Json(body): Json<SubmitBody>,
) -> (StatusCode, Json<BatchResponse>) {
    let req = body.into_request();
    // Cancelled when axum drops this future (client gone) mid-harvest.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    match run_batch(&state.batch, &req, &cancel).await {
        Ok(resp) => (StatusCode::OK, Json(resp)),
        Err(e) => {
            let code = match e {
                HarvestError::NoSources => StatusCode::BAD_REQUEST,
                HarvestError::Fatal(_) | HarvestError::Cancelled => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            (code, Json(BatchResponse::error(&e)))
        }
    }
}

async fn harvest_stream(
    State(state): State<AppState>,
    Json(body): Json<SubmitBody>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Dropping the response body (client gone) drops the stream and cancels the harvest.
    let events = stream_harvest(state.streaming.clone(), body.into_request()).filter_map(
        |ev| async move {
            Event::default()
                .event(ev.kind())
                .json_data(&ev)
                .ok()
                .map(Ok)
        },
    );
    Sse::new(events).keep_alive(KeepAlive::default())
}
