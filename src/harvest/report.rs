// src/harvest/report.rs
//! Reporters: one aggregate (batch) or an ordered event stream (streaming).

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::harvest::error::HarvestError;
use crate::harvest::orchestrator::{HarvestOutcome, Harvester, ProgressSink, TracingSink};
use crate::harvest::types::{ContactRecord, HarvestRequest};

const STREAM_BUFFER: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ProgressEvent {
    Connected {},
    SourceStart {
        source_url: String,
        source_index: usize,
        total_sources: usize,
    },
    Batch {
        source_name: String,
        batch_index: usize,
        total_processed_so_far: usize,
        new_records_in_batch: usize,
        records: Vec<ContactRecord>,
    },
    SourceComplete {
        source_name: String,
        total_from_this_source: usize,
        records: Vec<ContactRecord>,
    },
    SourceError {
        source_url: String,
        error_message: String,
    },
    Complete {
        total_contacts: usize,
        processing_time_seconds: f64,
        contacts: Vec<ContactRecord>,
    },
    FatalError {
        error_message: String,
    },
}

impl ProgressEvent {
    /// Tag as it appears on the wire, e.g. `"source_start"`.
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::Connected {} => "connected",
            ProgressEvent::SourceStart { .. } => "source_start",
            ProgressEvent::Batch { .. } => "batch",
            ProgressEvent::SourceComplete { .. } => "source_complete",
            ProgressEvent::SourceError { .. } => "source_error",
            ProgressEvent::Complete { .. } => "complete",
            ProgressEvent::FatalError { .. } => "fatal_error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Complete { .. } | ProgressEvent::FatalError { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub status: Status,
    pub contacts: Vec<ContactRecord>,
    pub total_contacts: usize,
    pub processing_time_seconds: f64,
    pub message: String,
}

impl BatchResponse {
    pub fn success(outcome: HarvestOutcome) -> Self {
        let message = outcome.message();
        Self {
            status: Status::Success,
            total_contacts: outcome.contacts.len(),
            processing_time_seconds: outcome.elapsed.as_secs_f64(),
            contacts: outcome.contacts,
            message,
        }
    }

    pub fn error(err: &HarvestError) -> Self {
        Self {
            status: Status::Error,
            contacts: Vec::new(),
            total_contacts: 0,
            processing_time_seconds: 0.0,
            message: err.to_string(),
        }
    }
}

/// Run a harvest to completion and return one aggregate.
///
/// Errors are harvest-scoped only (`NoSources`, `Fatal`, `Cancelled`); source
/// failures are absorbed into the outcome.
pub async fn run_batch(
    harvester: &Harvester,
    req: &HarvestRequest,
    cancel: &CancellationToken,
) -> Result<BatchResponse, HarvestError> {
    let outcome = harvester.run(req, &mut TracingSink, cancel).await?;
    Ok(BatchResponse::success(outcome))
}

/// Forwards events into a bounded channel; a closed receiver cancels the harvest.
struct ChannelSink {
    tx: mpsc::Sender<ProgressEvent>,
    cancel: CancellationToken,
}

#[async_trait]
impl ProgressSink for ChannelSink {
    async fn emit(&mut self, event: ProgressEvent) {
        if self.tx.send(event).await.is_err() {
            self.cancel.cancel();
        }
    }
}

/// Event stream of one running harvest. Dropping it cancels the harvest.
pub struct HarvestStream {
    inner: ReceiverStream<ProgressEvent>,
    _guard: DropGuard,
}

impl Stream for HarvestStream {
    type Item = ProgressEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Spawn a harvest and surface its progress as an ordered event stream:
/// `connected`, the orchestrator's events, then exactly one `complete` or
/// `fatal_error`. A cancelled harvest ends the stream without a terminal event.
pub fn stream_harvest(harvester: Harvester, req: HarvestRequest) -> HarvestStream {
    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    tokio::spawn(async move {
        let mut sink = ChannelSink {
            tx: tx.clone(),
            cancel: cancel.clone(),
        };
        sink.emit(ProgressEvent::Connected {}).await;

        let terminal = match harvester.run(&req, &mut sink, &cancel).await {
            Ok(outcome) => ProgressEvent::Complete {
                total_contacts: outcome.contacts.len(),
                processing_time_seconds: outcome.elapsed.as_secs_f64(),
                contacts: outcome.contacts,
            },
            Err(HarvestError::Cancelled) => {
                tracing::info!(target: "harvest", "streaming harvest cancelled");
                return;
            }
            Err(e) => ProgressEvent::FatalError {
                error_message: e.to_string(),
            },
        };
        let _ = tx.send(terminal).await;
    });

    HarvestStream {
        inner: ReceiverStream::new(rx),
        _guard: guard,
    }
}
