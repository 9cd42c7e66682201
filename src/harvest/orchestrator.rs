// src/harvest/orchestrator.rs
//! Multi-source orchestration: one source at a time, in caller order.
//!
//! The same [`Harvester::run`] drives both reporting modes; callers pick what
//! to surface through the [`ProgressSink`] they pass in.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, gauge};
use tokio_util::sync::CancellationToken;

use crate::harvest::dedup::ContactSet;
use crate::harvest::error::{ClientError, HarvestError};
use crate::harvest::normalize::normalize_source_identifier;
use crate::harvest::paginate::{PageState, Paginator, PagingCfg};
use crate::harvest::report::ProgressEvent;
use crate::harvest::types::{ContactRecord, HarvestRequest, RemoteSourceClient};

/// Receives progress events in emission order.
#[async_trait]
pub trait ProgressSink: Send {
    async fn emit(&mut self, event: ProgressEvent);
}

/// Sink for batch mode: nothing is surfaced, progress goes to the log.
#[derive(Debug, Default)]
pub struct TracingSink;

#[async_trait]
impl ProgressSink for TracingSink {
    async fn emit(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::SourceStart {
                source_url,
                source_index,
                total_sources,
            } => tracing::info!(target: "harvest", %source_url, source_index, total_sources, "source start"),
            ProgressEvent::SourceComplete {
                source_name,
                total_from_this_source,
                ..
            } => tracing::info!(target: "harvest", %source_name, total_from_this_source, "source complete"),
            ProgressEvent::SourceError {
                source_url,
                error_message,
            } => tracing::warn!(target: "harvest", %source_url, %error_message, "source skipped"),
            _ => {}
        }
    }
}

/// Remaining number of unique contacts the harvest may still collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarvestBudget {
    remaining: Option<usize>,
}

impl HarvestBudget {
    /// A limit of 0 is treated as "no limit".
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            remaining: limit.filter(|&l| l > 0),
        }
    }

    pub fn unlimited() -> Self {
        Self { remaining: None }
    }

    pub fn remaining(&self) -> Option<usize> {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    pub fn consume(&mut self, n: usize) {
        if let Some(r) = self.remaining.as_mut() {
            *r = r.saturating_sub(n);
        }
    }
}

/// Everything one harvest owns; never shared between harvests.
#[derive(Debug)]
pub struct HarvestState {
    pub targets: Vec<String>,
    pub budget: HarvestBudget,
    pub contacts: ContactSet,
}

impl HarvestState {
    pub fn from_request(req: &HarvestRequest) -> Self {
        Self {
            targets: req
                .source_identifiers
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            budget: HarvestBudget::new(req.member_limit),
            contacts: ContactSet::new(),
        }
    }
}

/// Final aggregate of a harvest that ran to completion.
#[derive(Debug, Clone)]
pub struct HarvestOutcome {
    pub contacts: Vec<ContactRecord>,
    pub sources_total: usize,
    pub sources_completed: usize,
    pub sources_failed: usize,
    pub elapsed: Duration,
}

impl HarvestOutcome {
    pub fn message(&self) -> String {
        format!(
            "Successfully harvested {} unique members from {} of {} sources",
            self.contacts.len(),
            self.sources_completed,
            self.sources_total
        )
    }
}

#[derive(Clone)]
pub struct Harvester {
    client: Arc<dyn RemoteSourceClient>,
    cfg: PagingCfg,
}

impl Harvester {
    pub fn new(client: Arc<dyn RemoteSourceClient>, cfg: PagingCfg) -> Self {
        Self { client, cfg }
    }

    pub async fn run<S>(
        &self,
        req: &HarvestRequest,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<HarvestOutcome, HarvestError>
    where
        S: ProgressSink + ?Sized,
    {
        crate::harvest::ensure_metrics_described();
        let t0 = Instant::now();

        let mut state = HarvestState::from_request(req);
        if state.targets.is_empty() {
            return Err(HarvestError::NoSources);
        }
        let total = state.targets.len();
        let mut completed = 0usize;
        let mut failed = 0usize;

        tracing::info!(
            target: "harvest",
            client = self.client.name(),
            sources = total,
            limit = ?state.budget.remaining(),
            exclude_bots = req.exclude_bots,
            "harvest start"
        );

        for (idx, target) in state.targets.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(HarvestError::Cancelled);
            }
            if state.budget.is_exhausted() {
                tracing::info!(target: "harvest", "member limit reached, skipping remaining sources");
                break;
            }

            sink.emit(ProgressEvent::SourceStart {
                source_url: target.clone(),
                source_index: idx + 1,
                total_sources: total,
            })
            .await;

            let res = self
                .run_source(
                    target,
                    req.exclude_bots,
                    &mut state.budget,
                    &mut state.contacts,
                    sink,
                    cancel,
                )
                .await;
            match res {
                Ok(()) => completed += 1,
                Err(SourceFailure::Skipped(e)) => {
                    failed += 1;
                    counter!("harvest_source_errors_total").increment(1);
                    sink.emit(ProgressEvent::SourceError {
                        source_url: target.clone(),
                        error_message: e.to_string(),
                    })
                    .await;
                }
                Err(SourceFailure::Abort(e)) => {
                    tracing::error!(target: "harvest", source = %target, error = %e, "harvest aborted");
                    return Err(e);
                }
            }
        }

        gauge!("harvest_last_run_ts").set(chrono::Utc::now().timestamp() as f64);
        let outcome = HarvestOutcome {
            contacts: state.contacts.into_vec(),
            sources_total: total,
            sources_completed: completed,
            sources_failed: failed,
            elapsed: t0.elapsed(),
        };
        tracing::info!(
            target: "harvest",
            unique = outcome.contacts.len(),
            completed,
            failed,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "harvest complete"
        );
        Ok(outcome)
    }

    async fn run_source<S>(
        &self,
        target: &str,
        exclude_bots: bool,
        budget: &mut HarvestBudget,
        contacts: &mut ContactSet,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<(), SourceFailure>
    where
        S: ProgressSink + ?Sized,
    {
        let ident = normalize_source_identifier(target);
        if ident.is_empty() {
            return Err(SourceFailure::Skipped(ClientError::SourceNotFound(
                target.to_string(),
            )));
        }
        let handle = self.client.resolve(&ident).await.map_err(SourceFailure::from)?;

        let mut pager = Paginator::new(self.client.as_ref(), &handle, self.cfg, budget.remaining())
            .exclude_bots(exclude_bots)
            .with_cancel(cancel.clone());

        let mut source_records = Vec::new();
        let mut batch_index = 0usize;
        while let Some(batch) = pager.next_batch().await {
            let added = contacts.merge(&batch);
            budget.consume(added.len());
            pager.set_remaining(budget.remaining());
            counter!("harvest_contacts_new_total").increment(added.len() as u64);
            counter!("harvest_duplicates_total").increment((batch.len() - added.len()) as u64);

            if cancel.is_cancelled() {
                return Err(SourceFailure::Abort(HarvestError::Cancelled));
            }

            batch_index += 1;
            sink.emit(ProgressEvent::Batch {
                source_name: handle.title.clone(),
                batch_index,
                total_processed_so_far: pager.fetched(),
                new_records_in_batch: batch.len(),
                records: batch.clone(),
            })
            .await;
            source_records.extend(batch);
        }

        match pager.into_state() {
            PageState::Exhausted | PageState::LimitReached => {
                sink.emit(ProgressEvent::SourceComplete {
                    source_name: handle.title.clone(),
                    total_from_this_source: source_records.len(),
                    records: source_records,
                })
                .await;
                Ok(())
            }
            PageState::Failed(e) => Err(e.into()),
            PageState::Cancelled => Err(SourceFailure::Abort(HarvestError::Cancelled)),
            PageState::Fetching | PageState::Delaying => {
                unreachable!("next_batch returns None only in a terminal state")
            }
        }
    }
}

enum SourceFailure {
    /// Source-scoped: report and move on.
    Skipped(ClientError),
    /// Harvest-scoped: stop everything.
    Abort(HarvestError),
}

impl From<ClientError> for SourceFailure {
    fn from(e: ClientError) -> Self {
        if e.is_fatal() {
            SourceFailure::Abort(HarvestError::Fatal(e))
        } else {
            SourceFailure::Skipped(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_never_goes_negative() {
        let mut b = HarvestBudget::new(Some(3));
        b.consume(2);
        assert_eq!(b.remaining(), Some(1));
        b.consume(5);
        assert_eq!(b.remaining(), Some(0));
        assert!(b.is_exhausted());
    }

    #[test]
    fn zero_limit_means_unlimited() {
        assert_eq!(HarvestBudget::new(Some(0)), HarvestBudget::unlimited());
        let mut b = HarvestBudget::unlimited();
        b.consume(1_000);
        assert!(!b.is_exhausted());
    }

    #[test]
    fn state_drops_blank_targets() {
        let req = HarvestRequest::new(["a", "  ", "", " b "]);
        let st = HarvestState::from_request(&req);
        assert_eq!(st.targets, vec!["a".to_string(), "b".to_string()]);
    }
}
