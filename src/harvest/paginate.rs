// src/harvest/paginate.rs
//! Per-source pagination state machine.
//!
//! `Fetching -> Delaying -> Fetching ...` until one of the terminal states
//! `Exhausted`, `LimitReached`, `Failed` or `Cancelled`. Rate limits are
//! surfaced as `Failed(RateLimited)`; the engine never waits them out.

use std::time::{Duration, Instant};

use chrono::Utc;
use metrics::{counter, histogram};
use tokio_util::sync::CancellationToken;

use crate::harvest::error::ClientError;
use crate::harvest::normalize::normalize;
use crate::harvest::types::{ContactRecord, RemoteSourceClient, SourceHandle};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PagingCfg {
    /// Upper bound on members requested per page.
    pub page_cap: usize,
    /// Courtesy pause between two pages of the same source.
    pub delay: Duration,
}

impl PagingCfg {
    pub const BATCH: PagingCfg = PagingCfg {
        page_cap: 200,
        delay: Duration::from_millis(1000),
    };
    pub const STREAMING: PagingCfg = PagingCfg {
        page_cap: 50,
        delay: Duration::from_millis(500),
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageState {
    Fetching,
    Delaying,
    Exhausted,
    LimitReached,
    Failed(ClientError),
    Cancelled,
}

pub struct Paginator<'a> {
    client: &'a dyn RemoteSourceClient,
    handle: &'a SourceHandle,
    cfg: PagingCfg,
    exclude_bots: bool,
    cancel: CancellationToken,
    limit: Option<usize>,
    offset: usize,
    fetched: usize,
    fetches: usize,
    state: PageState,
}

impl<'a> Paginator<'a> {
    pub fn new(
        client: &'a dyn RemoteSourceClient,
        handle: &'a SourceHandle,
        cfg: PagingCfg,
        limit: Option<usize>,
    ) -> Self {
        Self {
            client,
            handle,
            cfg,
            exclude_bots: false,
            cancel: CancellationToken::new(),
            limit,
            offset: 0,
            fetched: 0,
            fetches: 0,
            state: PageState::Fetching,
        }
    }

    pub fn exclude_bots(mut self, exclude: bool) -> Self {
        self.exclude_bots = exclude;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Re-target the source limit so that at most `remaining` more records
    /// are handed out. `None` lifts the limit.
    pub fn set_remaining(&mut self, remaining: Option<usize>) {
        self.limit = remaining.map(|r| self.fetched + r);
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    pub fn into_state(self) -> PageState {
        self.state
    }

    /// Records handed out so far for this source.
    pub fn fetched(&self) -> usize {
        self.fetched
    }

    /// Number of `fetch_page` calls issued so far.
    pub fn fetches(&self) -> usize {
        self.fetches
    }

    fn allowance(&self) -> usize {
        match self.limit {
            Some(l) => l.saturating_sub(self.fetched),
            None => usize::MAX,
        }
    }

    /// Drive the machine until the next non-empty batch or a terminal state.
    /// Returns `None` once terminal; inspect [`Paginator::state`] for why.
    pub async fn next_batch(&mut self) -> Option<Vec<ContactRecord>> {
        loop {
            match self.state {
                PageState::Delaying => {
                    if self.allowance() == 0 {
                        self.state = PageState::LimitReached;
                        continue;
                    }
                    if !self.cfg.delay.is_zero() {
                        let cancel = self.cancel.clone();
                        let cancelled = tokio::select! {
                            _ = cancel.cancelled() => true,
                            _ = tokio::time::sleep(self.cfg.delay) => false,
                        };
                        if cancelled {
                            self.state = PageState::Cancelled;
                            continue;
                        }
                    }
                    self.state = PageState::Fetching;
                }
                PageState::Fetching => {
                    if self.cancel.is_cancelled() {
                        self.state = PageState::Cancelled;
                        continue;
                    }
                    let batch_size = self.cfg.page_cap.min(self.allowance());
                    if batch_size == 0 {
                        self.state = PageState::LimitReached;
                        continue;
                    }
                    match self.fetch_once(batch_size).await {
                        // Page held only excluded bots; keep paging.
                        Some(batch) if batch.is_empty() => continue,
                        other => return other,
                    }
                }
                _ => return None,
            }
        }
    }

    /// One `fetch_page` round trip. `None` means the source reached a terminal state.
    async fn fetch_once(&mut self, batch_size: usize) -> Option<Vec<ContactRecord>> {
        let t0 = Instant::now();
        let page = self
            .client
            .fetch_page(self.handle, self.offset, batch_size)
            .await;
        self.fetches += 1;
        histogram!("harvest_page_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        let raws = match page {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    target: "harvest",
                    source = %self.handle.title,
                    offset = self.offset,
                    error = %e,
                    "page fetch failed"
                );
                self.state = PageState::Failed(e);
                return None;
            }
        };
        if raws.is_empty() {
            self.state = PageState::Exhausted;
            return None;
        }
        counter!("harvest_pages_total").increment(1);

        let allowance = self.allowance();
        let now = Utc::now();
        let mut batch = Vec::with_capacity(raws.len().min(allowance));
        // Raw members consumed; stays below raws.len() only when truncated.
        let mut consumed = 0usize;
        for raw in &raws {
            if batch.len() >= allowance {
                break;
            }
            consumed += 1;
            if self.exclude_bots && raw.bot {
                continue;
            }
            batch.push(normalize(raw, now));
        }

        self.offset += consumed;
        self.fetched += batch.len();
        self.state = PageState::Delaying;

        tracing::debug!(
            target: "harvest",
            source = %self.handle.title,
            returned = raws.len(),
            kept = batch.len(),
            offset = self.offset,
            "page fetched"
        );

        Some(batch)
    }
}
