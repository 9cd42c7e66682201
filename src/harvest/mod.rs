// src/harvest/mod.rs
pub mod dedup;
pub mod error;
pub mod normalize;
pub mod orchestrator;
pub mod paginate;
pub mod providers;
pub mod report;
pub mod types;

pub use dedup::ContactSet;
pub use error::{ClientError, HarvestError};
pub use orchestrator::{HarvestBudget, HarvestOutcome, Harvester, ProgressSink, TracingSink};
pub use paginate::{PageState, Paginator, PagingCfg};
pub use report::{run_batch, stream_harvest, BatchResponse, HarvestStream, ProgressEvent, Status};
pub use types::{
    ContactRecord, HarvestRequest, PresenceStatus, RawMember, RemoteSourceClient, SourceHandle,
};

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("harvest_pages_total", "Non-empty pages fetched from sources.");
        describe_counter!(
            "harvest_contacts_new_total",
            "Contacts added to a harvest after deduplication."
        );
        describe_counter!(
            "harvest_duplicates_total",
            "Contacts dropped because an earlier page or source already yielded them."
        );
        describe_counter!(
            "harvest_source_errors_total",
            "Sources skipped due to resolve or fetch errors."
        );
        describe_histogram!("harvest_page_fetch_ms", "Page fetch time in milliseconds.");
        describe_gauge!(
            "harvest_last_run_ts",
            "Unix ts when a harvest last completed."
        );
    });
}
