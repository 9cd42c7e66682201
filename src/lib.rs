// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod config;
pub mod harvest;
pub mod metrics;

// ---- Re-exports for stable public API ----
pub use crate::api::create_router;
pub use crate::harvest::{
    run_batch, stream_harvest, BatchResponse, ContactRecord, HarvestRequest, Harvester,
    ProgressEvent, RemoteSourceClient,
};

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::harvest::providers::fixture::FixtureClient;

/// Build the full application router from on-disk config.
///
/// Uses the fixture client at `fixture_path`; plug a real client in through
/// [`api::AppState::new`] instead when one is available.
pub fn app() -> Result<axum::Router> {
    let cfg = config::load_config_default()?;
    let client = FixtureClient::from_path(&cfg.fixture_path)?;
    info!(
        target: "harvest",
        sources = client.len(),
        path = %cfg.fixture_path.display(),
        "fixture client loaded"
    );
    let state = api::AppState::new(Arc::new(client), &cfg);
    Ok(api::create_router(state))
}
