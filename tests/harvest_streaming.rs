// tests/harvest_streaming.rs
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use member_harvester::harvest::providers::fixture::{FixtureClient, FixtureFailure, FixtureSource};
use member_harvester::harvest::{
    run_batch, stream_harvest, ClientError, HarvestRequest, Harvester, PagingCfg, ProgressEvent,
    RawMember, RemoteSourceClient, SourceHandle,
};
use tokio_util::sync::CancellationToken;

fn members(ids: std::ops::RangeInclusive<i64>) -> Vec<RawMember> {
    ids.map(|id| RawMember {
        id,
        username: Some(format!("user{id}")),
        ..Default::default()
    })
    .collect()
}

fn fixture() -> Arc<FixtureClient> {
    Arc::new(FixtureClient::from_sources(vec![
        FixtureSource::new("alpha", members(1..=7)),
        FixtureSource::new("beta", vec![]).failing(FixtureFailure::Forbidden),
        FixtureSource::new("gamma", members(5..=9)),
    ]))
}

const SMALL_PAGES: PagingCfg = PagingCfg {
    page_cap: 3,
    delay: Duration::ZERO,
};

#[tokio::test]
async fn events_arrive_in_protocol_order() {
    let h = Harvester::new(fixture(), SMALL_PAGES);
    let events: Vec<ProgressEvent> =
        stream_harvest(h, HarvestRequest::new(["alpha", "beta", "gamma"]))
            .collect()
            .await;

    let kinds: Vec<&str> = events.iter().map(|e| e.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            "connected",
            "source_start",
            "batch",
            "batch",
            "batch",
            "source_complete",
            "source_start",
            "source_error",
            "source_start",
            "batch",
            "batch",
            "source_complete",
            "complete",
        ]
    );

    match &events[1] {
        ProgressEvent::SourceStart {
            source_index,
            total_sources,
            ..
        } => assert_eq!((*source_index, *total_sources), (1, 3)),
        other => panic!("unexpected {other:?}"),
    }
    match &events[4] {
        ProgressEvent::Batch {
            batch_index,
            total_processed_so_far,
            new_records_in_batch,
            records,
            ..
        } => {
            assert_eq!(*batch_index, 3);
            assert_eq!(*total_processed_so_far, 7);
            assert_eq!(*new_records_in_batch, 1);
            assert_eq!(records.len(), 1);
        }
        other => panic!("unexpected {other:?}"),
    }
    match &events[5] {
        ProgressEvent::SourceComplete {
            source_name,
            total_from_this_source,
            records,
        } => {
            assert_eq!(source_name, "alpha");
            assert_eq!(*total_from_this_source, 7);
            assert_eq!(records.len(), 7);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
}

#[tokio::test]
async fn streaming_and_batch_agree_on_contacts() {
    let req = HarvestRequest::new(["alpha", "beta", "gamma"]).with_limit(8);

    let batch = run_batch(
        &Harvester::new(fixture(), SMALL_PAGES),
        &req,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let events: Vec<ProgressEvent> = stream_harvest(Harvester::new(fixture(), SMALL_PAGES), req)
        .collect()
        .await;
    let Some(ProgressEvent::Complete {
        total_contacts,
        contacts,
        ..
    }) = events.last()
    else {
        panic!("stream must end with complete: {events:?}");
    };

    assert_eq!(*total_contacts, batch.total_contacts);
    let streamed: BTreeSet<_> = contacts.iter().map(|c| c.id.clone()).collect();
    let batched: BTreeSet<_> = batch.contacts.iter().map(|c| c.id.clone()).collect();
    assert_eq!(streamed, batched);
    assert_eq!(streamed.len(), 8);
}

#[tokio::test]
async fn fatal_error_is_the_single_terminal_event() {
    let client = Arc::new(FixtureClient::from_sources(vec![FixtureSource::new(
        "dead",
        members(1..=3),
    )
    .failing(FixtureFailure::Fatal { at_offset: 0 })]));
    let events: Vec<ProgressEvent> =
        stream_harvest(Harvester::new(client, SMALL_PAGES), HarvestRequest::new(["dead"]))
            .collect()
            .await;
    let kinds: Vec<&str> = events.iter().map(|e| e.kind()).collect();
    assert_eq!(kinds, vec!["connected", "source_start", "fatal_error"]);
}

#[tokio::test]
async fn empty_request_streams_fatal_error() {
    let events: Vec<ProgressEvent> = stream_harvest(
        Harvester::new(fixture(), SMALL_PAGES),
        HarvestRequest::new(Vec::<String>::new()),
    )
    .collect()
    .await;
    assert!(matches!(
        events.as_slice(),
        [ProgressEvent::Connected {}, ProgressEvent::FatalError { .. }]
    ));
}

/// Endless source that counts fetches.
struct Endless {
    fetches: Arc<AtomicUsize>,
}

#[async_trait]
impl RemoteSourceClient for Endless {
    async fn resolve(&self, identifier: &str) -> Result<SourceHandle, ClientError> {
        Ok(SourceHandle {
            id: identifier.into(),
            title: identifier.into(),
        })
    }

    async fn fetch_page(
        &self,
        _handle: &SourceHandle,
        offset: usize,
        page_size: usize,
    ) -> Result<Vec<RawMember>, ClientError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok((offset..offset + page_size)
            .map(|i| RawMember {
                id: i as i64,
                ..Default::default()
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "endless"
    }
}

#[tokio::test(start_paused = true)]
async fn dropping_the_stream_stops_paging() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let client = Arc::new(Endless {
        fetches: fetches.clone(),
    });
    let cfg = PagingCfg {
        page_cap: 10,
        delay: Duration::from_secs(1),
    };
    let mut stream = stream_harvest(Harvester::new(client, cfg), HarvestRequest::new(["loop"]));

    loop {
        match stream.next().await {
            Some(ProgressEvent::Batch { .. }) => break,
            Some(_) => continue,
            None => panic!("stream ended early"),
        }
    }
    drop(stream);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}
