use std::sync::{Arc, Mutex as StdMutex};

use anyhow::anyhow;
use async_trait::async_trait;
use ledger::{
    EventFilter, EventOrder, FetchOptions, LedgerClient, ProgramCall, RawEvent, RawObject,
    SubmitError, TransactionReceipt,
};
use serde_json::json;
use shared::{
    domain::{Deployment, PollId, TxHash},
    error::DiscoveryError,
};

use super::*;

struct TestEventLog {
    pages: StdMutex<Vec<Result<Vec<RawEvent>, String>>>,
    queried_filters: StdMutex<Vec<(String, usize)>>,
}

impl TestEventLog {
    fn new(pages: Vec<Result<Vec<RawEvent>, String>>) -> Self {
        Self {
            pages: StdMutex::new(pages),
            queried_filters: StdMutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LedgerClient for TestEventLog {
    async fn fetch_object(
        &self,
        _id: &PollId,
        _options: FetchOptions,
    ) -> anyhow::Result<Option<RawObject>> {
        Ok(None)
    }

    async fn query_events(
        &self,
        filter: &EventFilter,
        limit: usize,
        _order: EventOrder,
    ) -> anyhow::Result<Vec<RawEvent>> {
        self.queried_filters
            .lock()
            .unwrap()
            .push((filter.event_type.clone(), limit));
        let mut pages = self.pages.lock().unwrap();
        if pages.is_empty() {
            return Ok(Vec::new());
        }
        pages.remove(0).map_err(|reason| anyhow!(reason))
    }

    async fn submit_transaction(&self, _call: &ProgramCall) -> Result<TxHash, SubmitError> {
        Err(SubmitError::Network("not a write client".into()))
    }

    async fn await_confirmation(&self, _hash: &TxHash) -> anyhow::Result<TransactionReceipt> {
        Err(anyhow!("not a write client"))
    }
}

fn creation_event(poll_id: &str, title: &str) -> RawEvent {
    RawEvent {
        event_type: "0xpkg::contract::PollCreated".into(),
        payload: json!({
            "poll_id": poll_id,
            "creator": "0xalice",
            "title": title,
            "description": "",
        }),
    }
}

fn directory_with(pages: Vec<Result<Vec<RawEvent>, String>>) -> (Arc<PollDirectory>, Arc<TestEventLog>) {
    let log = Arc::new(TestEventLog::new(pages));
    // `new` rather than `bind`: the background initial refresh would race
    // with the scripted page sequence below.
    let directory = PollDirectory::new(
        Arc::clone(&log) as Arc<dyn LedgerClient>,
        Some(Deployment::new("0xpkg", "contract")),
    );
    (directory, log)
}

#[tokio::test]
async fn refresh_replaces_the_list_wholesale() {
    let (directory, log) = directory_with(vec![
        Ok(vec![creation_event("0x2", "newest"), creation_event("0x1", "older")]),
        Ok(vec![creation_event("0x3", "newer still")]),
    ]);

    directory.refresh().await;
    let first = directory.snapshot().await;
    assert_eq!(first.polls.len(), 2);
    assert_eq!(first.polls[0].poll_id, PollId::new("0x2"));

    directory.refresh().await;
    let second = directory.snapshot().await;
    assert_eq!(second.polls.len(), 1);
    assert_eq!(second.polls[0].poll_id, PollId::new("0x3"));

    let filters = log.queried_filters.lock().unwrap().clone();
    assert!(filters
        .iter()
        .all(|(event_type, limit)| event_type == "0xpkg::contract::PollCreated" && *limit == 50));
}

#[tokio::test]
async fn malformed_event_preserves_the_previous_list() {
    let (directory, _) = directory_with(vec![
        Ok(vec![creation_event("0x1", "good")]),
        Ok(vec![
            creation_event("0x2", "fine"),
            RawEvent {
                event_type: "0xpkg::contract::PollCreated".into(),
                payload: json!({ "creator": "0xalice" }),
            },
        ]),
    ]);

    directory.refresh().await;
    assert_eq!(directory.snapshot().await.polls.len(), 1);

    directory.refresh().await;
    let snapshot = directory.snapshot().await;
    assert_eq!(snapshot.polls.len(), 1, "stale-but-valid list survives");
    assert_eq!(snapshot.polls[0].poll_id, PollId::new("0x1"));
    assert!(matches!(
        snapshot.last_error,
        Some(DiscoveryError::DecodeInvalid { position: 1, .. })
    ));
}

#[tokio::test]
async fn query_failure_preserves_the_previous_list() {
    let (directory, _) = directory_with(vec![
        Ok(vec![creation_event("0x1", "good")]),
        Err("log endpoint unreachable".into()),
    ]);

    directory.refresh().await;
    directory.refresh().await;

    let snapshot = directory.snapshot().await;
    assert_eq!(snapshot.polls.len(), 1);
    assert!(matches!(
        snapshot.last_error,
        Some(DiscoveryError::QueryFailed(_))
    ));
    assert!(!snapshot.is_loading);
}

#[tokio::test]
async fn rebind_clears_and_rebuilds_for_the_new_deployment() {
    let (directory, log) = directory_with(vec![
        Ok(vec![creation_event("0x1", "old deployment")]),
        Ok(vec![creation_event("0x9", "new deployment")]),
    ]);

    directory.refresh().await;
    directory
        .rebind(Deployment::new("0xother", "contract"))
        .await;

    let snapshot = directory.snapshot().await;
    assert_eq!(snapshot.polls.len(), 1);
    assert_eq!(snapshot.polls[0].poll_id, PollId::new("0x9"));

    let filters = log.queried_filters.lock().unwrap().clone();
    assert_eq!(
        filters.last().map(|(event_type, _)| event_type.as_str()),
        Some("0xother::contract::PollCreated")
    );
}

#[tokio::test]
async fn refresh_after_waits_out_the_event_log_lag() {
    let (directory, log) = directory_with(vec![Ok(vec![creation_event("0x1", "late arrival")])]);

    directory.refresh_after(std::time::Duration::from_millis(20));
    tokio::time::sleep(std::time::Duration::from_millis(60)).await;

    assert!(!log.queried_filters.lock().unwrap().is_empty());
    assert_eq!(directory.snapshot().await.polls.len(), 1);
}
