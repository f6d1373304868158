//! Poll discovery: rebuilds the list of known polls from the contract's
//! creation-event log. The ledger keeps no queryable index, so the log is
//! the only source; only the most recent page of creations is discoverable.

use std::{sync::Arc, time::Duration};

use ledger::{EventFilter, EventOrder, LedgerClient};
use shared::{
    domain::{Deployment, PollListEntry},
    error::DiscoveryError,
};
use tokio::sync::{broadcast, Mutex};
use tracing::warn;

use crate::decode;

/// Creation-event name emitted by the contract.
pub const CREATION_EVENT: &str = "PollCreated";
/// First-page bound; older creations are intentionally not discoverable.
pub const DISCOVERY_PAGE_SIZE: usize = 50;
/// Accommodation for event-log eventual consistency after a creation. Not
/// a correctness guarantee.
pub const POST_CREATE_REFRESH_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub enum DirectoryEvent {
    Refreshed,
    RefreshFailed,
}

#[derive(Default)]
struct DirectoryInner {
    deployment: Option<Deployment>,
    polls: Vec<PollListEntry>,
    is_loading: bool,
    last_error: Option<DiscoveryError>,
}

#[derive(Debug, Clone)]
pub struct DirectorySnapshot {
    pub polls: Vec<PollListEntry>,
    pub is_loading: bool,
    pub last_error: Option<DiscoveryError>,
}

pub struct PollDirectory {
    ledger: Arc<dyn LedgerClient>,
    inner: Mutex<DirectoryInner>,
    events: broadcast::Sender<DirectoryEvent>,
}

impl PollDirectory {
    /// Create the directory without triggering any query. Callers that want
    /// the usual instantiate-and-refresh behavior use [`PollDirectory::bind`].
    pub fn new(ledger: Arc<dyn LedgerClient>, deployment: Option<Deployment>) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            ledger,
            inner: Mutex::new(DirectoryInner {
                deployment,
                ..DirectoryInner::default()
            }),
            events,
        })
    }

    /// Create the directory bound to a deployment and run the initial
    /// refresh in the background.
    pub fn bind(ledger: Arc<dyn LedgerClient>, deployment: Deployment) -> Arc<Self> {
        let directory = Self::new(ledger, Some(deployment));
        let spawned = Arc::clone(&directory);
        tokio::spawn(async move {
            spawned.refresh().await;
        });
        directory
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DirectoryEvent> {
        self.events.subscribe()
    }

    /// Point the directory at a different deployment and rebuild the list.
    pub async fn rebind(&self, deployment: Deployment) {
        {
            let mut inner = self.inner.lock().await;
            inner.deployment = Some(deployment);
            inner.polls.clear();
            inner.last_error = None;
        }
        self.refresh().await;
    }

    /// Query the creation-event log, newest first, and replace the held
    /// list wholesale. A fault anywhere leaves the previous list untouched:
    /// stale-but-valid beats partially-wrong.
    pub async fn refresh(&self) {
        let deployment = {
            let mut inner = self.inner.lock().await;
            let Some(deployment) = inner.deployment.clone() else {
                return;
            };
            inner.is_loading = true;
            inner.last_error = None;
            deployment
        };

        let filter = EventFilter {
            event_type: deployment.event_type(CREATION_EVENT),
        };
        let outcome = self
            .ledger
            .query_events(&filter, DISCOVERY_PAGE_SIZE, EventOrder::Descending)
            .await;

        let events = match outcome {
            Ok(events) => events,
            Err(err) => {
                warn!(event_type = %filter.event_type, "event query failed: {err}");
                self.fail_refresh(DiscoveryError::QueryFailed(err.to_string()))
                    .await;
                return;
            }
        };

        let mut polls = Vec::with_capacity(events.len());
        for (position, event) in events.iter().enumerate() {
            match decode::decode_creation_event(position, event) {
                Ok(entry) => polls.push(entry),
                Err(err) => {
                    warn!(event_type = %filter.event_type, "discarding refresh: {err}");
                    self.fail_refresh(err).await;
                    return;
                }
            }
        }

        {
            let mut inner = self.inner.lock().await;
            inner.polls = polls;
            inner.is_loading = false;
        }
        let _ = self.events.send(DirectoryEvent::Refreshed);
    }

    /// Refresh after a delay, for callers reacting to a fresh creation that
    /// the event log may not serve yet.
    pub fn refresh_after(self: &Arc<Self>, delay: Duration) {
        let directory = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            directory.refresh().await;
        });
    }

    pub async fn snapshot(&self) -> DirectorySnapshot {
        let inner = self.inner.lock().await;
        DirectorySnapshot {
            polls: inner.polls.clone(),
            is_loading: inner.is_loading,
            last_error: inner.last_error.clone(),
        }
    }

    async fn fail_refresh(&self, err: DiscoveryError) {
        {
            let mut inner = self.inner.lock().await;
            inner.is_loading = false;
            inner.last_error = Some(err);
        }
        let _ = self.events.send(DirectoryEvent::RefreshFailed);
    }
}

#[cfg(test)]
#[path = "tests/discovery_tests.rs"]
mod tests;
