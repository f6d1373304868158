//! Poll session controller: owns the active poll id, drives create and
//! vote transactions through submission and confirmation, and reconciles
//! local state with the ledger after every mutation or cold load.

use std::sync::Arc;

use ledger::{FetchOptions, LedgerClient, ProgramCall, SubmitError};
use shared::{
    domain::{Address, PollId, PollRecord, TxHash, VoteChoice},
    error::SessionError,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use crate::{decode, location::LocationMirror};

/// Read-side lifecycle of the active poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadPhase {
    #[default]
    Idle,
    Loading,
    Loaded,
    NotFound,
    DecodeInvalid,
    FetchFailed,
}

/// Write-side lifecycle of the most recent mutation. Independent of the
/// read side: a fetch failure never cancels an in-flight write and a write
/// failure never discards loaded read state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePhase {
    #[default]
    Idle,
    Submitting,
    Confirming,
    Applied,
    Failed,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Selected(Option<PollId>),
    Fetched,
    Submitted(TxHash),
    Settled,
}

#[derive(Default)]
struct SessionInner {
    /// Bumped by `load_poll` and `clear_poll`; responses resolving under an
    /// older generation belong to a superseded session and are dropped.
    generation: u64,
    poll_id: Option<PollId>,
    record: Option<PollRecord>,
    /// Whether the last fetch returned any object, decodable or not.
    object_present: bool,
    read: ReadPhase,
    write: WritePhase,
    confirmation_hash: Option<TxHash>,
    last_error: Option<SessionError>,
}

/// Read-only projection handed to the presentation layer. Derived values
/// are recomputed on every snapshot, never stored.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub poll_id: Option<PollId>,
    pub record: Option<PollRecord>,
    pub read: ReadPhase,
    pub write: WritePhase,
    pub is_loading: bool,
    pub is_pending: bool,
    pub confirmation_hash: Option<TxHash>,
    pub last_error: Option<SessionError>,
    pub is_creator: bool,
    pub poll_exists: bool,
    pub has_valid_data: bool,
    pub yes_percentage: u8,
    pub no_percentage: u8,
}

pub struct PollSession {
    ledger: Arc<dyn LedgerClient>,
    account: Option<Address>,
    location: Arc<dyn LocationMirror>,
    inner: Mutex<SessionInner>,
    events: broadcast::Sender<SessionEvent>,
}

impl PollSession {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        account: Option<Address>,
        location: Arc<dyn LocationMirror>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            ledger,
            account,
            location,
            inner: Mutex::new(SessionInner::default()),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Seed the active poll from the persisted location string, if the
    /// session has no subject yet. Called once at startup.
    pub async fn restore_from_location(&self) {
        let Some(id) = self.location.current() else {
            return;
        };
        if self.inner.lock().await.poll_id.is_some() {
            return;
        }
        self.load_poll(id).await;
    }

    /// Select a poll and fetch its current state. The id is not validated
    /// beyond non-emptiness; a bad id surfaces as a fetch error.
    pub async fn load_poll(&self, id: PollId) {
        let id = PollId::new(id.as_str().trim());
        if id.as_str().is_empty() {
            return;
        }

        let generation = {
            let mut inner = self.inner.lock().await;
            inner.generation += 1;
            inner.poll_id = Some(id.clone());
            inner.record = None;
            inner.object_present = false;
            inner.read = ReadPhase::Loading;
            inner.write = WritePhase::Idle;
            inner.confirmation_hash = None;
            inner.last_error = None;
            inner.generation
        };
        self.location.set(&id);
        let _ = self.events.send(SessionEvent::Selected(Some(id)));

        self.refresh(generation).await;
    }

    /// Drop the active poll and all transient state. Outstanding remote
    /// calls are not aborted; their late responses fail the generation
    /// check and are ignored.
    pub async fn clear_poll(&self) {
        {
            let mut inner = self.inner.lock().await;
            let generation = inner.generation + 1;
            *inner = SessionInner {
                generation,
                ..SessionInner::default()
            };
        }
        self.location.clear();
        let _ = self.events.send(SessionEvent::Selected(None));
    }

    /// Submit a poll creation and adopt the created resource as the active
    /// poll once confirmed. Silently ignores an empty title.
    pub async fn create_poll(&self, title: &str, description: &str) {
        let title = title.trim();
        if title.is_empty() {
            info!("create ignored: empty title");
            return;
        }
        let description = description.trim();

        {
            let mut inner = self.inner.lock().await;
            inner.write = WritePhase::Submitting;
            inner.confirmation_hash = None;
            inner.last_error = None;
        }

        let call = ProgramCall::CreatePoll {
            title: title.as_bytes().to_vec(),
            description: description.as_bytes().to_vec(),
        };
        let hash = match self.ledger.submit_transaction(&call).await {
            Ok(hash) => hash,
            Err(err) => {
                self.fail_write(submit_error(err)).await;
                return;
            }
        };

        {
            let mut inner = self.inner.lock().await;
            inner.confirmation_hash = Some(hash.clone());
            inner.write = WritePhase::Confirming;
        }
        let _ = self.events.send(SessionEvent::Submitted(hash.clone()));

        let receipt = match self.ledger.await_confirmation(&hash).await {
            Ok(receipt) => receipt,
            Err(err) => {
                self.fail_write(SessionError::ConfirmationFailed(err.to_string()))
                    .await;
                return;
            }
        };

        match receipt.first_created() {
            Some(created) => {
                let created = created.clone();
                let generation = {
                    let mut inner = self.inner.lock().await;
                    inner.generation += 1;
                    inner.poll_id = Some(created.clone());
                    inner.record = None;
                    inner.object_present = false;
                    inner.read = ReadPhase::Loading;
                    inner.write = WritePhase::Applied;
                    inner.generation
                };
                self.location.set(&created);
                let _ = self.events.send(SessionEvent::Selected(Some(created)));
                self.refresh(generation).await;
            }
            None => {
                // The transaction itself succeeded; treat the missing
                // resource as an anomaly, not a failure.
                warn!(
                    transaction = %hash,
                    "creation confirmed but receipt names no created resource"
                );
                let mut inner = self.inner.lock().await;
                inner.write = WritePhase::Applied;
                drop(inner);
                let _ = self.events.send(SessionEvent::Settled);
            }
        }
    }

    pub async fn vote_yes(&self) {
        self.vote(VoteChoice::Yes).await;
    }

    pub async fn vote_no(&self) {
        self.vote(VoteChoice::No).await;
    }

    /// Submit a vote on the active poll and refetch its tally once the
    /// ledger confirms. No-op without an active poll.
    pub async fn vote(&self, choice: VoteChoice) {
        let (poll_id, generation) = {
            let mut inner = self.inner.lock().await;
            let Some(poll_id) = inner.poll_id.clone() else {
                return;
            };
            inner.write = WritePhase::Submitting;
            inner.last_error = None;
            (poll_id, inner.generation)
        };

        let call = ProgramCall::Vote {
            poll: poll_id.clone(),
            choice: choice.discriminant(),
        };
        let hash = match self.ledger.submit_transaction(&call).await {
            Ok(hash) => hash,
            Err(err) => {
                self.settle_vote(generation, Err(submit_error(err))).await;
                return;
            }
        };

        {
            let mut inner = self.inner.lock().await;
            if inner.generation == generation {
                inner.confirmation_hash = Some(hash.clone());
                inner.write = WritePhase::Confirming;
            }
        }
        let _ = self.events.send(SessionEvent::Submitted(hash.clone()));

        match self.ledger.await_confirmation(&hash).await {
            Ok(_) => {
                {
                    let mut inner = self.inner.lock().await;
                    if inner.generation == generation {
                        inner.read = ReadPhase::Loading;
                    }
                }
                self.refresh(generation).await;
                self.settle_vote(generation, Ok(())).await;
            }
            Err(err) => {
                self.settle_vote(
                    generation,
                    Err(SessionError::ConfirmationFailed(err.to_string())),
                )
                .await;
            }
        }
    }

    /// Current state plus all derived values. Percentages are defined as 0
    /// when no votes exist; this never divides by zero.
    pub async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock().await;
        let is_creator = match (&self.account, &inner.record) {
            (Some(account), Some(record)) => account.matches(&record.creator),
            _ => false,
        };
        let (yes_percentage, no_percentage) = inner
            .record
            .as_ref()
            .map(|record| {
                (
                    percentage(record.yes_count, record.total_votes),
                    percentage(record.no_count, record.total_votes),
                )
            })
            .unwrap_or((0, 0));

        SessionSnapshot {
            poll_id: inner.poll_id.clone(),
            record: inner.record.clone(),
            read: inner.read,
            write: inner.write,
            is_loading: inner.read == ReadPhase::Loading
                || matches!(inner.write, WritePhase::Submitting | WritePhase::Confirming),
            is_pending: inner.write == WritePhase::Submitting,
            confirmation_hash: inner.confirmation_hash.clone(),
            last_error: inner.last_error.clone(),
            is_creator,
            poll_exists: inner.object_present,
            has_valid_data: inner.record.is_some(),
            yes_percentage,
            no_percentage,
        }
    }

    /// Fetch the active poll's object and apply the outcome, unless the
    /// session moved on while the fetch was in flight.
    async fn refresh(&self, generation: u64) {
        let poll_id = {
            let inner = self.inner.lock().await;
            if inner.generation != generation {
                return;
            }
            match inner.poll_id.clone() {
                Some(poll_id) => poll_id,
                None => return,
            }
        };

        let outcome = self
            .ledger
            .fetch_object(&poll_id, FetchOptions::with_content())
            .await;

        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            info!(poll_id = %poll_id, "dropping stale fetch response");
            return;
        }
        match outcome {
            Ok(Some(raw)) => {
                inner.object_present = true;
                match decode::decode_poll_fields(&raw) {
                    Some(record) => {
                        if !record.tally_consistent() {
                            warn!(
                                poll_id = %poll_id,
                                yes = record.yes_count,
                                no = record.no_count,
                                total = record.total_votes,
                                "tally does not sum to total_votes"
                            );
                        }
                        inner.record = Some(record);
                        inner.read = ReadPhase::Loaded;
                    }
                    None => {
                        inner.record = None;
                        inner.read = ReadPhase::DecodeInvalid;
                        inner.last_error = Some(SessionError::DecodeInvalid);
                    }
                }
            }
            Ok(None) => {
                inner.object_present = false;
                inner.record = None;
                inner.read = ReadPhase::NotFound;
                inner.last_error = Some(SessionError::NotFound);
            }
            Err(err) => {
                inner.read = ReadPhase::FetchFailed;
                inner.last_error = Some(SessionError::FetchFailed(err.to_string()));
            }
        }
        drop(inner);
        let _ = self.events.send(SessionEvent::Fetched);
    }

    /// Resolve the write machine for a vote, unless the session the vote
    /// belonged to has been superseded.
    async fn settle_vote(&self, generation: u64, outcome: Result<(), SessionError>) {
        {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                info!("dropping stale vote outcome");
                return;
            }
            match outcome {
                Ok(()) => inner.write = WritePhase::Applied,
                Err(err) => {
                    inner.write = WritePhase::Failed;
                    inner.last_error = Some(err);
                }
            }
        }
        let _ = self.events.send(SessionEvent::Settled);
    }

    async fn fail_write(&self, err: SessionError) {
        {
            let mut inner = self.inner.lock().await;
            inner.write = WritePhase::Failed;
            inner.last_error = Some(err);
        }
        let _ = self.events.send(SessionEvent::Settled);
    }
}

fn submit_error(err: SubmitError) -> SessionError {
    match err {
        SubmitError::SignerRejected(reason) => SessionError::SignerRejected(reason),
        SubmitError::Network(reason) => SessionError::SubmissionFailed(reason),
    }
}

fn percentage(count: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    ((count as f64 / total as f64) * 100.0).round() as u8
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
