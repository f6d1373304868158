use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::domain::{Deployment, PollId, TxHash};
use thiserror::Error;

pub mod rpc;

pub use rpc::{HttpSigner, JsonRpcLedgerClient};

/// Raw object payload as returned by the ledger, before any shape
/// validation. `fields` is an arbitrary field bag; downstream code must go
/// through the decoding boundary before trusting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObject {
    pub object_id: PollId,
    /// Declared content kind, e.g. `moveObject`.
    pub kind: String,
    pub owner: Option<String>,
    pub fields: serde_json::Value,
}

/// One entry from the append-only event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub event_type: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    pub event_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchOptions {
    pub show_content: bool,
    pub show_owner: bool,
}

impl FetchOptions {
    pub fn with_content() -> Self {
        Self {
            show_content: true,
            show_owner: true,
        }
    }
}

/// Reference to a resource created by a confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRef {
    pub object_id: PollId,
}

/// Finalized effects of a confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_hash: TxHash,
    pub created: Vec<CreatedRef>,
}

impl TransactionReceipt {
    pub fn first_created(&self) -> Option<&PollId> {
        self.created.first().map(|created| &created.object_id)
    }
}

/// Call payload for one of the contract's two entry points. The vote
/// discriminant is fixed by the contract: 0 = YES, 1 = NO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum ProgramCall {
    CreatePoll {
        title: Vec<u8>,
        description: Vec<u8>,
    },
    Vote {
        poll: PollId,
        choice: u8,
    },
}

impl ProgramCall {
    pub fn entry_point(&self) -> &'static str {
        match self {
            ProgramCall::CreatePoll { .. } => "create_poll",
            ProgramCall::Vote { .. } => "vote",
        }
    }

    pub fn target(&self, deployment: &Deployment) -> String {
        deployment.target(self.entry_point())
    }
}

/// Write-path failure before the transaction reached the ledger. The split
/// matters to callers: a signer rejection is user-visible as such, a
/// network fault is not the signer's doing.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("signer rejected transaction: {0}")]
    SignerRejected(String),
    #[error("transaction submission failed: {0}")]
    Network(String),
}

/// Capability surface of the remote ledger consumed by the core services.
/// Reads return `Ok(None)` for absent objects; transport faults are errors.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn fetch_object(&self, id: &PollId, options: FetchOptions) -> Result<Option<RawObject>>;
    async fn query_events(
        &self,
        filter: &EventFilter,
        limit: usize,
        order: EventOrder,
    ) -> Result<Vec<RawEvent>>;
    async fn submit_transaction(&self, call: &ProgramCall) -> Result<TxHash, SubmitError>;
    async fn await_confirmation(&self, hash: &TxHash) -> Result<TransactionReceipt>;
}

pub struct MissingLedgerClient;

#[async_trait]
impl LedgerClient for MissingLedgerClient {
    async fn fetch_object(
        &self,
        id: &PollId,
        _options: FetchOptions,
    ) -> Result<Option<RawObject>> {
        Err(anyhow!("ledger client is unavailable for object {id}"))
    }

    async fn query_events(
        &self,
        filter: &EventFilter,
        _limit: usize,
        _order: EventOrder,
    ) -> Result<Vec<RawEvent>> {
        Err(anyhow!(
            "ledger client is unavailable for event query {}",
            filter.event_type
        ))
    }

    async fn submit_transaction(&self, call: &ProgramCall) -> Result<TxHash, SubmitError> {
        Err(SubmitError::Network(format!(
            "ledger client is unavailable for {}",
            call.entry_point()
        )))
    }

    async fn await_confirmation(&self, hash: &TxHash) -> Result<TransactionReceipt> {
        Err(anyhow!("ledger client is unavailable for transaction {hash}"))
    }
}

/// Signs a prepared program call on behalf of the active account. Wallet
/// interaction lives behind this seam; a rejection here never reaches the
/// ledger.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    async fn sign(&self, target: &str, call: &ProgramCall) -> Result<SignedTransaction>;
}

/// Serialized transaction bytes plus signature, base64 on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub tx_bytes_b64: String,
    pub signature_b64: String,
}

pub struct MissingSigner;

#[async_trait]
impl TransactionSigner for MissingSigner {
    async fn sign(&self, target: &str, _call: &ProgramCall) -> Result<SignedTransaction> {
        Err(anyhow!("no signer configured for {target}"))
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
