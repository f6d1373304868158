use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Faults a session action can leave behind in `last_error`. Every remote
/// fault is caught at the call site and folded into one of these variants;
/// none propagate to the presentation layer as panics.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SessionError {
    #[error("object exists but its fields do not match the expected poll shape")]
    DecodeInvalid,
    #[error("no object found for the requested poll id")]
    NotFound,
    #[error("poll fetch failed: {0}")]
    FetchFailed(String),
    #[error("signer rejected the transaction: {0}")]
    SignerRejected(String),
    #[error("transaction submission failed: {0}")]
    SubmissionFailed(String),
    #[error("transaction confirmation failed: {0}")]
    ConfirmationFailed(String),
}

/// Faults from a discovery refresh. A decode fault anywhere in the event
/// page fails the whole refresh; the previously held list stays intact.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DiscoveryError {
    #[error("event query failed: {0}")]
    QueryFailed(String),
    #[error("creation event at position {position} is malformed: {reason}")]
    DecodeInvalid { position: usize, reason: String },
}
