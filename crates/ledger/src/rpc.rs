//! JSON-RPC transport for the ledger capability surface.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use shared::domain::{Deployment, PollId, TxHash};
use tracing::warn;
use url::Url;

use crate::{
    CreatedRef, EventFilter, EventOrder, FetchOptions, LedgerClient, ProgramCall, RawEvent,
    RawObject, SignedTransaction, SubmitError, TransactionReceipt, TransactionSigner,
};

use async_trait::async_trait;

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// `LedgerClient` over a fullnode's JSON-RPC endpoint. Signing is delegated
/// to the injected `TransactionSigner`.
pub struct JsonRpcLedgerClient {
    http: Client,
    rpc_url: Url,
    deployment: Deployment,
    signer: Arc<dyn TransactionSigner>,
    next_id: AtomicU64,
}

impl JsonRpcLedgerClient {
    pub fn new(
        rpc_url: &str,
        deployment: Deployment,
        signer: Arc<dyn TransactionSigner>,
    ) -> Result<Self> {
        let rpc_url = Url::parse(rpc_url).with_context(|| format!("invalid rpc url: {rpc_url}"))?;
        Ok(Self {
            http: Client::new(),
            rpc_url,
            deployment,
            signer,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        let envelope: RpcEnvelope<T> = self
            .http
            .post(self.rpc_url.clone())
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("malformed rpc response for {method}"))?;

        if let Some(err) = envelope.error {
            return Err(anyhow!("rpc {method} failed ({}): {}", err.code, err.message));
        }
        envelope
            .result
            .ok_or_else(|| anyhow!("rpc {method} returned neither result nor error"))
    }
}

#[derive(Debug, Deserialize)]
struct GetObjectResult {
    data: Option<ObjectData>,
    error: Option<ObjectError>,
}

#[derive(Debug, Deserialize)]
struct ObjectData {
    #[serde(rename = "objectId")]
    object_id: String,
    content: Option<ObjectContent>,
    owner: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ObjectContent {
    #[serde(rename = "dataType")]
    data_type: String,
    #[serde(default)]
    fields: Value,
}

#[derive(Debug, Deserialize)]
struct ObjectError {
    code: String,
}

#[derive(Debug, Deserialize)]
struct EventPage {
    data: Vec<EventEntry>,
}

#[derive(Debug, Deserialize)]
struct EventEntry {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(rename = "parsedJson", default)]
    parsed_json: Value,
}

#[derive(Debug, Deserialize)]
struct ExecuteResult {
    digest: String,
}

#[derive(Debug, Deserialize)]
struct WaitResult {
    effects: Option<Effects>,
}

#[derive(Debug, Deserialize)]
struct Effects {
    #[serde(default)]
    created: Vec<CreatedEntry>,
}

#[derive(Debug, Deserialize)]
struct CreatedEntry {
    reference: CreatedReference,
}

#[derive(Debug, Deserialize)]
struct CreatedReference {
    #[serde(rename = "objectId")]
    object_id: String,
}

#[async_trait]
impl LedgerClient for JsonRpcLedgerClient {
    async fn fetch_object(&self, id: &PollId, options: FetchOptions) -> Result<Option<RawObject>> {
        let result: GetObjectResult = self
            .call(
                "ledger_getObject",
                json!([
                    id.as_str(),
                    { "showContent": options.show_content, "showOwner": options.show_owner }
                ]),
            )
            .await?;

        if let Some(err) = result.error {
            // Absent objects come back as an in-band error code, not a
            // transport fault.
            if err.code == "notExists" || err.code == "deleted" {
                return Ok(None);
            }
            return Err(anyhow!("object fetch failed for {id}: {}", err.code));
        }

        let Some(data) = result.data else {
            return Ok(None);
        };
        let (kind, fields) = match data.content {
            Some(content) => (content.data_type, content.fields),
            None => {
                warn!(object_id = %data.object_id, "object fetched without content");
                (String::new(), Value::Null)
            }
        };
        Ok(Some(RawObject {
            object_id: PollId::new(data.object_id),
            kind,
            owner: data.owner.map(|owner| owner.to_string()),
            fields,
        }))
    }

    async fn query_events(
        &self,
        filter: &EventFilter,
        limit: usize,
        order: EventOrder,
    ) -> Result<Vec<RawEvent>> {
        let descending = matches!(order, EventOrder::Descending);
        let page: EventPage = self
            .call(
                "ledger_queryEvents",
                json!([
                    { "MoveEventType": filter.event_type },
                    null,
                    limit,
                    descending
                ]),
            )
            .await?;

        Ok(page
            .data
            .into_iter()
            .map(|entry| RawEvent {
                event_type: entry.event_type,
                payload: entry.parsed_json,
            })
            .collect())
    }

    async fn submit_transaction(&self, call: &ProgramCall) -> Result<TxHash, SubmitError> {
        let target = call.target(&self.deployment);
        let signed: SignedTransaction = self
            .signer
            .sign(&target, call)
            .await
            .map_err(|err| SubmitError::SignerRejected(err.to_string()))?;

        let result: ExecuteResult = self
            .call(
                "ledger_executeTransaction",
                json!([signed.tx_bytes_b64, [signed.signature_b64]]),
            )
            .await
            .map_err(|err| SubmitError::Network(err.to_string()))?;

        Ok(TxHash::new(result.digest))
    }

    async fn await_confirmation(&self, hash: &TxHash) -> Result<TransactionReceipt> {
        let result: WaitResult = self
            .call(
                "ledger_waitForTransaction",
                json!([hash.as_str(), { "showEffects": true }]),
            )
            .await?;

        let created = result
            .effects
            .map(|effects| effects.created)
            .unwrap_or_default()
            .into_iter()
            .map(|entry| CreatedRef {
                object_id: PollId::new(entry.reference.object_id),
            })
            .collect();

        Ok(TransactionReceipt {
            transaction_hash: hash.clone(),
            created,
        })
    }
}

/// Signer that defers to an external wallet daemon over HTTP. The daemon
/// receives the serialized call and answers with signed bytes, or a non-2xx
/// status when the user declines.
pub struct HttpSigner {
    http: Client,
    endpoint: Url,
}

#[derive(Debug, Serialize)]
struct SignRequest<'a> {
    target: &'a str,
    call_b64: String,
}

impl HttpSigner {
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint =
            Url::parse(endpoint).with_context(|| format!("invalid signer endpoint: {endpoint}"))?;
        Ok(Self {
            http: Client::new(),
            endpoint,
        })
    }
}

#[async_trait]
impl TransactionSigner for HttpSigner {
    async fn sign(&self, target: &str, call: &ProgramCall) -> Result<SignedTransaction> {
        let call_bytes = serde_json::to_vec(call)?;
        let signed: SignedTransaction = self
            .http
            .post(self.endpoint.clone())
            .json(&SignRequest {
                target,
                call_b64: STANDARD.encode(call_bytes),
            })
            .send()
            .await?
            .error_for_status()
            .context("signer declined the transaction")?
            .json()
            .await
            .context("malformed signer response")?;
        Ok(signed)
    }
}
