//! Anchor ledger client.
//!
//! The ledger is an external JSON-RPC gateway fronting the vote-validation
//! contract; nothing about its consensus or mempool lives here. Every call
//! is bounded by the configured timeout and a timeout is reported as the
//! ledger being unavailable, which callers treat as "unknown", never as
//! "invalid". An unconfigured client short-circuits every call the same
//! way, so the rest of the engine does not need a separate code path for
//! deployments without a ledger.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::time;
use tracing::warn;

use crate::config::LedgerConfig;

/// All-zero placeholder submitted in place of a voter hash for anonymous
/// ballots.
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Failures surfaced by ledger calls.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// The gateway could not be reached, timed out, or is not configured.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
    /// The gateway answered but refused the operation.
    #[error("ledger rejected the call: {0}")]
    Rejected(String),
}

/// Receipt returned when a vote hash is accepted by the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorReceipt {
    /// Transaction reference of the anchor.
    pub tx_ref: String,
    /// Block height the transaction landed in.
    pub block_height: u64,
    /// Gas consumed by the submission.
    pub gas_used: u64,
    /// Confirmations observed at receipt time.
    pub confirmations: u32,
}

/// Result of asking the ledger whether it still recognises a vote hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashStatus {
    /// True when the hash is recorded and confirmed on the ledger.
    pub confirmed: bool,
    /// Block height of the recorded anchor.
    pub block_height: u64,
    /// Reference of the submitter that anchored the hash.
    pub submitter_ref: String,
}

/// Snapshot of ledger connectivity for dashboards.
///
/// Producing this never fails; any internal error collapses to the
/// disconnected snapshot because callers use it for display, not control
/// flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkStatus {
    /// Whether the gateway answered.
    pub connected: bool,
    /// Latest block height, 0 when disconnected.
    pub block_height: u64,
    /// Gas price in gwei as reported by the gateway.
    pub gas_price_gwei: String,
    /// Chain identifier.
    pub network_id: u64,
    /// Contract address the engine is configured against.
    pub contract_address: String,
}

impl NetworkStatus {
    /// The snapshot reported when the gateway is unreachable or unset.
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            block_height: 0,
            gas_price_gwei: "0".to_string(),
            network_id: 0,
            contract_address: String::new(),
        }
    }
}

/// Operations the engine needs from an anchor ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// True when the client holds everything needed to reach the gateway.
    fn is_available(&self) -> bool;

    /// Submits a vote hash (and optional voter hash) for anchoring.
    async fn submit_hash(
        &self,
        election_id: &str,
        vote_hash: &str,
        voter_hash: Option<&str>,
    ) -> Result<AnchorReceipt, LedgerError>;

    /// Asks whether the ledger still recognises an anchored vote hash.
    async fn query_hash(
        &self,
        election_id: &str,
        vote_hash: &str,
    ) -> Result<HashStatus, LedgerError>;

    /// Returns the number of vote hashes the ledger holds for an election.
    async fn election_vote_count(&self, election_id: &str) -> Result<u64, LedgerError>;

    /// Asks whether a voter hash already cast a ballot in an election.
    async fn has_voter_voted(
        &self,
        election_id: &str,
        voter_hash: &str,
    ) -> Result<bool, LedgerError>;

    /// Connectivity snapshot. Never fails.
    async fn network_status(&self) -> NetworkStatus;
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct NetworkInfo {
    block_height: u64,
    gas_price_gwei: String,
    network_id: u64,
}

/// JSON-RPC 2.0 client for the anchor gateway.
pub struct HttpLedgerClient {
    http: reqwest::Client,
    config: LedgerConfig,
    next_id: AtomicU64,
}

impl HttpLedgerClient {
    /// Builds a client from ledger settings. An incomplete config is
    /// accepted and produces a permanently unavailable client.
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            next_id: AtomicU64::new(1),
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let (url, token) = match (&self.config.rpc_url, &self.config.auth_token) {
            (Some(url), Some(token)) => (url, token),
            _ => {
                return Err(LedgerError::Unavailable(
                    "ledger endpoint or credential not configured".to_string(),
                ))
            }
        };
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        // The timeout covers the full exchange including the body read; a
        // gateway that sends headers and then stalls must not hang callers.
        let exchange = async {
            let response = self
                .http
                .post(url)
                .bearer_auth(token)
                .json(&request)
                .send()
                .await
                .map_err(|err| LedgerError::Unavailable(err.to_string()))?
                .error_for_status()
                .map_err(|err| LedgerError::Unavailable(err.to_string()))?;
            response
                .json::<JsonRpcResponse>()
                .await
                .map_err(|err| LedgerError::Unavailable(err.to_string()))
        };
        let body = time::timeout(self.config.request_timeout, exchange)
            .await
            .map_err(|_| LedgerError::Unavailable(format!("{method} timed out")))??;
        if let Some(error) = body.error {
            return Err(LedgerError::Rejected(format!(
                "{} (code {})",
                error.message, error.code
            )));
        }
        body.result
            .ok_or_else(|| LedgerError::Rejected("empty result".to_string()))
    }

    fn decode<T: for<'de> Deserialize<'de>>(value: Value) -> Result<T, LedgerError> {
        serde_json::from_value(value).map_err(|err| LedgerError::Rejected(err.to_string()))
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    fn is_available(&self) -> bool {
        self.config.is_configured()
    }

    async fn submit_hash(
        &self,
        election_id: &str,
        vote_hash: &str,
        voter_hash: Option<&str>,
    ) -> Result<AnchorReceipt, LedgerError> {
        let result = self
            .call(
                "anchor_submitVoteHash",
                json!([election_id, vote_hash, voter_hash.unwrap_or(ZERO_HASH)]),
            )
            .await?;
        Self::decode(result)
    }

    async fn query_hash(
        &self,
        election_id: &str,
        vote_hash: &str,
    ) -> Result<HashStatus, LedgerError> {
        let result = self
            .call("anchor_validateVote", json!([election_id, vote_hash]))
            .await?;
        Self::decode(result)
    }

    async fn election_vote_count(&self, election_id: &str) -> Result<u64, LedgerError> {
        let result = self
            .call("anchor_getElectionVoteCount", json!([election_id]))
            .await?;
        Self::decode(result)
    }

    async fn has_voter_voted(
        &self,
        election_id: &str,
        voter_hash: &str,
    ) -> Result<bool, LedgerError> {
        let result = self
            .call("anchor_hasVoterVoted", json!([election_id, voter_hash]))
            .await?;
        Self::decode(result)
    }

    async fn network_status(&self) -> NetworkStatus {
        if !self.is_available() {
            return NetworkStatus::disconnected();
        }
        match self.call("anchor_networkStatus", json!([])).await {
            Ok(result) => match Self::decode::<NetworkInfo>(result) {
                Ok(info) => NetworkStatus {
                    connected: true,
                    block_height: info.block_height,
                    gas_price_gwei: info.gas_price_gwei,
                    network_id: info.network_id,
                    contract_address: self.config.contract_address.clone().unwrap_or_default(),
                },
                Err(err) => {
                    warn!("malformed network status from ledger gateway: {err}");
                    NetworkStatus::disconnected()
                }
            },
            Err(err) => {
                warn!("ledger network status unavailable: {err}");
                NetworkStatus::disconnected()
            }
        }
    }
}
