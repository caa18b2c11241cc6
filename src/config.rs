//! Environment-driven configuration.
//!
//! The ledger side is deliberately optional: leaving the endpoint or the
//! credential unset yields an engine that accepts votes and simply reports
//! the ledger as unavailable, rather than refusing to start.

use std::env;
use std::time::Duration;

use tracing::{info, warn};

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Engine-level knobs independent of the ledger transport.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Fixed salt mixed into every vote and voter fingerprint.
    pub vote_salt: String,
}

impl EngineConfig {
    /// Builds the config with an explicit salt.
    pub fn new(vote_salt: impl Into<String>) -> Self {
        Self {
            vote_salt: vote_salt.into(),
        }
    }

    /// Loads the config from the environment.
    ///
    /// `VOTE_ANONYMIZATION_SALT` should be set in any real deployment; the
    /// fallback keeps local runs working but is logged loudly.
    pub fn from_env() -> Self {
        let vote_salt = env::var("VOTE_ANONYMIZATION_SALT").unwrap_or_else(|_| {
            warn!("VOTE_ANONYMIZATION_SALT not set, falling back to an insecure default");
            "ballot-anchor-dev-salt".to_string()
        });
        Self { vote_salt }
    }
}

/// Connection settings for the external anchor ledger.
#[derive(Debug, Clone, Default)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint of the anchor gateway.
    pub rpc_url: Option<String>,
    /// Bearer credential presented to the gateway.
    pub auth_token: Option<String>,
    /// Address of the vote-validation contract behind the gateway.
    pub contract_address: Option<String>,
    /// Upper bound on any single ledger call.
    pub request_timeout: Duration,
}

impl LedgerConfig {
    /// Loads ledger settings from the environment, logging which pieces are
    /// missing instead of failing.
    pub fn from_env() -> Self {
        let rpc_url = optional_var("LEDGER_RPC_URL");
        let auth_token = optional_var("LEDGER_AUTH_TOKEN");
        let contract_address = optional_var("LEDGER_CONTRACT_ADDRESS");
        let timeout_ms = env::var("LEDGER_TIMEOUT_MS")
            .ok()
            .and_then(|raw| match raw.parse::<u64>() {
                Ok(ms) => Some(ms),
                Err(err) => {
                    warn!("Invalid LEDGER_TIMEOUT_MS value: {err}");
                    None
                }
            })
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS);
        Self {
            rpc_url,
            auth_token,
            contract_address,
            request_timeout: Duration::from_millis(timeout_ms),
        }
    }

    /// True when both the endpoint and the credential are present.
    ///
    /// Higher-level components check this before attempting any ledger call
    /// and degrade gracefully when it is false.
    pub fn is_configured(&self) -> bool {
        self.rpc_url.is_some() && self.auth_token.is_some()
    }
}

fn optional_var(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => {
            info!("{key} not set, ledger features depending on it stay disabled");
            None
        }
    }
}
