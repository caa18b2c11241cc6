//! Vote integrity orchestration.
//!
//! Ties the hash engine, the policy checks, the row store, and the anchor
//! ledger together. The ordering contract is fixed: validation happens
//! before any write (fail-closed), persistence must succeed for a vote to
//! exist at all, and anchoring is best-effort afterwards (fail-open) — a
//! dead ledger never costs a voter their accepted ballot.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::audit::{self, AuditReport};
use crate::config::EngineConfig;
use crate::hashing;
use crate::ledger::{AnchorReceipt, LedgerClient, NetworkStatus};
use crate::model::{ElectionValidationStatus, VoteIntegrityCheck, VoteRecord};
use crate::policy::{self, RuleViolation};
use crate::store::{NewVote, StoreError, VoteStore};

const ANOMALY_HASH_MISMATCH: &str = "Vote hash mismatch - possible tampering detected";
const ANOMALY_LEDGER_MISMATCH: &str = "Ledger validation failed";
const ANOMALY_LEDGER_UNKNOWN: &str = "Could not verify ledger status";
const ANOMALY_VERIFY_FAILED: &str = "Verification failed";

/// Failures of a vote submission.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmitError {
    /// The ballot violated one or more admission rules. Nothing was written.
    #[error("vote rejected: {}", format_violations(.0))]
    Rejected(Vec<RuleViolation>),
    /// The target election does not exist.
    #[error("election not found")]
    ElectionNotFound,
    /// The row store failed; the caller must not assume a vote exists.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures of an integrity check lookup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerifyError {
    /// The vote row does not exist.
    #[error("vote not found")]
    VoteNotFound,
    /// The row store failed mid-check.
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn format_violations(violations: &[RuleViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Whether a freshly accepted vote made it onto the ledger.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum AnchorOutcome {
    /// The ledger accepted the hash; receipt attached.
    Anchored {
        /// Receipt returned by the ledger.
        receipt: AnchorReceipt,
    },
    /// No anchor exists yet; the vote is still accepted.
    Unanchored,
}

/// Caller-visible result of a successful submission.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SubmittedVote {
    /// Identifier of the persisted vote.
    pub vote_id: String,
    /// Content fingerprint stored with the vote.
    pub vote_hash: String,
    /// Anchor outcome; `Unanchored` is not a failure.
    pub anchor: AnchorOutcome,
}

/// Result of a ledger sync pass over one election.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LedgerSyncOutcome {
    /// Aggregate recomputed during the pass and written to the store.
    pub status: ElectionValidationStatus,
    /// Connectivity snapshot taken during the pass.
    pub network: NetworkStatus,
}

/// The vote integrity engine.
///
/// Holds injected store and ledger handles; no ambient globals. Stateless
/// between calls, so submissions and checks for different votes may run
/// concurrently without coordination — duplicate protection is delegated to
/// the store's uniqueness constraint.
pub struct IntegrityService {
    store: Arc<dyn VoteStore>,
    ledger: Arc<dyn LedgerClient>,
    config: EngineConfig,
}

impl IntegrityService {
    /// Builds the engine from its collaborators.
    pub fn new(
        store: Arc<dyn VoteStore>,
        ledger: Arc<dyn LedgerClient>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            config,
        }
    }

    /// Validates and persists one ballot, then anchors it best-effort.
    ///
    /// Any rule violation aborts before a single row is written. Once the
    /// vote row exists, no ledger failure can undo it; the outcome merely
    /// degrades to [`AnchorOutcome::Unanchored`].
    pub async fn submit_vote(
        &self,
        election_id: &str,
        candidate_ids: Vec<String>,
        voter_email: Option<String>,
    ) -> Result<SubmittedVote, SubmitError> {
        let election = match self.store.get_election(election_id).await {
            Ok(election) => election,
            Err(StoreError::NotFound) => return Err(SubmitError::ElectionNotFound),
            Err(err) => return Err(err.into()),
        };
        let candidates = self.store.list_candidates(election_id).await?;
        let now = Utc::now();

        let has_existing = match &voter_email {
            Some(email) => self
                .store
                .find_vote_by_voter(election_id, email)
                .await?
                .is_some(),
            None => false,
        };
        let mut violations = policy::evaluate(
            &election,
            &candidates,
            &candidate_ids,
            voter_email.as_deref(),
            has_existing,
            now,
        );

        let voter_digest = voter_email
            .as_deref()
            .map(|email| hashing::voter_hash(email, election_id, &self.config.vote_salt));

        // Advisory cross-check against the ledger's own voter registry;
        // unreachable ledger means unknown, not rejected.
        if violations.is_empty() && self.ledger.is_available() {
            if let Some(digest) = &voter_digest {
                match self.ledger.has_voter_voted(election_id, digest).await {
                    Ok(true) => violations.push(RuleViolation::AlreadyVoted),
                    Ok(false) => {}
                    Err(err) => warn!("could not check ledger vote status: {err}"),
                }
            }
        }
        if !violations.is_empty() {
            return Err(SubmitError::Rejected(violations));
        }

        let vote_hash = hashing::vote_hash(
            election_id,
            &candidate_ids,
            voter_email.as_deref(),
            now,
            &self.config.vote_salt,
        );
        let vote = self
            .store
            .insert_vote(NewVote {
                election_id: election_id.to_string(),
                candidate_ids,
                voter_email,
                vote_hash,
                voter_hash: voter_digest.clone(),
                created_at: now,
            })
            .await
            .map_err(|err| match err {
                // Two submissions raced past the lookup; the constraint is
                // the authoritative guard.
                StoreError::Constraint(_) => {
                    SubmitError::Rejected(vec![RuleViolation::AlreadyVoted])
                }
                other => SubmitError::Store(other),
            })?;

        let anchor = self.anchor_vote(&vote, voter_digest.as_deref()).await;
        Ok(SubmittedVote {
            vote_id: vote.id,
            vote_hash: vote.vote_hash,
            anchor,
        })
    }

    async fn anchor_vote(&self, vote: &VoteRecord, voter_digest: Option<&str>) -> AnchorOutcome {
        if !self.ledger.is_available() {
            return AnchorOutcome::Unanchored;
        }
        match self
            .ledger
            .submit_hash(&vote.election_id, &vote.vote_hash, voter_digest)
            .await
        {
            Ok(receipt) => {
                if let Err(err) = self
                    .store
                    .update_vote_anchor(&vote.id, &receipt.tx_ref, receipt.block_height, true)
                    .await
                {
                    // The anchor exists on the ledger; the stale row will be
                    // picked up by the next sync pass.
                    warn!("failed to record anchor for vote {}: {err}", vote.id);
                }
                info!(
                    "anchored vote {} at block {} ({})",
                    vote.id, receipt.block_height, receipt.tx_ref
                );
                AnchorOutcome::Anchored { receipt }
            }
            Err(err) => {
                warn!("anchor submission failed for vote {}: {err}", vote.id);
                AnchorOutcome::Unanchored
            }
        }
    }

    /// Recomputes a vote's fingerprint and cross-checks its anchor.
    ///
    /// Returns anomalies as data and never mutates the vote; writing results
    /// back is the caller's decision (see [`Self::revalidate_vote`]).
    pub async fn verify_vote_integrity(
        &self,
        vote_id: &str,
    ) -> Result<VoteIntegrityCheck, VerifyError> {
        let vote = match self.store.get_vote(vote_id).await {
            Ok(vote) => vote,
            Err(StoreError::NotFound) => return Err(VerifyError::VoteNotFound),
            Err(err) => return Err(err.into()),
        };
        let current_hash = hashing::vote_hash(
            &vote.election_id,
            &vote.candidate_ids,
            vote.voter_email.as_deref(),
            vote.created_at,
            &self.config.vote_salt,
        );

        let mut anomalies = Vec::new();
        let is_intact = vote.vote_hash == current_hash;
        if !is_intact {
            anomalies.push(ANOMALY_HASH_MISMATCH.to_string());
        }

        let mut ledger_confirmed = false;
        if vote.anchor_tx.is_some() && self.ledger.is_available() {
            match self
                .ledger
                .query_hash(&vote.election_id, &vote.vote_hash)
                .await
            {
                Ok(status) => {
                    ledger_confirmed = status.confirmed;
                    if !status.confirmed {
                        anomalies.push(ANOMALY_LEDGER_MISMATCH.to_string());
                    }
                }
                Err(err) => {
                    warn!("ledger lookup failed for vote {vote_id}: {err}");
                    anomalies.push(ANOMALY_LEDGER_UNKNOWN.to_string());
                }
            }
        }

        Ok(VoteIntegrityCheck {
            vote_id: vote_id.to_string(),
            original_hash: vote.vote_hash,
            current_hash,
            is_intact,
            ledger_confirmed,
            anomalies,
            checked_at: Utc::now(),
        })
    }

    /// Computes the validated/pending/invalid partition and integrity score
    /// for an election, with a best-effort ledger sync comparison.
    pub async fn get_election_validation_status(
        &self,
        election_id: &str,
    ) -> Result<ElectionValidationStatus, StoreError> {
        let votes = self.store.list_votes(election_id).await?;
        let validated = votes.iter().filter(|v| v.anchor_confirmed).count() as u64;

        let mut ledger_synced = false;
        if self.ledger.is_available() && !votes.is_empty() {
            match self.ledger.election_vote_count(election_id).await {
                Ok(count) => ledger_synced = count == validated,
                Err(err) => warn!("could not check ledger sync for {election_id}: {err}"),
            }
        }

        Ok(ElectionValidationStatus::from_votes(
            election_id,
            &votes,
            ledger_synced,
            Utc::now(),
        ))
    }

    /// Verifies each vote independently.
    ///
    /// Per-item isolation is mandatory: one corrupt or missing record
    /// produces an anomaly-flagged entry for that id and never aborts the
    /// rest of the batch.
    pub async fn batch_verify(&self, vote_ids: &[String]) -> Vec<VoteIntegrityCheck> {
        let mut results = Vec::with_capacity(vote_ids.len());
        for vote_id in vote_ids {
            match self.verify_vote_integrity(vote_id).await {
                Ok(check) => results.push(check),
                Err(err) => {
                    warn!("failed to verify vote {vote_id}: {err}");
                    results.push(VoteIntegrityCheck {
                        vote_id: vote_id.clone(),
                        original_hash: String::new(),
                        current_hash: String::new(),
                        is_intact: false,
                        ledger_confirmed: false,
                        anomalies: vec![ANOMALY_VERIFY_FAILED.to_string()],
                        checked_at: Utc::now(),
                    });
                }
            }
        }
        results
    }

    /// Runs an integrity check and writes the result back onto the vote row.
    pub async fn revalidate_vote(&self, vote_id: &str) -> Result<VoteIntegrityCheck, VerifyError> {
        let check = self.verify_vote_integrity(vote_id).await?;
        self.store
            .update_vote_integrity(vote_id, check.is_intact, &check.anomalies)
            .await?;
        Ok(check)
    }

    /// Recomputes the election aggregate, snapshots ledger connectivity, and
    /// persists the aggregate for dashboards.
    pub async fn sync_ledger(&self, election_id: &str) -> Result<LedgerSyncOutcome, StoreError> {
        let status = self.get_election_validation_status(election_id).await?;
        let network = self.ledger.network_status().await;
        self.store.record_validation_status(&status).await?;
        Ok(LedgerSyncOutcome { status, network })
    }

    /// Builds a full audit report: aggregate status, an integrity check for
    /// every vote, and the accumulated recommendations.
    pub async fn generate_audit_report(
        &self,
        election_id: &str,
    ) -> Result<AuditReport, StoreError> {
        let summary = self.get_election_validation_status(election_id).await?;
        let votes = self.store.list_votes(election_id).await?;
        let vote_ids: Vec<String> = votes.into_iter().map(|v| v.id).collect();
        let vote_checks = self.batch_verify(&vote_ids).await;
        Ok(audit::build_report(election_id, summary, vote_checks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{HashStatus, LedgerError};
    use crate::model::{Candidate, Election, ElectionPolicy};
    use crate::store::{MemoryStore, NewCandidate, NewElection};
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    struct ScriptedLedger {
        available: bool,
        fail_submit: bool,
        fail_queries: bool,
        confirm_queries: bool,
        vote_count: Option<u64>,
        voter_already_on_ledger: bool,
    }

    impl Default for ScriptedLedger {
        fn default() -> Self {
            Self {
                available: true,
                fail_submit: false,
                fail_queries: false,
                confirm_queries: true,
                vote_count: None,
                voter_already_on_ledger: false,
            }
        }
    }

    #[async_trait]
    impl LedgerClient for ScriptedLedger {
        fn is_available(&self) -> bool {
            self.available
        }

        async fn submit_hash(
            &self,
            _election_id: &str,
            _vote_hash: &str,
            _voter_hash: Option<&str>,
        ) -> Result<AnchorReceipt, LedgerError> {
            if self.fail_submit {
                return Err(LedgerError::Unavailable("scripted outage".into()));
            }
            Ok(AnchorReceipt {
                tx_ref: "0xanchor".into(),
                block_height: 7,
                gas_used: 21_000,
                confirmations: 1,
            })
        }

        async fn query_hash(
            &self,
            _election_id: &str,
            _vote_hash: &str,
        ) -> Result<HashStatus, LedgerError> {
            if self.fail_queries {
                return Err(LedgerError::Unavailable("scripted outage".into()));
            }
            Ok(HashStatus {
                confirmed: self.confirm_queries,
                block_height: 7,
                submitter_ref: "0xsubmitter".into(),
            })
        }

        async fn election_vote_count(&self, _election_id: &str) -> Result<u64, LedgerError> {
            self.vote_count
                .ok_or_else(|| LedgerError::Unavailable("scripted outage".into()))
        }

        async fn has_voter_voted(
            &self,
            _election_id: &str,
            _voter_hash: &str,
        ) -> Result<bool, LedgerError> {
            Ok(self.voter_already_on_ledger)
        }

        async fn network_status(&self) -> NetworkStatus {
            if self.available {
                NetworkStatus {
                    connected: true,
                    block_height: 7,
                    gas_price_gwei: "12".into(),
                    network_id: 11155111,
                    contract_address: "0xcontract".into(),
                }
            } else {
                NetworkStatus::disconnected()
            }
        }
    }

    /// Delegates reads to an inner store and counts every write.
    struct WriteCountingStore {
        inner: MemoryStore,
        writes: AtomicUsize,
    }

    impl WriteCountingStore {
        fn new(inner: MemoryStore) -> Self {
            Self {
                inner,
                writes: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl VoteStore for WriteCountingStore {
        async fn insert_election(&self, new: NewElection) -> Result<Election, StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.insert_election(new).await
        }

        async fn delete_election(&self, election_id: &str) -> Result<(), StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.delete_election(election_id).await
        }

        async fn insert_candidates(
            &self,
            election_id: &str,
            batch: Vec<NewCandidate>,
        ) -> Result<Vec<Candidate>, StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.insert_candidates(election_id, batch).await
        }

        async fn get_election(&self, election_id: &str) -> Result<Election, StoreError> {
            self.inner.get_election(election_id).await
        }

        async fn list_candidates(&self, election_id: &str) -> Result<Vec<Candidate>, StoreError> {
            self.inner.list_candidates(election_id).await
        }

        async fn insert_vote(&self, new: NewVote) -> Result<VoteRecord, StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.insert_vote(new).await
        }

        async fn get_vote(&self, vote_id: &str) -> Result<VoteRecord, StoreError> {
            self.inner.get_vote(vote_id).await
        }

        async fn list_votes(&self, election_id: &str) -> Result<Vec<VoteRecord>, StoreError> {
            self.inner.list_votes(election_id).await
        }

        async fn find_vote_by_voter(
            &self,
            election_id: &str,
            voter_email: &str,
        ) -> Result<Option<VoteRecord>, StoreError> {
            self.inner.find_vote_by_voter(election_id, voter_email).await
        }

        async fn update_vote_anchor(
            &self,
            vote_id: &str,
            tx_ref: &str,
            block_height: u64,
            confirmed: bool,
        ) -> Result<(), StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner
                .update_vote_anchor(vote_id, tx_ref, block_height, confirmed)
                .await
        }

        async fn update_vote_integrity(
            &self,
            vote_id: &str,
            verified: bool,
            anomalies: &[String],
        ) -> Result<(), StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner
                .update_vote_integrity(vote_id, verified, anomalies)
                .await
        }

        async fn record_validation_status(
            &self,
            status: &ElectionValidationStatus,
        ) -> Result<(), StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.record_validation_status(status).await
        }
    }

    fn engine_config() -> EngineConfig {
        EngineConfig::new("test-salt")
    }

    async fn seed_election(
        store: &MemoryStore,
        policy: ElectionPolicy,
        require_registration: bool,
        ended: bool,
    ) -> (Election, Vec<Candidate>) {
        let now = Utc::now();
        let (start, end) = if ended {
            (now - Duration::days(2), now - Duration::days(1))
        } else {
            (now - Duration::hours(1), now + Duration::days(1))
        };
        let election = store
            .insert_election(NewElection {
                title: "Treasurer".into(),
                description: "Pick a treasurer".into(),
                start_date: start,
                end_date: end,
                policy,
                require_registration,
            })
            .await
            .unwrap();
        let candidates = store
            .insert_candidates(
                &election.id,
                vec![
                    NewCandidate {
                        name: "Ada".into(),
                        description: None,
                    },
                    NewCandidate {
                        name: "Grace".into(),
                        description: None,
                    },
                    NewCandidate {
                        name: "Edsger".into(),
                        description: None,
                    },
                ],
            )
            .await
            .unwrap();
        (election, candidates)
    }

    fn service(store: Arc<MemoryStore>, ledger: ScriptedLedger) -> IntegrityService {
        IntegrityService::new(store, Arc::new(ledger), engine_config())
    }

    #[tokio::test]
    async fn anchoring_failure_does_not_reject_the_vote() {
        let store = Arc::new(MemoryStore::new());
        let (election, candidates) =
            seed_election(&store, ElectionPolicy::SingleSelect, false, false).await;
        let svc = service(
            store.clone(),
            ScriptedLedger {
                fail_submit: true,
                ..Default::default()
            },
        );

        let submitted = svc
            .submit_vote(&election.id, vec![candidates[0].id.clone()], None)
            .await
            .unwrap();
        assert!(matches!(submitted.anchor, AnchorOutcome::Unanchored));
        let stored = store.get_vote(&submitted.vote_id).await.unwrap();
        assert!(stored.anchor_tx.is_none());
        assert!(!stored.anchor_confirmed);
    }

    #[tokio::test]
    async fn successful_anchor_is_recorded_on_the_vote() {
        let store = Arc::new(MemoryStore::new());
        let (election, candidates) =
            seed_election(&store, ElectionPolicy::SingleSelect, false, false).await;
        let svc = service(store.clone(), ScriptedLedger::default());

        let submitted = svc
            .submit_vote(&election.id, vec![candidates[1].id.clone()], None)
            .await
            .unwrap();
        match &submitted.anchor {
            AnchorOutcome::Anchored { receipt } => assert_eq!(receipt.tx_ref, "0xanchor"),
            other => panic!("expected anchored outcome, got {other:?}"),
        }
        let stored = store.get_vote(&submitted.vote_id).await.unwrap();
        assert_eq!(stored.anchor_tx.as_deref(), Some("0xanchor"));
        assert!(stored.anchor_confirmed);
        assert_eq!(stored.anchor_block, Some(7));
    }

    #[tokio::test]
    async fn missing_ledger_leaves_votes_unanchored() {
        let store = Arc::new(MemoryStore::new());
        let (election, candidates) =
            seed_election(&store, ElectionPolicy::MultiSelect, false, false).await;
        let svc = service(
            store.clone(),
            ScriptedLedger {
                available: false,
                ..Default::default()
            },
        );

        let submitted = svc
            .submit_vote(
                &election.id,
                vec![candidates[0].id.clone(), candidates[1].id.clone()],
                None,
            )
            .await
            .unwrap();
        assert!(matches!(submitted.anchor, AnchorOutcome::Unanchored));
    }

    #[tokio::test]
    async fn ended_election_rejects_without_writing() {
        let inner = MemoryStore::new();
        let (election, candidates) =
            seed_election(&inner, ElectionPolicy::SingleSelect, false, true).await;
        let spy = Arc::new(WriteCountingStore::new(inner));
        let svc = IntegrityService::new(
            spy.clone(),
            Arc::new(ScriptedLedger::default()),
            engine_config(),
        );

        let before = spy.writes.load(Ordering::SeqCst);
        let err = svc
            .submit_vote(&election.id, vec![candidates[0].id.clone()], None)
            .await
            .unwrap_err();
        match err {
            SubmitError::Rejected(violations) => {
                assert!(violations.contains(&RuleViolation::Ended))
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(spy.writes.load(Ordering::SeqCst), before);
    }

    #[tokio::test]
    async fn single_select_rejects_two_candidates_but_takes_one() {
        let store = Arc::new(MemoryStore::new());
        let (election, candidates) =
            seed_election(&store, ElectionPolicy::SingleSelect, false, false).await;
        let svc = service(store.clone(), ScriptedLedger::default());

        let err = svc
            .submit_vote(
                &election.id,
                vec![candidates[0].id.clone(), candidates[1].id.clone()],
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SubmitError::Rejected(vec![RuleViolation::PolicyViolation])
        );

        svc.submit_vote(&election.id, vec![candidates[0].id.clone()], None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn second_vote_with_same_email_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let (election, candidates) =
            seed_election(&store, ElectionPolicy::SingleSelect, true, false).await;
        let svc = service(store.clone(), ScriptedLedger::default());

        svc.submit_vote(
            &election.id,
            vec![candidates[0].id.clone()],
            Some("ada@example.org".into()),
        )
        .await
        .unwrap();
        let err = svc
            .submit_vote(
                &election.id,
                vec![candidates[1].id.clone()],
                Some("ada@example.org".into()),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SubmitError::Rejected(vec![RuleViolation::AlreadyVoted])
        );
    }

    #[tokio::test]
    async fn registration_requirement_demands_an_email() {
        let store = Arc::new(MemoryStore::new());
        let (election, candidates) =
            seed_election(&store, ElectionPolicy::SingleSelect, true, false).await;
        let svc = service(store.clone(), ScriptedLedger::default());

        let err = svc
            .submit_vote(&election.id, vec![candidates[0].id.clone()], None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SubmitError::Rejected(vec![RuleViolation::EmailRequired])
        );
    }

    #[tokio::test]
    async fn ledger_side_duplicate_registry_is_honoured() {
        let store = Arc::new(MemoryStore::new());
        let (election, candidates) =
            seed_election(&store, ElectionPolicy::SingleSelect, true, false).await;
        let svc = service(
            store.clone(),
            ScriptedLedger {
                voter_already_on_ledger: true,
                ..Default::default()
            },
        );

        let err = svc
            .submit_vote(
                &election.id,
                vec![candidates[0].id.clone()],
                Some("ada@example.org".into()),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SubmitError::Rejected(vec![RuleViolation::AlreadyVoted])
        );
    }

    #[tokio::test]
    async fn unknown_election_is_its_own_error() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(store.clone(), ScriptedLedger::default());
        let err = svc
            .submit_vote("nope", vec!["c1".into()], None)
            .await
            .unwrap_err();
        assert_eq!(err, SubmitError::ElectionNotFound);
    }

    #[tokio::test]
    async fn tampered_candidate_selection_is_detected() {
        let store = Arc::new(MemoryStore::new());
        let (election, candidates) =
            seed_election(&store, ElectionPolicy::SingleSelect, false, false).await;
        let svc = service(store.clone(), ScriptedLedger::default());

        let submitted = svc
            .submit_vote(&election.id, vec![candidates[0].id.clone()], None)
            .await
            .unwrap();

        let mut stored = store.get_vote(&submitted.vote_id).await.unwrap();
        stored.candidate_ids = vec![candidates[2].id.clone()];
        store.overwrite_vote(stored).await;

        let check = svc.verify_vote_integrity(&submitted.vote_id).await.unwrap();
        assert!(!check.is_intact);
        assert!(check
            .anomalies
            .iter()
            .any(|a| a.contains("hash mismatch")));
    }

    #[tokio::test]
    async fn untouched_vote_verifies_clean_and_confirmed() {
        let store = Arc::new(MemoryStore::new());
        let (election, candidates) =
            seed_election(&store, ElectionPolicy::SingleSelect, false, false).await;
        let svc = service(store.clone(), ScriptedLedger::default());

        let submitted = svc
            .submit_vote(&election.id, vec![candidates[0].id.clone()], None)
            .await
            .unwrap();
        let check = svc.verify_vote_integrity(&submitted.vote_id).await.unwrap();
        assert!(check.is_intact);
        assert!(check.ledger_confirmed);
        assert!(check.anomalies.is_empty());
        assert_eq!(check.original_hash, check.current_hash);
    }

    #[tokio::test]
    async fn unreachable_ledger_reads_as_unknown_not_invalid() {
        let store = Arc::new(MemoryStore::new());
        let (election, candidates) =
            seed_election(&store, ElectionPolicy::SingleSelect, false, false).await;
        let svc = service(store.clone(), ScriptedLedger::default());
        let submitted = svc
            .submit_vote(&election.id, vec![candidates[0].id.clone()], None)
            .await
            .unwrap();

        let flaky = service(
            store.clone(),
            ScriptedLedger {
                fail_queries: true,
                ..Default::default()
            },
        );
        let check = flaky
            .verify_vote_integrity(&submitted.vote_id)
            .await
            .unwrap();
        assert!(check.is_intact);
        assert!(!check.ledger_confirmed);
        assert_eq!(check.anomalies, vec![ANOMALY_LEDGER_UNKNOWN.to_string()]);
    }

    #[tokio::test]
    async fn batch_verification_isolates_a_missing_vote() {
        let store = Arc::new(MemoryStore::new());
        let (election, candidates) =
            seed_election(&store, ElectionPolicy::MultiSelect, false, false).await;
        let svc = service(store.clone(), ScriptedLedger::default());

        let first = svc
            .submit_vote(&election.id, vec![candidates[0].id.clone()], None)
            .await
            .unwrap();
        let third = svc
            .submit_vote(&election.id, vec![candidates[1].id.clone()], None)
            .await
            .unwrap();

        let ids = vec![first.vote_id.clone(), "missing".to_string(), third.vote_id.clone()];
        let results = svc.batch_verify(&ids).await;
        assert_eq!(results.len(), 3);
        assert!(results[0].is_intact);
        assert!(!results[1].is_intact);
        assert_eq!(results[1].anomalies, vec![ANOMALY_VERIFY_FAILED.to_string()]);
        assert!(results[2].is_intact);
    }

    #[tokio::test]
    async fn status_partitions_votes_and_scores_them() {
        let store = Arc::new(MemoryStore::new());
        let (election, candidates) =
            seed_election(&store, ElectionPolicy::MultiSelect, false, false).await;

        let anchored = service(store.clone(), ScriptedLedger::default());
        anchored
            .submit_vote(&election.id, vec![candidates[0].id.clone()], None)
            .await
            .unwrap();
        anchored
            .submit_vote(&election.id, vec![candidates[1].id.clone()], None)
            .await
            .unwrap();

        let degraded = service(
            store.clone(),
            ScriptedLedger {
                fail_submit: true,
                vote_count: Some(2),
                ..Default::default()
            },
        );
        degraded
            .submit_vote(&election.id, vec![candidates[2].id.clone()], None)
            .await
            .unwrap();

        let status = degraded
            .get_election_validation_status(&election.id)
            .await
            .unwrap();
        assert_eq!(status.total_votes, 3);
        assert_eq!(status.validated_votes, 2);
        assert_eq!(status.pending_validation, 0);
        assert_eq!(status.invalid_votes, 1);
        assert!(status.ledger_synced);
        assert_eq!(status.integrity_score, 67);
    }

    #[tokio::test]
    async fn ledger_count_mismatch_reads_as_out_of_sync() {
        let store = Arc::new(MemoryStore::new());
        let (election, candidates) =
            seed_election(&store, ElectionPolicy::SingleSelect, false, false).await;
        let svc = service(
            store.clone(),
            ScriptedLedger {
                vote_count: Some(5),
                ..Default::default()
            },
        );
        svc.submit_vote(&election.id, vec![candidates[0].id.clone()], None)
            .await
            .unwrap();
        let status = svc
            .get_election_validation_status(&election.id)
            .await
            .unwrap();
        assert!(!status.ledger_synced);
    }

    #[tokio::test]
    async fn revalidation_writes_the_result_back() {
        let store = Arc::new(MemoryStore::new());
        let (election, candidates) =
            seed_election(&store, ElectionPolicy::SingleSelect, false, false).await;
        let svc = service(store.clone(), ScriptedLedger::default());

        let submitted = svc
            .submit_vote(&election.id, vec![candidates[0].id.clone()], None)
            .await
            .unwrap();
        let mut stored = store.get_vote(&submitted.vote_id).await.unwrap();
        stored.candidate_ids = vec![candidates[1].id.clone()];
        store.overwrite_vote(stored).await;

        let check = svc.revalidate_vote(&submitted.vote_id).await.unwrap();
        assert!(!check.is_intact);

        let after = store.get_vote(&submitted.vote_id).await.unwrap();
        assert_eq!(after.integrity_verified, Some(false));
        assert!(after.last_integrity_check.is_some());
        assert!(after.recorded_anomalies.is_some());
    }

    #[tokio::test]
    async fn sync_pass_returns_status_and_network_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let (election, candidates) =
            seed_election(&store, ElectionPolicy::SingleSelect, false, false).await;
        let svc = service(
            store.clone(),
            ScriptedLedger {
                vote_count: Some(1),
                ..Default::default()
            },
        );
        svc.submit_vote(&election.id, vec![candidates[0].id.clone()], None)
            .await
            .unwrap();

        let outcome = svc.sync_ledger(&election.id).await.unwrap();
        assert_eq!(outcome.status.total_votes, 1);
        assert!(outcome.status.ledger_synced);
        assert!(outcome.network.connected);
        assert_eq!(outcome.network.block_height, 7);
    }

    #[tokio::test]
    async fn audit_report_flags_a_degraded_election() {
        let store = Arc::new(MemoryStore::new());
        let (election, candidates) =
            seed_election(&store, ElectionPolicy::MultiSelect, false, false).await;
        let offline = service(
            store.clone(),
            ScriptedLedger {
                available: false,
                ..Default::default()
            },
        );
        let submitted = offline
            .submit_vote(&election.id, vec![candidates[0].id.clone()], None)
            .await
            .unwrap();
        offline
            .submit_vote(&election.id, vec![candidates[1].id.clone()], None)
            .await
            .unwrap();

        let mut stored = store.get_vote(&submitted.vote_id).await.unwrap();
        stored.candidate_ids = vec![candidates[2].id.clone()];
        store.overwrite_vote(stored).await;

        let report = offline.generate_audit_report(&election.id).await.unwrap();
        assert_eq!(report.summary.total_votes, 2);
        assert_eq!(report.summary.invalid_votes, 2);
        assert_eq!(report.vote_checks.len(), 2);
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("Low integrity score")));
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("Invalid votes detected")));
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("integrity issues")));
    }
}
