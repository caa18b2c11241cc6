//! Row-store contract consumed by the validation engine, plus an in-memory
//! implementation.
//!
//! The engine never talks to a concrete database; everything goes through
//! [`VoteStore`] so a relational backend, a test double, or [`MemoryStore`]
//! can be injected interchangeably. The store is the only shared mutable
//! resource in the engine and must provide at least read-committed
//! isolation. The `(election, voter email)` uniqueness constraint is the
//! authoritative guard against duplicate registered voters; the engine's
//! check-then-insert lookup is advisory and can race.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::{
    Candidate, Election, ElectionPolicy, ElectionValidationStatus, VoteRecord,
};

/// Failures surfaced by a [`VoteStore`] backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The requested row does not exist.
    #[error("row not found")]
    NotFound,
    /// A uniqueness constraint rejected the write.
    #[error("constraint violation: {0}")]
    Constraint(String),
    /// Any other backend failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Fields required to insert an election row.
#[derive(Debug, Clone)]
pub struct NewElection {
    /// Display title.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// Start of the voting window.
    pub start_date: DateTime<Utc>,
    /// End of the voting window.
    pub end_date: DateTime<Utc>,
    /// Ballot selection policy.
    pub policy: ElectionPolicy,
    /// Whether every ballot must carry a voter email.
    pub require_registration: bool,
}

/// Fields required to insert a candidate row.
#[derive(Debug, Clone)]
pub struct NewCandidate {
    /// Candidate display name.
    pub name: String,
    /// Optional blurb.
    pub description: Option<String>,
}

/// Fields required to insert a vote row.
#[derive(Debug, Clone)]
pub struct NewVote {
    /// Election the ballot was cast in.
    pub election_id: String,
    /// Selected candidate ids.
    pub candidate_ids: Vec<String>,
    /// Voter email, when supplied.
    pub voter_email: Option<String>,
    /// Content fingerprint computed at submission time.
    pub vote_hash: String,
    /// Salted voter digest, when an email was supplied.
    pub voter_hash: Option<String>,
    /// Submission timestamp; must match the one hashed into `vote_hash`.
    pub created_at: DateTime<Utc>,
}

/// Abstract transactional row store backing the engine.
#[async_trait]
pub trait VoteStore: Send + Sync {
    /// Inserts an election row and returns it with its minted id.
    async fn insert_election(&self, new: NewElection) -> Result<Election, StoreError>;

    /// Deletes an election row. Used as the compensating action when the
    /// candidate batch insert fails.
    async fn delete_election(&self, election_id: &str) -> Result<(), StoreError>;

    /// Inserts a batch of candidate rows for one election.
    async fn insert_candidates(
        &self,
        election_id: &str,
        batch: Vec<NewCandidate>,
    ) -> Result<Vec<Candidate>, StoreError>;

    /// Fetches one election row.
    async fn get_election(&self, election_id: &str) -> Result<Election, StoreError>;

    /// Lists the candidates of one election.
    async fn list_candidates(&self, election_id: &str) -> Result<Vec<Candidate>, StoreError>;

    /// Inserts a vote row, failing with [`StoreError::Constraint`] when the
    /// `(election, voter email)` pair already exists.
    async fn insert_vote(&self, new: NewVote) -> Result<VoteRecord, StoreError>;

    /// Fetches one vote row.
    async fn get_vote(&self, vote_id: &str) -> Result<VoteRecord, StoreError>;

    /// Lists every vote cast in one election.
    async fn list_votes(&self, election_id: &str) -> Result<Vec<VoteRecord>, StoreError>;

    /// Looks up a prior vote for the `(election, voter email)` pair.
    async fn find_vote_by_voter(
        &self,
        election_id: &str,
        voter_email: &str,
    ) -> Result<Option<VoteRecord>, StoreError>;

    /// Attaches ledger anchor metadata to a stored vote.
    async fn update_vote_anchor(
        &self,
        vote_id: &str,
        tx_ref: &str,
        block_height: u64,
        confirmed: bool,
    ) -> Result<(), StoreError>;

    /// Writes an integrity re-check result back onto a stored vote.
    async fn update_vote_integrity(
        &self,
        vote_id: &str,
        verified: bool,
        anomalies: &[String],
    ) -> Result<(), StoreError>;

    /// Upserts the latest computed validation aggregate for an election.
    async fn record_validation_status(
        &self,
        status: &ElectionValidationStatus,
    ) -> Result<(), StoreError>;
}

#[derive(Default)]
struct Inner {
    elections: HashMap<String, Election>,
    candidates: HashMap<String, Vec<Candidate>>,
    votes: HashMap<String, VoteRecord>,
    statuses: HashMap<String, ElectionValidationStatus>,
}

/// In-process [`VoteStore`] backed by tokio-guarded maps.
///
/// Enforces the `(election, voter email)` uniqueness constraint and keeps
/// the running vote count on the election row, matching what the engine
/// expects from a relational backend.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces a stored vote row wholesale, bypassing every constraint.
    ///
    /// Raw row access for fixtures and tamper drills; the engine itself
    /// never calls this.
    pub async fn overwrite_vote(&self, record: VoteRecord) {
        self.inner
            .write()
            .await
            .votes
            .insert(record.id.clone(), record);
    }
}

#[async_trait]
impl VoteStore for MemoryStore {
    async fn insert_election(&self, new: NewElection) -> Result<Election, StoreError> {
        let election = Election {
            id: Uuid::new_v4().to_string(),
            title: new.title,
            description: new.description,
            start_date: new.start_date,
            end_date: new.end_date,
            policy: new.policy,
            require_registration: new.require_registration,
            vote_count: 0,
            created_at: Utc::now(),
        };
        self.inner
            .write()
            .await
            .elections
            .insert(election.id.clone(), election.clone());
        Ok(election)
    }

    async fn delete_election(&self, election_id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner
            .elections
            .remove(election_id)
            .ok_or(StoreError::NotFound)?;
        inner.candidates.remove(election_id);
        Ok(())
    }

    async fn insert_candidates(
        &self,
        election_id: &str,
        batch: Vec<NewCandidate>,
    ) -> Result<Vec<Candidate>, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.elections.contains_key(election_id) {
            return Err(StoreError::NotFound);
        }
        let rows: Vec<Candidate> = batch
            .into_iter()
            .map(|c| Candidate {
                id: Uuid::new_v4().to_string(),
                election_id: election_id.to_string(),
                name: c.name,
                description: c.description,
            })
            .collect();
        inner
            .candidates
            .entry(election_id.to_string())
            .or_default()
            .extend(rows.clone());
        Ok(rows)
    }

    async fn get_election(&self, election_id: &str) -> Result<Election, StoreError> {
        self.inner
            .read()
            .await
            .elections
            .get(election_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_candidates(&self, election_id: &str) -> Result<Vec<Candidate>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .candidates
            .get(election_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_vote(&self, new: NewVote) -> Result<VoteRecord, StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(email) = &new.voter_email {
            let duplicate = inner.votes.values().any(|v| {
                v.election_id == new.election_id && v.voter_email.as_deref() == Some(email.as_str())
            });
            if duplicate {
                return Err(StoreError::Constraint(format!(
                    "vote already exists for {email} in election {}",
                    new.election_id
                )));
            }
        }
        let record = VoteRecord {
            id: Uuid::new_v4().to_string(),
            election_id: new.election_id.clone(),
            candidate_ids: new.candidate_ids,
            voter_email: new.voter_email,
            vote_hash: new.vote_hash,
            voter_hash: new.voter_hash,
            anchor_tx: None,
            anchor_confirmed: false,
            anchor_block: None,
            integrity_verified: None,
            last_integrity_check: None,
            recorded_anomalies: None,
            created_at: new.created_at,
        };
        if let Some(election) = inner.elections.get_mut(&new.election_id) {
            election.vote_count += 1;
        }
        inner.votes.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn get_vote(&self, vote_id: &str) -> Result<VoteRecord, StoreError> {
        self.inner
            .read()
            .await
            .votes
            .get(vote_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_votes(&self, election_id: &str) -> Result<Vec<VoteRecord>, StoreError> {
        let inner = self.inner.read().await;
        let mut votes: Vec<VoteRecord> = inner
            .votes
            .values()
            .filter(|v| v.election_id == election_id)
            .cloned()
            .collect();
        votes.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(votes)
    }

    async fn find_vote_by_voter(
        &self,
        election_id: &str,
        voter_email: &str,
    ) -> Result<Option<VoteRecord>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .votes
            .values()
            .find(|v| {
                v.election_id == election_id && v.voter_email.as_deref() == Some(voter_email)
            })
            .cloned())
    }

    async fn update_vote_anchor(
        &self,
        vote_id: &str,
        tx_ref: &str,
        block_height: u64,
        confirmed: bool,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let vote = inner.votes.get_mut(vote_id).ok_or(StoreError::NotFound)?;
        vote.anchor_tx = Some(tx_ref.to_string());
        vote.anchor_block = Some(block_height);
        vote.anchor_confirmed = confirmed;
        Ok(())
    }

    async fn update_vote_integrity(
        &self,
        vote_id: &str,
        verified: bool,
        anomalies: &[String],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let vote = inner.votes.get_mut(vote_id).ok_or(StoreError::NotFound)?;
        vote.integrity_verified = Some(verified);
        vote.last_integrity_check = Some(Utc::now());
        vote.recorded_anomalies = if anomalies.is_empty() {
            None
        } else {
            Some(anomalies.to_vec())
        };
        Ok(())
    }

    async fn record_validation_status(
        &self,
        status: &ElectionValidationStatus,
    ) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .statuses
            .insert(status.election_id.clone(), status.clone());
        Ok(())
    }
}
