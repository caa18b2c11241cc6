//! Election lifecycle helpers: creation with its compensating rollback, and
//! per-candidate tallying.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use thiserror::Error;
use tracing::error;

use crate::model::{Candidate, Election, ElectionPolicy};
use crate::store::{NewCandidate, NewElection, StoreError, VoteStore};

/// Default voting window length when no end date is supplied.
const DEFAULT_WINDOW_DAYS: i64 = 7;

/// Failures of election creation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CreateElectionError {
    /// Title or description was missing or blank.
    #[error("title and description are required")]
    MissingFields,
    /// Fewer than two usable candidates were supplied.
    #[error("at least 2 candidates are required")]
    NotEnoughCandidates,
    /// The row store failed; no partial election survives.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Inputs for creating an election.
#[derive(Debug, Clone)]
pub struct ElectionDraft {
    /// Display title. Must be non-blank.
    pub title: String,
    /// Longer description. Must be non-blank.
    pub description: String,
    /// Start of the voting window; defaults to now.
    pub start_date: Option<chrono::DateTime<Utc>>,
    /// End of the voting window; defaults to start plus seven days.
    pub end_date: Option<chrono::DateTime<Utc>>,
    /// Ballot selection policy.
    pub policy: ElectionPolicy,
    /// Whether every ballot must carry a voter email.
    pub require_registration: bool,
    /// Proposed candidates; blank names are dropped before counting.
    pub candidates: Vec<CandidateDraft>,
}

/// One proposed candidate.
#[derive(Debug, Clone)]
pub struct CandidateDraft {
    /// Candidate display name.
    pub name: String,
    /// Optional blurb.
    pub description: Option<String>,
}

/// Validates a draft and persists the election with its candidate batch.
///
/// The election row is inserted first; if the candidate batch then fails,
/// the election row is deleted again so no candidate-less election is left
/// behind.
pub async fn create_election(
    store: &dyn VoteStore,
    draft: ElectionDraft,
) -> Result<(Election, Vec<Candidate>), CreateElectionError> {
    if draft.title.trim().is_empty() || draft.description.trim().is_empty() {
        return Err(CreateElectionError::MissingFields);
    }
    let usable: Vec<NewCandidate> = draft
        .candidates
        .into_iter()
        .filter(|c| !c.name.trim().is_empty())
        .map(|c| NewCandidate {
            name: c.name,
            description: c.description,
        })
        .collect();
    if usable.len() < 2 {
        return Err(CreateElectionError::NotEnoughCandidates);
    }

    let start_date = draft.start_date.unwrap_or_else(Utc::now);
    let end_date = draft
        .end_date
        .unwrap_or_else(|| start_date + Duration::days(DEFAULT_WINDOW_DAYS));

    let election = store
        .insert_election(NewElection {
            title: draft.title,
            description: draft.description,
            start_date,
            end_date,
            policy: draft.policy,
            require_registration: draft.require_registration,
        })
        .await?;

    match store.insert_candidates(&election.id, usable).await {
        Ok(candidates) => Ok((election, candidates)),
        Err(err) => {
            if let Err(cleanup) = store.delete_election(&election.id).await {
                error!(
                    "failed to roll back election {} after candidate insert failure: {cleanup}",
                    election.id
                );
            }
            Err(err.into())
        }
    }
}

/// Per-candidate vote counts for one election.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Tally {
    /// Election the tally covers.
    pub election_id: String,
    /// Total ballots on record.
    pub total_votes: u64,
    /// Selections received per candidate id, zero-filled for candidates
    /// nobody picked.
    pub counts: HashMap<String, u64>,
}

/// Counts selections per candidate across every ballot in an election.
///
/// Multi-select ballots contribute one count per selected candidate, so the
/// per-candidate counts may sum to more than `total_votes`.
pub async fn tally_votes(store: &dyn VoteStore, election_id: &str) -> Result<Tally, StoreError> {
    let candidates = store.list_candidates(election_id).await?;
    let votes = store.list_votes(election_id).await?;

    let mut counts: HashMap<String, u64> =
        candidates.iter().map(|c| (c.id.clone(), 0)).collect();
    for vote in &votes {
        for candidate_id in &vote.candidate_ids {
            if let Some(count) = counts.get_mut(candidate_id) {
                *count += 1;
            }
        }
    }
    Ok(Tally {
        election_id: election_id.to_string(),
        total_votes: votes.len() as u64,
        counts,
    })
}
