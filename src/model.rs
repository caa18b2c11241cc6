//! Core record types shared across the validation engine.
//!
//! These mirror the rows held by the backing store plus the ephemeral
//! results computed on demand (integrity checks, per-election validation
//! status). Election status is never stored; it is derived from the
//! voting window so it cannot drift from wall-clock time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How many candidates a single ballot may select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElectionPolicy {
    /// Exactly one candidate per ballot.
    SingleSelect,
    /// Any subset of the candidate list.
    MultiSelect,
}

/// Lifecycle phase of an election, derived from its voting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionStatus {
    /// Voting has not opened yet.
    Draft,
    /// The window is open.
    Active,
    /// The window has closed.
    Ended,
}

impl ElectionStatus {
    /// Derives the status purely from `(now, start, end)`.
    pub fn derive(now: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if now < start {
            Self::Draft
        } else if now > end {
            Self::Ended
        } else {
            Self::Active
        }
    }
}

/// A stored election row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Election {
    /// Opaque election identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Longer description shown to voters.
    pub description: String,
    /// Start of the voting window.
    pub start_date: DateTime<Utc>,
    /// End of the voting window.
    pub end_date: DateTime<Utc>,
    /// Selection policy for ballots in this election.
    pub policy: ElectionPolicy,
    /// Whether a voter email must accompany every ballot.
    pub require_registration: bool,
    /// Running count of accepted votes.
    pub vote_count: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Election {
    /// Returns the election status as of `now`.
    pub fn status_at(&self, now: DateTime<Utc>) -> ElectionStatus {
        ElectionStatus::derive(now, self.start_date, self.end_date)
    }
}

/// A stored candidate row. Immutable after the creation batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Opaque candidate identifier.
    pub id: String,
    /// Election this candidate belongs to.
    pub election_id: String,
    /// Candidate display name.
    pub name: String,
    /// Optional blurb.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Anchor lifecycle classification of a stored vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorState {
    /// The ledger has confirmed the vote hash.
    Confirmed,
    /// A ledger transaction exists but confirmation is outstanding.
    Pending,
    /// No anchor transaction was ever recorded.
    Unanchored,
}

/// A stored vote row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRecord {
    /// Opaque vote identifier.
    pub id: String,
    /// Election the ballot was cast in.
    pub election_id: String,
    /// Selected candidate ids, as submitted.
    pub candidate_ids: Vec<String>,
    /// Voter email when supplied. Anonymous ballots carry `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voter_email: Option<String>,
    /// Content fingerprint computed at submission time.
    pub vote_hash: String,
    /// Salted voter digest, present only when an email was supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voter_hash: Option<String>,
    /// Ledger transaction reference, if anchoring was attempted and accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_tx: Option<String>,
    /// Whether the ledger confirmed the anchor.
    pub anchor_confirmed: bool,
    /// Block height of the anchor transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_block: Option<u64>,
    /// Result of the most recent integrity re-check written back by a caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity_verified: Option<bool>,
    /// Timestamp of the most recent integrity re-check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_integrity_check: Option<DateTime<Utc>>,
    /// Anomalies recorded by the most recent integrity re-check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_anomalies: Option<Vec<String>>,
    /// Submission timestamp. An input to the content fingerprint.
    pub created_at: DateTime<Utc>,
}

impl VoteRecord {
    /// Classifies the vote by its anchor flags.
    pub fn anchor_state(&self) -> AnchorState {
        if self.anchor_confirmed {
            AnchorState::Confirmed
        } else if self.anchor_tx.is_some() {
            AnchorState::Pending
        } else {
            AnchorState::Unanchored
        }
    }
}

/// Outcome of re-deriving a single vote's fingerprint and anchor status.
///
/// Anomalies are data, not errors: a mismatch is reported here and left to
/// the caller to act on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteIntegrityCheck {
    /// Vote under inspection.
    pub vote_id: String,
    /// Fingerprint stored at submission time.
    pub original_hash: String,
    /// Fingerprint recomputed from the stored fields.
    pub current_hash: String,
    /// True when original and recomputed fingerprints agree.
    pub is_intact: bool,
    /// True when the ledger still recognises the anchored hash.
    pub ledger_confirmed: bool,
    /// Human-readable anomaly descriptions, empty when clean.
    pub anomalies: Vec<String>,
    /// When this check ran.
    pub checked_at: DateTime<Utc>,
}

/// Per-election integrity aggregate, computed on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionValidationStatus {
    /// Election the aggregate describes.
    pub election_id: String,
    /// Total votes on record.
    pub total_votes: u64,
    /// Votes whose anchor the ledger confirmed.
    pub validated_votes: u64,
    /// Votes with an anchor transaction awaiting confirmation.
    pub pending_validation: u64,
    /// Votes that are neither anchored nor confirmed.
    pub invalid_votes: u64,
    /// Whether the ledger's vote count matched the confirmed count.
    pub ledger_synced: bool,
    /// Confirmed votes as a percentage of the total; 100 for empty elections.
    pub integrity_score: u8,
    /// When this aggregate was computed.
    pub last_sync_time: DateTime<Utc>,
}

impl ElectionValidationStatus {
    /// Classifies `votes` into the validated/pending/invalid partition and
    /// computes the integrity score.
    ///
    /// The three buckets always sum to `total_votes`.
    pub fn from_votes(
        election_id: &str,
        votes: &[VoteRecord],
        ledger_synced: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let total = votes.len() as u64;
        let validated = votes
            .iter()
            .filter(|v| v.anchor_state() == AnchorState::Confirmed)
            .count() as u64;
        let pending = votes
            .iter()
            .filter(|v| v.anchor_state() == AnchorState::Pending)
            .count() as u64;
        let invalid = total - validated - pending;
        Self {
            election_id: election_id.to_string(),
            total_votes: total,
            validated_votes: validated,
            pending_validation: pending,
            invalid_votes: invalid,
            ledger_synced,
            integrity_score: integrity_score(validated, total),
            last_sync_time: now,
        }
    }
}

/// Percentage of `total` made up by `validated`, rounded to the nearest
/// integer and clamped to 100. An election with no votes scores 100.
pub fn integrity_score(validated: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let scaled = ((validated as f64 / total as f64) * 100.0).min(100.0);
    scaled.round() as u8
}
