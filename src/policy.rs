//! Ballot admission rules.
//!
//! Every check is a pure function returning the list of violated rules, an
//! empty list meaning the ballot passes. The orchestrator runs all checks
//! and rejects on any violation before a single row is written.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Candidate, Election, ElectionPolicy};

/// A rule a submitted ballot violated.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "rule")]
pub enum RuleViolation {
    /// The voting window has not opened.
    #[error("Election has not started yet")]
    NotStarted,
    /// The voting window has closed.
    #[error("Election has ended")]
    Ended,
    /// The election requires registration but no email was supplied.
    #[error("Email is required for this election")]
    EmailRequired,
    /// A prior vote exists for this (election, email) pair.
    #[error("You have already voted in this election")]
    AlreadyVoted,
    /// No candidate was selected at all.
    #[error("Please select at least one candidate")]
    EmptySelection,
    /// A selected id is not a candidate of this election.
    #[error("Invalid candidate selection")]
    InvalidCandidate {
        /// The offending candidate id.
        id: String,
    },
    /// More candidates were selected than the election policy allows.
    #[error("This election only allows voting for one candidate")]
    PolicyViolation,
}

/// Checks that `now` falls inside the voting window.
pub fn check_window(
    now: DateTime<Utc>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<RuleViolation> {
    let mut violations = Vec::new();
    if now < start {
        violations.push(RuleViolation::NotStarted);
    }
    if now > end {
        violations.push(RuleViolation::Ended);
    }
    violations
}

/// Checks the registration requirement against email presence.
pub fn check_registration(require_registration: bool, email_provided: bool) -> Vec<RuleViolation> {
    if require_registration && !email_provided {
        vec![RuleViolation::EmailRequired]
    } else {
        Vec::new()
    }
}

/// Flags a duplicate when a prior vote already exists for the voter.
///
/// Only meaningful when an email accompanied the ballot; anonymous ballots
/// skip this check entirely, so they carry no duplicate protection. That is
/// a recorded policy choice, not an oversight: the only guard for anonymous
/// elections is turning `require_registration` on.
pub fn check_duplicate_voter(existing_vote_for_email: bool) -> Vec<RuleViolation> {
    if existing_vote_for_email {
        vec![RuleViolation::AlreadyVoted]
    } else {
        Vec::new()
    }
}

/// Checks the selected ids against the candidate list and the selection
/// policy.
pub fn check_candidate_selection(
    selected: &[String],
    candidates: &[Candidate],
    policy: ElectionPolicy,
) -> Vec<RuleViolation> {
    let mut violations = Vec::new();
    if selected.is_empty() {
        violations.push(RuleViolation::EmptySelection);
        return violations;
    }
    let valid: HashSet<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
    for id in selected {
        if !valid.contains(id.as_str()) {
            violations.push(RuleViolation::InvalidCandidate { id: id.clone() });
        }
    }
    if policy == ElectionPolicy::SingleSelect && selected.len() > 1 {
        violations.push(RuleViolation::PolicyViolation);
    }
    violations
}

/// Runs every admission rule for one ballot and accumulates the violations.
///
/// `has_existing_vote` is the result of the caller's duplicate lookup and is
/// only consulted when an email is present.
pub fn evaluate(
    election: &Election,
    candidates: &[Candidate],
    selected: &[String],
    voter_email: Option<&str>,
    has_existing_vote: bool,
    now: DateTime<Utc>,
) -> Vec<RuleViolation> {
    let mut violations = check_window(now, election.start_date, election.end_date);
    violations.extend(check_registration(
        election.require_registration,
        voter_email.is_some(),
    ));
    if voter_email.is_some() {
        violations.extend(check_duplicate_voter(has_existing_vote));
    }
    violations.extend(check_candidate_selection(
        selected,
        candidates,
        election.policy,
    ));
    violations
}
