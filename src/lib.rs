#![deny(missing_docs)]

//! # ballot_anchor
//!
//! **Ballot-Anchor** is a vote integrity validation engine. It accepts
//! ballots, enforces election admission rules, fingerprints every accepted
//! vote with a deterministic salted SHA-256 hash, and anchors those
//! fingerprints on an external ledger so tampering with stored votes can be
//! detected after the fact.
//!
//! The engine follows two asymmetric failure rules. Validation is
//! fail-closed: a ballot violating any admission rule is rejected before a
//! single row is written. Anchoring is fail-open: once a vote is persisted,
//! no ledger outage can reject or lose it; the vote is simply left
//! unanchored and shows up as such in later integrity reports.
//!
//! ## Features
//!
//! * **Deterministic fingerprints**: the [`hashing`] module canonicalises a
//!   ballot (sorted candidate ids, millisecond timestamps) before hashing,
//!   so the same vote always produces the same hash and a changed vote
//!   never does.
//! * **Admission rules**: the [`policy`] module holds the pure rule checks
//!   for voting windows, registration, duplicate voters, and candidate
//!   selection, accumulating every violation rather than stopping at the
//!   first.
//! * **Pluggable persistence**: the [`store`] module defines the
//!   [`VoteStore`] contract and ships [`MemoryStore`] for tests and
//!   single-process use.
//! * **Ledger anchoring**: the [`ledger`] module speaks JSON-RPC to an
//!   anchor gateway through [`LedgerClient`], treating an unreachable
//!   ledger as "unknown" rather than "invalid".
//! * **Orchestration and audit**: [`IntegrityService`] ties the pieces
//!   together (submission, verification, batch checks, ledger sync), and
//!   the [`audit`] module turns the results into reports with follow-up
//!   recommendations.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ballot_anchor::{
//!     EngineConfig, HttpLedgerClient, IntegrityService, LedgerConfig, MemoryStore,
//! };
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let ledger = Arc::new(HttpLedgerClient::new(LedgerConfig::from_env()));
//! let engine = IntegrityService::new(store, ledger, EngineConfig::from_env());
//!
//! let submitted = engine
//!     .submit_vote("election-1", vec!["candidate-9".into()], None)
//!     .await?;
//! let check = engine.verify_vote_integrity(&submitted.vote_id).await?;
//! assert!(check.is_intact);
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod config;
pub mod elections;
pub mod hashing;
pub mod ledger;
pub mod model;
pub mod policy;
pub mod service;
pub mod store;

pub use audit::{build_report, AuditReport, LOW_SCORE_THRESHOLD};
pub use config::{EngineConfig, LedgerConfig};
pub use elections::{
    create_election, tally_votes, CandidateDraft, CreateElectionError, ElectionDraft, Tally,
};
pub use hashing::{canonical_timestamp, vote_hash, voter_hash};
pub use ledger::{
    AnchorReceipt, HashStatus, HttpLedgerClient, LedgerClient, LedgerError, NetworkStatus,
    ZERO_HASH,
};
pub use model::{
    integrity_score, AnchorState, Candidate, Election, ElectionPolicy, ElectionStatus,
    ElectionValidationStatus, VoteIntegrityCheck, VoteRecord,
};
pub use policy::RuleViolation;
pub use service::{
    AnchorOutcome, IntegrityService, LedgerSyncOutcome, SubmitError, SubmittedVote, VerifyError,
};
pub use store::{MemoryStore, NewCandidate, NewElection, NewVote, StoreError, VoteStore};
