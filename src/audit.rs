//! Election audit reports.
//!
//! Purely derived from a validation status and the per-vote integrity
//! checks; nothing here persists or mutates anything.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{ElectionValidationStatus, VoteIntegrityCheck};

/// Integrity score below which an investigation is recommended.
pub const LOW_SCORE_THRESHOLD: u8 = 90;

/// Full audit output for one election.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    /// Election the report covers.
    pub election_id: String,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Aggregate validation status at generation time.
    pub summary: ElectionValidationStatus,
    /// Integrity check for every vote in the election.
    pub vote_checks: Vec<VoteIntegrityCheck>,
    /// Accumulated follow-up recommendations.
    pub recommendations: Vec<String>,
}

/// Evaluates the recommendation rule table.
///
/// Every rule is checked and every match is accumulated; the rules are not
/// mutually exclusive.
pub fn recommendations(
    summary: &ElectionValidationStatus,
    checks: &[VoteIntegrityCheck],
) -> Vec<String> {
    let mut out = Vec::new();
    if summary.integrity_score < LOW_SCORE_THRESHOLD {
        out.push("Low integrity score detected - investigate vote anomalies".to_string());
    }
    if !summary.ledger_synced {
        out.push("Ledger sync required - some votes not validated on-chain".to_string());
    }
    if summary.invalid_votes > 0 {
        out.push("Invalid votes detected - manual review recommended".to_string());
    }
    let anomaly_count = checks.iter().filter(|c| !c.anomalies.is_empty()).count();
    if anomaly_count > 0 {
        out.push(format!(
            "{anomaly_count} votes have integrity issues - detailed investigation needed"
        ));
    }
    out
}

/// Assembles a report from already-computed pieces.
pub fn build_report(
    election_id: &str,
    summary: ElectionValidationStatus,
    vote_checks: Vec<VoteIntegrityCheck>,
) -> AuditReport {
    let recommendations = recommendations(&summary, &vote_checks);
    AuditReport {
        election_id: election_id.to_string(),
        generated_at: Utc::now(),
        summary,
        vote_checks,
        recommendations,
    }
}
