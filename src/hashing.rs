//! Deterministic fingerprints for votes and voters.
//!
//! A vote fingerprint commits to the election, the selected candidates, the
//! submission timestamp, the (optional) voter email, and a fixed salt.
//! Candidate ids are sorted before hashing so that selecting `{A, B}` and
//! `{B, A}` produce the same fingerprint; without that, duplicate and tamper
//! detection would depend on selection order.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Canonical form fed to the digest. Field order is fixed by the struct.
#[derive(Serialize)]
struct CanonicalVote<'a> {
    election_id: &'a str,
    candidate_ids: Vec<&'a str>,
    voter_email: Option<&'a str>,
    timestamp: String,
    salt: &'a str,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Renders a timestamp in the canonical RFC 3339 millisecond form used
/// inside fingerprints.
pub fn canonical_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Computes the content fingerprint of a vote.
///
/// Pure and deterministic: identical inputs always produce the same hex
/// digest, and the order of `candidate_ids` is irrelevant.
pub fn vote_hash(
    election_id: &str,
    candidate_ids: &[String],
    voter_email: Option<&str>,
    timestamp: DateTime<Utc>,
    salt: &str,
) -> String {
    let mut sorted: Vec<&str> = candidate_ids.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let canonical = CanonicalVote {
        election_id,
        candidate_ids: sorted,
        voter_email,
        timestamp: canonical_timestamp(timestamp),
        salt,
    };
    // Struct serialization has a fixed key order, so the JSON is canonical.
    let payload = serde_json::to_string(&canonical).expect("canonical form serializes");
    sha256_hex(payload.as_bytes())
}

/// Computes the salted one-way digest identifying a voter within one
/// election, used to detect duplicate registered voters without shipping
/// plaintext email to the anchor layer.
pub fn voter_hash(email: &str, election_id: &str, salt: &str) -> String {
    sha256_hex(format!("{email}:{election_id}:{salt}").as_bytes())
}
