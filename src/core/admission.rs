//! Admission control for freshly sourced candidates.
//!
//! Rejects candidates whose website is already known, either from stored
//! leads or from an earlier candidate in the same batch. Synchronous and
//! deterministic; admitting an already-admitted batch changes nothing.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::core::lead::Candidate;

/// Normalize a website for identity comparison.
///
/// Drops the scheme, a leading `www.`, trailing slashes, and case, so
/// `HTTPS://www.Acme.io/` and `acme.io` compare equal.
pub fn normalize_website(url: &str) -> String {
    let trimmed = url.trim().to_lowercase();
    let without_scheme = trimmed
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(&trimmed);
    let without_www = without_scheme
        .strip_prefix("www.")
        .unwrap_or(without_scheme);
    without_www.trim_end_matches('/').to_string()
}

/// Why a candidate was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// A stored lead already has this website.
    KnownWebsite,
    /// An earlier candidate in the same batch has this website.
    DuplicateInBatch,
    /// The candidate has no usable website.
    MissingWebsite,
}

/// A candidate that was filtered out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedCandidate {
    pub candidate: Candidate,
    pub normalized_website: String,
    pub reason: RejectionReason,
}

/// Result of running the admission filter over one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdmissionReport {
    /// Candidates with previously unseen websites, in sourcing order.
    pub admitted: Vec<Candidate>,
    pub rejected: Vec<RejectedCandidate>,
}

impl AdmissionReport {
    /// True when sourcing returned candidates but every one was rejected.
    pub fn all_rejected(&self) -> bool {
        self.admitted.is_empty() && !self.rejected.is_empty()
    }
}

/// Filter candidates against a set of known normalized websites.
///
/// `known` must already be normalized (see [`normalize_website`]).
pub fn admit(candidates: Vec<Candidate>, known: &HashSet<String>) -> AdmissionReport {
    let mut seen: HashSet<String> = HashSet::new();
    let mut report = AdmissionReport::default();

    for candidate in candidates {
        let normalized = normalize_website(&candidate.url);
        let reason = if normalized.is_empty() {
            Some(RejectionReason::MissingWebsite)
        } else if known.contains(&normalized) {
            Some(RejectionReason::KnownWebsite)
        } else if seen.contains(&normalized) {
            Some(RejectionReason::DuplicateInBatch)
        } else {
            None
        };

        match reason {
            Some(reason) => report.rejected.push(RejectedCandidate {
                candidate,
                normalized_website: normalized,
                reason,
            }),
            None => {
                seen.insert(normalized);
                report.admitted.push(candidate);
            }
        }
    }

    report
}
