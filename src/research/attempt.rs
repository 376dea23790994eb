//! Research attempts, best-result selection, and outcomes.

use std::borrow::Borrow;

use serde::{Deserialize, Serialize};

use crate::research::{Analysis, ResearchCorpus};

/// Trace entry for one enrichment pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResearchAttempt {
    pub attempt_number: u32,
    /// Labels of every source in the corpus after this pass.
    pub sources_used: Vec<String>,
    pub quality_achieved: u8,
    pub missing_data: Vec<String>,
    /// False when the primary site was unavailable and the pass was forced
    /// to quality 1 without analysis.
    pub primary_ok: bool,
}

/// The payload retained from the highest-quality attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BestResult {
    pub attempt: u32,
    pub quality: u8,
    /// Accumulated corpus as it stood after `attempt`.
    pub corpus: ResearchCorpus,
    pub analysis: Analysis,
}

/// Pick the highest-quality result. Ties keep the earliest attempt.
/// Accepts owned results or references.
pub fn select_best<R: Borrow<BestResult>>(results: impl IntoIterator<Item = R>) -> Option<R> {
    results.into_iter().fold(None, |best: Option<R>, candidate| match best {
        Some(current) if current.borrow().quality >= candidate.borrow().quality => Some(current),
        _ => Some(candidate),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchStatus {
    /// Target quality reached.
    Success,
    /// Budget spent; best quality is below target but above zero.
    MaxAttemptsReached,
    /// No attempt ever had primary site content.
    Failed,
}

impl ResearchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResearchStatus::Success => "success",
            ResearchStatus::MaxAttemptsReached => "max_attempts_reached",
            ResearchStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResearchOutcome {
    pub status: ResearchStatus,
    pub best: Option<BestResult>,
    pub attempts: Vec<ResearchAttempt>,
}

impl ResearchOutcome {
    /// Best quality achieved, 0 if research failed.
    pub fn quality(&self) -> u8 {
        self.best.as_ref().map(|b| b.quality).unwrap_or(0)
    }

    /// Derive the terminal status from the selected best result.
    pub fn conclude(
        best: Option<BestResult>,
        attempts: Vec<ResearchAttempt>,
        target_quality: u8,
    ) -> Self {
        let status = match &best {
            Some(b) if b.quality >= target_quality => ResearchStatus::Success,
            Some(_) => ResearchStatus::MaxAttemptsReached,
            None => ResearchStatus::Failed,
        };
        Self {
            status,
            best,
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(attempt: u32, quality: u8) -> BestResult {
        BestResult {
            attempt,
            quality,
            corpus: ResearchCorpus::default(),
            analysis: Analysis::with_quality(quality),
        }
    }

    #[test]
    fn test_select_best_keeps_highest() {
        let best = select_best(vec![result(1, 5), result(2, 8), result(3, 7)]).unwrap();
        assert_eq!(best.attempt, 2);
        assert_eq!(best.quality, 8);
    }

    #[test]
    fn test_select_best_tie_keeps_earliest() {
        let best = select_best(vec![result(1, 6), result(2, 6)]).unwrap();
        assert_eq!(best.attempt, 1);
    }

    #[test]
    fn test_select_best_empty() {
        assert!(select_best(Vec::<BestResult>::new()).is_none());
    }

    #[test]
    fn test_conclude_statuses() {
        let success = ResearchOutcome::conclude(Some(result(1, 9)), vec![], 9);
        assert_eq!(success.status, ResearchStatus::Success);

        let partial = ResearchOutcome::conclude(Some(result(2, 8)), vec![], 9);
        assert_eq!(partial.status, ResearchStatus::MaxAttemptsReached);
        assert_eq!(partial.quality(), 8);

        let failed = ResearchOutcome::conclude(None, vec![], 9);
        assert_eq!(failed.status, ResearchStatus::Failed);
        assert_eq!(failed.quality(), 0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // Property: the selected quality never decreases as attempts are appended
            #[test]
            fn prop_best_quality_monotonic(qualities in prop::collection::vec(1u8..=10, 1..8)) {
                let results: Vec<BestResult> = qualities
                    .iter()
                    .enumerate()
                    .map(|(i, q)| result(i as u32 + 1, *q))
                    .collect();

                let mut previous = 0;
                for n in 1..=results.len() {
                    let best = select_best(results[..n].to_vec()).unwrap();
                    prop_assert!(best.quality >= previous);
                    previous = best.quality;
                }
            }

            // Property: the selected result is the first attempt with the max quality
            #[test]
            fn prop_best_is_first_max(qualities in prop::collection::vec(1u8..=10, 1..8)) {
                let results: Vec<BestResult> = qualities
                    .iter()
                    .enumerate()
                    .map(|(i, q)| result(i as u32 + 1, *q))
                    .collect();
                let max = *qualities.iter().max().unwrap();
                let first = qualities.iter().position(|q| *q == max).unwrap() as u32 + 1;

                let best = select_best(results).unwrap();
                prop_assert_eq!(best.quality, max);
                prop_assert_eq!(best.attempt, first);
            }
        }
    }
}
