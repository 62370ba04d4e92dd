//! Pairwise validation and ranking of matches.
//!
//! Every match is checked against the incoming record by the
//! [`MatchValidator`]. Results are ordered by:
//! 1. `Merge` verdicts before anything else
//! 2. descending match probability
//! 3. ascending original position (`match_sequence`)
//!
//! The last key makes the order total, so equal candidates always rank the
//! way the matchers returned them.

use crate::error::Result;
use crate::record::Record;
use crate::services::{MatchAction, MatchCandidate, MatchValidator, Preference};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A match together with its validation verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedMatch {
    /// The candidate as returned by the matcher
    pub candidate: MatchCandidate,
    /// Validator verdict
    pub action: MatchAction,
    /// Merge base preference
    pub preference: Preference,
    /// Validator explanation
    pub message: String,
    /// Position of the candidate in the matcher output (0-based)
    pub match_sequence: usize,
    /// Match probability (copied from the candidate)
    pub probability: f64,
}

impl ValidatedMatch {
    /// Database id of the matched record.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.candidate.id
    }

    /// Whether the validator allows merging.
    #[must_use]
    pub fn is_mergeable(&self) -> bool {
        self.action == MatchAction::Merge
    }
}

/// Ranked validation results.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    /// All results, best first
    pub ranked: Vec<ValidatedMatch>,
    /// Number of results allowing a merge (they lead `ranked`)
    pub valid_count: usize,
}

impl Ranking {
    /// Best mergeable match, if any.
    #[must_use]
    pub fn best(&self) -> Option<&ValidatedMatch> {
        self.ranked.first().filter(|m| m.is_mergeable())
    }

    /// Mergeable results, best first.
    #[must_use]
    pub fn valid(&self) -> &[ValidatedMatch] {
        &self.ranked[..self.valid_count]
    }

    /// Results that must not be merged.
    #[must_use]
    pub fn invalid(&self) -> &[ValidatedMatch] {
        &self.ranked[self.valid_count..]
    }
}

/// Ordering used by [`rank_matches`].
#[must_use]
pub fn compare_ranked(a: &ValidatedMatch, b: &ValidatedMatch) -> Ordering {
    b.is_mergeable()
        .cmp(&a.is_mergeable())
        .then_with(|| b.probability.total_cmp(&a.probability))
        .then_with(|| a.match_sequence.cmp(&b.match_sequence))
}

/// Validate every match against `incoming` and rank the results.
///
/// # Errors
///
/// Propagates validator failures as [`ValidationError::Upstream`](crate::error::ValidationError::Upstream).
pub fn rank_matches(
    validator: &dyn MatchValidator,
    incoming: &Record,
    matches: Vec<MatchCandidate>,
) -> Result<Ranking> {
    let mut ranked = matches
        .into_iter()
        .enumerate()
        .map(|(match_sequence, candidate)| {
            let validation = validator.validate(incoming, &candidate.record)?;
            tracing::debug!(
                id = %candidate.id,
                action = ?validation.action,
                probability = candidate.probability,
                "match validated"
            );
            Ok(ValidatedMatch {
                action: validation.action,
                preference: validation.preference,
                message: validation.message,
                match_sequence,
                probability: candidate.probability,
                candidate,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    ranked.sort_by(compare_ranked);
    let valid_count = ranked.iter().take_while(|m| m.is_mergeable()).count();

    Ok(Ranking {
        ranked,
        valid_count,
    })
}
