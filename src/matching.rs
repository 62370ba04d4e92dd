//! Matcher iteration: searching the database for duplicates of an incoming record.
//!
//! Matchers run one at a time, in priority order. Each run appends a
//! [`MatcherReport`]; with [`MatchOptions::stop_when_found`] the first matcher
//! that finds anything ends the search.
//!
//! A zero-match result is only trusted when every matcher that ran searched
//! its candidate space completely. Matchers that stopped because of too many
//! candidates, or that retrieved candidates they could not compare, make zero
//! a "false zero", which is reported as an error instead of letting a
//! duplicate through.
//!
//! The loop threads a [`MatchAccumulator`] by value; each step returns the
//! next accumulator, so the stop decision lives in one place.

use crate::error::{Result, ValidationError};
use crate::record::Record;
use crate::services::{
    CandidateMatcher, MatchCandidate, MatchStatus, MatcherError, MatcherKind, MatcherOutput,
    StopReason,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Options for [`iterate_matchers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOptions {
    /// Stop after the first matcher that finds at least one match
    #[serde(default = "default_true")]
    pub stop_when_found: bool,
    /// Trust a zero-match result even when a matcher hit its candidate limit
    #[serde(default)]
    pub accept_zero_with_max_candidates: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        MatchOptions {
            stop_when_found: true,
            accept_zero_with_max_candidates: false,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Summary of one matcher invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatcherReport {
    /// 1-based invocation order
    pub sequence: usize,
    /// Matcher name
    pub name: String,
    /// Number of matches found
    pub match_count: usize,
    /// Number of candidates retrieved
    pub candidate_count: usize,
    /// Number of candidates that could not be compared
    pub conversion_failure_count: usize,
    /// Search status
    pub match_status: MatchStatus,
    /// Ids of the matches found
    pub matched_ids: Vec<String>,
    /// `false` when the matcher could not build a query and did not run
    pub ran: bool,
}

/// Result of matcher iteration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    /// Matches, de-duplicated by candidate id (first occurrence wins)
    pub matches: Vec<MatchCandidate>,
    /// One report per matcher invocation
    pub matcher_reports: Vec<MatcherReport>,
}

impl MatchOutcome {
    /// Ids of all matches in order.
    #[must_use]
    pub fn matched_ids(&self) -> Vec<String> {
        self.matches.iter().map(|m| m.id.clone()).collect()
    }
}

/// State carried from one matcher to the next.
#[derive(Debug, Clone, Default)]
pub struct MatchAccumulator {
    matches: IndexMap<String, MatchCandidate>,
    reports: Vec<MatcherReport>,
    not_run: usize,
    too_many_candidates: usize,
    conversion_failures: usize,
    non_matchable_ids: Vec<String>,
}

impl MatchAccumulator {
    /// Fold a successful matcher run into the accumulator.
    #[must_use]
    pub fn with_output(mut self, name: String, output: MatcherOutput) -> Self {
        let matched_ids: Vec<String> = output.matches.iter().map(|m| m.id.clone()).collect();

        if output.matches.is_empty() {
            let stop_reason = output.match_status.stop_reason;
            if matches!(
                stop_reason,
                Some(StopReason::MaxCandidates | StopReason::MaxedQueries)
            ) {
                self.too_many_candidates += 1;
            }
            if !output.conversion_failures.is_empty()
                || stop_reason == Some(StopReason::ConversionFailures)
            {
                self.conversion_failures += 1;
            }
        }

        for failure in &output.conversion_failures {
            if !self.non_matchable_ids.contains(&failure.id) {
                self.non_matchable_ids.push(failure.id.clone());
            }
        }

        self.reports.push(MatcherReport {
            sequence: self.reports.len() + 1,
            name,
            match_count: output.matches.len(),
            candidate_count: output.candidate_count,
            conversion_failure_count: output.conversion_failures.len(),
            match_status: output.match_status,
            matched_ids,
            ran: true,
        });

        for candidate in output.matches {
            self.matches.entry(candidate.id.clone()).or_insert(candidate);
        }
        self
    }

    /// Record a matcher that could not build a query.
    #[must_use]
    pub fn with_not_run(mut self, name: String) -> Self {
        self.not_run += 1;
        self.reports.push(MatcherReport {
            sequence: self.reports.len() + 1,
            name,
            match_count: 0,
            candidate_count: 0,
            conversion_failure_count: 0,
            match_status: MatchStatus::default(),
            matched_ids: Vec::new(),
            ran: false,
        });
        self
    }

    /// Whether any match has been found so far.
    #[must_use]
    pub fn has_matches(&self) -> bool {
        !self.matches.is_empty()
    }

    fn into_outcome(self) -> MatchOutcome {
        MatchOutcome {
            matches: self.matches.into_values().collect(),
            matcher_reports: self.reports,
        }
    }

    /// Final decision after every matcher has had its turn.
    fn finish(self, options: MatchOptions) -> Result<MatchOutcome> {
        if self.has_matches() {
            return Ok(self.into_outcome());
        }

        if self.too_many_candidates > 0 && !options.accept_zero_with_max_candidates {
            return Err(ValidationError::conflict(format!(
                "Matching stopped early in {} matcher(s) due to too many candidates, zero matches is not reliable",
                self.too_many_candidates
            )));
        }

        if self.conversion_failures > 0 {
            return Err(ValidationError::Unprocessable {
                message: "Some candidates could not be converted for matching".to_string(),
                ids: self.non_matchable_ids,
            });
        }

        Ok(self.into_outcome())
    }
}

/// Run matchers in order and collect matches.
///
/// # Errors
///
/// - [`ValidationError::Internal`] when `matchers` is empty
/// - [`ValidationError::Unprocessable`] when the content matcher or the last
///   matcher cannot build a query, when no matcher could build a query, when
///   the lookup service answers with a diagnostic, or when the only obstacle
///   to a match was candidate conversion (carrying the candidate ids)
/// - [`ValidationError::Conflict`] when a matcher hit its candidate limit and
///   that is not accepted by `options`
/// - [`ValidationError::Upstream`] for any other matcher failure
pub async fn iterate_matchers(
    matchers: &[Arc<dyn CandidateMatcher>],
    record: &Record,
    options: MatchOptions,
) -> Result<MatchOutcome> {
    if matchers.is_empty() {
        return Err(ValidationError::Internal(
            "No matchers configured".to_string(),
        ));
    }

    let mut acc = MatchAccumulator::default();

    for (index, matcher) in matchers.iter().enumerate() {
        let name = matcher.name();
        let is_last = index + 1 == matchers.len();

        acc = match matcher.find_matches(record).await {
            Ok(output) => {
                tracing::debug!(
                    matcher = %name,
                    matches = output.matches.len(),
                    candidates = output.candidate_count,
                    conversion_failures = output.conversion_failures.len(),
                    "matcher finished"
                );
                acc.with_output(name, output)
            },
            Err(MatcherError::NoQueries(reason)) => {
                tracing::debug!(matcher = %name, %reason, "matcher generated no queries");
                let acc = acc.with_not_run(name.clone());
                if acc.not_run == matchers.len() {
                    return Err(ValidationError::unprocessable(
                        "Generated no queries for any matcher, matching not possible",
                    ));
                }
                if matcher.kind() == MatcherKind::Content || is_last {
                    return Err(ValidationError::unprocessable(format!(
                        "Generated no queries for matcher {name}, matching not possible"
                    )));
                }
                acc
            },
            Err(MatcherError::Diagnostic(message)) => {
                return Err(ValidationError::unprocessable(format!(
                    "Lookup service diagnostic from matcher {name}: {message}"
                )));
            },
            Err(MatcherError::Other(err)) => return Err(ValidationError::Upstream(err)),
        };

        if options.stop_when_found && acc.has_matches() {
            break;
        }
    }

    acc.finish(options)
}
