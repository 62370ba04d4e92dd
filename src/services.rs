//! Collaborator interfaces injected into the pipeline.
//!
//! The pipeline owns the decisions; everything that talks to the outside world
//! (record lookup, candidate search, pairwise match validation, merge reduction,
//! generic field validation, post-merge fixes, audit logging) sits behind one
//! of the traits below. Implementations must be `Send + Sync` so one
//! [`Validator`](crate::pipeline::Validator) can serve concurrent requests.
//!
//! Every trait method is awaited in order by the pipeline; none are called
//! speculatively or in parallel.

use crate::audit::LogItem;
use crate::headers::FixType;
use crate::leader::RecordKind;
use crate::record::Record;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Record lookup
// ============================================================================

/// Fetches records from the shared database by id.
#[async_trait]
pub trait RecordLookup: Send + Sync {
    /// Return the record with the given id, or `None` if it does not exist.
    async fn find(&self, id: &str) -> anyhow::Result<Option<Record>>;
}

// ============================================================================
// Candidate matchers
// ============================================================================

/// Matcher class. The content matcher is the last line of defence against
/// duplicates, so its failure to run is always fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatcherKind {
    /// Database identifiers carried by the record
    Ids,
    /// Standard identifiers (ISBN, ISSN, ...)
    StandardIds,
    /// Descriptive content (title, authors, publication data)
    Content,
    /// Anything else
    Other,
}

impl fmt::Display for MatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatcherKind::Ids => "IDS",
            MatcherKind::StandardIds => "STANDARD_IDS",
            MatcherKind::Content => "CONTENT",
            MatcherKind::Other => "OTHER",
        };
        f.write_str(name)
    }
}

/// Why a matcher stopped before exhausting its candidate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    /// Enough matches found
    MaxMatches,
    /// Too many candidates retrieved
    MaxCandidates,
    /// Query budget used up
    MaxedQueries,
    /// Candidates could not be converted for comparison
    ConversionFailures,
}

/// Whether a matcher searched its whole candidate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchStatus {
    /// `true` when the candidate space was exhausted
    pub status: bool,
    /// Reason for stopping early
    pub stop_reason: Option<StopReason>,
}

/// A database record found by a matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCandidate {
    /// Database id of the candidate
    pub id: String,
    /// Candidate record
    pub record: Record,
    /// Match probability reported by the matcher (0.0 - 1.0)
    pub probability: f64,
    /// Matching strategy that produced the match
    #[serde(default)]
    pub strategy: Option<String>,
    /// Probability threshold in effect
    #[serde(default)]
    pub threshold: Option<f64>,
    /// Query that retrieved the candidate
    #[serde(default)]
    pub query: Option<String>,
}

impl MatchCandidate {
    /// Candidate with only the required fields set.
    #[must_use]
    pub fn new(id: impl Into<String>, record: Record, probability: f64) -> Self {
        MatchCandidate {
            id: id.into(),
            record,
            probability,
            strategy: None,
            threshold: None,
            query: None,
        }
    }
}

/// A candidate a matcher retrieved but could not convert for comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionFailure {
    /// Database id of the candidate
    pub id: String,
    /// Conversion error message
    pub message: String,
}

/// Result of one matcher run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatcherOutput {
    /// Matches found
    pub matches: Vec<MatchCandidate>,
    /// Search status
    pub match_status: MatchStatus,
    /// Candidates that could not be compared
    pub conversion_failures: Vec<ConversionFailure>,
    /// Number of candidates retrieved
    pub candidate_count: usize,
}

/// Matcher failure classes.
#[derive(Error, Debug)]
pub enum MatcherError {
    /// The record did not yield any query for this matcher; the matcher did not run.
    #[error("Generated query list contains no queries: {0}")]
    NoQueries(String),

    /// The lookup service answered with a diagnostic instead of results.
    #[error("Lookup service returned a diagnostic: {0}")]
    Diagnostic(String),

    /// Any other failure (transport, decoding, ...).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Searches the database for records matching an incoming record.
#[async_trait]
pub trait CandidateMatcher: Send + Sync {
    /// Matcher class
    fn kind(&self) -> MatcherKind;

    /// Name used in reports and logs
    fn name(&self) -> String {
        self.kind().to_string()
    }

    /// Search for matches.
    async fn find_matches(&self, record: &Record) -> Result<MatcherOutput, MatcherError>;
}

// ============================================================================
// Pairwise match validation
// ============================================================================

/// Record side in a pairwise comparison: `A` is incoming, `B` is the database record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Side {
    /// The incoming record
    A,
    /// The database record
    #[default]
    B,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => f.write_str("A (incoming record)"),
            Side::B => f.write_str("B (database record)"),
        }
    }
}

/// Which record should be the merge base, and why.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Preference {
    /// Preferred side
    pub side: Side,
    /// Human-readable reason
    pub reason: String,
}

/// Verdict of the pairwise match validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchAction {
    /// The records describe the same resource and may be merged
    Merge,
    /// The match must not be merged
    Reject,
}

/// Result of validating one incoming/candidate pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchValidation {
    /// Verdict
    pub action: MatchAction,
    /// Merge base preference
    #[serde(default)]
    pub preference: Preference,
    /// Explanation
    #[serde(default)]
    pub message: String,
}

/// Decides whether two matched records may be merged.
///
/// Validation is CPU-only and synchronous from the pipeline's point of view.
pub trait MatchValidator: Send + Sync {
    /// Compare incoming record `a` with database record `b`.
    ///
    /// # Errors
    ///
    /// Returns an error if the records cannot be compared.
    fn validate(&self, a: &Record, b: &Record) -> anyhow::Result<MatchValidation>;
}

// ============================================================================
// Merge reduction
// ============================================================================

/// Input of the merge-reduction engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    /// Record whose content wins conflicts absent an explicit reducer decision
    pub base: Record,
    /// Record whose content is merged into the base
    pub source: Record,
    /// Record class selecting the reducer set
    pub record_kind: RecordKind,
}

/// Output of the merge-reduction engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeResult {
    /// Merged record; `None` when the reducers produced nothing
    pub record: Option<Record>,
    /// Engine status message
    #[serde(default)]
    pub status: String,
}

/// Merge engine failure classes.
#[derive(Error, Debug)]
pub enum MergeError {
    /// No reducers are configured for this record class.
    #[error("No merge reducers configured for {0} records")]
    NoReducers(RecordKind),

    /// Any other merge failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Merges two records.
#[async_trait]
pub trait MergeEngine: Send + Sync {
    /// Merge `request.source` into `request.base`.
    async fn merge(&self, request: MergeRequest) -> Result<MergeResult, MergeError>;
}

// ============================================================================
// Post-merge fixes
// ============================================================================

/// Options passed to the post-merge fix step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixOptions {
    /// Fix requested in the operation settings
    pub fix_type: Option<FixType>,
    /// Priority (interactive) request
    pub prio: bool,
}

/// Normalizes a freshly merged record.
#[async_trait]
pub trait PostMergeFixer: Send + Sync {
    /// Return the fixed record.
    async fn fix(&self, record: Record, options: FixOptions) -> anyhow::Result<Record>;
}

// ============================================================================
// Generic field validation
// ============================================================================

/// Result of generic field validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValidation {
    /// Record after validation (validators may apply fixes)
    pub record: Record,
    /// Whether validation failed
    pub failed: bool,
    /// Validation messages
    #[serde(default)]
    pub messages: Vec<String>,
}

/// Generic, record-local field validation.
#[async_trait]
pub trait FieldValidator: Send + Sync {
    /// Validate (and possibly fix) a record.
    async fn validate(&self, record: Record) -> anyhow::Result<FieldValidation>;
}

// ============================================================================
// Audit log
// ============================================================================

/// Sink for audit log items.
///
/// Writes are best-effort: the pipeline logs and swallows failures.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Persist one item.
    async fn add_log_item(&self, item: LogItem) -> anyhow::Result<()>;
}
