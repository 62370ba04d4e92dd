#![warn(missing_docs)]

//! # MRRV: MARC Record Validation
//!
//! Decides what happens to a MARC record before it is written to a shared
//! bibliographic database: accept it, reject it, merge it with an existing
//! record, or skip it because it changes nothing.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mrrv::{Cataloger, Collaborators, Headers, Operation, Validator, ValidatorConfig};
//!
//! # async fn run(services: Collaborators, record: mrrv::Record) -> Result<(), mrrv::Rejection> {
//! let validator = Validator::new(ValidatorConfig::from_env(), services);
//!
//! let mut headers = Headers::new(
//!     Operation::Create,
//!     Cataloger { id: "IMP_HELMET".to_string(), authorization: vec!["HELKA".to_string()] },
//! );
//! headers.operation_settings.unique = true;
//! headers.operation_settings.merge = true;
//!
//! let validated = validator.process(record, headers).await?;
//! println!("{} {:?}", validated.headers.operation, validated.headers.id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`record`] — Core MARC record structures (`Record`, `Field`, `Subfield`)
//! - [`leader`] — MARC record leader (24-character header)
//! - [`headers`] — Request headers travelling with each record
//! - [`pipeline`] — The validation state machine ([`Validator`])
//! - [`ownership`] — `LOW` tag authorization guard
//! - [`change_detection`] — No-op update detection
//! - [`modification_history`] — `CAT` history consistency guard
//! - [`source_overlap`] — Redundant import detection (`884` source hashes)
//! - [`matching`] — Sequential duplicate search over candidate matchers
//! - [`ranking`] — Pairwise match validation and ranking
//! - [`merge`] — Merge orchestration
//! - [`services`] — Collaborator traits implemented by the host service
//! - [`record_validation`] — Structural record checks and a default field validator
//! - [`audit`] — Audit log items
//! - [`config`] — Validator configuration
//! - [`error`] — Error types and result type

pub mod audit;
pub mod change_detection;
pub mod config;
pub mod error;
pub mod headers;
pub mod leader;
pub mod matching;
pub mod merge;
pub mod modification_history;
pub mod ownership;
pub mod pipeline;
pub mod ranking;
/// Core MARC record structures (`Record`, `Field`, `Subfield`)
pub mod record;
pub mod record_validation;
pub mod services;
pub mod source_overlap;

pub use audit::{LogContext, LogItem};
pub use change_detection::{detect_no_op_change, ChangeDetection};
pub use config::ValidatorConfig;
pub use error::{MarcError, Rejection, Result, ValidationError};
pub use headers::{Cataloger, FixType, Headers, Operation, OperationSettings, RecordMetadata};
pub use leader::{Leader, RecordKind};
pub use matching::{iterate_matchers, MatchOptions, MatchOutcome, MatcherReport};
pub use merge::{MergeOrchestrator, Merged};
pub use ownership::{check_ownership, GuardOutcome};
pub use pipeline::{Collaborators, Outcome, Validated, ValidationMode, Validator};
pub use ranking::{rank_matches, Ranking, ValidatedMatch};
pub use record::{ControlField, Field, FieldBuilder, Record, RecordBuilder, Subfield};
pub use record_validation::{RecordStructureValidator, StructureFieldValidator};
pub use services::{
    AuditLog, CandidateMatcher, ConversionFailure, FieldValidation, FieldValidator, FixOptions,
    MatchAction, MatchCandidate, MatchStatus, MatchValidation, MatchValidator, MatcherError,
    MatcherKind, MatcherOutput, MergeEngine, MergeError, MergeRequest, MergeResult,
    PostMergeFixer, Preference, RecordLookup, Side, StopReason,
};
