//! The validation state machine.
//!
//! [`Validator::process`] takes an incoming record with its [`Headers`] and
//! decides what happens to it:
//!
//! ```text
//! CREATE ──► ownership ──► (unique|merge)? ──► matchers ──► ranking ──► source overlap ──► merge ─┐
//!                 │                 │              │                          │                    │
//!                 │                 no             no matches                 redundant            ▼
//!                 │                 ▼              ▼                          ▼          UPDATE (post-merge)
//!                 │             validate ──► ACCEPTED                   SKIPPED_UPDATE
//!                 ▼
//! UPDATE ──► lookup ──► (merge) ──► ownership ──► CAT history ──► validate ──► change ──► ACCEPTED | SKIPPED_CHANGE
//! ```
//!
//! The only cycle is CREATE → UPDATE after a merge. It runs in
//! [`ValidationMode::PostMergeUpdate`], which never merges again.

use crate::audit::{write_best_effort, LogContext, LogItem};
use crate::change_detection::{detect_no_op_change, ChangeDetection};
use crate::config::ValidatorConfig;
use crate::error::{Rejection, Result, ValidationError};
use crate::headers::{FixType, Headers, Operation, RecordMetadata};
use crate::matching::iterate_matchers;
use crate::merge::MergeOrchestrator;
use crate::modification_history::check_modification_history;
use crate::ownership::check_ownership;
use crate::ranking::rank_matches;
use crate::record::Record;
use crate::services::{
    AuditLog, CandidateMatcher, FieldValidator, MatchValidator, MergeEngine, PostMergeFixer,
    RecordLookup,
};
use crate::source_overlap::check_source_overlap;
use std::fmt;
use std::sync::Arc;
use tracing::Instrument;

/// Which path through the state machine a record is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// A `CREATE` request
    PlainCreate,
    /// An `UPDATE` request
    PlainUpdate,
    /// The update reached after merging a created record with a match
    PostMergeUpdate,
}

impl ValidationMode {
    /// Mode for a requested operation.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::BadRequest`] for operations that are only
    /// valid as an outcome.
    pub fn for_operation(operation: Operation) -> Result<Self> {
        match operation {
            Operation::Create => Ok(ValidationMode::PlainCreate),
            Operation::Update => Ok(ValidationMode::PlainUpdate),
            other => Err(ValidationError::BadRequest(format!(
                "Operation {other} cannot be requested"
            ))),
        }
    }

    /// Whether an update in this mode may merge with the existing record.
    #[must_use]
    pub fn allows_merge(self) -> bool {
        self == ValidationMode::PlainUpdate
    }
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValidationMode::PlainCreate => "create",
            ValidationMode::PlainUpdate => "update",
            ValidationMode::PostMergeUpdate => "updateAfterMerge",
        };
        f.write_str(name)
    }
}

/// Successful disposition of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The record may be written
    Accepted,
    /// The update changes nothing
    SkippedChange,
    /// The database already holds this version of the source record
    SkippedUpdate,
}

/// Result of [`Validator::process`].
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    /// Record to write (merged and fixed where applicable)
    pub record: Record,
    /// Headers describing the disposition
    pub headers: Headers,
    /// Disposition
    pub outcome: Outcome,
}

/// External services used by a [`Validator`].
#[derive(Clone)]
pub struct Collaborators {
    /// Database record lookup
    pub lookup: Arc<dyn RecordLookup>,
    /// Candidate matchers in priority order
    pub matchers: Vec<Arc<dyn CandidateMatcher>>,
    /// Pairwise match validation
    pub match_validator: Arc<dyn MatchValidator>,
    /// Merge-reduction engine
    pub merge_engine: Arc<dyn MergeEngine>,
    /// Post-merge fixes
    pub fixer: Arc<dyn PostMergeFixer>,
    /// Generic field validation
    pub field_validator: Arc<dyn FieldValidator>,
    /// Audit log sink
    pub audit: Arc<dyn AuditLog>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("matchers", &self.matchers.len())
            .finish_non_exhaustive()
    }
}

/// Validates incoming records against the database.
///
/// Holds only shared, immutable collaborators, so one instance can serve
/// concurrent requests.
#[derive(Clone)]
pub struct Validator {
    config: ValidatorConfig,
    services: Collaborators,
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let matchers: Vec<String> = self.services.matchers.iter().map(|m| m.name()).collect();
        f.debug_struct("Validator")
            .field("config", &self.config)
            .field("matchers", &matchers)
            .finish_non_exhaustive()
    }
}

impl Validator {
    /// Create a validator.
    #[must_use]
    pub fn new(config: ValidatorConfig, services: Collaborators) -> Self {
        Validator { config, services }
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Decide what to do with an incoming record.
    ///
    /// On success `headers.operation` holds the disposition (`CREATE`,
    /// `UPDATE`, `SKIPPED_CHANGE` or `SKIPPED_UPDATE`) and `headers.id` the
    /// target record for anything but a plain create. A `RECORD_LOG` item
    /// is written for every success.
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] pairing the [`ValidationError`] with the
    /// metadata of the refused record.
    pub async fn process(
        &self,
        record: Record,
        mut headers: Headers,
    ) -> std::result::Result<Validated, Rejection> {
        let span = tracing::info_span!(
            "validate",
            correlation_id = %headers.correlation_id,
            operation = %headers.operation,
        );

        async move {
            if headers.record_metadata == RecordMetadata::default() {
                headers.record_metadata = RecordMetadata::from_record(&record);
            }

            let record_metadata = headers.record_metadata.clone();
            let result = match ValidationMode::for_operation(headers.operation) {
                Ok(ValidationMode::PlainCreate) => self.validate_create(record, headers).await,
                Ok(mode) => self.validate_update(record, headers, mode).await,
                Err(err) => Err(err),
            };

            match result {
                Ok(validated) => {
                    tracing::info!(
                        outcome = ?validated.outcome,
                        operation = %validated.headers.operation,
                        id = validated.headers.id.as_deref().unwrap_or_default(),
                        "record validated"
                    );
                    write_best_effort(
                        self.services.audit.as_ref(),
                        LogItem::RecordLog {
                            context: LogContext::from_headers(&validated.headers),
                            operation: validated.headers.operation,
                            id: validated.headers.id.clone(),
                            record: validated.record.clone(),
                        },
                    )
                    .await;
                    Ok(validated)
                },
                Err(err) => {
                    tracing::info!(status = err.status(), "record rejected: {err}");
                    Err(Rejection::new(err, record_metadata))
                },
            }
        }
        .instrument(span)
        .await
    }

    async fn validate_create(&self, record: Record, mut headers: Headers) -> Result<Validated> {
        check_ownership(
            &self.config,
            &headers.cataloger.authorization,
            &record,
            None,
        )?;

        let merge = headers.operation_settings.merge;
        if !headers.operation_settings.unique && !merge {
            let record = self.run_field_validation(record, &mut headers).await?;
            return Ok(accepted(record, headers));
        }

        let outcome =
            iterate_matchers(&self.services.matchers, &record, self.config.match_options).await?;
        write_best_effort(
            self.services.audit.as_ref(),
            LogItem::MatchLog {
                context: LogContext::from_headers(&headers),
                matched_ids: outcome.matched_ids(),
                matcher_reports: outcome.matcher_reports.clone(),
            },
        )
        .await;

        if outcome.matches.is_empty() {
            tracing::debug!("no duplicates in database");
            let record = self.run_field_validation(record, &mut headers).await?;
            return Ok(accepted(record, headers));
        }

        if !merge {
            return Err(ValidationError::Conflict {
                message: "Duplicates in database".to_string(),
                ids: outcome.matched_ids(),
            });
        }

        let ranking = rank_matches(
            self.services.match_validator.as_ref(),
            &record,
            outcome.matches,
        )?;
        let Some(best) = ranking.best() else {
            return Err(ValidationError::Conflict {
                message: "Duplicates in database, no valid match for merge".to_string(),
                ids: ranking.ranked.iter().map(|m| m.id().to_string()).collect(),
            });
        };

        if !check_source_overlap(
            &self.config,
            &record,
            &best.candidate.record,
            &headers.cataloger.id,
        ) {
            tracing::info!(id = best.id(), "source version already in database");
            headers.operation = Operation::SkippedUpdate;
            headers.id = Some(best.id().to_string());
            headers.push_note(format!(
                "Database record {} already contains this version of the source record",
                best.id()
            ));
            return Ok(Validated {
                record,
                headers,
                outcome: Outcome::SkippedUpdate,
            });
        }

        let merged = self
            .merger()
            .merge_for_match(record, best, headers)
            .await?;
        self.validate_update(merged.record, merged.headers, ValidationMode::PostMergeUpdate)
            .await
    }

    async fn validate_update(
        &self,
        record: Record,
        headers: Headers,
        mode: ValidationMode,
    ) -> Result<Validated> {
        let Some(id) = headers.id.clone() else {
            return Err(ValidationError::BadRequest(
                "Update requires a record id".to_string(),
            ));
        };

        let existing = self
            .services
            .lookup
            .find(&id)
            .await?
            .ok_or_else(|| ValidationError::NotFound(format!("Record {id} not found")))?;

        if existing.is_deleted() && headers.operation_settings.fix_type != Some(FixType::Undel) {
            return Err(ValidationError::NotFound(format!("Record {id} is deleted")));
        }

        let (record, mut headers) = if mode.allows_merge() && headers.operation_settings.merge {
            let merged = self
                .merger()
                .merge_for_update(record, &id, existing.clone(), headers)
                .await?;
            (merged.record, merged.headers)
        } else {
            (record, headers)
        };

        check_ownership(
            &self.config,
            &headers.cataloger.authorization,
            &record,
            Some(&existing),
        )?;
        check_modification_history(&record, &existing)?;

        let record = self.run_field_validation(record, &mut headers).await?;

        headers.operation = Operation::Update;
        let change = detect_no_op_change(
            &record,
            &existing,
            headers.operation_settings.skip_no_change_updates,
        );
        tracing::debug!(%mode, ?change, "change detection");
        if change == ChangeDetection::Unchanged {
            headers.operation = Operation::SkippedChange;
            headers.push_note(format!(
                "No changes detected while trying to update existing record {id}, update skipped"
            ));
            return Ok(Validated {
                record,
                headers,
                outcome: Outcome::SkippedChange,
            });
        }

        Ok(Validated {
            record,
            headers,
            outcome: Outcome::Accepted,
        })
    }

    async fn run_field_validation(&self, record: Record, headers: &mut Headers) -> Result<Record> {
        if !headers.operation_settings.validate {
            tracing::debug!("field validation disabled for this request");
            return Ok(record);
        }

        let validation = self.services.field_validator.validate(record).await?;
        for message in &validation.messages {
            headers.push_note(message.clone());
        }
        if validation.failed {
            return Err(ValidationError::unprocessable(format!(
                "Record validation failed: {}",
                validation.messages.join("; ")
            )));
        }
        Ok(validation.record)
    }

    fn merger(&self) -> MergeOrchestrator<'_> {
        MergeOrchestrator::new(
            self.services.merge_engine.as_ref(),
            self.services.fixer.as_ref(),
            self.services.audit.as_ref(),
        )
    }
}

fn accepted(record: Record, headers: Headers) -> Validated {
    Validated {
        record,
        headers,
        outcome: Outcome::Accepted,
    }
}
