//! Merge orchestration.
//!
//! Decides which record is the merge base, calls the merge engine, applies the
//! post-merge fixes and turns the request into an update of the merged
//! database record.
//!
//! - Plain updates always use the database record (side `B`) as base.
//! - Matches use the side the match validator preferred.

use crate::audit::{write_best_effort, LogContext, LogItem};
use crate::error::{Result, ValidationError};
use crate::headers::{Headers, Operation};
use crate::ranking::ValidatedMatch;
use crate::record::Record;
use crate::services::{
    AuditLog, FixOptions, MergeEngine, MergeError, MergeRequest, PostMergeFixer, Preference, Side,
};

/// Merged record with headers redirected to the merge target.
#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
    /// Merged and fixed record
    pub record: Record,
    /// Headers with `operation = UPDATE`, `id = target id` and a merge note
    pub headers: Headers,
}

/// Runs merges using the injected collaborators.
#[derive(Clone, Copy)]
pub struct MergeOrchestrator<'a> {
    engine: &'a dyn MergeEngine,
    fixer: &'a dyn PostMergeFixer,
    audit: &'a dyn AuditLog,
}

impl std::fmt::Debug for MergeOrchestrator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeOrchestrator").finish_non_exhaustive()
    }
}

impl<'a> MergeOrchestrator<'a> {
    /// Create an orchestrator over borrowed collaborators.
    #[must_use]
    pub fn new(
        engine: &'a dyn MergeEngine,
        fixer: &'a dyn PostMergeFixer,
        audit: &'a dyn AuditLog,
    ) -> Self {
        MergeOrchestrator {
            engine,
            fixer,
            audit,
        }
    }

    /// Merge an update into the existing database record (the database record wins).
    ///
    /// # Errors
    ///
    /// See [`MergeOrchestrator::merge_for_match`].
    pub async fn merge_for_update(
        &self,
        incoming: Record,
        existing_id: &str,
        existing: Record,
        headers: Headers,
    ) -> Result<Merged> {
        let preference = Preference {
            side: Side::B,
            reason: "update merges into the existing database record".to_string(),
        };
        self.merge(existing_id, incoming, existing, preference, headers)
            .await
    }

    /// Merge an incoming record with the best validated match.
    ///
    /// The validator's preferred side becomes the merge base.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::Internal`] if no merge reducers exist for the record kind
    /// - [`ValidationError::Unprocessable`] if the merge yields no record or any
    ///   step fails
    pub async fn merge_for_match(
        &self,
        incoming: Record,
        best: &ValidatedMatch,
        headers: Headers,
    ) -> Result<Merged> {
        self.merge(
            best.id(),
            incoming,
            best.candidate.record.clone(),
            best.preference.clone(),
            headers,
        )
        .await
    }

    async fn merge(
        &self,
        target_id: &str,
        incoming: Record,
        database: Record,
        preference: Preference,
        mut headers: Headers,
    ) -> Result<Merged> {
        let (base, source) = match preference.side {
            Side::A => (incoming, database),
            Side::B => (database, incoming),
        };
        let record_kind = base.record_kind();

        let result = self
            .engine
            .merge(MergeRequest {
                base: base.clone(),
                source: source.clone(),
                record_kind,
            })
            .await
            .map_err(|err| match err {
                MergeError::NoReducers(kind) => ValidationError::Internal(format!(
                    "No merge reducers configured for {kind} records"
                )),
                MergeError::Other(cause) => merge_failure(target_id, &cause),
            })?;

        let Some(merged) = result.record else {
            return Err(ValidationError::unprocessable(format!(
                "Merge with {target_id} produced no record ({})",
                result.status
            )));
        };

        let options = FixOptions {
            fix_type: headers.operation_settings.fix_type,
            prio: headers.operation_settings.prio,
        };
        let merged = self
            .fixer
            .fix(merged, options)
            .await
            .map_err(|cause| merge_failure(target_id, &cause))?;

        tracing::info!(target_id, side = ?preference.side, "merged with database record");
        write_best_effort(
            self.audit,
            LogItem::MergeLog {
                context: LogContext::from_headers(&headers),
                target_id: target_id.to_string(),
                preference: preference.clone(),
                base,
                source,
                merged: merged.clone(),
            },
        )
        .await;

        headers.push_note(merge_note(target_id, &preference));
        headers.operation = Operation::Update;
        headers.id = Some(target_id.to_string());

        Ok(Merged {
            record: merged,
            headers,
        })
    }
}

fn merge_failure(target_id: &str, cause: &anyhow::Error) -> ValidationError {
    ValidationError::unprocessable(format!("Merge with {target_id} failed: {cause:#}"))
}

fn merge_note(target_id: &str, preference: &Preference) -> String {
    if preference.reason.is_empty() {
        format!(
            "Merged with database record {target_id}, preferring {}",
            preference.side
        )
    } else {
        format!(
            "Merged with database record {target_id}, preferring {}: {}",
            preference.side, preference.reason
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::Cataloger;
    use crate::leader::{Leader, RecordKind};
    use crate::record::Field;
    use crate::services::{MatchAction, MatchCandidate, MergeResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn record(marker: &str) -> Record {
        let leader: Leader = "00000cam a2200000 i 4500".parse().unwrap();
        Record::builder(leader)
            .field(
                Field::builder("500".to_string(), ' ', ' ')
                    .subfield_str('a', marker)
                    .build(),
            )
            .build()
    }

    fn marker(record: &Record) -> &str {
        record.get_field("500").and_then(|f| f.get_subfield('a')).unwrap()
    }

    /// Returns the base unchanged and remembers the request.
    #[derive(Default)]
    struct BaseWins {
        requests: Mutex<Vec<MergeRequest>>,
        empty: bool,
        no_reducers: bool,
    }

    #[async_trait]
    impl MergeEngine for BaseWins {
        async fn merge(&self, request: MergeRequest) -> std::result::Result<MergeResult, MergeError> {
            if self.no_reducers {
                return Err(MergeError::NoReducers(request.record_kind));
            }
            let record = (!self.empty).then(|| request.base.clone());
            self.requests.lock().unwrap().push(request);
            Ok(MergeResult {
                record,
                status: "ok".to_string(),
            })
        }
    }

    struct NoteFixer;

    #[async_trait]
    impl PostMergeFixer for NoteFixer {
        async fn fix(&self, mut record: Record, _options: FixOptions) -> anyhow::Result<Record> {
            record.add_field(Field::new("FIX".to_string(), ' ', ' '));
            Ok(record)
        }
    }

    #[derive(Default)]
    struct MemoryLog {
        items: Mutex<Vec<LogItem>>,
    }

    #[async_trait]
    impl AuditLog for MemoryLog {
        async fn add_log_item(&self, item: LogItem) -> anyhow::Result<()> {
            self.items.lock().unwrap().push(item);
            Ok(())
        }
    }

    fn headers() -> Headers {
        Headers::new(Operation::Create, Cataloger::default())
    }

    fn validated(side: Side) -> ValidatedMatch {
        ValidatedMatch {
            candidate: MatchCandidate::new("000777", record("database"), 0.9),
            action: MatchAction::Merge,
            preference: Preference {
                side,
                reason: "test".to_string(),
            },
            message: String::new(),
            match_sequence: 0,
            probability: 0.9,
        }
    }

    #[tokio::test]
    async fn test_update_merge_uses_database_as_base() {
        let engine = BaseWins::default();
        let log = MemoryLog::default();
        let merger = MergeOrchestrator::new(&engine, &NoteFixer, &log);

        let merged = merger
            .merge_for_update(record("incoming"), "000123", record("database"), headers())
            .await
            .unwrap();

        assert_eq!(marker(&merged.record), "database");
        assert!(merged.record.has_field("FIX"));
        assert_eq!(merged.headers.operation, Operation::Update);
        assert_eq!(merged.headers.id.as_deref(), Some("000123"));
        assert!(merged.headers.notes()[0].contains("000123"));

        let requests = engine.requests.lock().unwrap();
        assert_eq!(marker(&requests[0].source), "incoming");
        assert_eq!(requests[0].record_kind, RecordKind::Bibliographic);
        assert_eq!(log.items.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_match_merge_follows_preference() {
        let engine = BaseWins::default();
        let log = MemoryLog::default();
        let merger = MergeOrchestrator::new(&engine, &NoteFixer, &log);

        let merged = merger
            .merge_for_match(record("incoming"), &validated(Side::A), headers())
            .await
            .unwrap();
        assert_eq!(marker(&merged.record), "incoming");
        assert_eq!(merged.headers.id.as_deref(), Some("000777"));

        let merged = merger
            .merge_for_match(record("incoming"), &validated(Side::B), headers())
            .await
            .unwrap();
        assert_eq!(marker(&merged.record), "database");
    }

    #[tokio::test]
    async fn test_missing_reducers_is_internal_error() {
        let engine = BaseWins {
            no_reducers: true,
            ..BaseWins::default()
        };
        let log = MemoryLog::default();
        let merger = MergeOrchestrator::new(&engine, &NoteFixer, &log);

        let err = merger
            .merge_for_match(record("incoming"), &validated(Side::B), headers())
            .await
            .unwrap_err();
        assert_eq!(err.status(), 500);
    }

    #[tokio::test]
    async fn test_empty_merge_is_unprocessable() {
        let engine = BaseWins {
            empty: true,
            ..BaseWins::default()
        };
        let log = MemoryLog::default();
        let merger = MergeOrchestrator::new(&engine, &NoteFixer, &log);

        let err = merger
            .merge_for_match(record("incoming"), &validated(Side::B), headers())
            .await
            .unwrap_err();
        assert_eq!(err.status(), 422);
        assert!(log.items.lock().unwrap().is_empty());
    }
}
