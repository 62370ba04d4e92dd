//! Common test helpers and in-memory collaborators shared across the test suite.

#![allow(dead_code)]

use async_trait::async_trait;
use mrrv::{
    AuditLog, CandidateMatcher, Cataloger, Collaborators, Field, FieldValidation, FieldValidator,
    FixOptions, Headers, Leader, LogItem, MatchAction, MatchCandidate, MatchStatus,
    MatchValidation, MatchValidator, MatcherError, MatcherKind, MatcherOutput, MergeEngine,
    MergeError, MergeRequest, MergeResult, Operation, PostMergeFixer, Preference, Record,
    RecordLookup, Side, StopReason, Validator, ValidatorConfig,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Cataloger id used by the test requests.
pub const CATALOGER: &str = "IMP_HELMET";
/// Ownership tag the test cataloger is authorized for.
pub const OWN_TAG: &str = "HELKA";

/// Creates a default leader for test records.
pub fn create_test_leader() -> Leader {
    Leader {
        record_length: 1000,
        record_status: 'c',
        record_type: 'a',
        bibliographic_level: 'm',
        control_record_type: ' ',
        character_coding: 'a',
        indicator_count: 2,
        subfield_code_count: 2,
        data_base_address: 100,
        encoding_level: ' ',
        cataloging_form: 'i',
        multipart_level: ' ',
        reserved: "4500".to_string(),
    }
}

/// Creates a bibliographic record with a title, an ownership tag and one
/// modification history entry.
pub fn create_test_record(id: &str, title: &str) -> Record {
    Record::builder(create_test_leader())
        .control_field_str("001", id)
        .control_field_str("005", "20240101120000.0")
        .control_field_str("008", "240101s2024    fi ||||||||||||||||fin||")
        .field(
            Field::builder("245".to_string(), '1', '0')
                .subfield_str('a', title)
                .build(),
        )
        .field(
            Field::builder("LOW".to_string(), ' ', ' ')
                .subfield_str('a', OWN_TAG)
                .build(),
        )
        .field(
            Field::builder("CAT".to_string(), ' ', ' ')
                .subfield_str('a', "LOAD-HELMET")
                .subfield_str('c', "20240101")
                .build(),
        )
        .build()
}

/// Adds an `884` source field carrying a conversion name and a source hash.
pub fn with_source_hash(mut record: Record, conversion: &str, hash: &str) -> Record {
    record.add_field(
        Field::builder("884".to_string(), ' ', ' ')
            .subfield_str('a', conversion)
            .subfield_str('k', hash)
            .build(),
    );
    record
}

/// Headers for a request by the test cataloger.
pub fn headers(operation: Operation) -> Headers {
    let mut headers = Headers::new(
        operation,
        Cataloger {
            id: CATALOGER.to_string(),
            authorization: vec![OWN_TAG.to_string()],
        },
    );
    headers.correlation_id = "job-1".to_string();
    headers
}

/// Database lookup backed by a map.
#[derive(Default)]
pub struct MemoryLookup {
    records: Mutex<HashMap<String, Record>>,
    pub lookups: AtomicUsize,
}

impl MemoryLookup {
    pub fn insert(&self, id: &str, record: Record) {
        self.records.lock().unwrap().insert(id.to_string(), record);
    }
}

#[async_trait]
impl RecordLookup for MemoryLookup {
    async fn find(&self, id: &str) -> anyhow::Result<Option<Record>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.lock().unwrap().get(id).cloned())
    }
}

/// What a [`ScriptedMatcher`] answers.
#[derive(Clone)]
pub enum Script {
    /// Return these matches
    Matches(Vec<MatchCandidate>),
    /// Fail to build a query
    NoQueries,
    /// Find nothing because the candidate limit was hit
    TooManyCandidates,
}

/// Matcher returning a fixed answer and counting its calls.
pub struct ScriptedMatcher {
    kind: MatcherKind,
    script: Script,
    pub calls: AtomicUsize,
}

impl ScriptedMatcher {
    pub fn new(kind: MatcherKind, script: Script) -> Self {
        ScriptedMatcher {
            kind,
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CandidateMatcher for ScriptedMatcher {
    fn kind(&self) -> MatcherKind {
        self.kind
    }

    async fn find_matches(&self, _record: &Record) -> Result<MatcherOutput, MatcherError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Matches(matches) => Ok(MatcherOutput {
                candidate_count: matches.len(),
                matches: matches.clone(),
                match_status: MatchStatus {
                    status: true,
                    stop_reason: None,
                },
                conversion_failures: Vec::new(),
            }),
            Script::NoQueries => Err(MatcherError::NoQueries(
                "record has no usable identifiers".to_string(),
            )),
            Script::TooManyCandidates => Ok(MatcherOutput {
                matches: Vec::new(),
                match_status: MatchStatus {
                    status: false,
                    stop_reason: Some(StopReason::MaxCandidates),
                },
                conversion_failures: Vec::new(),
                candidate_count: 500,
            }),
        }
    }
}

/// Match validator allowing merges with the listed ids.
pub struct ListValidator {
    pub mergeable: Vec<String>,
    pub side: Side,
}

impl MatchValidator for ListValidator {
    fn validate(&self, _a: &Record, b: &Record) -> anyhow::Result<MatchValidation> {
        let id = b.control_number().unwrap_or_default();
        let action = if self.mergeable.iter().any(|m| m == id) {
            MatchAction::Merge
        } else {
            MatchAction::Reject
        };
        Ok(MatchValidation {
            action,
            preference: Preference {
                side: self.side,
                reason: "more complete record".to_string(),
            },
            message: String::new(),
        })
    }
}

/// Merge engine that keeps the base record and remembers requests.
#[derive(Default)]
pub struct BaseMergeEngine {
    pub requests: Mutex<Vec<MergeRequest>>,
}

#[async_trait]
impl MergeEngine for BaseMergeEngine {
    async fn merge(&self, request: MergeRequest) -> Result<MergeResult, MergeError> {
        let record = request.base.clone();
        self.requests.lock().unwrap().push(request);
        Ok(MergeResult {
            record: Some(record),
            status: "merged".to_string(),
        })
    }
}

/// Fixer returning records unchanged.
#[derive(Default)]
pub struct PassthroughFixer {
    pub options: Mutex<Vec<FixOptions>>,
}

#[async_trait]
impl PostMergeFixer for PassthroughFixer {
    async fn fix(&self, record: Record, options: FixOptions) -> anyhow::Result<Record> {
        self.options.lock().unwrap().push(options);
        Ok(record)
    }
}

/// Field validator with a fixed verdict.
#[derive(Default)]
pub struct VerdictFieldValidator {
    pub fail: bool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl FieldValidator for VerdictFieldValidator {
    async fn validate(&self, record: Record) -> anyhow::Result<FieldValidation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let messages = if self.fail {
            vec!["Field 245 is missing subfield a".to_string()]
        } else {
            Vec::new()
        };
        Ok(FieldValidation {
            record,
            failed: self.fail,
            messages,
        })
    }
}

/// Audit log collecting items in memory, optionally failing every write.
#[derive(Default)]
pub struct MemoryAuditLog {
    pub items: Mutex<Vec<LogItem>>,
    pub fail: bool,
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn add_log_item(&self, item: LogItem) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("audit sink unavailable");
        }
        self.items.lock().unwrap().push(item);
        Ok(())
    }
}

/// All fakes of one test, with access to their recorded calls.
pub struct Harness {
    pub lookup: Arc<MemoryLookup>,
    pub matchers: Vec<Arc<ScriptedMatcher>>,
    pub match_validator: Arc<ListValidator>,
    pub merge_engine: Arc<BaseMergeEngine>,
    pub fixer: Arc<PassthroughFixer>,
    pub field_validator: Arc<VerdictFieldValidator>,
    pub audit: Arc<MemoryAuditLog>,
    pub config: ValidatorConfig,
}

impl Default for Harness {
    fn default() -> Self {
        Harness {
            lookup: Arc::default(),
            matchers: Vec::new(),
            match_validator: Arc::new(ListValidator {
                mergeable: Vec::new(),
                side: Side::B,
            }),
            merge_engine: Arc::default(),
            fixer: Arc::default(),
            field_validator: Arc::default(),
            audit: Arc::default(),
            config: ValidatorConfig::default(),
        }
    }
}

impl Harness {
    pub fn with_matcher(mut self, kind: MatcherKind, script: Script) -> Self {
        self.matchers.push(Arc::new(ScriptedMatcher::new(kind, script)));
        self
    }

    pub fn merging(mut self, ids: &[&str], side: Side) -> Self {
        self.match_validator = Arc::new(ListValidator {
            mergeable: ids.iter().map(ToString::to_string).collect(),
            side,
        });
        self
    }

    pub fn failing_field_validation(mut self) -> Self {
        self.field_validator = Arc::new(VerdictFieldValidator {
            fail: true,
            calls: AtomicUsize::new(0),
        });
        self
    }

    pub fn failing_audit_log(mut self) -> Self {
        self.audit = Arc::new(MemoryAuditLog {
            items: Mutex::default(),
            fail: true,
        });
        self
    }

    pub fn validator(&self) -> Validator {
        let services = Collaborators {
            lookup: self.lookup.clone(),
            matchers: self
                .matchers
                .iter()
                .map(|m| m.clone() as Arc<dyn CandidateMatcher>)
                .collect(),
            match_validator: self.match_validator.clone(),
            merge_engine: self.merge_engine.clone(),
            fixer: self.fixer.clone(),
            field_validator: self.field_validator.clone(),
            audit: self.audit.clone(),
        };
        Validator::new(self.config.clone(), services)
    }

    pub fn matcher_calls(&self) -> Vec<usize> {
        self.matchers.iter().map(|m| m.calls()).collect()
    }

    pub fn field_validations(&self) -> usize {
        self.field_validator.calls.load(Ordering::SeqCst)
    }

    pub fn merges(&self) -> usize {
        self.merge_engine.requests.lock().unwrap().len()
    }
}
