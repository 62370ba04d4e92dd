//! Per-request metadata travelling with each incoming record.
//!
//! Headers arrive with the record (usually deserialized from a queue message)
//! and leave the pipeline describing what happened to it: `operation` reflects
//! the final disposition, `id` names the target record and the notes carry a
//! human-readable trail.

use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Requested operation on input, actual disposition on output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    /// Create a new record
    Create,
    /// Update an existing record
    Update,
    /// Update skipped because the record did not change
    SkippedChange,
    /// Update skipped because the database already holds this source version
    SkippedUpdate,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Create => "CREATE",
            Operation::Update => "UPDATE",
            Operation::SkippedChange => "SKIPPED_CHANGE",
            Operation::SkippedUpdate => "SKIPPED_UPDATE",
        };
        f.write_str(name)
    }
}

/// The user or import process submitting the record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cataloger {
    /// Cataloger id (user name or import-process id)
    pub id: String,
    /// Ownership tags this cataloger may add or remove
    #[serde(default)]
    pub authorization: Vec<String>,
}

/// Record fix requested together with an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FixType {
    /// Restore a deleted record
    Undel,
    /// Mark a record deleted
    Delet,
}

/// Switches controlling what the pipeline does with a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSettings {
    /// Search the database for duplicates before creating
    #[serde(default)]
    pub unique: bool,
    /// Merge with a matching (or the existing) record
    #[serde(default)]
    pub merge: bool,
    /// Run generic field validation
    #[serde(default = "default_true")]
    pub validate: bool,
    /// Turn updates without content changes into `SKIPPED_CHANGE`
    #[serde(default)]
    pub skip_no_change_updates: bool,
    /// Fix applied together with the update
    #[serde(default)]
    pub fix_type: Option<FixType>,
    /// Priority (interactive) request rather than bulk
    #[serde(default)]
    pub prio: bool,
}

impl Default for OperationSettings {
    fn default() -> Self {
        OperationSettings {
            unique: false,
            merge: false,
            validate: true,
            skip_no_change_updates: false,
            fix_type: None,
            prio: false,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Tracing metadata about the incoming record, used for audit correlation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    /// Identifier of the record in its source system
    #[serde(default)]
    pub source_id: Option<String>,
    /// Position of the record inside its bulk blob
    #[serde(default)]
    pub blob_sequence: Option<u64>,
    /// Title of the record
    #[serde(default)]
    pub title: Option<String>,
    /// ISBN/ISSN/other standard identifiers
    #[serde(default)]
    pub standard_identifiers: Vec<String>,
}

impl RecordMetadata {
    /// Collect metadata from a record.
    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        RecordMetadata {
            source_id: record.control_number().map(ToString::to_string),
            blob_sequence: None,
            title: record.title().map(ToString::to_string),
            standard_identifiers: record.standard_identifiers(),
        }
    }
}

/// Request headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Headers {
    /// Requested operation / final disposition
    pub operation: Operation,
    /// Target record id (required for updates)
    #[serde(default)]
    pub id: Option<String>,
    /// Submitting cataloger
    #[serde(default)]
    pub cataloger: Cataloger,
    /// Operation switches
    #[serde(default)]
    pub operation_settings: OperationSettings,
    /// Audit metadata
    #[serde(default)]
    pub record_metadata: RecordMetadata,
    #[serde(default)]
    notes: Vec<String>,
    /// Correlation id of the request (job id)
    #[serde(default)]
    pub correlation_id: String,
}

impl Headers {
    /// Headers for a fresh request with default settings.
    #[must_use]
    pub fn new(operation: Operation, cataloger: Cataloger) -> Self {
        Headers {
            operation,
            id: None,
            cataloger,
            operation_settings: OperationSettings::default(),
            record_metadata: RecordMetadata::default(),
            notes: Vec::new(),
            correlation_id: String::new(),
        }
    }

    /// Append a note to the trail.
    pub fn push_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    /// Notes accumulated so far, oldest first.
    #[must_use]
    pub fn notes(&self) -> &[String] {
        &self.notes
    }
}
