//! Audit log items written by the pipeline.
//!
//! Items are serde-serializable so the sink can store them as JSON. Writing an
//! item never fails the business outcome: [`write_best_effort`] logs sink
//! errors and carries on.

use crate::headers::{Headers, Operation, RecordMetadata};
use crate::matching::MatcherReport;
use crate::record::Record;
use crate::services::{AuditLog, Preference};
use serde::{Deserialize, Serialize};

/// Fields shared by every log item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogContext {
    /// Correlation id of the request
    pub correlation_id: String,
    /// Cataloger who submitted the record
    pub cataloger: String,
    /// Metadata of the incoming record
    pub record_metadata: RecordMetadata,
}

impl LogContext {
    /// Context taken from request headers.
    #[must_use]
    pub fn from_headers(headers: &Headers) -> Self {
        LogContext {
            correlation_id: headers.correlation_id.clone(),
            cataloger: headers.cataloger.id.clone(),
            record_metadata: headers.record_metadata.clone(),
        }
    }
}

/// One audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "logItemType",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum LogItem {
    /// Outcome of duplicate matching
    MatchLog {
        /// Request context
        #[serde(flatten)]
        context: LogContext,
        /// Ids of the records matched
        matched_ids: Vec<String>,
        /// One report per matcher invocation, in invocation order
        matcher_reports: Vec<MatcherReport>,
    },
    /// A merge performed by the pipeline
    MergeLog {
        /// Request context
        #[serde(flatten)]
        context: LogContext,
        /// Id of the database record merged with
        target_id: String,
        /// Which side won
        preference: Preference,
        /// Merge base
        base: Record,
        /// Merge source
        source: Record,
        /// Merge result after fixes
        merged: Record,
    },
    /// The record as it leaves the pipeline
    RecordLog {
        /// Request context
        #[serde(flatten)]
        context: LogContext,
        /// Disposition of the record
        operation: Operation,
        /// Target record id, absent for a plain create
        id: Option<String>,
        /// Record to write
        record: Record,
    },
}

/// Write an item, logging and swallowing sink failures.
pub async fn write_best_effort(audit: &dyn AuditLog, item: LogItem) {
    if let Err(err) = audit.add_log_item(item).await {
        tracing::warn!("audit log write failed, continuing: {err:#}");
    }
}
