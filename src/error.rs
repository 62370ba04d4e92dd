//! Error types for record validation.
//!
//! This module provides two error types:
//! - [`MarcError`] for malformed record data (leader, fields, structure)
//! - [`ValidationError`] for every way the validation pipeline can refuse a record
//!
//! [`ValidationError`] carries a status class rather than a type hierarchy, so a
//! caller can render a protocol-specific response from [`ValidationError::status`],
//! the message and [`ValidationError::ids`].
//!
//! [`Rejection`] is what the pipeline hands back: the error together with the
//! metadata of the record it refused.

use thiserror::Error;

use crate::headers::RecordMetadata;

/// Error type for malformed MARC record data.
#[derive(Error, Debug)]
pub enum MarcError {
    /// Error indicating an invalid or malformed MARC record.
    #[error("Invalid MARC record: {0}")]
    InvalidRecord(String),

    /// Error indicating an invalid leader (24-character header).
    #[error("Invalid leader: {0}")]
    InvalidLeader(String),

    /// Error indicating an invalid field structure.
    #[error("Invalid field: {0}")]
    InvalidField(String),
}

/// Error type for the validation pipeline.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The request is missing something it requires (e.g. the target id of an update).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The cataloger is not allowed to make the requested ownership change.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The record conflicts with the database state.
    ///
    /// Used for modification history mismatches, unresolved duplicates and
    /// untrustworthy zero-match results.
    #[error("Conflict: {message}")]
    Conflict {
        /// Human-readable description
        message: String,
        /// Offending record ids, if any
        ids: Vec<String>,
    },

    /// The existing record is unknown or deleted.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The record cannot be processed reliably.
    #[error("Unprocessable entity: {message}")]
    Unprocessable {
        /// Human-readable description
        message: String,
        /// Offending record ids, if any
        ids: Vec<String>,
    },

    /// The pipeline is misconfigured.
    #[error("Internal error: {0}")]
    Internal(String),

    /// A collaborator failed in a way the pipeline does not classify.
    #[error("Upstream failure: {0}")]
    Upstream(#[from] anyhow::Error),

    /// Record data itself is malformed.
    #[error(transparent)]
    Record(#[from] MarcError),
}

impl ValidationError {
    /// Build a [`ValidationError::Conflict`] without ids.
    pub fn conflict(message: impl Into<String>) -> Self {
        ValidationError::Conflict {
            message: message.into(),
            ids: Vec::new(),
        }
    }

    /// Build a [`ValidationError::Unprocessable`] without ids.
    pub fn unprocessable(message: impl Into<String>) -> Self {
        ValidationError::Unprocessable {
            message: message.into(),
            ids: Vec::new(),
        }
    }

    /// HTTP-style status code for this failure class.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            ValidationError::BadRequest(_) => 400,
            ValidationError::Forbidden(_) => 403,
            ValidationError::NotFound(_) => 404,
            ValidationError::Conflict { .. } => 409,
            ValidationError::Unprocessable { .. } | ValidationError::Record(_) => 422,
            ValidationError::Internal(_) | ValidationError::Upstream(_) => 500,
        }
    }

    /// Record ids attached to the failure (duplicates, unconvertible candidates).
    #[must_use]
    pub fn ids(&self) -> &[String] {
        match self {
            ValidationError::Conflict { ids, .. } | ValidationError::Unprocessable { ids, .. } => {
                ids
            },
            _ => &[],
        }
    }
}

/// A record refused by the validation pipeline.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct Rejection {
    /// Why the record was refused
    #[source]
    pub error: ValidationError,
    /// Metadata of the refused record (control number, title, standard ids)
    pub record_metadata: RecordMetadata,
}

impl Rejection {
    /// Pair an error with the metadata of the record it refers to.
    #[must_use]
    pub fn new(error: ValidationError, record_metadata: RecordMetadata) -> Self {
        Rejection {
            error,
            record_metadata,
        }
    }

    /// Status code of the underlying error.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.error.status()
    }

    /// Record ids attached to the underlying error.
    #[must_use]
    pub fn ids(&self) -> &[String] {
        self.error.ids()
    }
}

/// Convenience type alias for [`std::result::Result`] with [`ValidationError`].
pub type Result<T> = std::result::Result<T, ValidationError>;
