//! Modification history (`CAT`) guard.
//!
//! Each save of a shared record appends a `CAT` field naming the cataloger and
//! time. An incoming update must carry exactly the `CAT` fields of the record
//! it was based on; otherwise someone else saved the record in between and the
//! update would silently overwrite their work.

use crate::error::{Result, ValidationError};
use crate::record::{Field, Record};

/// Tag of the modification history field.
pub const MODIFICATION_HISTORY_TAG: &str = "CAT";

/// Check that `incoming` carries the same modification history as `existing`.
///
/// Fields are compared one by one in record order: tag, both indicators and
/// every subfield.
///
/// # Errors
///
/// Returns [`ValidationError::Conflict`] on any difference.
pub fn check_modification_history(incoming: &Record, existing: &Record) -> Result<()> {
    let incoming_history: Vec<&Field> = incoming.fields_by_tag(MODIFICATION_HISTORY_TAG).collect();
    let existing_history: Vec<&Field> = existing.fields_by_tag(MODIFICATION_HISTORY_TAG).collect();

    if incoming_history == existing_history {
        return Ok(());
    }

    tracing::debug!(
        incoming = incoming_history.len(),
        existing = existing_history.len(),
        "modification history mismatch"
    );
    Err(ValidationError::conflict(format!(
        "Modification history mismatch ({MODIFICATION_HISTORY_TAG})"
    )))
}
