//! Ownership (`LOW` tag) authorization guard.
//!
//! Every library holding a copy of a shared record marks it with a `LOW` field
//! whose `$a` is the library's ownership tag. A cataloger may only add or
//! remove the tags listed in their authorization; tags they leave untouched
//! need no authorization.

use crate::config::ValidatorConfig;
use crate::error::{Result, ValidationError};
use crate::record::Record;
use std::collections::BTreeSet;

/// Tag of the ownership field.
pub const OWNERSHIP_TAG: &str = "LOW";

/// Outcome of a guard that may be switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    /// The guard ran and passed
    Passed,
    /// The guard is disabled by configuration
    Skipped,
}

/// Ownership tags of a record: `LOW $a` values, trimmed and upper-cased.
#[must_use]
pub fn ownership_tags(record: &Record) -> BTreeSet<String> {
    normalize_tags(record.subfield_values(OWNERSHIP_TAG, 'a'))
}

fn normalize_tags<'a, I>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    tags.into_iter()
        .map(|tag| tag.trim().to_uppercase())
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Check that the cataloger may make the ownership changes in `incoming`.
///
/// Without an existing record, every tag of the incoming record must be in
/// `own_tags`. With an existing record, only the tags added or removed (the
/// symmetric difference) must be.
///
/// # Errors
///
/// Returns [`ValidationError::Forbidden`] naming the unauthorized tags.
pub fn check_ownership(
    config: &ValidatorConfig,
    own_tags: &[String],
    incoming: &Record,
    existing: Option<&Record>,
) -> Result<GuardOutcome> {
    if !config.validate_owner_changes {
        return Ok(GuardOutcome::Skipped);
    }

    let own = normalize_tags(own_tags.iter().map(String::as_str));
    let incoming_tags = ownership_tags(incoming);

    let changed: BTreeSet<String> = match existing {
        None => incoming_tags,
        Some(existing) => {
            let existing_tags = ownership_tags(existing);
            incoming_tags
                .symmetric_difference(&existing_tags)
                .cloned()
                .collect()
        },
    };

    let unauthorized: Vec<&str> = changed
        .iter()
        .filter(|tag| !own.contains(*tag))
        .map(String::as_str)
        .collect();

    if unauthorized.is_empty() {
        Ok(GuardOutcome::Passed)
    } else {
        Err(ValidationError::Forbidden(format!(
            "Own authorization tags do not cover changed ownership tags: {}",
            unauthorized.join(", ")
        )))
    }
}
