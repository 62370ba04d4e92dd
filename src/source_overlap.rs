//! Source overlap guard for bulk imports.
//!
//! Import processes stamp each record they load with an `884` field: `$a`
//! names the conversion and `$k` holds a hash of the source record. When an
//! import brings a record whose source hash the database record already
//! carries, the same source version was loaded before and the update is
//! redundant.

use crate::config::ValidatorConfig;
use crate::record::Record;
use std::collections::HashSet;

/// Tag of the source description field.
pub const SOURCE_TAG: &str = "884";

/// Minimum length of a source hash in `884 $k`.
pub const MIN_HASH_LENGTH: usize = 64;

/// Decide whether an update from `cataloger_id` should proceed.
///
/// Returns `true` (no special handling) when the cataloger is not a configured
/// import source or either record lacks an `884` field. Returns `false` when
/// both records share a source hash for the cataloger's conversion.
#[must_use]
pub fn check_source_overlap(
    config: &ValidatorConfig,
    incoming: &Record,
    existing: &Record,
    cataloger_id: &str,
) -> bool {
    let Some(conversion) = config.import_sources.get(cataloger_id) else {
        return true;
    };
    if !incoming.has_field(SOURCE_TAG) || !existing.has_field(SOURCE_TAG) {
        return true;
    }

    let existing_hashes: HashSet<&str> = source_hashes(existing, conversion).collect();
    let overlapping = source_hashes(incoming, conversion).find(|hash| existing_hashes.contains(hash));

    match overlapping {
        Some(hash) => {
            tracing::debug!(cataloger = cataloger_id, hash, "source version already in database");
            false
        },
        None => true,
    }
}

/// Source hashes written by `conversion`.
fn source_hashes<'a>(record: &'a Record, conversion: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    record
        .fields_by_tag(SOURCE_TAG)
        .filter(move |f| f.subfields_by_code('a').any(|name| name == conversion))
        .flat_map(|f| f.subfields_by_code('k'))
        .filter(|hash| hash.len() >= MIN_HASH_LENGTH)
}
