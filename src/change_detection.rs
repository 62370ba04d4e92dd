//! Detection of updates that change nothing.
//!
//! Records fetched from the database and records coming back from catalogers
//! differ in ways that carry no meaning: binary leader positions, the `005`
//! timestamp, empty subfields and the relative order of administrative fields.
//! [`normalize_for_comparison`] removes those differences; anything left over
//! is a real change.

use crate::record::{ControlField, Field, Record};

/// Local administrative tags: cataloger history, ownership, source ids.
pub const ADMINISTRATIVE_TAGS: [&str; 3] = ["CAT", "LOW", "SID"];

/// Tag of the latest-transaction timestamp control field.
pub const TIMESTAMP_TAG: &str = "005";

/// Value the first `005` is replaced with before comparison.
pub const TIMESTAMP_SENTINEL: &str = "00000000000000.0";

/// Result of change detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDetection {
    /// The incoming record differs from the existing one
    Changed,
    /// The records are equivalent; the update would be a no-op
    Unchanged,
    /// Detection is disabled for this request
    Skipped,
}

/// Whether a tag is one of [`ADMINISTRATIVE_TAGS`].
#[must_use]
pub fn is_administrative(tag: &str) -> bool {
    ADMINISTRATIVE_TAGS.contains(&tag)
}

/// Compare an incoming record with the existing one.
#[must_use]
pub fn detect_no_op_change(incoming: &Record, existing: &Record, enabled: bool) -> ChangeDetection {
    if !enabled {
        return ChangeDetection::Skipped;
    }

    if content_field_count(incoming) != content_field_count(existing) {
        return ChangeDetection::Changed;
    }

    if normalize_for_comparison(incoming) == normalize_for_comparison(existing) {
        ChangeDetection::Unchanged
    } else {
        ChangeDetection::Changed
    }
}

fn content_field_count(record: &Record) -> usize {
    record.control_fields.len()
        + record
            .fields
            .iter()
            .filter(|f| !is_administrative(&f.tag))
            .count()
}

/// Normalized copy of a record for equality comparison.
///
/// - leader record length and base address are zeroed
/// - the first `005` gets [`TIMESTAMP_SENTINEL`] as its value
/// - empty subfields are dropped, and data fields left without subfields
/// - administrative fields are stably sorted by tag among themselves; every
///   other field keeps its position
#[must_use]
pub fn normalize_for_comparison(record: &Record) -> Record {
    let timestamp_slot = record
        .control_fields
        .iter()
        .position(|cf| cf.tag == TIMESTAMP_TAG);
    let control_fields = record
        .control_fields
        .iter()
        .enumerate()
        .map(|(i, cf)| {
            if Some(i) == timestamp_slot {
                ControlField {
                    tag: cf.tag.clone(),
                    value: TIMESTAMP_SENTINEL.to_string(),
                }
            } else {
                cf.clone()
            }
        })
        .collect();

    let fields: Vec<Field> = record
        .fields
        .iter()
        .filter_map(without_empty_subfields)
        .collect();

    Record {
        leader: record.leader.without_binary_positions(),
        control_fields,
        fields: sort_administrative_fields(fields),
    }
}

fn without_empty_subfields(field: &Field) -> Option<Field> {
    let mut field = field.clone();
    field.subfields.retain(|sf| !sf.value.is_empty());
    if field.subfields.is_empty() {
        None
    } else {
        Some(field)
    }
}

/// Sort administrative fields by tag while leaving other fields in place.
///
/// The slots occupied by administrative fields are refilled, in order, with
/// the administrative fields sorted by tag. Fields sharing a tag are ordered
/// by indicators and subfields so that any permutation sorts the same way.
fn sort_administrative_fields(mut fields: Vec<Field>) -> Vec<Field> {
    let slots: Vec<usize> = fields
        .iter()
        .enumerate()
        .filter(|(_, f)| is_administrative(&f.tag))
        .map(|(i, _)| i)
        .collect();

    let mut administrative: Vec<Field> = slots.iter().map(|&i| fields[i].clone()).collect();
    administrative.sort_by(|a, b| {
        a.tag
            .cmp(&b.tag)
            .then_with(|| (a.indicator1, a.indicator2).cmp(&(b.indicator1, b.indicator2)))
            .then_with(|| subfield_key(a).cmp(&subfield_key(b)))
    });

    for (slot, field) in slots.into_iter().zip(administrative) {
        fields[slot] = field;
    }
    fields
}

fn subfield_key(field: &Field) -> Vec<(char, &str)> {
    field
        .subfields
        .iter()
        .map(|sf| (sf.code, sf.value.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leader::Leader;

    fn field(tag: &str, code: char, value: &str) -> Field {
        Field::builder(tag.to_string(), ' ', ' ')
            .subfield_str(code, value)
            .build()
    }

    fn base_record(leader: &str, timestamp: &str) -> Record {
        let leader: Leader = leader.parse().unwrap();
        Record::builder(leader)
            .control_field_str("005", timestamp)
            .control_field_str("008", "240101s2024    fi ||||||||||||||||fin||")
            .field(field("245", 'a', "Title"))
            .field(field("LOW", 'a', "HELKA"))
            .field(field("CAT", 'a', "LOAD"))
            .field(field("650", 'a', "Subject"))
            .build()
    }

    #[test]
    fn test_disabled_detection_is_skipped() {
        let record = base_record("00714cam a2200205 a 4500", "20240101000000.0");
        assert_eq!(
            detect_no_op_change(&record, &record, false),
            ChangeDetection::Skipped
        );
    }

    #[test]
    fn test_identical_records_unchanged() {
        let record = base_record("00714cam a2200205 a 4500", "20240101000000.0");
        assert_eq!(
            detect_no_op_change(&record, &record.clone(), true),
            ChangeDetection::Unchanged
        );
    }

    #[test]
    fn test_binary_leader_and_timestamp_ignored() {
        let incoming = base_record("00000cam a2200000 a 4500", "19990101000000.0");
        let existing = base_record("00714cam a2200205 a 4500", "20240101000000.0");
        assert_eq!(
            detect_no_op_change(&incoming, &existing, true),
            ChangeDetection::Unchanged
        );
    }

    #[test]
    fn test_administrative_order_ignored() {
        let incoming = base_record("00714cam a2200205 a 4500", "20240101000000.0");
        let mut existing = incoming.clone();
        // LOW (index 1) and CAT (index 2) swap places
        existing.fields.swap(1, 2);
        assert_eq!(
            detect_no_op_change(&incoming, &existing, true),
            ChangeDetection::Unchanged
        );
    }

    #[test]
    fn test_same_tag_administrative_permutation_ignored() {
        let incoming = base_record("00714cam a2200205 a 4500", "20240101000000.0");
        let mut existing = incoming.clone();
        existing.fields.insert(2, field("LOW", 'a', "TAMK"));
        let mut reordered = existing.clone();
        reordered.fields.swap(1, 2);
        assert_eq!(
            detect_no_op_change(&reordered, &existing, true),
            ChangeDetection::Unchanged
        );
    }

    #[test]
    fn test_content_order_matters() {
        let incoming = base_record("00714cam a2200205 a 4500", "20240101000000.0");
        let mut existing = incoming.clone();
        // 245 (index 0) and 650 (index 3) swap places
        existing.fields.swap(0, 3);
        assert_eq!(
            detect_no_op_change(&incoming, &existing, true),
            ChangeDetection::Changed
        );
    }

    #[test]
    fn test_added_field_is_change() {
        let existing = base_record("00714cam a2200205 a 4500", "20240101000000.0");
        let mut incoming = existing.clone();
        incoming.add_field(field("500", 'a', "A note"));
        assert_eq!(
            detect_no_op_change(&incoming, &existing, true),
            ChangeDetection::Changed
        );
    }

    #[test]
    fn test_changed_subfield_value_is_change() {
        let existing = base_record("00714cam a2200205 a 4500", "20240101000000.0");
        let mut incoming = existing.clone();
        incoming.fields[0].subfields[0].value = "Another title".to_string();
        assert_eq!(
            detect_no_op_change(&incoming, &existing, true),
            ChangeDetection::Changed
        );
    }

    #[test]
    fn test_empty_subfields_ignored() {
        let existing = base_record("00714cam a2200205 a 4500", "20240101000000.0");
        let mut incoming = existing.clone();
        incoming.fields[3].add_subfield_str('x', "");
        assert_eq!(
            detect_no_op_change(&incoming, &existing, true),
            ChangeDetection::Unchanged
        );
    }

    #[test]
    fn test_timestamp_after_control_number_ignored() {
        let leader: Leader = "00714cam a2200205 a 4500".parse().unwrap();
        let a = Record::builder(leader.clone())
            .control_field_str("001", "000123")
            .control_field_str("005", "20240101000000.0")
            .build();
        let b = Record::builder(leader)
            .control_field_str("001", "000123")
            .control_field_str("005", "20250101000000.0")
            .build();
        assert_eq!(detect_no_op_change(&a, &b, true), ChangeDetection::Unchanged);
    }
}
