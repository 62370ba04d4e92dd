//! Validation of MARC record structure and integrity.
//!
//! [`RecordStructureValidator`] checks the leader, tags, indicators and
//! subfield codes of a record, and that the record would still fit the
//! ISO 2709 length limits when written. [`StructureFieldValidator`] exposes
//! those checks as a [`FieldValidator`] for pipelines that have no richer
//! field validation service.

use crate::error::MarcError;
use crate::leader::{Leader, RecordKind};
use crate::record::Record;
use crate::services::{FieldValidation, FieldValidator};
use async_trait::async_trait;

type Result<T> = std::result::Result<T, MarcError>;

/// Validator for MARC record structure
#[derive(Debug)]
pub struct RecordStructureValidator;

impl RecordStructureValidator {
    /// Validate a leader's format and contents
    ///
    /// # Errors
    ///
    /// Returns `Err` if the leader is invalid according to MARC21 standards.
    pub fn validate_leader(leader: &Leader) -> Result<()> {
        // Record status (position 5)
        if !matches!(leader.record_status, 'a' | 'c' | 'd' | 'n' | 'p') {
            return Err(invalid_leader("record status", leader.record_status));
        }

        // Type of record (position 6)
        if !matches!(
            leader.record_type,
            'a' | 'c'
                | 'd'
                | 'e'
                | 'f'
                | 'g'
                | 'i'
                | 'j'
                | 'k'
                | 'm'
                | 'o'
                | 'p'
                | 'r'
                | 't'
                | 'u'
                | 'v'
                | 'x'
                | 'y'
                | 'z'
        ) {
            return Err(invalid_leader("type of record", leader.record_type));
        }

        // Bibliographic level (position 7), undefined outside bibliographic records
        if leader.record_kind() == RecordKind::Bibliographic
            && !matches!(
                leader.bibliographic_level,
                'a' | 'b' | 'c' | 'd' | 'i' | 'm' | 's'
            )
        {
            return Err(invalid_leader(
                "bibliographic level",
                leader.bibliographic_level,
            ));
        }

        // Character coding (position 9)
        if !matches!(leader.character_coding, ' ' | 'a') {
            return Err(invalid_leader("character coding", leader.character_coding));
        }

        if leader.indicator_count != 2 {
            return Err(MarcError::InvalidLeader(format!(
                "Invalid indicator count in leader: {} (expected 2)",
                leader.indicator_count
            )));
        }

        if leader.subfield_code_count != 2 {
            return Err(MarcError::InvalidLeader(format!(
                "Invalid subfield code count in leader: {} (expected 2)",
                leader.subfield_code_count
            )));
        }

        Ok(())
    }

    /// Validate tags, indicators and subfields of every field
    ///
    /// Data field tags may be numeric or local alphanumeric tags such as
    /// `LOW` and `CAT`; control field tags must be `001`-`009`.
    ///
    /// Returns every problem found, in field order.
    #[must_use]
    pub fn validate_fields(record: &Record) -> Vec<MarcError> {
        let mut problems = Vec::new();

        for control_field in &record.control_fields {
            let tag = &control_field.tag;
            if tag.len() != 3 || !tag.starts_with("00") || !tag.chars().all(|c| c.is_ascii_digit())
            {
                problems.push(MarcError::InvalidField(format!(
                    "Invalid control field tag: '{tag}'"
                )));
            }
        }

        for field in &record.fields {
            let tag = &field.tag;
            if tag.len() != 3 || !tag.chars().all(|c| c.is_ascii_alphanumeric()) || tag.starts_with("00")
            {
                problems.push(MarcError::InvalidField(format!(
                    "Invalid data field tag: '{tag}'"
                )));
            }
            if field.indicator1.is_control() || field.indicator2.is_control() {
                problems.push(MarcError::InvalidField(format!(
                    "Invalid indicator in field {tag}: control character"
                )));
            }
            if field.subfields.is_empty() {
                problems.push(MarcError::InvalidField(format!(
                    "Field {tag} has no subfields"
                )));
            }
            for subfield in &field.subfields {
                if !subfield.code.is_ascii_graphic() {
                    problems.push(MarcError::InvalidField(format!(
                        "Invalid subfield code in field {tag}: {:?}",
                        subfield.code
                    )));
                }
            }
        }

        problems
    }

    /// Validate a complete record structure
    ///
    /// Returns every problem found; an empty list means the record is well-formed.
    #[must_use]
    pub fn validate_record(record: &Record) -> Vec<MarcError> {
        let mut problems = Vec::new();

        if let Err(err) = Self::validate_leader(&record.leader) {
            problems.push(err);
        }

        if record.record_kind() == RecordKind::Bibliographic
            && record.get_control_field("008").is_none()
        {
            problems.push(MarcError::InvalidRecord(
                "Missing required control field 008 (Fixed-length data elements)".to_string(),
            ));
        }

        problems.extend(Self::validate_fields(record));

        if let Err(err) = Self::validate_directory_structure(record) {
            problems.push(err);
        }

        problems
    }

    /// Validate directory structure and field length consistency
    ///
    /// This validates that field lengths and positions would be consistent
    /// if the record were written to ISO 2709 format.
    ///
    /// # Errors
    ///
    /// Returns `Err` if directory structure is invalid.
    pub fn validate_directory_structure(record: &Record) -> Result<()> {
        // 12 bytes per directory entry + 1 for terminator
        let directory_length = record.field_count() * 12 + 1;

        let base_address = 24 + directory_length;
        if base_address > 99_999 {
            return Err(MarcError::InvalidRecord(format!(
                "Directory size would exceed maximum base address: {base_address}"
            )));
        }

        let mut total_length = base_address;
        for control_field in &record.control_fields {
            total_length += control_field.value.len() + 1;
        }
        for field in &record.fields {
            // indicators + (delimiter + code + value) per subfield + terminator
            total_length += 2
                + field
                    .subfields
                    .iter()
                    .map(|sf| 2 + sf.value.len())
                    .sum::<usize>()
                + 1;
        }
        // record terminator
        total_length += 1;

        if total_length > 99_999 {
            return Err(MarcError::InvalidRecord(format!(
                "Total record length would exceed maximum: {total_length}"
            )));
        }

        Ok(())
    }

    /// Check if the record structure is well-formed
    #[must_use]
    pub fn is_valid(record: &Record) -> bool {
        Self::validate_record(record).is_empty()
    }
}

fn invalid_leader(position: &str, value: char) -> MarcError {
    MarcError::InvalidLeader(format!("Invalid {position} in leader: '{value}'"))
}

/// [`FieldValidator`] backed by [`RecordStructureValidator`].
///
/// Never modifies the record.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructureFieldValidator;

#[async_trait]
impl FieldValidator for StructureFieldValidator {
    async fn validate(&self, record: Record) -> anyhow::Result<FieldValidation> {
        let messages: Vec<String> = RecordStructureValidator::validate_record(&record)
            .iter()
            .map(ToString::to_string)
            .collect();
        Ok(FieldValidation {
            record,
            failed: !messages.is_empty(),
            messages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Field;

    fn create_test_leader() -> Leader {
        Leader {
            record_length: 1000,
            record_status: 'n',
            record_type: 'a',
            bibliographic_level: 'm',
            control_record_type: ' ',
            character_coding: 'a',
            indicator_count: 2,
            subfield_code_count: 2,
            data_base_address: 500,
            encoding_level: ' ',
            cataloging_form: 'i',
            multipart_level: ' ',
            reserved: "4500".to_string(),
        }
    }

    fn create_test_record() -> Record {
        Record::builder(create_test_leader())
            .control_field_str("001", "000123456")
            .control_field_str("008", "240101s2024    fi ||||||||||||||||fin||")
            .field(
                Field::builder("245".to_string(), '1', '0')
                    .subfield_str('a', "Talvisota")
                    .build(),
            )
            .field(
                Field::builder("LOW".to_string(), ' ', ' ')
                    .subfield_str('a', "HELKA")
                    .build(),
            )
            .build()
    }

    #[test]
    fn test_validate_leader_valid_bibliographic() {
        assert!(RecordStructureValidator::validate_leader(&create_test_leader()).is_ok());
    }

    #[test]
    fn test_validate_leader_invalid_record_status() {
        let mut leader = create_test_leader();
        leader.record_status = 'x';
        assert!(matches!(
            RecordStructureValidator::validate_leader(&leader),
            Err(MarcError::InvalidLeader(_))
        ));
    }

    #[test]
    fn test_validate_leader_invalid_type_of_record() {
        let mut leader = create_test_leader();
        leader.record_type = 'b';
        assert!(RecordStructureValidator::validate_leader(&leader).is_err());
    }

    #[test]
    fn test_bibliographic_level_only_checked_for_bibliographic_records() {
        let mut leader = create_test_leader();
        leader.bibliographic_level = ' ';
        assert!(RecordStructureValidator::validate_leader(&leader).is_err());

        leader.record_type = 'z';
        assert!(RecordStructureValidator::validate_leader(&leader).is_ok());
    }

    #[test]
    fn test_validate_leader_invalid_indicator_count() {
        let mut leader = create_test_leader();
        leader.indicator_count = 3;
        assert!(RecordStructureValidator::validate_leader(&leader).is_err());
    }

    #[test]
    fn test_validate_record_valid() {
        let record = create_test_record();
        assert!(RecordStructureValidator::validate_record(&record).is_empty());
        assert!(RecordStructureValidator::is_valid(&record));
    }

    #[test]
    fn test_validate_record_missing_008() {
        let mut record = create_test_record();
        record.control_fields.retain(|cf| cf.tag != "008");
        let problems = RecordStructureValidator::validate_record(&record);
        assert_eq!(problems.len(), 1);
        assert!(matches!(problems[0], MarcError::InvalidRecord(_)));
    }

    #[test]
    fn test_authority_record_needs_no_008() {
        let mut leader = create_test_leader();
        leader.record_type = 'z';
        let record = Record::builder(leader)
            .field(
                Field::builder("100".to_string(), '1', ' ')
                    .subfield_str('a', "Sibelius, Jean")
                    .build(),
            )
            .build();
        assert!(RecordStructureValidator::is_valid(&record));
    }

    #[test]
    fn test_all_field_problems_are_reported() {
        let mut record = create_test_record();
        record.add_control_field_str("0X1", "bad");
        record.add_field(Field::new("5!0".to_string(), ' ', ' '));
        record.add_field(
            Field::builder("650".to_string(), '\u{1}', ' ')
                .subfield_str(' ', "bad code")
                .build(),
        );

        let problems = RecordStructureValidator::validate_fields(&record);
        // bad control tag, bad data tag, empty field, control indicator, bad code
        assert_eq!(problems.len(), 5);
    }

    #[test]
    fn test_validate_directory_structure_excessive_length() {
        let mut record = create_test_record();
        record.add_field(
            Field::builder("500".to_string(), ' ', ' ')
                .subfield_str('a', &"x".repeat(100_000))
                .build(),
        );
        assert!(RecordStructureValidator::validate_directory_structure(&record).is_err());
    }

    #[tokio::test]
    async fn test_field_validator_reports_messages() {
        let validator = StructureFieldValidator;

        let ok = validator.validate(create_test_record()).await.unwrap();
        assert!(!ok.failed);
        assert!(ok.messages.is_empty());

        let mut record = create_test_record();
        record.control_fields.clear();
        let failed = validator.validate(record).await.unwrap();
        assert!(failed.failed);
        assert_eq!(failed.messages.len(), 1);
        assert!(failed.messages[0].contains("008"));
    }
}
