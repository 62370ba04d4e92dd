//! MARC bibliographic record structures.
//!
//! This module provides the record types the validation pipeline works on:
//! - [`Record`] — leader plus ordered control and data fields
//! - [`ControlField`] — fields 001-009 (tag and value, no subfields)
//! - [`Field`] — data fields (010+ and alphabetic local tags such as `LOW` or `CAT`)
//! - [`Subfield`] — named data elements within fields
//!
//! Field order is significant: two records with the same fields in a different
//! order are different records. Guards compare records by value and never mutate
//! them.
//!
//! # Examples
//!
//! ```
//! use mrrv::{Field, Leader, Record};
//!
//! let leader: Leader = "00000cam a2200000 i 4500".parse().unwrap();
//! let record = Record::builder(leader)
//!     .control_field_str("001", "000123456")
//!     .field(
//!         Field::builder("245".to_string(), '1', '0')
//!             .subfield_str('a', "Title")
//!             .build(),
//!     )
//!     .build();
//!
//! assert_eq!(record.title(), Some("Title"));
//! ```

use crate::leader::{Leader, RecordKind};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A MARC bibliographic record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Record leader (24 characters)
    pub leader: Leader,
    /// Control fields (001-009) in record order
    pub control_fields: Vec<ControlField>,
    /// Data fields in record order
    pub fields: Vec<Field>,
}

/// A control field in a MARC record (fields 001-009)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlField {
    /// Field tag (3 characters)
    pub tag: String,
    /// Field data
    pub value: String,
}

/// A data field in a MARC record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field tag (3 characters)
    pub tag: String,
    /// First indicator
    pub indicator1: char,
    /// Second indicator
    pub indicator2: char,
    /// Subfields (stored in `SmallVec` to avoid allocation for typical fields with 4 or fewer subfields)
    pub subfields: SmallVec<[Subfield; 4]>,
}

/// A subfield within a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfield {
    /// Subfield code (single character)
    pub code: char,
    /// Subfield value
    pub value: String,
}

impl Record {
    /// Create a new MARC record with the given leader
    #[must_use]
    pub fn new(leader: Leader) -> Self {
        Record {
            leader,
            control_fields: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Create a builder for fluently constructing MARC records
    #[must_use]
    pub fn builder(leader: Leader) -> RecordBuilder {
        RecordBuilder {
            record: Record::new(leader),
        }
    }

    /// Append a control field (001-009)
    pub fn add_control_field(&mut self, tag: String, value: String) {
        self.control_fields.push(ControlField { tag, value });
    }

    /// Append a control field using string slices
    pub fn add_control_field_str(&mut self, tag: &str, value: &str) {
        self.add_control_field(tag.to_string(), value.to_string());
    }

    /// Get the first value of a control field
    #[must_use]
    pub fn get_control_field(&self, tag: &str) -> Option<&str> {
        self.control_fields
            .iter()
            .find(|cf| cf.tag == tag)
            .map(|cf| cf.value.as_str())
    }

    /// Append a data field
    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Get first field with a given tag
    #[must_use]
    pub fn get_field(&self, tag: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.tag == tag)
    }

    /// Iterate over fields matching a specific tag, in record order
    pub fn fields_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Field> + 'a {
        self.fields.iter().filter(move |f| f.tag == tag)
    }

    /// Whether the record has at least one data field with the given tag
    #[must_use]
    pub fn has_field(&self, tag: &str) -> bool {
        self.fields.iter().any(|f| f.tag == tag)
    }

    /// Values of a subfield code across all fields with the given tag
    pub fn subfield_values<'a>(
        &'a self,
        tag: &'a str,
        code: char,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.fields_by_tag(tag)
            .flat_map(move |f| f.subfields_by_code(code))
    }

    /// Total number of control and data fields
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.control_fields.len() + self.fields.len()
    }

    // ============================================================================
    // Helper methods for common bibliographic fields
    // ============================================================================

    /// Get the control number (system number) from field 001
    #[must_use]
    pub fn control_number(&self) -> Option<&str> {
        self.get_control_field("001")
    }

    /// Get the main title from field 245, subfield 'a'
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.get_field("245").and_then(|f| f.get_subfield('a'))
    }

    /// Get all ISBNs from field 020, subfield 'a'
    #[must_use]
    pub fn isbns(&self) -> Vec<&str> {
        self.subfield_values("020", 'a').collect()
    }

    /// Get all ISSNs from field 022, subfield 'a'
    #[must_use]
    pub fn issns(&self) -> Vec<&str> {
        self.subfield_values("022", 'a').collect()
    }

    /// Standard identifiers (ISBN, ISSN, other standard identifiers from 024)
    #[must_use]
    pub fn standard_identifiers(&self) -> Vec<String> {
        self.isbns()
            .into_iter()
            .chain(self.issns())
            .chain(self.subfield_values("024", 'a'))
            .map(ToString::to_string)
            .collect()
    }

    /// Record class derived from the leader
    #[must_use]
    pub fn record_kind(&self) -> RecordKind {
        self.leader.record_kind()
    }

    /// Check whether the record is marked deleted
    ///
    /// A record is deleted when leader position 5 is `d`, when it carries a
    /// `DEL` field, or when `STA $a` is `DELETED`.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.leader.is_deleted()
            || self.has_field("DEL")
            || self
                .subfield_values("STA", 'a')
                .any(|v| v.eq_ignore_ascii_case("DELETED"))
    }
}

/// Builder for fluently constructing MARC records
#[derive(Debug)]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    /// Add a control field to the record being built
    #[must_use]
    pub fn control_field(mut self, tag: String, value: String) -> Self {
        self.record.add_control_field(tag, value);
        self
    }

    /// Add a control field using string slices
    #[must_use]
    pub fn control_field_str(mut self, tag: &str, value: &str) -> Self {
        self.record.add_control_field_str(tag, value);
        self
    }

    /// Add a data field to the record being built
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.record.add_field(field);
        self
    }

    /// Build the record
    #[must_use]
    pub fn build(self) -> Record {
        self.record
    }
}

impl Field {
    /// Create a new data field
    #[must_use]
    pub fn new(tag: String, indicator1: char, indicator2: char) -> Self {
        Field {
            tag,
            indicator1,
            indicator2,
            subfields: SmallVec::new(),
        }
    }

    /// Create a builder for constructing fields fluently
    ///
    /// # Examples
    ///
    /// ```
    /// use mrrv::Field;
    ///
    /// let field = Field::builder("LOW".to_string(), ' ', ' ')
    ///     .subfield_str('a', "HELKA")
    ///     .build();
    /// assert_eq!(field.get_subfield('a'), Some("HELKA"));
    /// ```
    #[must_use]
    pub fn builder(tag: String, indicator1: char, indicator2: char) -> FieldBuilder {
        FieldBuilder {
            field: Field::new(tag, indicator1, indicator2),
        }
    }

    /// Add a subfield
    pub fn add_subfield(&mut self, code: char, value: String) {
        self.subfields.push(Subfield { code, value });
    }

    /// Add a subfield using a string slice
    pub fn add_subfield_str(&mut self, code: char, value: &str) {
        self.add_subfield(code, value.to_string());
    }

    /// Get first value for a subfield code
    #[must_use]
    pub fn get_subfield(&self, code: char) -> Option<&str> {
        self.subfields
            .iter()
            .find(|sf| sf.code == code)
            .map(|sf| sf.value.as_str())
    }

    /// Iterate over subfields with a specific code
    pub fn subfields_by_code(&self, code: char) -> impl Iterator<Item = &str> {
        self.subfields
            .iter()
            .filter(move |sf| sf.code == code)
            .map(|sf| sf.value.as_str())
    }
}

/// Builder for fluently constructing MARC fields
#[derive(Debug)]
pub struct FieldBuilder {
    field: Field,
}

impl FieldBuilder {
    /// Add a subfield to the field being built
    #[must_use]
    pub fn subfield(mut self, code: char, value: String) -> Self {
        self.field.add_subfield(code, value);
        self
    }

    /// Add a subfield using a string slice
    #[must_use]
    pub fn subfield_str(mut self, code: char, value: &str) -> Self {
        self.field.add_subfield_str(code, value);
        self
    }

    /// Build the field
    #[must_use]
    pub fn build(self) -> Field {
        self.field
    }
}
