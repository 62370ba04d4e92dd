//! MARC record leader parsing and comparison.
//!
//! The MARC leader is a 24-character fixed-length field at the start of every MARC record.
//! It contains metadata describing the record's structure, content type, and encoding.
//!
//! # Structure
//!
//! - Positions 0-4: Record length (5 digits)
//! - Position 5: Record status (d = deleted)
//! - Position 6: Record type (a = language material, z = authority, etc.)
//! - Position 7: Bibliographic level (m = monograph, s = serial, etc.)
//! - Position 8: Control record type
//! - Position 9: Character coding (space = MARC-8, a = UTF-8)
//! - Position 10: Indicator count (usually 2)
//! - Position 11: Subfield code count (usually 2)
//! - Positions 12-16: Base address of data (5 digits)
//! - Positions 17-19: Encoding level, cataloging form, multipart level
//! - Positions 20-23: Reserved (usually "4500")
//!
//! Positions 0-4 and 12-16 only describe the binary ISO 2709 layout. They carry
//! no cataloging content, so [`Leader::without_binary_positions`] zeroes them
//! before two records are compared.

use crate::error::MarcError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// MARC Leader - 24 characters at the start of every MARC record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leader {
    /// Record length (5 digits) - positions 0-4
    pub record_length: u32,
    /// Record status (1 char) - position 5
    pub record_status: char,
    /// Type of record (1 char) - position 6
    pub record_type: char,
    /// Bibliographic level (1 char) - position 7
    pub bibliographic_level: char,
    /// Type of control record (1 char) - position 8
    pub control_record_type: char,
    /// Character coding scheme (1 char) - position 9
    pub character_coding: char,
    /// Indicator count (1 digit) - position 10 (usually 2)
    pub indicator_count: u8,
    /// Subfield code count (1 digit) - position 11 (usually 2)
    pub subfield_code_count: u8,
    /// Base address of data (5 digits) - positions 12-16
    pub data_base_address: u32,
    /// Encoding level (1 char) - position 17
    pub encoding_level: char,
    /// Cataloging form (1 char) - position 18
    pub cataloging_form: char,
    /// Multipart resource record level (1 char) - position 19
    pub multipart_level: char,
    /// Reserved (4 chars) - positions 20-23
    pub reserved: String,
}

/// Broad class of a record, derived from leader position 6.
///
/// Merge reducers are configured per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Bibliographic record (any type not listed below)
    Bibliographic,
    /// Authority record (type z)
    Authority,
    /// Holdings record (types u, v, x, y)
    Holdings,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::Bibliographic => "bibliographic",
            RecordKind::Authority => "authority",
            RecordKind::Holdings => "holdings",
        };
        f.write_str(name)
    }
}

impl Leader {
    /// Parse a leader from 24 bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are invalid or too short.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MarcError> {
        if bytes.len() < 24 {
            return Err(MarcError::InvalidLeader(format!(
                "Leader must be at least 24 bytes, got {}",
                bytes.len()
            )));
        }

        let indicator_count = parse_count(bytes[10], 10)?;
        let subfield_code_count = parse_count(bytes[11], 11)?;

        Ok(Leader {
            record_length: parse_digits(&bytes[0..5])?,
            record_status: bytes[5] as char,
            record_type: bytes[6] as char,
            bibliographic_level: bytes[7] as char,
            control_record_type: bytes[8] as char,
            character_coding: bytes[9] as char,
            indicator_count,
            subfield_code_count,
            data_base_address: parse_digits(&bytes[12..17])?,
            encoding_level: bytes[17] as char,
            cataloging_form: bytes[18] as char,
            multipart_level: bytes[19] as char,
            reserved: String::from_utf8_lossy(&bytes[20..24]).to_string(),
        })
    }

    /// Serialize leader to its 24-byte form
    ///
    /// # Errors
    ///
    /// Returns an error if the leader values are invalid for serialization.
    pub fn as_bytes(&self) -> Result<Vec<u8>, MarcError> {
        if self.record_length > 99_999 || self.data_base_address > 99_999 {
            return Err(MarcError::InvalidLeader(
                "Numeric leader positions exceed 5 digits".to_string(),
            ));
        }
        if self.indicator_count > 9 || self.subfield_code_count > 9 {
            return Err(MarcError::InvalidLeader(
                "Indicator or subfield code count exceeds 1 digit".to_string(),
            ));
        }

        let mut bytes = Vec::with_capacity(24);
        bytes.extend_from_slice(format!("{:05}", self.record_length).as_bytes());
        for c in [
            self.record_status,
            self.record_type,
            self.bibliographic_level,
            self.control_record_type,
            self.character_coding,
        ] {
            push_ascii(&mut bytes, c)?;
        }
        bytes.push(b'0' + self.indicator_count);
        bytes.push(b'0' + self.subfield_code_count);
        bytes.extend_from_slice(format!("{:05}", self.data_base_address).as_bytes());
        for c in [
            self.encoding_level,
            self.cataloging_form,
            self.multipart_level,
        ] {
            push_ascii(&mut bytes, c)?;
        }

        let reserved_bytes = self.reserved.as_bytes();
        if reserved_bytes.len() != 4 {
            return Err(MarcError::InvalidLeader(format!(
                "Reserved field must be 4 characters, got {}",
                reserved_bytes.len()
            )));
        }
        bytes.extend_from_slice(reserved_bytes);

        Ok(bytes)
    }

    /// Copy of this leader with the binary-layout positions (0-4, 12-16) zeroed.
    #[must_use]
    pub fn without_binary_positions(&self) -> Leader {
        Leader {
            record_length: 0,
            data_base_address: 0,
            ..self.clone()
        }
    }

    /// Whether position 5 marks the record as deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.record_status == 'd'
    }

    /// Record class from position 6.
    #[must_use]
    pub fn record_kind(&self) -> RecordKind {
        match self.record_type {
            'z' => RecordKind::Authority,
            'u' | 'v' | 'x' | 'y' => RecordKind::Holdings,
            _ => RecordKind::Bibliographic,
        }
    }
}

impl FromStr for Leader {
    type Err = MarcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 24 || !s.is_ascii() {
            return Err(MarcError::InvalidLeader(format!(
                "Leader must be 24 ASCII characters, got '{s}'"
            )));
        }
        Leader::from_bytes(s.as_bytes())
    }
}

/// Writes the leader positions as text. Out-of-range values are written
/// at their full width; use [`Leader::as_bytes`] when a valid 24-byte leader
/// is required.
impl fmt::Display for Leader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:05}{}{}{}{}{}{}{}{:05}{}{}{}{}",
            self.record_length,
            self.record_status,
            self.record_type,
            self.bibliographic_level,
            self.control_record_type,
            self.character_coding,
            self.indicator_count,
            self.subfield_code_count,
            self.data_base_address,
            self.encoding_level,
            self.cataloging_form,
            self.multipart_level,
            self.reserved,
        )
    }
}

fn push_ascii(bytes: &mut Vec<u8>, c: char) -> Result<(), MarcError> {
    u8::try_from(c)
        .ok()
        .filter(u8::is_ascii)
        .map(|b| bytes.push(b))
        .ok_or_else(|| MarcError::InvalidLeader(format!("Non-ASCII leader value: '{c}'")))
}

fn parse_count(byte: u8, position: usize) -> Result<u8, MarcError> {
    (byte as char)
        .to_digit(10)
        .and_then(|d| u8::try_from(d).ok())
        .ok_or_else(|| {
            MarcError::InvalidLeader(format!(
                "Invalid count at position {position}: {}",
                byte as char
            ))
        })
}

/// Parse 5-digit ASCII number from bytes
fn parse_digits(bytes: &[u8]) -> Result<u32, MarcError> {
    let s = String::from_utf8_lossy(bytes);
    s.parse::<u32>()
        .map_err(|_| MarcError::InvalidLeader(format!("Invalid numeric field: '{s}'")))
}
