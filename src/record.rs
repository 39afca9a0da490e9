//! Decoding of individual USN records.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use chrono::{DateTime, Utc};
use log::warn;

use crate::{
    Usn, UsnResult,
    errors::UsnError,
    flags::{
        self, FILE_ATTRIBUTE_DIRECTORY, FILE_ATTRIBUTE_FLAGS, FILE_ATTRIBUTE_HIDDEN, REASON_FLAGS,
        SOURCE_INFO_FLAGS,
    },
    reference::FileReference,
    time,
};

/// Size of the version-independent record header: length, major and minor version.
pub const RECORD_HEADER_SIZE: usize = 8;

/// Fixed part of a USN_RECORD_V2, up to (not including) the file name.
pub const RECORD_V2_FIXED_SIZE: u32 = 60;

/// Fixed part of a USN_RECORD_V3, up to (not including) the file name.
pub const RECORD_V3_FIXED_SIZE: u32 = 76;

/// A decoded USN record.
///
/// Records own all of their data and are never modified after decoding.
/// Derived values such as timestamps and flag names are computed on demand
/// from the raw fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsnRecord {
    pub record_length: u32,
    pub major_version: u16,
    pub minor_version: u16,
    pub file_reference: FileReference,
    pub parent_file_reference: FileReference,
    pub usn: Usn,
    pub timestamp_raw: u64,
    pub reason_mask: u32,
    pub source_info_mask: u32,
    pub security_id: u32,
    pub file_attribute_mask: u32,
    pub file_name_length: u16,
    pub file_name_offset: u16,
    pub file_name: String,
}

impl UsnRecord {
    /// Decodes the record starting at `record_start` within `buffer`.
    ///
    /// The buffer must hold the whole record as declared by its length field.
    /// The file name is read at `record_start + file_name_offset` rather than
    /// directly after the fixed fields, so records with extra fields between
    /// the two decode correctly.
    ///
    /// # Errors
    /// * `TruncatedRecord` - the buffer is shorter than the declared length,
    ///   or the file name extends past the end of the record.
    /// * `MalformedRecord` - the declared length is shorter than the fixed
    ///   layout of the record's version.
    /// * `UnsupportedVersion` - the major version is neither 2 nor 3.
    ///
    /// A file name that is not valid UTF-16 is not an error: it is logged and
    /// replaced with an empty string.
    pub fn decode(buffer: &[u8], record_start: usize) -> UsnResult<Self> {
        let record = buffer.get(record_start..).unwrap_or_default();
        if record.len() < RECORD_HEADER_SIZE {
            return Err(UsnError::TruncatedRecord {
                declared: RECORD_HEADER_SIZE as u64,
                available: record.len() as u64,
            });
        }

        let mut cursor = Cursor::new(record);
        let record_length = cursor.read_u32::<LittleEndian>()?;
        let major_version = cursor.read_u16::<LittleEndian>()?;
        let minor_version = cursor.read_u16::<LittleEndian>()?;

        if (record_length as usize) < RECORD_HEADER_SIZE {
            return Err(UsnError::MalformedRecord(format!(
                "record length {} is shorter than the record header",
                record_length
            )));
        }
        if record_length as usize > record.len() {
            return Err(UsnError::TruncatedRecord {
                declared: record_length as u64,
                available: record.len() as u64,
            });
        }

        let fixed_size = match major_version {
            2 => RECORD_V2_FIXED_SIZE,
            3 => RECORD_V3_FIXED_SIZE,
            _ => {
                return Err(UsnError::UnsupportedVersion {
                    version: major_version,
                    record_length,
                });
            }
        };
        if record_length < fixed_size {
            return Err(UsnError::MalformedRecord(format!(
                "record length {} is shorter than the {} byte version {} layout",
                record_length, fixed_size, major_version
            )));
        }

        let record = &record[..record_length as usize];
        let mut cursor = Cursor::new(record);
        cursor.set_position(RECORD_HEADER_SIZE as u64);

        let (file_reference, parent_file_reference) = if major_version == 2 {
            (
                FileReference::from_mft(cursor.read_u64::<LittleEndian>()?),
                FileReference::from_mft(cursor.read_u64::<LittleEndian>()?),
            )
        } else {
            (
                FileReference::Id128(cursor.read_u128::<LittleEndian>()?),
                FileReference::Id128(cursor.read_u128::<LittleEndian>()?),
            )
        };

        let usn = cursor.read_i64::<LittleEndian>()?;
        let timestamp_raw = cursor.read_u64::<LittleEndian>()?;
        let reason_mask = cursor.read_u32::<LittleEndian>()?;
        let source_info_mask = cursor.read_u32::<LittleEndian>()?;
        let security_id = cursor.read_u32::<LittleEndian>()?;
        let file_attribute_mask = cursor.read_u32::<LittleEndian>()?;
        let file_name_length = cursor.read_u16::<LittleEndian>()?;
        let file_name_offset = cursor.read_u16::<LittleEndian>()?;

        let name_start = file_name_offset as usize;
        let name_end = name_start + file_name_length as usize;
        if name_end > record.len() {
            return Err(UsnError::TruncatedRecord {
                declared: name_end as u64,
                available: record.len() as u64,
            });
        }

        let file_name = match decode_file_name(&record[name_start..name_end]) {
            Ok(name) => name,
            Err(err) => {
                warn!("USN {}: {}, using an empty file name", usn, err);
                String::new()
            }
        };

        Ok(UsnRecord {
            record_length,
            major_version,
            minor_version,
            file_reference,
            parent_file_reference,
            usn,
            timestamp_raw,
            reason_mask,
            source_info_mask,
            security_id,
            file_attribute_mask,
            file_name_length,
            file_name_offset,
            file_name,
        })
    }

    /// The record timestamp as a UTC calendar time.
    pub fn timestamp_utc(&self) -> DateTime<Utc> {
        time::filetime_to_utc(self.timestamp_raw)
    }

    /// The record timestamp as whole POSIX seconds.
    pub fn timestamp_epoch(&self) -> i64 {
        time::filetime_to_epoch_seconds(self.timestamp_raw)
    }

    pub fn reasons(&self) -> Vec<&'static str> {
        flags::flags_to_names(REASON_FLAGS, self.reason_mask)
    }

    pub fn file_attributes(&self) -> Vec<&'static str> {
        flags::flags_to_names(FILE_ATTRIBUTE_FLAGS, self.file_attribute_mask)
    }

    pub fn source_info(&self) -> Vec<&'static str> {
        flags::flags_to_names(SOURCE_INFO_FLAGS, self.source_info_mask)
    }

    /// Returns true if this record describes a directory.
    pub fn is_dir(&self) -> bool {
        self.file_attribute_mask & FILE_ATTRIBUTE_DIRECTORY != 0
    }

    /// Returns true if this record describes a hidden file or directory.
    pub fn is_hidden(&self) -> bool {
        self.file_attribute_mask & FILE_ATTRIBUTE_HIDDEN != 0
    }
}

/// Decodes UTF-16LE file name bytes, dropping NUL code units.
fn decode_file_name(bytes: &[u8]) -> UsnResult<String> {
    if bytes.len() % 2 != 0 {
        return Err(UsnError::InvalidFilenameEncoding);
    }

    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .filter(|&unit| unit != 0)
        .collect();

    String::from_utf16(&units).map_err(|_| UsnError::InvalidFilenameEncoding)
}
