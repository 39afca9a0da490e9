//! File reference numbers carried by USN records.

use std::fmt;

const ENTRY_NUMBER_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;

/// Identifies a file-system entry referenced by a USN record.
///
/// Version 2 records carry a packed 64-bit MFT reference made of a 48-bit
/// entry number and a 16-bit sequence number. Version 3 records carry a
/// 128-bit file identifier which is kept as-is: there is no agreed way to
/// split it into entry and sequence numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileReference {
    Mft {
        entry_number: u64,
        sequence_number: u16,
    },
    Id128(u128),
}

impl FileReference {
    /// Builds a reference from a packed 64-bit MFT reference number.
    pub fn from_mft(value: u64) -> Self {
        let (entry_number, sequence_number) = decompose_reference(value);
        FileReference::Mft {
            entry_number,
            sequence_number,
        }
    }

    /// Returns the MFT entry number, if this is a version 2 reference.
    pub fn entry_number(&self) -> Option<u64> {
        match self {
            FileReference::Mft { entry_number, .. } => Some(*entry_number),
            FileReference::Id128(_) => None,
        }
    }

    /// Returns the sequence number, if this is a version 2 reference.
    pub fn sequence_number(&self) -> Option<u16> {
        match self {
            FileReference::Mft {
                sequence_number, ..
            } => Some(*sequence_number),
            FileReference::Id128(_) => None,
        }
    }
}

impl fmt::Display for FileReference {
    /// `entry-sequence` for MFT references, `0x`-prefixed hex for 128-bit ids.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileReference::Mft {
                entry_number,
                sequence_number,
            } => write!(f, "{}-{}", entry_number, sequence_number),
            FileReference::Id128(id) => write!(f, "{:#034x}", id),
        }
    }
}

/// Splits a packed 64-bit MFT reference into `(entry_number, sequence_number)`.
pub fn decompose_reference(value: u64) -> (u64, u16) {
    let entry_number = value & ENTRY_NUMBER_MASK;
    let sequence_number = ((value >> 48) & 0xFFFF) as u16;
    (entry_number, sequence_number)
}
