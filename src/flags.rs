//! Symbolic names for the bitmask fields of a USN record.
//!
//! Each table maps a single-bit mask to its name. Tables are walked in
//! declaration order, so the output order of [`flags_to_names`] is stable and
//! does not depend on numeric bit order.

/// An ordered table of `(bit, name)` pairs.
pub type FlagTable = &'static [(u32, &'static str)];

/// USN_REASON_* change reasons.
pub const REASON_FLAGS: FlagTable = &[
    (0x0000_0001, "DATA_OVERWRITE"),
    (0x0000_0002, "DATA_EXTEND"),
    (0x0000_0004, "DATA_TRUNCATION"),
    (0x0000_0010, "NAMED_DATA_OVERWRITE"),
    (0x0000_0020, "NAMED_DATA_EXTEND"),
    (0x0000_0040, "NAMED_DATA_TRUNCATION"),
    (0x0000_0100, "FILE_CREATE"),
    (0x0000_0200, "FILE_DELETE"),
    (0x0000_0400, "EA_CHANGE"),
    (0x0000_0800, "SECURITY_CHANGE"),
    (0x0000_1000, "RENAME_OLD_NAME"),
    (0x0000_2000, "RENAME_NEW_NAME"),
    (0x0000_4000, "INDEXABLE_CHANGE"),
    (0x0000_8000, "BASIC_INFO_CHANGE"),
    (0x0001_0000, "HARD_LINK_CHANGE"),
    (0x0002_0000, "COMPRESSION_CHANGE"),
    (0x0004_0000, "ENCRYPTION_CHANGE"),
    (0x0008_0000, "OBJECT_ID_CHANGE"),
    (0x0010_0000, "REPARSE_POINT_CHANGE"),
    (0x0020_0000, "STREAM_CHANGE"),
    (0x0040_0000, "TRANSACTED_CHANGE"),
    (0x0080_0000, "INTEGRITY_CHANGE"),
    (0x0100_0000, "DESIRED_STORAGE_CLASS_CHANGE"),
    (0x8000_0000, "CLOSE"),
];

/// FILE_ATTRIBUTE_* values.
pub const FILE_ATTRIBUTE_FLAGS: FlagTable = &[
    (0x0000_0001, "READONLY"),
    (0x0000_0002, "HIDDEN"),
    (0x0000_0004, "SYSTEM"),
    (0x0000_0010, "DIRECTORY"),
    (0x0000_0020, "ARCHIVE"),
    (0x0000_0040, "DEVICE"),
    (0x0000_0080, "NORMAL"),
    (0x0000_0100, "TEMPORARY"),
    (0x0000_0200, "SPARSE_FILE"),
    (0x0000_0400, "REPARSE_POINT"),
    (0x0000_0800, "COMPRESSED"),
    (0x0000_1000, "OFFLINE"),
    (0x0000_2000, "NOT_CONTENT_INDEXED"),
    (0x0000_4000, "ENCRYPTED"),
    (0x0000_8000, "INTEGRITY_STREAM"),
    (0x0001_0000, "VIRTUAL"),
    (0x0002_0000, "NO_SCRUB_DATA"),
];

/// USN_SOURCE_* values.
pub const SOURCE_INFO_FLAGS: FlagTable = &[
    (0x0000_0001, "DATA_MANAGEMENT"),
    (0x0000_0002, "AUXILIARY_DATA"),
    (0x0000_0004, "REPLICATION_MANAGEMENT"),
];

pub(crate) const FILE_ATTRIBUTE_HIDDEN: u32 = 0x0000_0002;
pub(crate) const FILE_ATTRIBUTE_DIRECTORY: u32 = 0x0000_0010;

/// Returns the names of all flags in `table` that are set in `mask`, in table order.
///
/// Bits without an entry in the table are ignored.
pub fn flags_to_names(table: FlagTable, mask: u32) -> Vec<&'static str> {
    table
        .iter()
        .filter(|(bit, _)| mask & bit != 0)
        .map(|&(_, name)| name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_names_follow_table_order() {
        assert_eq!(
            flags_to_names(REASON_FLAGS, 0x103),
            vec!["DATA_OVERWRITE", "DATA_EXTEND", "FILE_CREATE"]
        );
        assert_eq!(
            flags_to_names(REASON_FLAGS, 0x8000_0100),
            vec!["FILE_CREATE", "CLOSE"]
        );
    }

    #[test]
    fn empty_and_unknown_bits() {
        assert!(flags_to_names(REASON_FLAGS, 0).is_empty());
        // 0x8 has no reason name.
        assert!(flags_to_names(REASON_FLAGS, 0x8).is_empty());
        assert_eq!(flags_to_names(SOURCE_INFO_FLAGS, 0xFF).len(), 3);
    }

    #[test]
    fn attribute_names() {
        assert_eq!(
            flags_to_names(FILE_ATTRIBUTE_FLAGS, 0x20 | 0x2),
            vec!["HIDDEN", "ARCHIVE"]
        );
        assert_eq!(
            flags_to_names(FILE_ATTRIBUTE_FLAGS, FILE_ATTRIBUTE_DIRECTORY),
            vec!["DIRECTORY"]
        );
    }

    #[test]
    fn tables_hold_single_bits() {
        for table in [REASON_FLAGS, FILE_ATTRIBUTE_FLAGS, SOURCE_INFO_FLAGS] {
            for (bit, name) in table {
                assert_eq!(bit.count_ones(), 1, "{name} is not a single bit");
            }
        }
    }
}
