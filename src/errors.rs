use thiserror::Error;

#[derive(Debug, Error)]
pub enum UsnError {
    #[error("Unsupported USN record version {version} (record length {record_length})")]
    UnsupportedVersion { version: u16, record_length: u32 },

    #[error("Truncated USN record: declared {declared} bytes, only {available} available")]
    TruncatedRecord { declared: u64, available: u64 },

    #[error("Malformed USN record: {0}")]
    MalformedRecord(String),

    #[error("Invalid UTF-16 file name")]
    InvalidFilenameEncoding,

    #[error(
        "The USN journal is {size} bytes; quick scanning requires at least {threshold} bytes"
    )]
    JournalTooSmall { size: u64, threshold: u64 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl UsnError {
    /// Returns true if iteration can continue past this error.
    ///
    /// Only errors confined to a single record whose declared length is still
    /// usable for framing are recoverable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            UsnError::UnsupportedVersion { .. } | UsnError::InvalidFilenameEncoding
        )
    }
}
