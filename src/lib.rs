//! # usn-parser-rs
//!
//! A Rust library for parsing NTFS USN change journal files (`$UsnJrnl:$J`).
//!
//! The journal is an append-only log of file system change events. Extracted
//! to a file it is a sparse stream: long runs of zero bytes, followed by
//! variable-length records padded to word and cluster boundaries. This crate
//! finds the records in such a stream and decodes them into [`UsnRecord`]
//! values, without loading the stream into memory.
//!
//! ## Features
//! - Enumerate USN journal records as a Rust iterator
//! - Version 2 and version 3 records
//! - Optional fast search for the first record in multi-gigabyte journals
//! - Symbolic names for change reasons, file attributes and source info flags
//!
//! ## Example: Enumerate USN Journal
//! ```no_run
//! use usn_parser::journal::UsnJournal;
//!
//! let journal = UsnJournal::open("$J").unwrap();
//! for result in journal.into_iter().take(10) {
//!     match result {
//!         Ok(record) => println!("{} {} {:?}", record.usn, record.file_name, record.reasons()),
//!         Err(e) => eprintln!("Error reading record: {}", e),
//!     }
//! }
//! ```
//!
//! ## License
//! MIT License.

pub mod errors;
pub mod flags;
pub mod journal;
pub mod output;
pub mod record;
pub mod reference;
pub mod scanner;
pub mod time;

// Re-export commonly used types
pub use errors::UsnError;
pub use journal::{ScanOptions, UsnJournal, UsnJournalIter, open_journal};
pub use record::UsnRecord;
pub use reference::FileReference;

/// A convenient type alias for Results with UsnError.
pub type UsnResult<T> = std::result::Result<T, UsnError>;


pub type Usn = i64;

pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024; // 64KB

/// Journals at least this large may use the fast first-record search.
pub const LARGE_JOURNAL_THRESHOLD: u64 = 1024 * 1024 * 1024; // 1GB
pub const FAST_SCAN_STRIDE: u64 = 1024 * 1024 * 1024; // 1GB
pub const FAST_SCAN_PROBE_SIZE: usize = 6_553_600; // 6.25MB

/// Upper bound on a plausible record length; real records stay below 1KB.
pub const MAX_RECORD_LENGTH: u64 = 64 * 1024;
