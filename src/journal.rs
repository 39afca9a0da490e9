//! Iterating over the records of a USN change journal stream.
//!
//! The journal is read forward from a seekable stream, one record window at a
//! time. Each record's own length field decides where the next search starts,
//! so fields this crate does not know about never throw framing off.

use std::{
    fs::File,
    io::{BufReader, Read, Seek, SeekFrom},
    path::Path,
};

use log::{debug, warn};

use crate::{
    DEFAULT_BUFFER_SIZE, FAST_SCAN_PROBE_SIZE, FAST_SCAN_STRIDE, LARGE_JOURNAL_THRESHOLD,
    MAX_RECORD_LENGTH, UsnResult,
    errors::UsnError,
    record::{RECORD_HEADER_SIZE, UsnRecord},
    scanner::{self, Scan},
};

/// Records start on 4-byte boundaries; padding is skipped a word at a time.
const WORD_SIZE: u64 = 4;

#[derive(Debug, Clone)]
/// Options for scanning a USN journal stream.
///
/// `quick` enables the large-stride search for the first record, which only
/// applies to streams of at least `large_file_threshold` bytes. See
/// [`scanner::locate_first_record_fast`] for the trade-off involved.
pub struct ScanOptions {
    pub chunk_size: usize,
    pub quick: bool,
    pub large_file_threshold: u64,
    pub fast_stride: u64,
    pub probe_window: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            chunk_size: DEFAULT_BUFFER_SIZE,
            quick: false,
            large_file_threshold: LARGE_JOURNAL_THRESHOLD,
            fast_stride: FAST_SCAN_STRIDE,
            probe_window: FAST_SCAN_PROBE_SIZE,
        }
    }
}

/// A USN change journal stream, such as an extracted `$UsnJrnl:$J` file.
#[derive(Debug)]
pub struct UsnJournal<R> {
    reader: R,
    size: u64,
    options: ScanOptions,
}

impl UsnJournal<BufReader<File>> {
    /// Opens a journal file with default options.
    pub fn open(path: impl AsRef<Path>) -> UsnResult<Self> {
        Self::open_with_options(path, ScanOptions::default())
    }

    /// Opens a journal file with custom scan options.
    pub fn open_with_options(path: impl AsRef<Path>, options: ScanOptions) -> UsnResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        debug!("Opened USN journal {} ({} bytes)", path.display(), size);

        Ok(UsnJournal {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file),
            size,
            options,
        })
    }
}

impl<R: Read + Seek> UsnJournal<R> {
    /// Wraps a reader holding `size` bytes of journal data.
    pub fn new(reader: R, size: u64) -> Self {
        Self::with_options(reader, size, ScanOptions::default())
    }

    pub fn with_options(reader: R, size: u64, options: ScanOptions) -> Self {
        UsnJournal {
            reader,
            size,
            options,
        }
    }

    /// Wraps a reader, taking the stream size from its end position.
    pub fn from_reader(mut reader: R) -> UsnResult<Self> {
        let size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self::new(reader, size))
    }

    /// Size of the journal stream in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Returns an iterator over the journal's records.
    ///
    /// Every call starts a new pass from the beginning of the stream.
    pub fn iter(&mut self) -> UsnJournalIter<&mut R> {
        UsnJournalIter::new(&mut self.reader, self.size, self.options.clone(), Some(0))
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read + Seek> IntoIterator for UsnJournal<R> {
    type Item = UsnResult<UsnRecord>;
    type IntoIter = UsnJournalIter<R>;

    fn into_iter(self) -> Self::IntoIter {
        UsnJournalIter::new(self.reader, self.size, self.options, Some(0))
    }
}

/// Iterates over the records of a journal stream starting at its current position.
///
/// `stream_size` is the total length of the stream.
pub fn open_journal<R: Read + Seek>(reader: R, stream_size: u64) -> UsnJournalIter<R> {
    UsnJournalIter::new(reader, stream_size, ScanOptions::default(), None)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IterState {
    Start,
    Records,
    Done,
}

/// Iterate over USN journal records.
///
/// Yields `Err` for records that cannot be decoded. After an error that
/// breaks record framing (see [`UsnError::is_recoverable`]) the iterator
/// is exhausted; otherwise it carries on with the next record. The end of
/// the journal is simply the end of iteration.
pub struct UsnJournalIter<R> {
    reader: R,
    size: u64,
    options: ScanOptions,
    start_offset: Option<u64>,
    buffer: Vec<u8>,
    state: IterState,
}

impl<R: Read + Seek> UsnJournalIter<R> {
    fn new(reader: R, size: u64, options: ScanOptions, start_offset: Option<u64>) -> Self {
        UsnJournalIter {
            reader,
            size,
            options,
            start_offset,
            buffer: Vec::new(),
            state: IterState::Start,
        }
    }

    /// Positions the reader at the word holding the first non-zero byte.
    ///
    /// Returns false if the stream holds no records at all.
    fn seek_first_record(&mut self) -> UsnResult<bool> {
        if let Some(offset) = self.start_offset {
            self.reader.seek(SeekFrom::Start(offset))?;
        }

        let scan = if self.options.quick {
            scanner::locate_first_record_fast(&mut self.reader, self.size, &self.options)?
        } else {
            scanner::locate_first_record(&mut self.reader, self.options.chunk_size)?
        };

        match scan {
            Scan::Found(offset) => {
                // A length that is a multiple of 256 has a zero low byte, so
                // the first non-zero byte can sit inside the length field.
                let record_start = offset - offset % WORD_SIZE;
                debug!("First USN record at offset {}", record_start);
                self.reader.seek(SeekFrom::Start(record_start))?;
                Ok(true)
            }
            Scan::EndOfJournal => Ok(false),
        }
    }

    /// Finds, reads and decodes the next record.
    fn find_next_entry(&mut self) -> UsnResult<Option<UsnRecord>> {
        if self.state == IterState::Start {
            self.state = IterState::Records;
            if !self.seek_first_record()? {
                return Ok(None);
            }
        }

        let next_offset = match scanner::advance_to_next(&mut self.reader, self.size)? {
            Scan::Found(offset) => offset,
            Scan::EndOfJournal => return Ok(None),
        };
        let record_start = self.reader.stream_position()?;
        let record_length = next_offset - record_start;

        if next_offset > self.size {
            return Err(UsnError::TruncatedRecord {
                declared: record_length,
                available: self.size - record_start,
            });
        }
        if record_length < RECORD_HEADER_SIZE as u64 || record_length > MAX_RECORD_LENGTH {
            return Err(UsnError::MalformedRecord(format!(
                "implausible record length {} at offset {}",
                record_length, record_start
            )));
        }

        self.buffer.resize(record_length as usize, 0);
        self.reader.read_exact(&mut self.buffer)?;

        // The whole declared window has been consumed, so the reader already
        // sits at `next_offset` no matter how much of it the decoder used.
        match UsnRecord::decode(&self.buffer, 0) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                warn!("Skipping USN record at offset {}: {}", record_start, err);
                Err(err)
            }
        }
    }
}

impl<R: Read + Seek> Iterator for UsnJournalIter<R> {
    type Item = UsnResult<UsnRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == IterState::Done {
            return None;
        }

        match self.find_next_entry() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.state = IterState::Done;
                None
            }
            Err(err) => {
                if !err.is_recoverable() {
                    warn!("Stopping USN journal iteration: {}", err);
                    self.state = IterState::Done;
                }
                Some(Err(err))
            }
        }
    }
}

impl<R: Read + Seek> std::iter::FusedIterator for UsnJournalIter<R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{reference::FileReference, tests::RecordBuilder};
    use std::io::{Cursor, Write};

    /// Lays out `leading` zero bytes, then each record followed by its padding.
    fn journal_stream(leading: usize, records: &[(Vec<u8>, usize)]) -> Vec<u8> {
        let mut data = vec![0u8; leading];
        for (record, padding) in records {
            data.extend(record);
            data.extend(vec![0u8; *padding]);
        }
        data
    }

    fn collect_ok(iter: impl Iterator<Item = UsnResult<UsnRecord>>) -> Vec<UsnRecord> {
        iter.map(|result| result.unwrap()).collect()
    }

    #[test]
    fn usn_journal_iter_test() {
        let paddings = [0usize, 8, 4, 4096, 12, 0, 65_536];
        let records: Vec<(Vec<u8>, usize)> = paddings
            .iter()
            .enumerate()
            .map(|(i, &padding)| {
                let record = RecordBuilder::v2(&format!("file-{}.txt", i))
                    .file_reference(0x0001_0000_0000_0100 + i as u128)
                    .usn(1000 + i as i64 * 100)
                    .timestamp(132_000_000_000_000_000 + i as u64)
                    .reason(0x100)
                    .build();
                (record, padding)
            })
            .collect();
        let data = journal_stream(8192, &records);
        let size = data.len() as u64;

        let decoded = collect_ok(open_journal(Cursor::new(data), size));
        assert_eq!(decoded.len(), records.len());

        let mut previous_usn = -1i64;
        for (i, record) in decoded.iter().enumerate() {
            let expected = UsnRecord::decode(&records[i].0, 0).unwrap();
            assert_eq!(record, &expected);
            assert_eq!(record.file_name, format!("file-{}.txt", i));
            assert_eq!(
                record.file_reference,
                FileReference::Mft {
                    entry_number: 0x100 + i as u64,
                    sequence_number: 1
                }
            );
            assert!(record.usn > previous_usn, "USN entries are not in order");
            previous_usn = record.usn;
        }
    }

    #[test]
    fn mixed_versions() {
        let records = vec![
            (RecordBuilder::v2("two").usn(1).build(), 0),
            (RecordBuilder::v3("three").usn(2).build(), 16),
            (RecordBuilder::v2("two-again").usn(3).build(), 0),
        ];
        let data = journal_stream(0, &records);
        let size = data.len() as u64;

        let decoded = collect_ok(open_journal(Cursor::new(data), size));
        let versions: Vec<u16> = decoded.iter().map(|r| r.major_version).collect();
        assert_eq!(versions, vec![2, 3, 2]);
        assert_eq!(decoded[1].file_name, "three");
    }

    #[test]
    fn empty_and_zero_streams() {
        assert_eq!(open_journal(Cursor::new(Vec::new()), 0).count(), 0);
        assert_eq!(open_journal(Cursor::new(vec![0u8; 100_000]), 100_000).count(), 0);
    }

    #[test]
    fn first_record_length_with_zero_low_byte() {
        // 60 byte header + 196 byte name = 256 bytes; the first byte is zero.
        let name = "n".repeat(98);
        let record = RecordBuilder::v2(&name).build();
        assert_eq!(record.len(), 256);
        assert_eq!(record[0], 0);

        let data = journal_stream(4096, &[(record, 0)]);
        let size = data.len() as u64;
        let decoded = collect_ok(open_journal(Cursor::new(data), size));
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].file_name, name);
    }

    #[test]
    fn truncated_record_ends_iteration() {
        let first = RecordBuilder::v2("complete.txt").build();
        let mut last = RecordBuilder::v2("cut-short.txt").build();
        last.truncate(last.len() - 16);
        let data = journal_stream(0, &[(first, 8), (last, 0)]);
        let size = data.len() as u64;

        let mut iter = open_journal(Cursor::new(data), size);
        assert_eq!(iter.next().unwrap().unwrap().file_name, "complete.txt");
        match iter.next() {
            Some(Err(UsnError::TruncatedRecord {
                declared,
                available,
            })) => {
                assert_eq!(available + 16, declared);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
    }

    #[test]
    fn unsupported_version_is_skipped() {
        let records = vec![
            (RecordBuilder::v2("before.txt").usn(10).build(), 0),
            (RecordBuilder::v2("future.txt").major_version(99).build(), 8),
            (RecordBuilder::v2("after.txt").usn(30).build(), 0),
        ];
        let data = journal_stream(64, &records);
        let size = data.len() as u64;

        let results: Vec<UsnResult<UsnRecord>> = open_journal(Cursor::new(data), size).collect();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().usn, 10);
        match &results[1] {
            Err(err @ UsnError::UnsupportedVersion { version: 99, .. }) => {
                assert!(err.is_recoverable())
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(results[2].as_ref().unwrap().file_name, "after.txt");
    }

    #[test]
    fn implausible_length_ends_iteration() {
        let mut data = vec![0u8; 8];
        data.extend(4u32.to_le_bytes());
        data.extend(vec![0u8; 60]);
        let size = data.len() as u64;

        let mut iter = open_journal(Cursor::new(data), size);
        assert!(matches!(
            iter.next(),
            Some(Err(UsnError::MalformedRecord(_)))
        ));
        assert!(iter.next().is_none());
    }

    #[test]
    fn quick_scan_requires_large_journal() {
        let data = journal_stream(128, &[(RecordBuilder::v2("a").build(), 0)]);
        let size = data.len() as u64;
        let options = ScanOptions {
            quick: true,
            ..ScanOptions::default()
        };

        let mut journal = UsnJournal::with_options(Cursor::new(data), size, options);
        let mut iter = journal.iter();
        assert!(matches!(
            iter.next(),
            Some(Err(UsnError::JournalTooSmall { .. }))
        ));
        assert!(iter.next().is_none());
    }

    #[test]
    fn quick_scan_with_scaled_options() {
        let options = ScanOptions {
            quick: true,
            large_file_threshold: 4096,
            fast_stride: 4096,
            probe_window: 1024,
            ..ScanOptions::default()
        };
        let records = vec![
            (RecordBuilder::v2("one").usn(1).build(), 0),
            (RecordBuilder::v2("two").usn(2).build(), 0),
        ];
        let data = journal_stream(3 * 4096, &records);
        let size = data.len() as u64;

        let mut journal = UsnJournal::with_options(Cursor::new(data), size, options);
        let usns: Vec<i64> = collect_ok(journal.iter()).iter().map(|r| r.usn).collect();
        assert_eq!(usns, vec![1, 2]);
    }

    #[test]
    fn each_iter_call_is_a_new_pass() {
        let records = vec![
            (RecordBuilder::v2("one").build(), 0),
            (RecordBuilder::v2("two").build(), 24),
        ];
        let data = journal_stream(512, &records);

        let mut journal = UsnJournal::from_reader(Cursor::new(data)).unwrap();
        let expected_size = 512 + records[0].0.len() + records[1].0.len() + 24;
        assert_eq!(journal.size(), expected_size as u64);
        let first_pass = collect_ok(journal.iter());
        let second_pass = collect_ok(journal.iter());
        assert_eq!(first_pass.len(), 2);
        assert_eq!(first_pass, second_pass);
    }

    #[test]
    fn open_journal_file() -> Result<(), UsnError> {
        let records = vec![
            (RecordBuilder::v2("on-disk.txt").usn(7).build(), 40),
            (RecordBuilder::v3("on-disk-v3.txt").usn(8).build(), 0),
        ];
        let data = journal_stream(1 << 20, &records);

        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(&data)?;
        file.flush()?;

        let journal = UsnJournal::open(file.path())?;
        assert_eq!(journal.size(), data.len() as u64);
        let names: Vec<String> = journal
            .into_iter()
            .map(|r| r.map(|record| record.file_name))
            .collect::<Result<_, _>>()?;
        assert_eq!(names, vec!["on-disk.txt", "on-disk-v3.txt"]);

        Ok(())
    }
}
