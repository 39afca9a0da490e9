//! Locating record boundaries in a sparse journal stream.
//!
//! A `$UsnJrnl:$J` stream is mostly zeros: the journal is sparse at its head
//! and records are padded out to cluster and page boundaries. These functions
//! skip the padding and report where records start.

use std::io::{ErrorKind, Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;

use crate::{UsnResult, errors::UsnError, journal::ScanOptions};

/// Outcome of a scan for the next record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// An absolute stream offset.
    Found(u64),
    /// The stream ended before any further non-zero data.
    EndOfJournal,
}

/// Returns the offset of the first non-zero byte at or after the reader's
/// current position, reading `chunk_size` bytes at a time.
///
/// The reader is left somewhere past the returned offset; callers seek to it.
pub fn locate_first_record<R: Read + Seek>(reader: &mut R, chunk_size: usize) -> UsnResult<Scan> {
    let mut chunk = vec![0u8; chunk_size.max(1)];
    let mut chunk_start = reader.stream_position()?;

    loop {
        let bytes_read = match reader.read(&mut chunk) {
            Ok(0) => {
                debug!("No records found before end of stream at {}", chunk_start);
                return Ok(Scan::EndOfJournal);
            }
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };

        if let Some(pos) = chunk[..bytes_read].iter().position(|&b| b != 0) {
            let offset = chunk_start + pos as u64;
            debug!("First non-zero byte at offset {}", offset);
            return Ok(Scan::Found(offset));
        }

        chunk_start += bytes_read as u64;
    }
}

/// Like [`locate_first_record`], but leaps over large runs of leading zeros.
///
/// From the current position, the reader jumps ahead by `options.fast_stride`
/// bytes and probes `options.probe_window` bytes. When a probe sees non-zero
/// data the reader backs up to the start of that probe window and the exact
/// offset is found with [`locate_first_record`]. Once a further leap would
/// pass the end of the stream, the remainder is scanned linearly.
///
/// # Caveat
/// Whatever lies inside a skipped stride is never looked at. The result is
/// only exact if no record starts within the stride preceding the first
/// non-empty probe window. Journals satisfy this in practice because once
/// records begin they are packed with padding runs shorter than the probe
/// window, so the probe lands in record data; records that begin earlier in
/// that stride are skipped.
///
/// # Errors
/// `JournalTooSmall` if `stream_size` is below `options.large_file_threshold`.
pub fn locate_first_record_fast<R: Read + Seek>(
    reader: &mut R,
    stream_size: u64,
    options: &ScanOptions,
) -> UsnResult<Scan> {
    if stream_size < options.large_file_threshold {
        return Err(UsnError::JournalTooSmall {
            size: stream_size,
            threshold: options.large_file_threshold,
        });
    }

    let mut probe = vec![0u8; options.probe_window.max(1)];
    loop {
        let position = reader.stream_position()?;
        let window_start = position.saturating_add(options.fast_stride);
        if window_start >= stream_size {
            return locate_first_record(reader, options.chunk_size);
        }

        reader.seek(SeekFrom::Start(window_start))?;
        let bytes_read = read_up_to(reader, &mut probe)?;
        if probe[..bytes_read].iter().any(|&b| b != 0) {
            debug!("Non-zero data in probe window at {}", window_start);
            reader.seek(SeekFrom::Start(window_start))?;
            return locate_first_record(reader, options.chunk_size);
        }
        if bytes_read < probe.len() {
            return Ok(Scan::EndOfJournal);
        }
    }
}

/// Finds the record that follows the one at (or after) the current position.
///
/// Reads 4-byte little-endian words, skipping zero words as padding. At the
/// first non-zero word, which is a record length, the reader is rewound to
/// the start of that word and `start + length` is returned: the offset of the
/// record after this one. Running out of stream is `EndOfJournal`.
pub fn advance_to_next<R: Read + Seek>(reader: &mut R, stream_size: u64) -> UsnResult<Scan> {
    let mut position = reader.stream_position()?;

    while position + 4 <= stream_size {
        let record_length = match reader.read_u32::<LittleEndian>() {
            Ok(length) => length,
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(err.into()),
        };

        if record_length != 0 {
            reader.seek_relative(-4)?;
            return Ok(Scan::Found(position + record_length as u64));
        }
        position += 4;
    }

    debug!("End of journal at offset {}", position);
    Ok(Scan::EndOfJournal)
}

/// Reads until `buf` is full or the reader is exhausted.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}
