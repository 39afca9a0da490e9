//! Text renderings of USN records: plain text, CSV, body file, TLN and JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};

use crate::record::UsnRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `timestamp | file name | attributes | reasons`
    #[default]
    Text,
    Csv,
    /// Sleuth Kit body file, for timeline tools such as mactime.
    Body,
    /// Five-field TLN timeline format.
    Tln,
    /// One JSON object per line with every record field.
    Json,
}

/// Renders records in one [`OutputFormat`].
#[derive(Debug, Clone)]
pub struct RecordFormatter {
    format: OutputFormat,
    system_name: String,
}

impl RecordFormatter {
    pub fn new(format: OutputFormat) -> Self {
        RecordFormatter {
            format,
            system_name: String::new(),
        }
    }

    /// Sets the host name written into TLN output.
    pub fn with_system_name(mut self, system_name: impl Into<String>) -> Self {
        self.system_name = system_name.into();
        self
    }

    /// The line to print before the first record, if the format has one.
    pub fn header(&self) -> Option<&'static str> {
        match self.format {
            OutputFormat::Csv => Some("timestamp,filename,fileattr,reason"),
            _ => None,
        }
    }

    pub fn format(&self, record: &UsnRecord) -> String {
        let reasons = record.reasons().join(" ");
        match self.format {
            OutputFormat::Text => format!(
                "{} | {} | {} | {}",
                human_timestamp(&record.timestamp_utc()),
                record.file_name,
                record.file_attributes().join(" "),
                reasons
            ),
            OutputFormat::Csv => [
                human_timestamp(&record.timestamp_utc()),
                record.file_name.clone(),
                record.file_attributes().join(" "),
                reasons,
            ]
            .iter()
            .map(|field| csv_field(field))
            .collect::<Vec<_>>()
            .join(","),
            OutputFormat::Body => {
                let epoch = record.timestamp_epoch();
                format!(
                    "0|{} (USN: {})|{}|0|0|0|0|{epoch}|{epoch}|{epoch}|{epoch}",
                    record.file_name, reasons, record.file_reference
                )
            }
            OutputFormat::Tln => format!(
                "{}|USN|{}||{}:{}",
                record.timestamp_epoch(),
                self.system_name,
                record.file_name,
                reasons
            ),
            OutputFormat::Json => to_json(record).to_string(),
        }
    }
}

/// All fields of a record as a JSON object.
pub fn to_json(record: &UsnRecord) -> Value {
    json!({
        "record_length": record.record_length,
        "major_version": record.major_version,
        "minor_version": record.minor_version,
        "file_reference": record.file_reference.to_string(),
        "mft_entry_number": record.file_reference.entry_number(),
        "mft_sequence_number": record.file_reference.sequence_number(),
        "parent_file_reference": record.parent_file_reference.to_string(),
        "parent_mft_entry_number": record.parent_file_reference.entry_number(),
        "parent_mft_sequence_number": record.parent_file_reference.sequence_number(),
        "usn": record.usn,
        "timestamp": record.timestamp_utc().to_rfc3339_opts(SecondsFormat::AutoSi, true),
        "timestamp_raw": record.timestamp_raw,
        "timestamp_epoch": record.timestamp_epoch(),
        "reason": record.reasons(),
        "reason_mask": record.reason_mask,
        "source_info": record.source_info(),
        "security_id": record.security_id,
        "file_attributes": record.file_attributes(),
        "file_attribute_mask": record.file_attribute_mask,
        "file_name_length": record.file_name_length,
        "file_name_offset": record.file_name_offset,
        "file_name": record.file_name,
    })
}

/// `YYYY-MM-DD HH:MM:SS`, with microseconds only when they are non-zero.
fn human_timestamp(time: &DateTime<Utc>) -> String {
    if time.timestamp_subsec_micros() == 0 {
        time.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        time.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    }
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
