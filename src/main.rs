//! usnparser
//!
//! Command-line front end: parses an extracted `$UsnJrnl:$J` file and prints
//! one line per record.

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::{LevelFilter, warn};
use usn_parser::{
    ScanOptions, UsnJournal,
    output::{OutputFormat, RecordFormatter},
};

/// Parse an NTFS USN change journal file
#[derive(Parser)]
#[command(name = "usnparser")]
#[command(version)]
#[command(about = "Parse an NTFS USN change journal ($UsnJrnl:$J) file", long_about = None)]
struct Cli {
    /// Parse the given USN journal file
    #[arg(short, long)]
    file: PathBuf,

    /// Return USN records in body file format
    #[arg(short, long, group = "format")]
    body: bool,

    /// Return USN records in comma-separated format
    #[arg(short, long, group = "format")]
    csv: bool,

    /// TLN output (use with -s)
    #[arg(short, long, group = "format")]
    tln: bool,

    /// Return all USN properties for each record (JSON)
    #[arg(short, long, group = "format")]
    verbose: bool,

    /// System name (use with -t)
    #[arg(short, long, default_value = "")]
    system: String,

    /// Parse a large journal file quickly (journal must be at least 1GB)
    #[arg(short, long)]
    quick: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Cli {
    fn output_format(&self) -> OutputFormat {
        if self.verbose {
            OutputFormat::Json
        } else if self.body {
            OutputFormat::Body
        } else if self.tln {
            OutputFormat::Tln
        } else if self.csv {
            OutputFormat::Csv
        } else {
            OutputFormat::Text
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    let options = ScanOptions {
        quick: cli.quick,
        ..ScanOptions::default()
    };
    let journal = UsnJournal::open_with_options(&cli.file, options)
        .with_context(|| format!("Failed to open {}", cli.file.display()))?;

    let formatter =
        RecordFormatter::new(cli.output_format()).with_system_name(cli.system.as_str());

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if let Some(header) = formatter.header() {
        writeln!(out, "{}", header)?;
    }

    for result in journal {
        match result {
            Ok(record) => writeln!(out, "{}", formatter.format(&record))?,
            Err(err) if err.is_recoverable() => warn!("{}", err),
            Err(err) => {
                out.flush()?;
                return Err(err)
                    .with_context(|| format!("Failed to parse {}", cli.file.display()));
            }
        }
    }

    out.flush()?;
    Ok(())
}
