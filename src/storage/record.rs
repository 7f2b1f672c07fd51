/// Append-only CSV log of completed cycles
use log::{debug, info};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

use crate::error::LoggerResult;
use crate::models::{Channel, Record};
use crate::utils::{format_datetime, format_file_stamp};

/// Name of the trailing human-readable time column
pub const DATETIME_COLUMN: &str = "datetime";

/// Header row: channel names in snapshot order, then the datetime column.
pub fn header() -> String {
    let mut columns: Vec<&str> = Channel::ALL.iter().map(|c| c.name()).collect();
    columns.push(DATETIME_COLUMN);
    columns.join(",")
}

/// One data row matching the header's column order.
pub fn format_row(record: &Record) -> String {
    let mut fields: Vec<String> = record.values.iter().map(|v| v.to_string()).collect();
    fields.push(format_datetime(&record.captured_at));
    fields.join(",")
}

/// Owns the log file for the lifetime of the process.
///
/// Nothing is held open between cycles: every append opens, writes and closes
/// the file, so a crash can only lose the row being written.
#[derive(Debug)]
pub struct RecordWriter {
    path: PathBuf,
}

impl RecordWriter {
    /// Prepare `data_dir` and create a fresh log file containing only the header.
    ///
    /// An existing directory is fine; any other failure to create it is fatal.
    pub fn initialize(data_dir: &Path, created_at: &OffsetDateTime) -> LoggerResult<Self> {
        match fs::create_dir(data_dir) {
            Ok(()) => info!("Created data directory {}", data_dir.display()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                info!("Data directory {} already exists", data_dir.display())
            }
            Err(e) => return Err(e.into()),
        }

        let path = data_dir.join(format!("enviro_data_{}.csv", format_file_stamp(created_at)));
        info!("Opening log file {}", path.display());

        let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        writeln!(file, "{}", header())?;

        Ok(RecordWriter { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &Record) -> LoggerResult<()> {
        let row = format_row(record);
        {
            let mut file: File = OpenOptions::new().append(true).open(&self.path)?;
            writeln!(file, "{}", row)?;
            file.sync_data()?;
        }
        debug!("Appended row to {}: {}", self.path.display(), row);
        Ok(())
    }
}
