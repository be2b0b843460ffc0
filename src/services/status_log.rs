use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::models::record::{ProcessingRecord, RecordStatus};

/// Column names written once, when the log file is first created.
pub const HEADER: [&str; 7] = [
    "Original Path",
    "Input Ref",
    "Output Ref",
    "Enhance Job Id",
    "Final Path",
    "Status",
    "Error",
];

/// One flattened, positional log row.
#[derive(Debug, Serialize)]
pub struct StatusRow {
    pub source_path: String,
    pub input_ref: String,
    pub output_ref: String,
    pub job_id: String,
    pub final_path: String,
    pub status: RecordStatus,
    pub error: String,
}

impl From<&ProcessingRecord> for StatusRow {
    fn from(record: &ProcessingRecord) -> Self {
        Self {
            source_path: record.source_path().display().to_string(),
            input_ref: record.remote_input_ref().to_string(),
            output_ref: record.remote_output_ref().to_string(),
            job_id: record.job_id().to_string(),
            final_path: record
                .final_path()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            status: record.status(),
            error: record.error().unwrap_or_default().to_string(),
        }
    }
}

/// Append-only CSV audit trail of per-file outcomes.
pub struct StatusLog {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl StatusLog {
    /// Open the log for appending, writing the header if the file is new.
    pub fn open(path: &Path) -> Result<Self, LogError> {
        let created = !path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| LogError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if created {
            writer.write_record(HEADER)?;
            writer.flush()?;
            tracing::info!(path = %path.display(), "Created status log");
        }

        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row per record, then flush once.
    pub fn append_all(&mut self, records: &[ProcessingRecord]) -> Result<usize, LogError> {
        for record in records {
            let row = StatusRow::from(record);
            tracing::debug!(
                source = %row.source_path,
                status = %row.status,
                "Writing status row"
            );
            self.writer.serialize(&row)?;
        }
        self.writer.flush()?;
        Ok(records.len())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("Failed to open status log {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write status log: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to flush status log: {0}")]
    Io(#[from] std::io::Error),
}
