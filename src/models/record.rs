use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strum::{Display, EnumString};

/// Lifecycle of a record within a single run.
///
/// `New -> Pending -> Complete`, or `New/Pending -> Failure`. `Failure` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecordStatus {
    New,
    Pending,
    Complete,
    Failure,
}

/// Per-file state carried through one pipeline execution.
///
/// Fields are only mutated through the transition methods below, all of which
/// are no-ops once the record has failed.
#[derive(Debug, Clone)]
pub struct ProcessingRecord {
    source_path: PathBuf,
    remote_input_ref: String,
    remote_output_ref: String,
    job_id: String,
    final_path: Option<PathBuf>,
    status: RecordStatus,
    error: Option<String>,
}

impl ProcessingRecord {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            remote_input_ref: String::new(),
            remote_output_ref: String::new(),
            job_id: String::new(),
            final_path: None,
            status: RecordStatus::New,
            error: None,
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn remote_input_ref(&self) -> &str {
        &self.remote_input_ref
    }

    pub fn remote_output_ref(&self) -> &str {
        &self.remote_output_ref
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn final_path(&self) -> Option<&Path> {
        self.final_path.as_deref()
    }

    pub fn status(&self) -> RecordStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_failed(&self) -> bool {
        self.status == RecordStatus::Failure
    }

    /// Input reference registered and bytes transferred.
    pub fn mark_uploaded(&mut self, input_ref: String) {
        if self.is_failed() {
            return;
        }
        self.remote_input_ref = input_ref;
    }

    /// Output destination declared for the enhancement job.
    pub fn declare_output(&mut self, output_ref: String) {
        if self.is_failed() {
            return;
        }
        self.remote_output_ref = output_ref;
    }

    /// Job accepted by the service; the record now waits on it.
    pub fn mark_pending(&mut self, job_id: String) {
        if self.is_failed() {
            return;
        }
        self.job_id = job_id;
        self.status = RecordStatus::Pending;
    }

    /// Artifact saved locally.
    pub fn mark_complete(&mut self, final_path: PathBuf) {
        if self.is_failed() {
            return;
        }
        self.final_path = Some(final_path);
        self.status = RecordStatus::Complete;
    }

    /// Record a terminal failure. The first cause wins.
    pub fn fail(&mut self, cause: impl Into<String>) {
        if self.is_failed() {
            return;
        }
        let mut cause = cause.into();
        if cause.is_empty() {
            cause = "unknown failure".to_string();
        }
        self.status = RecordStatus::Failure;
        self.error = Some(cause);
    }
}
