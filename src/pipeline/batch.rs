use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::app_state::AppContext;
use crate::models::record::{ProcessingRecord, RecordStatus};
use crate::pipeline::stages::process_record;
use crate::services::discovery::sanitize_base_name;
use crate::services::status_log::{LogError, StatusLog};

/// Outcome of one batch run, in discovery order.
#[derive(Debug)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub records: Vec<ProcessingRecord>,
}

impl BatchReport {
    pub fn batch_size(&self) -> usize {
        self.records.len()
    }

    pub fn completed(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status() == RecordStatus::Complete)
            .count()
    }

    /// Records that did not reach `complete`.
    pub fn non_completions(&self) -> usize {
        self.batch_size() - self.completed()
    }

    pub fn summary(&self) -> String {
        format!("Non-completions: {}/{}", self.non_completions(), self.batch_size())
    }
}

/// Span wrapping one record's pipeline, keyed by its sanitized name.
fn record_span(path: &Path, extension: &str) -> tracing::Span {
    tracing::info_span!(
        "record",
        key = %sanitize_base_name(path, extension),
        source = %path.display()
    )
}

/// Spawn one pipeline task per file and wait for all of them.
///
/// Each task owns its record and hands it back on completion. A task that
/// panics yields a failed record for its file instead of losing it.
pub async fn run_pipelines(ctx: Arc<AppContext>, files: Vec<PathBuf>) -> Vec<ProcessingRecord> {
    let (paths, handles): (Vec<_>, Vec<_>) = files
        .into_iter()
        .map(|path| {
            let ctx = ctx.clone();
            let record = ProcessingRecord::new(path.clone());
            let span = record_span(&path, &ctx.extension);
            let handle = tokio::spawn(
                async move { process_record(&ctx, record).await }.instrument(span),
            );
            (path, handle)
        })
        .unzip();

    let results = futures::future::join_all(handles).await;

    paths
        .into_iter()
        .zip(results)
        .map(|(path, result)| match result {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(source = %path.display(), error = %e, "Pipeline task aborted");
                let mut record = ProcessingRecord::new(path);
                record.fail(format!("pipeline task aborted: {e}"));
                record
            }
        })
        .collect()
}

/// Process a discovered batch and append every outcome to the status log.
///
/// The log is written once, after all pipelines have finished. An empty batch
/// writes nothing.
pub async fn run_batch(
    ctx: Arc<AppContext>,
    files: Vec<PathBuf>,
    log: &mut StatusLog,
) -> Result<BatchReport, LogError> {
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("batch", run_id = %run_id, size = files.len());

    if files.is_empty() {
        span.in_scope(|| tracing::info!("Nothing to process"));
        return Ok(BatchReport {
            run_id,
            records: Vec::new(),
        });
    }

    let records = async {
        tracing::info!("Starting batch");
        run_pipelines(ctx, files).await
    }
    .instrument(span.clone())
    .await;

    let report = BatchReport { run_id, records };

    span.in_scope(|| -> Result<(), LogError> {
        let written = log.append_all(&report.records)?;
        tracing::info!(
            rows = written,
            completed = report.completed(),
            failures = report.non_completions(),
            log = %log.path().display(),
            "{}",
            report.summary()
        );
        Ok(())
    })?;

    Ok(report)
}
