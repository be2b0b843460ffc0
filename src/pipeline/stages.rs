//! The four remote-call stages run for every record.
//!
//! Each stage takes the record by `&mut`, does nothing if it has already
//! failed, and on error records the cause instead of returning it.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;

use crate::app_state::AppContext;
use crate::models::record::{ProcessingRecord, RecordStatus};
use crate::services::discovery::{expected_output_path, sanitize_base_name};
use crate::services::enhance::EnhanceError;

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("Media input creation failed: {0}")]
    CreateInput(#[source] EnhanceError),

    #[error("Upload transfer failed: {0}")]
    Transfer(#[source] EnhanceError),

    #[error("Enhancement request failed: {0}")]
    Enhance(#[source] EnhanceError),

    #[error("Empty job identifier in enhancement response")]
    EmptyJobId,

    #[error("polling attempted without a pending job")]
    NotPending,

    #[error("Polling request failed: {0}")]
    Poll(#[source] EnhanceError),

    #[error("Enhancement job reported status {0}")]
    RemoteJobFailed(String),

    #[error("Timeout after {0:?} while polling for job completion")]
    PollTimeout(Duration),

    #[error("Download failed: {0}")]
    Download(#[source] EnhanceError),

    #[error("Failed to finalize artifact {}: {source}", path.display())]
    Finalize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn remote_ref(direction: &str, record: &ProcessingRecord, extension: &str) -> String {
    format!(
        "dlb://{direction}/{}.{extension}",
        sanitize_base_name(record.source_path(), extension)
    )
}

fn fail(record: &mut ProcessingRecord, error: StageError) {
    tracing::warn!(
        source = %record.source_path().display(),
        error = %error,
        "Record failed"
    );
    record.fail(error.to_string());
}

/// Register the input with the service and transfer the file bytes.
pub async fn upload(ctx: &AppContext, record: &mut ProcessingRecord) {
    if record.is_failed() {
        return;
    }

    let input_ref = remote_ref("in", record, &ctx.extension);
    tracing::info!(input_ref = %input_ref, "Creating media input");

    let presigned_url = match ctx.client.create_input(&input_ref).await {
        Ok(url) => url,
        Err(e) => return fail(record, StageError::CreateInput(e)),
    };

    if let Err(e) = ctx.client.upload_file(&presigned_url, record.source_path()).await {
        return fail(record, StageError::Transfer(e));
    }

    record.mark_uploaded(input_ref);
}

/// Submit the enhancement job; success moves the record to `pending`.
pub async fn enhance(ctx: &AppContext, record: &mut ProcessingRecord) {
    if record.is_failed() {
        return;
    }

    let output_ref = remote_ref("out", record, &ctx.extension);
    tracing::info!(output_ref = %output_ref, profile = %ctx.profile, "Submitting enhancement job");

    let job_id = match ctx
        .client
        .submit_job(record.remote_input_ref(), &output_ref, &ctx.profile)
        .await
    {
        Ok(id) => id,
        Err(e) => return fail(record, StageError::Enhance(e)),
    };

    if job_id.is_empty() {
        return fail(record, StageError::EmptyJobId);
    }

    record.declare_output(output_ref);
    record.mark_pending(job_id);
}

/// Wait for the job to reach 100% progress, within the configured timeout.
pub async fn poll(ctx: &AppContext, record: &mut ProcessingRecord) {
    if record.status() != RecordStatus::Pending {
        // Keeps an earlier cause if the record already failed.
        return fail(record, StageError::NotPending);
    }

    let job_id = record.job_id().to_string();
    let timeout = ctx.poll.timeout;
    let started = Instant::now();

    loop {
        let remaining = timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return fail(record, StageError::PollTimeout(timeout));
        }

        // A stalled status request must not outlive the polling budget.
        let job = match tokio::time::timeout(remaining, ctx.client.job_status(&job_id)).await {
            Ok(Ok(job)) => job,
            Ok(Err(e)) => return fail(record, StageError::Poll(e)),
            Err(_) => return fail(record, StageError::PollTimeout(timeout)),
        };
        tracing::debug!(job_id = %job_id, progress = job.progress, status = %job.status, "Polled job");

        if job.is_failed() {
            return fail(record, StageError::RemoteJobFailed(job.status));
        }
        if job.is_finished() {
            tracing::info!(job_id = %job_id, "Enhancement job finished");
            return;
        }

        let remaining = timeout.saturating_sub(started.elapsed());
        let delay = ctx
            .poll
            .backoff
            .next_delay_within(&mut rand::thread_rng(), remaining);
        tokio::time::sleep(delay).await;
    }
}

fn partial_path(final_path: &Path) -> PathBuf {
    let mut name = OsString::from(final_path.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

/// Fetch the enhanced artifact into the output directory.
///
/// Bytes land in a `.part` file that is renamed into place only once complete,
/// so the sanitized name never exists for a partial download.
pub async fn download(ctx: &AppContext, record: &mut ProcessingRecord) {
    if record.is_failed() {
        return;
    }

    let final_path = expected_output_path(record.source_path(), &ctx.output_dir, &ctx.extension);
    let part_path = partial_path(&final_path);
    tracing::info!(output_ref = %record.remote_output_ref(), "Downloading enhanced artifact");

    let written = match ctx
        .client
        .download_output(record.remote_output_ref(), &part_path)
        .await
    {
        Ok(n) => n,
        Err(e) => {
            let _ = tokio::fs::remove_file(&part_path).await;
            return fail(record, StageError::Download(e));
        }
    };

    if let Err(source) = tokio::fs::rename(&part_path, &final_path).await {
        let _ = tokio::fs::remove_file(&part_path).await;
        return fail(
            record,
            StageError::Finalize {
                path: final_path,
                source,
            },
        );
    }

    tracing::info!(path = %final_path.display(), bytes = written, "Saved enhanced artifact");
    record.mark_complete(final_path);
}

/// Run all four stages for one record, in order.
pub async fn process_record(ctx: &AppContext, mut record: ProcessingRecord) -> ProcessingRecord {
    upload(ctx, &mut record).await;
    enhance(ctx, &mut record).await;
    poll(ctx, &mut record).await;
    download(ctx, &mut record).await;
    record
}
