use std::sync::Arc;

use crate::app_state::AppContext;
use crate::config::AppConfig;
use crate::pipeline::batch::{run_batch, BatchReport};
use crate::services::auth::{obtain_access_token, AuthError, Credentials};
use crate::services::discovery::{discover_pending, DiscoveryError};
use crate::services::status_log::{LogError, StatusLog};

/// Conditions that abort the run before any pipeline starts.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Failed to create output directory {path}: {source}")]
    OutputDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error("Credential bootstrap failed: {0}")]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// Prepare the output location, log, and credentials, then process one batch.
pub async fn run(config: &AppConfig) -> Result<BatchReport, StartupError> {
    let output_dir = config.output_dir();
    std::fs::create_dir_all(&output_dir).map_err(|source| StartupError::OutputDir {
        path: output_dir.display().to_string(),
        source,
    })?;

    let mut log = StatusLog::open(&config.status_log_path())?;

    let http = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .map_err(StartupError::HttpClient)?;

    let credentials = Credentials {
        auth_url: &config.enhance_auth_url,
        app_key: &config.enhance_app_key,
        app_secret: &config.enhance_app_secret,
        ttl_secs: config.token_ttl_secs,
    };
    let token =
        obtain_access_token(&http, &credentials, config.token_cache_path.as_deref()).await?;

    let files = discover_pending(
        &config.source_dir,
        &output_dir,
        &config.source_extension,
        config.batch_limit,
    )?;
    tracing::info!(
        source_dir = %config.source_dir.display(),
        pending = files.len(),
        "Discovered files to process"
    );

    let ctx = Arc::new(AppContext::from_config(config, http, token.access_token));
    Ok(run_batch(ctx, files, &mut log).await?)
}
