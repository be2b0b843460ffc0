use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::pipeline::backoff::JitterBackoff;
use crate::services::enhance::EnhanceClient;

/// Polling bounds for a single enhancement job.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub backoff: JitterBackoff,
}

/// Read-only context shared by every pipeline task in a run.
#[derive(Clone)]
pub struct AppContext {
    pub client: Arc<EnhanceClient>,
    pub output_dir: PathBuf,
    pub extension: String,
    pub profile: String,
    pub poll: PollPolicy,
}

impl AppContext {
    pub fn new(
        client: EnhanceClient,
        output_dir: PathBuf,
        extension: String,
        profile: String,
        poll: PollPolicy,
    ) -> Self {
        Self {
            client: Arc::new(client),
            output_dir,
            extension,
            profile,
            poll,
        }
    }

    /// Build from validated configuration and an already obtained bearer token.
    pub fn from_config(
        config: &AppConfig,
        http: reqwest::Client,
        bearer_token: String,
    ) -> Self {
        let (min, max) = config.poll_delay_bounds();
        Self::new(
            EnhanceClient::new(http, &config.enhance_api_url, bearer_token),
            config.output_dir(),
            config.source_extension.clone(),
            config.enhance_profile.clone(),
            PollPolicy {
                timeout: config.poll_timeout(),
                backoff: JitterBackoff::new(min, max),
            },
        )
    }
}
