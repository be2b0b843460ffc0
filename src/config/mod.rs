use garde::Validate;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AppConfig {
    /// Directory holding the source audio files
    #[garde(skip)]
    pub source_dir: PathBuf,

    /// Destination for enhanced artifacts. Defaults to `<source_dir>/out`.
    #[serde(default)]
    #[garde(skip)]
    pub output_dir: Option<PathBuf>,

    /// Append-only status log. Defaults to `<output_dir>/status.csv`.
    #[serde(default)]
    #[garde(skip)]
    pub status_log_path: Option<PathBuf>,

    /// Extension (without the dot) of files considered for processing
    #[serde(default = "default_source_extension")]
    #[garde(length(min = 1), ascii, alphanumeric)]
    pub source_extension: String,

    /// Optional upper bound on the number of files processed in one run
    #[serde(default)]
    #[garde(skip)]
    pub batch_limit: Option<usize>,

    /// Client-credentials key for the enhancement service
    #[garde(length(min = 1))]
    pub enhance_app_key: String,

    /// Client-credentials secret for the enhancement service
    #[garde(length(min = 1))]
    pub enhance_app_secret: String,

    /// Media API base URL
    #[serde(default = "default_api_url")]
    #[garde(length(min = 1))]
    pub enhance_api_url: String,

    /// OAuth token endpoint
    #[serde(default = "default_auth_url")]
    #[garde(length(min = 1))]
    pub enhance_auth_url: String,

    /// Processing profile sent with every enhancement job
    #[serde(default = "default_profile")]
    #[garde(length(min = 1))]
    pub enhance_profile: String,

    /// Optional file used to cache the bearer token between runs
    #[serde(default)]
    #[garde(skip)]
    pub token_cache_path: Option<PathBuf>,

    /// Lifetime requested for freshly issued tokens
    #[serde(default = "default_token_ttl_secs")]
    #[garde(range(min = 60))]
    pub token_ttl_secs: u64,

    /// Wall-clock bound on polling a single job
    #[serde(default = "default_poll_timeout_secs")]
    #[garde(range(min = 1))]
    pub poll_timeout_secs: u64,

    #[serde(default = "default_poll_min_delay_ms")]
    #[garde(range(min = 1))]
    pub poll_min_delay_ms: u64,

    #[serde(default = "default_poll_max_delay_ms")]
    #[garde(range(min = 1))]
    pub poll_max_delay_ms: u64,

    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout_secs")]
    #[garde(range(min = 1))]
    pub request_timeout_secs: u64,
}

fn default_source_extension() -> String {
    "mp3".to_string()
}

fn default_api_url() -> String {
    "https://api.dolby.com".to_string()
}

fn default_auth_url() -> String {
    "https://api.dolby.io/v1/auth/token".to_string()
}

fn default_profile() -> String {
    "studio".to_string()
}

fn default_token_ttl_secs() -> u64 {
    1800
}

fn default_poll_timeout_secs() -> u64 {
    15 * 60
}

fn default_poll_min_delay_ms() -> u64 {
    1_000
}

fn default_poll_max_delay_ms() -> u64 {
    10_000
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl AppConfig {
    /// Load from the process environment, after reading an optional `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    /// Build from explicit key/value pairs (upper-case variable names).
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Self = envy::from_iter(vars)?;
        config.validate()?;

        if config.poll_min_delay_ms > config.poll_max_delay_ms {
            return Err(ConfigError::PollDelayBounds {
                min: config.poll_min_delay_ms,
                max: config.poll_max_delay_ms,
            });
        }

        if config.batch_limit == Some(0) {
            return Err(ConfigError::ZeroBatchLimit);
        }

        Ok(config)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| self.source_dir.join("out"))
    }

    pub fn status_log_path(&self) -> PathBuf {
        self.status_log_path
            .clone()
            .unwrap_or_else(|| self.output_dir().join("status.csv"))
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn poll_delay_bounds(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.poll_min_delay_ms),
            Duration::from_millis(self.poll_max_delay_ms),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] garde::Report),

    #[error("POLL_MIN_DELAY_MS ({min}) must not exceed POLL_MAX_DELAY_MS ({max})")]
    PollDelayBounds { min: u64, max: u64 },

    #[error("BATCH_LIMIT must be at least 1 when set")]
    ZeroBatchLimit,
}
