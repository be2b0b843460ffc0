use tracing_subscriber::EnvFilter;

use enhance_batch::config::AppConfig;
use enhance_batch::startup;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    tracing::info!(
        source_dir = %config.source_dir.display(),
        output_dir = %config.output_dir().display(),
        "Starting enhancement batch"
    );

    match startup::run(&config).await {
        Ok(report) => {
            // Per-record failures are in the log; the process still succeeds.
            println!("{}", report.summary());
        }
        Err(e) => {
            tracing::error!(error = %e, "Batch aborted during startup");
            std::process::exit(1);
        }
    }
}
