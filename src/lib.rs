pub mod config;
pub mod pipeline;
pub mod rerank;

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Logs go to stderr so stdout stays free
/// for command output.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();
}
