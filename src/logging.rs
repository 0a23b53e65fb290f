//! Diagnostic logging to stderr, filtered by `AG_LOG`.

use tracing_subscriber::EnvFilter;

use crate::config::DEFAULT_LOG_FILTER;

/// Installs the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(parse_filter(filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

/// Parses a filter directive, falling back to the default level when the
/// directive is malformed.
pub fn parse_filter(filter: &str) -> EnvFilter {
    EnvFilter::try_new(filter.trim()).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}
