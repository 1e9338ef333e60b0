//! Diagnostic tracing, written to stderr.
//!
//! Stdout carries only shell output and task results, so logs can be
//! redirected without mixing the two.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. Reads `RUST_LOG`, defaulting to `info`.
///
/// ```bash
/// RUST_LOG=browser_agent=debug browser-agent "find the docs link on example.com"
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
