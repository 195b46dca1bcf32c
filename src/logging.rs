//! Tracing subscriber setup for the `wp` binary.
//!
//! Library code only emits events; the binary installs the subscriber once at
//! startup. Events go to stderr so stdout stays clean for command output.

use crate::config::{LOG_ENV, LogFormat};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Build the event filter from a directive such as `"warn"` or `"waypoint=debug"`.
///
/// An unparsable directive falls back to `warn`.
pub fn build_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install the global subscriber.
///
/// `directive` is the already-resolved level (`WP_LOG`, then config, then
/// default). Calling this twice is harmless; the second install is ignored.
pub fn init(directive: &str, format: LogFormat) {
    let filter = build_filter(directive);
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    } else {
        tracing::trace!(env = LOG_ENV, directive, %format, "logging initialized");
    }
}
