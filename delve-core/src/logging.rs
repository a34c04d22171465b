//! Tracing subscriber setup for binaries and tests embedding the pipeline.
//!
//! The library itself only emits events; nothing here runs unless a caller
//! asks for it.

use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer};

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines on stderr.
    #[default]
    Pretty,
    /// One JSON object per event on stderr.
    Json,
}

/// Filter directive for a verbosity count (`-v` flags) and a quiet switch.
pub fn filter_directive(verbosity: u8, quiet: bool) -> &'static str {
    match verbosity {
        0 if quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// `RUST_LOG` when set and valid, otherwise the verbosity directive.
fn build_filter(verbosity: u8, quiet: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(verbosity, quiet)))
}

fn subscriber(
    verbosity: u8,
    quiet: bool,
    format: LogFormat,
) -> impl tracing::Subscriber + Send + Sync + 'static {
    let pretty = (format == LogFormat::Pretty).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(build_filter(verbosity, quiet))
    });
    let json = (format == LogFormat::Json).then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(build_filter(verbosity, quiet))
    });
    tracing_subscriber::registry().with(pretty).with(json)
}

/// Install the global subscriber. Panics if one is already installed.
pub fn init_tracing(verbosity: u8, quiet: bool, format: LogFormat) {
    subscriber(verbosity, quiet, format).init();
}

/// Install the global subscriber unless one is already installed.
pub fn try_init_tracing(verbosity: u8, quiet: bool, format: LogFormat) -> Result<(), TryInitError> {
    subscriber(verbosity, quiet, format).try_init()
}
