//! Log output
//!
//! Logs always go to stderr. Stdout is left to the reconciliation report, so
//! `run --json` can be piped while logging in either format.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::config::{LogFormat, LoggingConfig};

/// Installs the global subscriber; `RUST_LOG` wins over the configured level
pub fn init_logging(config: &LoggingConfig) {
    tracing_subscriber::registry()
        .with(output_layer(config.format))
        .with(env_filter(config))
        .init();

    tracing::debug!("Logging initialized with level: {}", config.level);
}

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// JSON lines carry the current action span on every event, plus a close
/// event per run with its timings, for CI log collectors. The pretty format
/// is one line per event for a terminal.
fn output_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(false)
            .with_span_events(FmtSpan::NONE)
            .with_writer(std::io::stderr)
            .boxed(),
    }
}
