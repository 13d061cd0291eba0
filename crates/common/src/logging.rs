//! Logging and tracing initialization.
//!
//! Logs go to stderr so the CLI's progress line on stdout stays intact.

use tracing_subscriber::fmt::format::FmtSpan;

use crate::config::LoggingConfig;

/// Initialize the tracing subscriber with the given configuration.
///
/// `RUST_LOG` takes precedence over `config.level` when set.
pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_span_events(span_events(config));

    if config.json {
        let subscriber = builder.json().with_current_span(true).finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let subscriber = builder
            .with_target(config.targets)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }
}

/// Span lifecycle events to emit. Closing a phase span logs its busy and
/// idle time, which is how per-phase export timings are reported.
pub fn span_events(config: &LoggingConfig) -> FmtSpan {
    if config.phase_timings {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}
