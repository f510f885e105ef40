//! Structured logging infrastructure for Meshlink.
//!
//! Node and CA processes call [`init_from_env`] once at startup. The log
//! level is taken from `RUST_LOG` (default `info`) and the output format
//! from `LOG_FORMAT` (`json` for structured output, anything else for the
//! human-readable layer).

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable selecting the output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the logging system with human-readable output.
///
/// # Example
/// ```no_run
/// use meshlink_core::logging;
///
/// logging::init();
/// tracing::info!("Node started");
/// ```
pub fn init() {
    tracing_subscriber::registry()
        .with(default_filter())
        .with(fmt::layer().with_target(true))
        .init();
}

/// Initialize the logging system with JSON output.
///
/// This format is suitable for log aggregation across many node processes.
///
/// # Example
/// ```no_run
/// use meshlink_core::logging;
///
/// logging::init_json();
/// tracing::info!(node = "A", "Node started");
/// ```
pub fn init_json() {
    tracing_subscriber::registry()
        .with(default_filter())
        .with(fmt::layer().json().with_target(true))
        .init();
}

/// Pick [`init`] or [`init_json`] based on `LOG_FORMAT`.
pub fn init_from_env() {
    if wants_json(std::env::var(LOG_FORMAT_ENV).ok().as_deref()) {
        init_json();
    } else {
        init();
    }
}

fn wants_json(format: Option<&str>) -> bool {
    matches!(format, Some(f) if f.eq_ignore_ascii_case("json"))
}
