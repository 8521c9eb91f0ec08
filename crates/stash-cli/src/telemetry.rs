//! Logging initialization.

use crate::config::LoggingConfig;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Invalid log filter '{0}': {1}")]
    Filter(String, String),
    #[error("Failed to initialize logging: {0}")]
    Init(String),
}

/// Filter from `rust_log` when set, else from the configured level. An
/// unparsable directive is an error in either case.
fn build_filter(
    config: &LoggingConfig,
    rust_log: Option<&str>,
) -> Result<EnvFilter, TelemetryError> {
    let directive = rust_log.unwrap_or(&config.level);
    EnvFilter::try_new(directive)
        .map_err(|e| TelemetryError::Filter(directive.to_string(), e.to_string()))
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
pub fn init_telemetry(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let env_filter = build_filter(config, rust_log.as_deref())?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = if config.json {
        registry
            .with(fmt::layer().json().with_target(true))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init()
    };

    installed.map_err(|e| TelemetryError::Init(e.to_string()))
}
