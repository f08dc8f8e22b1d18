//! Logging setup helper
//!
//! The protocol crates only *emit* `tracing` events and OpenTelemetry
//! metrics; installing exporters and subscribers is the host application's
//! job. This module covers the common case of a host (or an integration
//! test) that just wants readable local logs without assembling a
//! subscriber stack by hand.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration.
///
/// # Examples
///
/// ```
/// use playlink_core::observability::LogConfig;
///
/// let config = LogConfig::new("debug").with_json(true);
/// assert_eq!(config.log_level, "debug");
/// ```
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is unset. Accepts the usual directives,
    /// e.g. `"info"` or `"playlink_client=debug"`.
    pub log_level: String,
    /// Emit one JSON object per line instead of human-readable text.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

impl LogConfig {
    /// Create a configuration with the given fallback filter.
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            log_level: level.into(),
            ..Default::default()
        }
    }

    /// Switch between JSON and plain-text output.
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

/// Install a global `tracing` subscriber.
///
/// `RUST_LOG` wins over the configured level when set. Uses `try_init`
/// underneath, so a second call returns an error instead of panicking.
pub fn init_logging(config: &LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    if config.json {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_line_number(true)
            .json();
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = LogConfig::default();
        assert_eq!(config.log_level, "info");
        assert!(!config.json);
    }

    #[test]
    fn builder_chaining() {
        let config = LogConfig::new("playlink_client=trace").with_json(true);
        assert_eq!(config.log_level, "playlink_client=trace");
        assert!(config.json);
    }
}
