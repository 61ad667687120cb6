//! Structured Logging Setup
//!
//! Builds the `tracing` subscriber from [`LoggingConfig`]: an `EnvFilter`
//! seeded with the configured level (overridable through `RUST_LOG`) and one
//! of the json, pretty or compact formatters.

use anyhow::{Context, Result};
use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Build a subscriber writing to `writer`
pub fn build_subscriber<W>(
    config: &LoggingConfig,
    level: Level,
    writer: W,
) -> Box<dyn Subscriber + Send + Sync>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let builder = fmt().with_env_filter(filter).with_writer(writer);

    match config.format.to_lowercase().as_str() {
        "json" => Box::new(builder.json().finish()),
        "pretty" => Box::new(builder.pretty().finish()),
        _ => Box::new(builder.compact().finish()),
    }
}

/// Install the global subscriber
///
/// `verbose` forces the debug level regardless of configuration.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else {
        config.tracing_level()?
    };

    let subscriber = build_subscriber(config, level, std::io::stderr);
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tracing::{debug, warn};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
        }
    }

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Capture {
        type Writer = Capture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn config(format: &str) -> LoggingConfig {
        LoggingConfig {
            level: "info".to_string(),
            format: format.to_string(),
        }
    }

    /// JSON output is one parseable object per line with structured fields
    #[test]
    fn test_json_output_format() {
        let capture = Capture::default();
        let subscriber = build_subscriber(&config("json"), Level::INFO, capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            warn!(owner_id = "user-1", used = 10, "Quota exhausted");
        });

        let output = capture.contents();
        let line = output.lines().next().expect("one log line");
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(value["fields"]["message"], "Quota exhausted");
        assert_eq!(value["fields"]["owner_id"], "user-1");
        assert_eq!(value["fields"]["used"], 10);
    }

    /// Compact output is human-readable text
    #[test]
    fn test_compact_output_format() {
        let capture = Capture::default();
        let subscriber = build_subscriber(&config("compact"), Level::INFO, capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            warn!(key = "general:ip:unknown", "Rate limit exceeded");
        });

        let output = capture.contents();
        assert!(output.contains("Rate limit exceeded"));
        assert!(output.contains("general:ip:unknown"));
        assert!(serde_json::from_str::<serde_json::Value>(output.trim()).is_err());
    }

    /// Events below the configured level are filtered
    #[test]
    fn test_log_level_filtering() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let capture = Capture::default();
        let subscriber = build_subscriber(&config("compact"), Level::INFO, capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            debug!("hidden detail");
            warn!("visible warning");
        });

        let output = capture.contents();
        assert!(!output.contains("hidden detail"));
        assert!(output.contains("visible warning"));
    }

    #[test]
    fn test_init_rejects_invalid_level() {
        let config = LoggingConfig {
            level: "loud".to_string(),
            format: "compact".to_string(),
        };
        assert!(init(&config, false).is_err());
    }
}
