//! # Observability
//!
//! Logging setup shared by every credbroker binary.
//!
//! Library crates only emit `tracing` events; the binary calls
//! [`init_with_config`] once at startup. With the `file-sink` feature (on by
//! default) every event is also appended as one JSON object per line to
//! `~/.credbroker/logs/credbroker.jsonl`, so a broken login can be diagnosed
//! after the fact with `jq`:
//!
//! ```text
//! tail -n 50 ~/.credbroker/logs/credbroker.jsonl | jq .
//! ```
//!
//! Field values whose names look like credentials (passwords, tokens,
//! session ids, SAML assertions) are masked before they reach the file.
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "credbroker".into(),
//!     default_level: "info".into(),
//!     also_stderr: true,
//!     ..Default::default()
//! });
//! ```

#[cfg(feature = "file-sink")]
mod file_sink;

mod json_layer;

use std::path::PathBuf;

pub use json_layer::{is_sensitive_field, LogEntry, MASKED};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name written into every JSONL entry.
    pub service_name: String,

    /// Default filter directive (e.g. "info", "credbroker=debug").
    /// `RUST_LOG` takes precedence when set.
    pub default_level: String,

    /// Custom JSONL path. Defaults to `~/.credbroker/logs/credbroker.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Also print compact, human readable lines on stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "credbroker".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize logging with default settings for the given service.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize logging with custom configuration.
///
/// Calling this twice is harmless: the second global subscriber install is
/// rejected by `tracing` and ignored here.
pub fn init_with_config(config: LogConfig) {
    #[cfg(feature = "file-sink")]
    {
        match file_sink::init_file_subscriber(&config) {
            Ok(()) => return,
            Err(e) => {
                // No writable home directory; fall back to stderr only.
                eprintln!("warning: file logging disabled: {}", e);
            }
        }
    }

    init_stderr_subscriber(&config);
}

fn init_stderr_subscriber(config: &LogConfig) {
    use tracing_subscriber::util::SubscriberInitExt;

    let level = if config.also_stderr {
        config.default_level.as_str()
    } else {
        "warn"
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .finish()
        .try_init();
}

/// Default location of the JSONL log file.
pub fn default_log_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| {
        home.join(".credbroker")
            .join("logs")
            .join("credbroker.jsonl")
    })
}

pub use tracing::{debug, error, info, instrument, trace, warn};
pub use tracing::Level;
