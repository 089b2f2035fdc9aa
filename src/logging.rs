//! Logging setup
//!
//! Tracing subscriber with JSON output by default and a human-readable format
//! for local work. `RUST_LOG` takes precedence over the configured level.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing_subscriber::{fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Output format of the console log layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            _ => anyhow::bail!("Invalid log format: {}. Expected: json or pretty", s),
        }
    }
}

fn filter_for(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

/// Install the global subscriber; a second call is a no-op
pub fn init_tracing(log_level: &str, format: LogFormat) {
    let layer = match format {
        LogFormat::Json => tracing_fmt::layer()
            .json()
            .with_current_span(false)
            .with_filter(filter_for(log_level))
            .boxed(),
        LogFormat::Pretty => tracing_fmt::layer()
            .with_target(false)
            .with_filter(filter_for(log_level))
            .boxed(),
    };

    if tracing_subscriber::registry().with(layer).try_init().is_err() {
        eprintln!("Tracing subscriber already installed; keeping the existing one");
    }
}
