//! Application settings and configuration
//!
//! Settings come from environment variables (and a `.env` file when present)
//! with defaults suited to local development.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::logging::LogFormat;
use crate::services::rotation::{CooldownPolicy, FallbackChains, HealthPolicy, RotationConfig};
use crate::utils::RetryConfig;

/// Application environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    #[value(alias = "dev")]
    Development,
    #[value(alias = "stage")]
    Staging,
    #[value(alias = "prod")]
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => anyhow::bail!("Invalid environment: {}. Expected: development, staging, or production", s),
        }
    }
}

/// Rotation tuning knobs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RotationSettings {
    pub error_threshold: u32,
    pub exclusion_threshold: u32,
    pub health_check_interval_secs: u64,
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub retry_jitter_ms: u64,
    pub payment_cooldown_secs: u64,
    pub payment_repeat_cooldown_secs: u64,
    pub rate_limit_cooldown_secs: u64,
    pub other_cooldown_secs: u64,
    pub abort_on_payment_required: bool,
    /// `primary=alt1,alt2;other=alt3`
    pub fallback_chains: String,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            error_threshold: 3,
            exclusion_threshold: 3,
            health_check_interval_secs: 300,
            max_attempts: 3,
            retry_base_delay_ms: 2000,
            retry_max_delay_ms: 30_000,
            retry_jitter_ms: 1000,
            payment_cooldown_secs: 3600,
            payment_repeat_cooldown_secs: 86_400,
            rate_limit_cooldown_secs: 300,
            other_cooldown_secs: 30,
            abort_on_payment_required: true,
            fallback_chains: FallbackChains::llm_defaults().to_string(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    // App settings
    pub app_name: String,
    pub app_version: String,
    pub environment: Environment,
    pub log_level: String,
    pub log_format: LogFormat,

    // Server settings
    pub host: String,
    pub port: u16,

    // Authentication for /admin
    #[serde(skip_serializing)]
    pub admin_api_key: Option<String>,

    pub rotation: RotationSettings,
}

impl Settings {
    /// Load settings from environment variables with defaults
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let defaults = RotationSettings::default();

        let settings = Self {
            app_name: get("APP_NAME", "api-rotation"),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: get("ENVIRONMENT", "development").parse().unwrap_or_default(),
            log_level: get("LOG_LEVEL", "info"),
            log_format: get("LOG_FORMAT", "json").parse().unwrap_or_default(),

            host: get("HOST", "0.0.0.0"),
            port: get("PORT", "8080").parse().context("Invalid PORT value")?,

            admin_api_key: lookup("ADMIN_API_KEY").filter(|v| !v.trim().is_empty()),

            rotation: RotationSettings {
                error_threshold: parse_var(&get, "ROTATION_ERROR_THRESHOLD", defaults.error_threshold)?,
                exclusion_threshold: parse_var(
                    &get,
                    "ROTATION_EXCLUSION_THRESHOLD",
                    defaults.exclusion_threshold,
                )?,
                health_check_interval_secs: parse_var(
                    &get,
                    "ROTATION_HEALTH_CHECK_INTERVAL_SECS",
                    defaults.health_check_interval_secs,
                )?,
                max_attempts: parse_var(&get, "ROTATION_MAX_ATTEMPTS", defaults.max_attempts)?,
                retry_base_delay_ms: parse_var(
                    &get,
                    "ROTATION_RETRY_BASE_DELAY_MS",
                    defaults.retry_base_delay_ms,
                )?,
                retry_max_delay_ms: parse_var(
                    &get,
                    "ROTATION_RETRY_MAX_DELAY_MS",
                    defaults.retry_max_delay_ms,
                )?,
                retry_jitter_ms: parse_var(&get, "ROTATION_RETRY_JITTER_MS", defaults.retry_jitter_ms)?,
                payment_cooldown_secs: parse_var(
                    &get,
                    "ROTATION_PAYMENT_COOLDOWN_SECS",
                    defaults.payment_cooldown_secs,
                )?,
                payment_repeat_cooldown_secs: parse_var(
                    &get,
                    "ROTATION_PAYMENT_REPEAT_COOLDOWN_SECS",
                    defaults.payment_repeat_cooldown_secs,
                )?,
                rate_limit_cooldown_secs: parse_var(
                    &get,
                    "ROTATION_RATE_LIMIT_COOLDOWN_SECS",
                    defaults.rate_limit_cooldown_secs,
                )?,
                other_cooldown_secs: parse_var(
                    &get,
                    "ROTATION_OTHER_COOLDOWN_SECS",
                    defaults.other_cooldown_secs,
                )?,
                abort_on_payment_required: get("ROTATION_ABORT_ON_PAYMENT_REQUIRED", "true")
                    .parse()
                    .unwrap_or(true),
                fallback_chains: get("FALLBACK_CHAINS", &defaults.fallback_chains),
            },
        };

        settings.validate()?;

        Ok(settings)
    }

    /// Validate settings
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("Port cannot be 0");
        }

        let rotation = &self.rotation;
        if rotation.error_threshold == 0 {
            anyhow::bail!("ROTATION_ERROR_THRESHOLD must be >= 1");
        }
        if rotation.exclusion_threshold == 0 {
            anyhow::bail!("ROTATION_EXCLUSION_THRESHOLD must be >= 1");
        }
        if rotation.max_attempts == 0 {
            anyhow::bail!("ROTATION_MAX_ATTEMPTS must be >= 1");
        }

        self.fallback_chains()?;

        Ok(())
    }

    /// Questionable but accepted settings, to be logged once tracing is up
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let rotation = &self.rotation;
        if rotation.exclusion_threshold < rotation.error_threshold {
            warnings.push(format!(
                "ROTATION_EXCLUSION_THRESHOLD ({}) is below ROTATION_ERROR_THRESHOLD ({}); credentials are excluded as soon as they error",
                rotation.exclusion_threshold, rotation.error_threshold
            ));
        }
        if self.environment == Environment::Production && self.admin_api_key.is_none() {
            warnings.push(
                "Running in production without ADMIN_API_KEY; admin endpoints are open".to_string(),
            );
        }
        warnings
    }

    pub fn fallback_chains(&self) -> Result<FallbackChains> {
        FallbackChains::parse(&self.rotation.fallback_chains)
            .map_err(|e| anyhow::anyhow!("Invalid FALLBACK_CHAINS: {}", e))
    }

    pub fn health_policy(&self) -> HealthPolicy {
        let r = &self.rotation;
        HealthPolicy::default()
            .with_error_threshold(r.error_threshold)
            .with_exclusion_threshold(r.exclusion_threshold)
            .with_cooldowns(CooldownPolicy {
                payment_required: secs(r.payment_cooldown_secs),
                payment_required_repeat: secs(r.payment_repeat_cooldown_secs),
                rate_limited: secs(r.rate_limit_cooldown_secs),
                other: secs(r.other_cooldown_secs),
            })
    }

    pub fn rotation_config(&self) -> Result<RotationConfig> {
        Ok(RotationConfig::default()
            .with_health(self.health_policy())
            .with_health_check_interval(secs(self.rotation.health_check_interval_secs))
            .with_fallbacks(self.fallback_chains()?))
    }

    pub fn retry_config(&self) -> RetryConfig {
        let r = &self.rotation;
        RetryConfig::key_rotation()
            .with_max_attempts(r.max_attempts)
            .with_initial_delay(Duration::from_millis(r.retry_base_delay_ms))
            .with_max_delay(Duration::from_millis(r.retry_max_delay_ms))
            .with_jitter(Duration::from_millis(r.retry_jitter_ms))
    }

    /// Get the server address string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "api-rotation".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: Environment::Development,
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            host: "0.0.0.0".to_string(),
            port: 8080,
            admin_api_key: None,
            rotation: RotationSettings::default(),
        }
    }
}

fn parse_var<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr + ToString,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str, &str) -> String,
{
    get(key, &default.to_string())
        .trim()
        .parse()
        .with_context(|| format!("Invalid {} value", key))
}

/// Ten years; longer values are clamped so deadlines stay representable
const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

fn secs(value: u64) -> chrono::Duration {
    chrono::Duration::seconds(value.min(MAX_DURATION_SECS) as i64)
}
