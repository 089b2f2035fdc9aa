//! Credential records and the handles given out to callers
//!
//! A [`CredentialRecord`] is created once per configured secret and lives for
//! the whole process. It is only ever mutated while the owning manager's lock
//! is held; callers receive a detached [`CredentialHandle`] instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::classify::FailureKind;
use crate::utils::key_preview;

// ============================================================================
// Startup Input
// ============================================================================

/// One configured credential, as produced by the configuration loader
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CredentialConfig {
    /// Logical service the credential belongs to (e.g. "gemini")
    pub service: String,
    /// Human-readable label (e.g. "gemini_1")
    pub name: String,
    #[serde(skip_serializing)]
    pub secret: String,
    pub base_url: String,
    #[serde(default = "default_max_requests_per_minute")]
    pub max_requests_per_minute: u32,
}

fn default_max_requests_per_minute() -> u32 {
    60
}

impl CredentialConfig {
    pub fn new(
        service: impl Into<String>,
        name: impl Into<String>,
        secret: impl Into<String>,
        base_url: impl Into<String>,
        max_requests_per_minute: u32,
    ) -> Self {
        Self {
            service: service.into(),
            name: name.into(),
            secret: secret.into(),
            base_url: base_url.into(),
            max_requests_per_minute,
        }
    }
}

// ============================================================================
// Credential State
// ============================================================================

/// The single source of truth for whether a credential may be selected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    Active,
    /// Per-minute cap reached or provider-signalled limit, until the instant given
    RateLimited { until: DateTime<Utc> },
    /// Error threshold reached; only an explicit reset restores it
    Errored,
    /// Administratively disabled, never recovered automatically
    Offline,
    /// Timed exclusion applied after a classified provider failure
    Cooldown {
        until: DateTime<Utc>,
        reason: FailureKind,
    },
}

impl CredentialState {
    /// Expiry of the current timed exclusion, if any
    pub fn until(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::RateLimited { until } | Self::Cooldown { until, .. } => Some(*until),
            _ => None,
        }
    }

    /// Coarse status used in reports
    pub fn status(&self) -> ApiStatus {
        match self {
            Self::Active => ApiStatus::Active,
            Self::RateLimited { .. } | Self::Cooldown { .. } => ApiStatus::RateLimited,
            Self::Errored => ApiStatus::Error,
            Self::Offline => ApiStatus::Offline,
        }
    }
}

/// Coarse credential status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiStatus {
    Active,
    RateLimited,
    Error,
    Offline,
}

impl fmt::Display for ApiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::RateLimited => write!(f, "rate_limited"),
            Self::Error => write!(f, "error"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

// ============================================================================
// Credential Record
// ============================================================================

/// Identity plus mutable health of one credential
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub(crate) service: String,
    pub(crate) name: String,
    pub(crate) secret: String,
    pub(crate) base_url: String,
    pub(crate) max_requests_per_minute: u32,

    pub(crate) state: CredentialState,
    /// Reported failures since the last error reset
    pub(crate) error_count: u32,
    /// Selections within the current one-minute window
    pub(crate) requests_made: u32,
    pub(crate) window_started: Option<DateTime<Utc>>,
    pub(crate) total_requests: u64,
    pub(crate) successes: u64,
    /// payment_required reports since the last cooldown reset
    pub(crate) payment_failures: u32,
    pub(crate) last_used: Option<DateTime<Utc>>,
}

impl CredentialRecord {
    pub fn new(config: CredentialConfig) -> Self {
        Self {
            service: config.service,
            name: config.name,
            secret: config.secret,
            base_url: config.base_url,
            max_requests_per_minute: config.max_requests_per_minute,
            state: CredentialState::Active,
            error_count: 0,
            requests_made: 0,
            window_started: None,
            total_requests: 0,
            successes: 0,
            payment_failures: 0,
            last_used: None,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn state(&self) -> CredentialState {
        self.state
    }

    pub fn status(&self) -> ApiStatus {
        self.state.status()
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn requests_made(&self) -> u32 {
        self.requests_made
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests
    }

    pub fn successes(&self) -> u64 {
        self.successes
    }

    pub fn last_used(&self) -> Option<DateTime<Utc>> {
        self.last_used
    }

    pub fn max_requests_per_minute(&self) -> u32 {
        self.max_requests_per_minute
    }

    /// Set exactly when the record is rate limited or cooling down
    pub fn rate_limit_reset(&self) -> Option<DateTime<Utc>> {
        self.state.until()
    }

    /// Redacted form of the secret, safe for logs and reports
    pub fn key_preview(&self) -> String {
        key_preview(&self.secret)
    }

    pub(crate) fn handle(&self, index: usize) -> CredentialHandle {
        CredentialHandle {
            service: self.service.clone(),
            name: self.name.clone(),
            secret: self.secret.clone(),
            base_url: self.base_url.clone(),
            index,
        }
    }
}

// ============================================================================
// Credential Handle
// ============================================================================

/// Everything a collaborator needs to issue one request
///
/// The handle is a snapshot; reporting an outcome goes back through the
/// manager using the handle's service and index.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialHandle {
    pub service: String,
    pub name: String,
    pub secret: String,
    pub base_url: String,
    pub index: usize,
}

impl CredentialHandle {
    /// Join a path onto the credential's base URL
    pub fn endpoint(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, path)
        }
    }

    /// Attach the secret as a bearer token
    pub fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.bearer_auth(&self.secret)
    }

    pub fn key_preview(&self) -> String {
        key_preview(&self.secret)
    }
}

impl fmt::Debug for CredentialHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialHandle")
            .field("service", &self.service)
            .field("name", &self.name)
            .field("secret", &self.key_preview())
            .field("base_url", &self.base_url)
            .field("index", &self.index)
            .finish()
    }
}
