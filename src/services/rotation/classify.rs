//! Provider failure classification and cooldown durations

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Class of a provider-reported failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// 402 / insufficient credits
    PaymentRequired,
    /// 429 / provider rate limit
    RateLimited,
    Other,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentRequired => "payment_required",
            Self::RateLimited => "rate_limited",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const PAYMENT_WORDS: &[&str] = &["credit", "payment"];
const RATE_LIMIT_WORDS: &[&str] = &["rate limit", "rate_limit", "too many requests"];
/// Status codes quoted in messages that carry no status of their own
const PAYMENT_CODES: &[&str] = &["402"];
const RATE_LIMIT_CODES: &[&str] = &["429"];

/// A failed outbound call, as reported by the collaborator that made it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Failure built from an HTTP status and response body
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        Self::new(Some(status), body)
    }

    /// Failure with no status code (transport error, timeout, ...)
    pub fn message(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }

    pub fn kind(&self) -> FailureKind {
        match self.status {
            Some(402) => FailureKind::PaymentRequired,
            Some(429) => FailureKind::RateLimited,
            // A definite status makes digits in the body meaningless
            Some(_) => classify_words(&self.message),
            None => classify_message(&self.message),
        }
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "status {}: {}", status, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ProviderFailure {}

impl From<reqwest::Error> for ProviderFailure {
    fn from(err: reqwest::Error) -> Self {
        Self::new(err.status().map(|s| s.as_u16()), err.to_string())
    }
}

/// Bucket a free-form error message
pub fn classify_message(message: &str) -> FailureKind {
    classify(&message.to_lowercase(), true)
}

/// Bucket by wording only, ignoring any status codes quoted in the message
fn classify_words(message: &str) -> FailureKind {
    classify(&message.to_lowercase(), false)
}

fn classify(msg: &str, with_codes: bool) -> FailureKind {
    let matches = |words: &[&str], codes: &[&str]| {
        words.iter().any(|p| msg.contains(p)) || (with_codes && codes.iter().any(|p| msg.contains(p)))
    };
    if matches(PAYMENT_WORDS, PAYMENT_CODES) {
        FailureKind::PaymentRequired
    } else if matches(RATE_LIMIT_WORDS, RATE_LIMIT_CODES) {
        FailureKind::RateLimited
    } else {
        FailureKind::Other
    }
}

// ============================================================================
// Cooldown Policy
// ============================================================================

/// How long a credential is excluded after each failure class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownPolicy {
    pub payment_required: Duration,
    /// Applied from the second payment_required report onwards
    pub payment_required_repeat: Duration,
    pub rate_limited: Duration,
    pub other: Duration,
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self {
            payment_required: Duration::hours(1),
            payment_required_repeat: Duration::hours(24),
            rate_limited: Duration::minutes(5),
            other: Duration::seconds(30),
        }
    }
}

impl CooldownPolicy {
    /// Cooldown for a failure; `payment_failures` counts this report too
    pub fn duration_for(&self, kind: FailureKind, payment_failures: u32) -> Duration {
        match kind {
            FailureKind::PaymentRequired if payment_failures > 1 => self.payment_required_repeat,
            FailureKind::PaymentRequired => self.payment_required,
            FailureKind::RateLimited => self.rate_limited,
            FailureKind::Other => self.other,
        }
    }
}
