//! Rotation signals and their Prometheus counters
//!
//! Each manager owns its own registry so that independent managers (and
//! tests) never share counters.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::fmt;

/// Kinds of observable state changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    CredentialSelected,
    CredentialExcluded,
    CredentialRecovered,
    CooldownApplied,
    CredentialErrored,
    PoolExhausted,
    AllCredentialsUnavailable,
    FallbackActivated,
    FallbackUnavailable,
    PaymentReviewRequired,
    HealthSweep,
    AdminReset,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CredentialSelected => "credential_selected",
            Self::CredentialExcluded => "credential_excluded",
            Self::CredentialRecovered => "credential_recovered",
            Self::CooldownApplied => "cooldown_applied",
            Self::CredentialErrored => "credential_errored",
            Self::PoolExhausted => "pool_exhausted",
            Self::AllCredentialsUnavailable => "all_credentials_unavailable",
            Self::FallbackActivated => "fallback_activated",
            Self::FallbackUnavailable => "fallback_unavailable",
            Self::PaymentReviewRequired => "payment_review_required",
            Self::HealthSweep => "health_sweep",
            Self::AdminReset => "admin_reset",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome label for `api_rotation_attempts_total`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failure,
}

impl AttemptOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// Counters for one manager
#[derive(Clone)]
pub struct RotationMetrics {
    registry: Registry,
    signals: IntCounterVec,
    attempts: IntCounterVec,
}

impl RotationMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let signals = IntCounterVec::new(
            Opts::new(
                "api_rotation_signals_total",
                "Credential rotation state changes by service and kind",
            ),
            &["service", "signal"],
        )?;
        let attempts = IntCounterVec::new(
            Opts::new(
                "api_rotation_attempts_total",
                "Outbound attempts made through the orchestrator",
            ),
            &["service", "outcome"],
        )?;

        registry.register(Box::new(signals.clone()))?;
        registry.register(Box::new(attempts.clone()))?;

        Ok(Self {
            registry,
            signals,
            attempts,
        })
    }

    pub fn signal(&self, service: &str, signal: Signal) {
        self.signals
            .with_label_values(&[service, signal.as_str()])
            .inc();
    }

    pub fn attempt(&self, service: &str, outcome: AttemptOutcome) {
        self.attempts
            .with_label_values(&[service, outcome.as_str()])
            .inc();
    }

    pub fn signal_count(&self, service: &str, signal: Signal) -> u64 {
        self.signals
            .with_label_values(&[service, signal.as_str()])
            .get()
    }

    /// Render all counters in the Prometheus text format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl fmt::Debug for RotationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotationMetrics").finish_non_exhaustive()
    }
}
