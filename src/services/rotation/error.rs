//! Rotation error types

use thiserror::Error;

use super::classify::{FailureKind, ProviderFailure};

/// Errors surfaced by the rotation engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RotationError {
    /// No usable credential in the pool, and no fallback took over
    #[error("No credential available for service '{service}'")]
    NoCredentialAvailable { service: String },

    /// A classified provider failure that short-circuits retries
    #[error("Provider rejected credential '{credential}' for '{service}' ({kind}): {failure}")]
    ProviderRejected {
        service: String,
        credential: String,
        kind: FailureKind,
        failure: ProviderFailure,
    },

    /// Every attempt on the service and on its fallbacks failed
    #[error("All providers exhausted for '{service}' (tried: {}){}", .attempted.join(", "), last_error_suffix(.last_error))]
    AllProvidersExhausted {
        service: String,
        attempted: Vec<String>,
        last_error: Option<ProviderFailure>,
    },

    #[error("Invalid admin request: {0}")]
    InvalidAdminRequest(String),

    #[error("Metrics registry error: {0}")]
    Metrics(String),
}

fn last_error_suffix(last_error: &Option<ProviderFailure>) -> String {
    match last_error {
        Some(failure) => format!("; last error: {}", failure),
        None => String::new(),
    }
}

impl RotationError {
    /// The failure class, when the error came from a provider
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::ProviderRejected { kind, .. } => Some(*kind),
            Self::AllProvidersExhausted {
                last_error: Some(failure),
                ..
            } => Some(failure.kind()),
            _ => None,
        }
    }
}
