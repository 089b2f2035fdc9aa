//! Retry and fallback orchestration
//!
//! [`Orchestrator::execute`] wraps one outbound call. Each attempt reselects a
//! credential, so the credential that just failed is skipped through its new
//! cooldown. When a service runs out of attempts or credentials the
//! orchestrator walks the configured fallback chain once, in order.

use std::future::Future;
use std::sync::Arc;

use super::classify::{FailureKind, ProviderFailure};
use super::credential::CredentialHandle;
use super::error::RotationError;
use super::manager::RotationManager;
use super::metrics::AttemptOutcome;
use crate::utils::RetryConfig;

/// Runs operations against a service with key rotation, backoff and fallback
#[derive(Clone)]
pub struct Orchestrator {
    manager: Arc<RotationManager>,
    retry: RetryConfig,
    abort_on_payment_required: bool,
}

enum ServiceOutcome<T> {
    Done(T),
    /// No attempt could be made at all
    NoCredential,
    Exhausted,
}

impl Orchestrator {
    pub fn new(manager: Arc<RotationManager>) -> Self {
        Self {
            manager,
            retry: RetryConfig::key_rotation(),
            abort_on_payment_required: true,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Whether a payment_required failure is handed straight to the caller
    pub fn with_abort_on_payment_required(mut self, abort: bool) -> Self {
        self.abort_on_payment_required = abort;
        self
    }

    pub fn manager(&self) -> &Arc<RotationManager> {
        &self.manager
    }

    /// Run `operation` for `service`, rotating keys and falling back as needed
    ///
    /// The operation receives an owned [`CredentialHandle`] and runs with the
    /// manager's lock released.
    pub async fn execute<T, F, Fut>(&self, service: &str, mut operation: F) -> Result<T, RotationError>
    where
        F: FnMut(CredentialHandle) -> Fut,
        Fut: Future<Output = Result<T, ProviderFailure>>,
    {
        let mut attempted: Vec<String> = Vec::new();
        let mut last_error: Option<ProviderFailure> = None;

        let mut chain = vec![service.to_string()];
        for alternate in self.manager.fallbacks_for(service) {
            if !chain.contains(alternate) {
                chain.push(alternate.clone());
            }
        }

        for (position, target) in chain.iter().enumerate() {
            if position > 0 {
                if !self.manager.has_available(target) {
                    tracing::debug!(
                        service = %service,
                        fallback = %target,
                        "Skipping fallback with no usable credential"
                    );
                    continue;
                }
                self.manager.note_fallback(service, target);
            }

            match self
                .run_service(target, &mut operation, &mut attempted, &mut last_error)
                .await?
            {
                ServiceOutcome::Done(value) => return Ok(value),
                ServiceOutcome::NoCredential | ServiceOutcome::Exhausted => {}
            }
        }

        if attempted.is_empty() {
            self.manager.note_fallback_unavailable(service);
            return Err(RotationError::NoCredentialAvailable {
                service: service.to_string(),
            });
        }

        tracing::error!(
            service = %service,
            attempted = ?attempted,
            "All providers exhausted"
        );
        Err(RotationError::AllProvidersExhausted {
            service: service.to_string(),
            attempted,
            last_error,
        })
    }

    async fn run_service<T, F, Fut>(
        &self,
        service: &str,
        operation: &mut F,
        attempted: &mut Vec<String>,
        last_error: &mut Option<ProviderFailure>,
    ) -> Result<ServiceOutcome<T>, RotationError>
    where
        F: FnMut(CredentialHandle) -> Fut,
        Fut: Future<Output = Result<T, ProviderFailure>>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut made = 0u32;

        for attempt in 0..max_attempts {
            let Some(handle) = self.manager.select(service) else {
                break;
            };
            made += 1;
            if !attempted.iter().any(|s| s == service) {
                attempted.push(service.to_string());
            }

            let credential = handle.name.clone();
            match operation(handle.clone()).await {
                Ok(value) => {
                    self.manager.report_success(&handle);
                    self.manager
                        .metrics()
                        .attempt(service, AttemptOutcome::Success);
                    return Ok(ServiceOutcome::Done(value));
                }
                Err(failure) => {
                    self.manager
                        .metrics()
                        .attempt(service, AttemptOutcome::Failure);
                    let kind = failure.kind();
                    self.manager.report_failure(&handle, &failure);
                    tracing::warn!(
                        service = %service,
                        credential = %credential,
                        attempt = attempt + 1,
                        max_attempts,
                        kind = %kind,
                        "Attempt failed"
                    );

                    if kind == FailureKind::PaymentRequired && self.abort_on_payment_required {
                        return Err(RotationError::ProviderRejected {
                            service: service.to_string(),
                            credential,
                            kind,
                            failure,
                        });
                    }
                    *last_error = Some(failure);
                }
            }

            if attempt + 1 < max_attempts {
                let delay = self.retry.calculate_delay(attempt);
                tracing::debug!(
                    service = %service,
                    delay_ms = delay.as_millis() as u64,
                    "Backing off before next attempt"
                );
                tokio::time::sleep(delay).await;
            }
        }

        Ok(if made == 0 {
            ServiceOutcome::NoCredential
        } else {
            ServiceOutcome::Exhausted
        })
    }
}
