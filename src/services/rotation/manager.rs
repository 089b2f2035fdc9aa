//! Rotation manager
//!
//! Owns every pool behind a single mutex. Selection, outcome reporting,
//! administrative resets and snapshots all run inside that one critical
//! section and never await, so the outbound call a caller makes with a
//! selected credential always happens with the lock released.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::classify::{FailureKind, ProviderFailure};
use super::clock::{Clock, SystemClock};
use super::credential::{CredentialConfig, CredentialHandle, CredentialRecord};
use super::error::RotationError;
use super::fallback::FallbackChains;
use super::health::{FailureOutcome, HealthPolicy, Transition};
use super::metrics::{RotationMetrics, Signal};
use super::pool::{Pool, PoolTransition};
use super::report::{ServiceReport, StatusReport};
use super::selector::select_next;
use crate::utils::truncate_with_suffix;

// ============================================================================
// Configuration
// ============================================================================

/// Behaviour shared by every pool of a manager
#[derive(Debug, Clone)]
pub struct RotationConfig {
    pub health: HealthPolicy,
    /// Minimum time between bulk sweeps of a pool
    pub health_check_interval: Duration,
    pub fallbacks: FallbackChains,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            health: HealthPolicy::default(),
            health_check_interval: Duration::minutes(5),
            fallbacks: FallbackChains::default(),
        }
    }
}

impl RotationConfig {
    pub fn with_health(mut self, health: HealthPolicy) -> Self {
        self.health = health;
        self
    }

    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    pub fn with_fallbacks(mut self, fallbacks: FallbackChains) -> Self {
        self.fallbacks = fallbacks;
        self
    }
}

/// A credential picked for a request, possibly from a fallback service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedCredential {
    pub handle: CredentialHandle,
    /// Set when the requested service had nothing usable
    pub fallback_from: Option<String>,
}

impl SelectedCredential {
    pub fn is_fallback(&self) -> bool {
        self.fallback_from.is_some()
    }
}

// ============================================================================
// Builder
// ============================================================================

pub struct RotationManagerBuilder {
    config: RotationConfig,
    clock: Arc<dyn Clock>,
    services: Vec<String>,
    credentials: Vec<CredentialConfig>,
}

impl RotationManagerBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register services up front so they exist even with no credential
    pub fn services<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.services.extend(services.into_iter().map(Into::into));
        self
    }

    pub fn credential(mut self, credential: CredentialConfig) -> Self {
        self.credentials.push(credential);
        self
    }

    pub fn credentials(mut self, credentials: impl IntoIterator<Item = CredentialConfig>) -> Self {
        self.credentials.extend(credentials);
        self
    }

    pub fn build(self) -> Result<RotationManager, RotationError> {
        let metrics = RotationMetrics::new().map_err(|e| RotationError::Metrics(e.to_string()))?;

        let mut pools: BTreeMap<String, Pool> = BTreeMap::new();
        for service in self.services {
            pools.entry(service.clone()).or_insert_with(|| Pool::new(service));
        }
        for credential in self.credentials {
            pools
                .entry(credential.service.clone())
                .or_insert_with(|| Pool::new(credential.service.clone()))
                .push(credential);
        }

        let total: usize = pools.values().map(Pool::len).sum();
        tracing::info!(
            services = pools.len(),
            credentials = total,
            "Initialized rotation manager"
        );
        for pool in pools.values() {
            if pool.is_empty() {
                tracing::warn!(service = %pool.service(), "No credential configured for service");
            } else {
                tracing::info!(service = %pool.service(), credentials = pool.len(), "Loaded credential pool");
            }
        }

        Ok(RotationManager {
            pools: Mutex::new(pools),
            config: self.config,
            clock: self.clock,
            metrics,
        })
    }
}

// ============================================================================
// Rotation Manager
// ============================================================================

/// Credential pools for every logical service, with their health state
pub struct RotationManager {
    pools: Mutex<BTreeMap<String, Pool>>,
    config: RotationConfig,
    clock: Arc<dyn Clock>,
    metrics: RotationMetrics,
}

impl RotationManager {
    pub fn builder(config: RotationConfig) -> RotationManagerBuilder {
        RotationManagerBuilder {
            config,
            clock: Arc::new(SystemClock),
            services: Vec::new(),
            credentials: Vec::new(),
        }
    }

    /// Every critical section leaves pools consistent, so a poisoned lock is
    /// still safe to use.
    fn pools(&self) -> MutexGuard<'_, BTreeMap<String, Pool>> {
        self.pools.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn config(&self) -> &RotationConfig {
        &self.config
    }

    pub fn metrics(&self) -> &RotationMetrics {
        &self.metrics
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn services(&self) -> Vec<String> {
        self.pools().keys().cloned().collect()
    }

    pub fn fallbacks_for(&self, service: &str) -> &[String] {
        self.config.fallbacks.for_service(service)
    }

    /// Copy of one credential record, for inspection
    pub fn record(&self, service: &str, index: usize) -> Option<CredentialRecord> {
        self.pools().get(service)?.get(index).cloned()
    }

    /// Whether the service has a usable credential right now; never mutates
    pub fn has_available(&self, service: &str) -> bool {
        let now = self.clock.now();
        self.pools()
            .get(service)
            .is_some_and(|pool| pool.available_count_at(now, &self.config.health) > 0)
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    /// Next usable credential of a service, or `None` when the pool is exhausted
    pub fn select(&self, service: &str) -> Option<CredentialHandle> {
        let now = self.clock.now();
        let mut pools = self.pools();
        let Some(pool) = pools.get_mut(service) else {
            tracing::warn!(service = %service, "Selection requested for unknown service");
            return None;
        };

        if pool.is_empty() {
            pool.exhaustions += 1;
            self.metrics.signal(service, Signal::PoolExhausted);
            tracing::warn!(
                service = %service,
                signal = %Signal::PoolExhausted,
                "No credential configured for service"
            );
            return None;
        }

        let selection = select_next(
            pool,
            now,
            &self.config.health,
            self.config.health_check_interval,
        );
        if selection.swept {
            self.metrics.signal(service, Signal::HealthSweep);
            tracing::debug!(service = %service, signal = %Signal::HealthSweep, "Health sweep completed");
        }
        for transition in &selection.transitions {
            self.log_transition(service, transition);
        }

        match selection.handle {
            Some(handle) => {
                pool.all_unavailable = false;
                self.metrics.signal(service, Signal::CredentialSelected);
                tracing::debug!(
                    service = %service,
                    credential = %handle.name,
                    signal = %Signal::CredentialSelected,
                    "Using credential"
                );
                Some(handle)
            }
            None => {
                pool.exhaustions += 1;
                self.metrics.signal(service, Signal::PoolExhausted);
                tracing::warn!(
                    service = %service,
                    credentials = pool.len(),
                    signal = %Signal::PoolExhausted,
                    "No usable credential for service"
                );
                self.check_all_unavailable(pool, now);
                None
            }
        }
    }

    /// Select from the service, or from the first fallback that has a usable credential
    pub fn select_with_fallback(&self, service: &str) -> Result<SelectedCredential, RotationError> {
        if let Some(handle) = self.select(service) {
            return Ok(SelectedCredential {
                handle,
                fallback_from: None,
            });
        }

        for alternate in self.fallbacks_for(service) {
            if let Some(handle) = self.select(alternate) {
                self.note_fallback(service, alternate);
                return Ok(SelectedCredential {
                    handle,
                    fallback_from: Some(service.to_string()),
                });
            }
        }

        self.note_fallback_unavailable(service);
        Err(RotationError::NoCredentialAvailable {
            service: service.to_string(),
        })
    }

    pub(crate) fn note_fallback(&self, service: &str, alternate: &str) {
        if let Some(pool) = self.pools().get_mut(service) {
            pool.fallback_activations += 1;
        }
        self.metrics.signal(service, Signal::FallbackActivated);
        tracing::warn!(
            service = %service,
            fallback = %alternate,
            signal = %Signal::FallbackActivated,
            "Falling back to alternate service"
        );
    }

    pub(crate) fn note_fallback_unavailable(&self, service: &str) {
        self.metrics.signal(service, Signal::FallbackUnavailable);
        tracing::warn!(
            service = %service,
            fallbacks = ?self.fallbacks_for(service),
            signal = %Signal::FallbackUnavailable,
            "No fallback available"
        );
    }

    // ------------------------------------------------------------------------
    // Outcome reporting
    // ------------------------------------------------------------------------

    pub fn report_success(&self, handle: &CredentialHandle) {
        let now = self.clock.now();
        let mut pools = self.pools();
        if let Some(record) = Self::resolve(&mut pools, handle) {
            record.record_success(now);
        }
    }

    /// Record a failed call made with `handle`; returns what changed
    pub fn report_failure(
        &self,
        handle: &CredentialHandle,
        failure: &ProviderFailure,
    ) -> Option<FailureOutcome> {
        self.report_failure_kind(handle, failure.kind(), &failure.to_string())
    }

    pub fn report_failure_kind(
        &self,
        handle: &CredentialHandle,
        kind: FailureKind,
        detail: &str,
    ) -> Option<FailureOutcome> {
        let now = self.clock.now();
        let mut pools = self.pools();
        let outcome = {
            let record = Self::resolve(&mut pools, handle)?;
            record.record_failure(kind, now, &self.config.health)
        };
        let service = handle.service.as_str();

        if let Some(until) = outcome.excluded_until {
            self.metrics.signal(service, Signal::CooldownApplied);
            tracing::warn!(
                service = %service,
                credential = %handle.name,
                key = %handle.key_preview(),
                kind = %kind,
                error_count = outcome.error_count,
                until = %until,
                detail = %truncate_with_suffix(detail, 200, "..."),
                signal = %Signal::CooldownApplied,
                "Credential cooling down"
            );
        }
        if outcome.errored {
            self.metrics.signal(service, Signal::CredentialErrored);
            tracing::warn!(
                service = %service,
                credential = %handle.name,
                error_count = outcome.error_count,
                signal = %Signal::CredentialErrored,
                "Credential marked as errored"
            );
        }
        if outcome.repeated_payment {
            self.metrics.signal(service, Signal::PaymentReviewRequired);
            tracing::warn!(
                service = %service,
                credential = %handle.name,
                key = %handle.key_preview(),
                signal = %Signal::PaymentReviewRequired,
                "Credential reported payment required again; top up credits or replace the key"
            );
        }

        if let Some(pool) = pools.get_mut(service) {
            self.check_all_unavailable(pool, now);
        }
        Some(outcome)
    }

    /// Provider signalled a rate limit; exclude until `reset_at` (default one window)
    pub fn report_rate_limited(
        &self,
        handle: &CredentialHandle,
        reset_at: Option<DateTime<Utc>>,
    ) -> Option<DateTime<Utc>> {
        let now = self.clock.now();
        let until = reset_at.unwrap_or(now + self.config.health.rate_limit_window);
        let mut pools = self.pools();
        let applied = Self::resolve(&mut pools, handle)?.mark_rate_limited(until);

        if let Some(until) = applied {
            self.metrics.signal(&handle.service, Signal::CredentialExcluded);
            tracing::warn!(
                service = %handle.service,
                credential = %handle.name,
                until = %until,
                signal = %Signal::CredentialExcluded,
                "Credential rate limited by provider"
            );
        }
        if let Some(pool) = pools.get_mut(&handle.service) {
            self.check_all_unavailable(pool, now);
        }
        applied
    }

    fn resolve<'a>(
        pools: &'a mut BTreeMap<String, Pool>,
        handle: &CredentialHandle,
    ) -> Option<&'a mut CredentialRecord> {
        let pool = pools.get_mut(&handle.service)?;
        let index = pool.position(handle.index, &handle.name)?;
        pool.get_mut(index)
    }

    fn check_all_unavailable(&self, pool: &mut Pool, now: DateTime<Utc>) {
        if pool.is_empty() || pool.all_unavailable {
            return;
        }
        if pool.available_count_at(now, &self.config.health) == 0 {
            pool.all_unavailable = true;
            self.metrics
                .signal(pool.service(), Signal::AllCredentialsUnavailable);
            tracing::error!(
                service = %pool.service(),
                credentials = pool.len(),
                signal = %Signal::AllCredentialsUnavailable,
                "All credentials for service are unavailable; operator action required"
            );
        }
    }

    fn log_transition(&self, service: &str, transition: &PoolTransition) {
        match transition.transition {
            Transition::Recovered => {
                self.metrics.signal(service, Signal::CredentialRecovered);
                tracing::info!(
                    service = %service,
                    credential = %transition.name,
                    signal = %Signal::CredentialRecovered,
                    "Credential cooldown expired"
                );
            }
            Transition::Errored => {
                self.metrics.signal(service, Signal::CredentialErrored);
                tracing::warn!(
                    service = %service,
                    credential = %transition.name,
                    signal = %Signal::CredentialErrored,
                    "Credential cooldown expired into errored state"
                );
            }
            Transition::CapReached { until } => {
                self.metrics.signal(service, Signal::CredentialExcluded);
                tracing::warn!(
                    service = %service,
                    credential = %transition.name,
                    until = %until,
                    signal = %Signal::CredentialExcluded,
                    "Credential reached its per-minute request cap"
                );
            }
        }
    }

    // ------------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------------

    /// Run a health sweep now, ignoring the sweep interval
    ///
    /// Covers one service, or every service when `service` is `None`. Returns
    /// the number of credentials whose state changed.
    pub fn sweep(&self, service: Option<&str>) -> Result<usize, RotationError> {
        let now = self.clock.now();
        let mut pools = self.pools();
        let targets = Self::admin_targets(&pools, service)?;

        let mut changed = 0;
        for name in &targets {
            let Some(pool) = pools.get_mut(name) else {
                continue;
            };
            let transitions = pool.sweep(now, &self.config.health);
            for transition in &transitions {
                self.log_transition(name, transition);
            }
            changed += transitions.len();
            self.metrics.signal(name, Signal::HealthSweep);
            if pool.available_count_at(now, &self.config.health) > 0 {
                pool.all_unavailable = false;
            }
        }
        tracing::info!(
            services = ?targets,
            transitions = changed,
            signal = %Signal::HealthSweep,
            "Forced health sweep completed"
        );
        Ok(changed)
    }

    /// Clear error counters for one service, or for all when `service` is `None`
    pub fn reset_errors(&self, service: Option<&str>) -> Result<(), RotationError> {
        let mut pools = self.pools();
        let targets = Self::admin_targets(&pools, service)?;
        for name in &targets {
            if let Some(pool) = pools.get_mut(name) {
                pool.records_mut().iter_mut().for_each(CredentialRecord::reset_errors);
                pool.all_unavailable = false;
                self.metrics.signal(name, Signal::AdminReset);
            }
        }
        tracing::info!(services = ?targets, signal = %Signal::AdminReset, "Error counters reset");
        Ok(())
    }

    /// Clear cooldown and exhaustion flags of one credential, or of the whole service
    pub fn reset_cooldowns(&self, service: &str, index: Option<usize>) -> Result<(), RotationError> {
        let mut pools = self.pools();
        let pool = pools.get_mut(service).ok_or_else(|| unknown_service(service))?;

        match index {
            Some(index) => {
                let record = pool.get_mut(index).ok_or_else(|| {
                    RotationError::InvalidAdminRequest(format!(
                        "credential index {} out of range for '{}'",
                        index, service
                    ))
                })?;
                record.reset_cooldown();
                tracing::info!(
                    service = %service,
                    credential = %record.name(),
                    signal = %Signal::AdminReset,
                    "Credential cooldown reset"
                );
            }
            None => {
                pool.records_mut().iter_mut().for_each(CredentialRecord::reset_cooldown);
                tracing::info!(service = %service, signal = %Signal::AdminReset, "All cooldowns reset for service");
            }
        }
        pool.all_unavailable = false;
        self.metrics.signal(service, Signal::AdminReset);
        Ok(())
    }

    pub fn reset_all_cooldowns(&self) {
        let mut pools = self.pools();
        for pool in pools.values_mut() {
            pool.records_mut().iter_mut().for_each(CredentialRecord::reset_cooldown);
            pool.all_unavailable = false;
            self.metrics.signal(pool.service(), Signal::AdminReset);
        }
        tracing::info!(signal = %Signal::AdminReset, "All cooldowns reset");
    }

    /// Take a credential out of rotation until `set_online` is called
    pub fn set_offline(&self, service: &str, index: usize) -> Result<(), RotationError> {
        self.with_admin_record(service, index, |record| {
            record.set_offline();
            tracing::warn!(service = %service, credential = %record.name(), "Credential taken offline");
        })
    }

    pub fn set_online(&self, service: &str, index: usize) -> Result<(), RotationError> {
        self.with_admin_record(service, index, |record| {
            record.set_online();
            tracing::info!(service = %service, credential = %record.name(), "Credential back online");
        })
    }

    fn with_admin_record(
        &self,
        service: &str,
        index: usize,
        apply: impl FnOnce(&mut CredentialRecord),
    ) -> Result<(), RotationError> {
        let mut pools = self.pools();
        let pool = pools.get_mut(service).ok_or_else(|| unknown_service(service))?;
        let record = pool.get_mut(index).ok_or_else(|| {
            RotationError::InvalidAdminRequest(format!(
                "credential index {} out of range for '{}'",
                index, service
            ))
        })?;
        apply(record);
        pool.all_unavailable = false;
        self.metrics.signal(service, Signal::AdminReset);
        Ok(())
    }

    fn admin_targets(
        pools: &BTreeMap<String, Pool>,
        service: Option<&str>,
    ) -> Result<Vec<String>, RotationError> {
        match service {
            Some(name) if pools.contains_key(name) => Ok(vec![name.to_string()]),
            Some(name) => Err(unknown_service(name)),
            None => Ok(pools.keys().cloned().collect()),
        }
    }

    // ------------------------------------------------------------------------
    // Reporting
    // ------------------------------------------------------------------------

    pub fn status_report(&self) -> StatusReport {
        let now = self.clock.now();
        let pools = self.pools();
        StatusReport::from_pools(pools.values(), now, &self.config.health)
    }

    pub fn service_report(&self, service: &str) -> Option<ServiceReport> {
        let now = self.clock.now();
        let pools = self.pools();
        pools
            .get(service)
            .map(|pool| ServiceReport::from_pool(pool, now, &self.config.health))
    }
}

fn unknown_service(service: &str) -> RotationError {
    RotationError::InvalidAdminRequest(format!("unknown service '{}'", service))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::rotation::clock::ManualClock;
    use crate::services::rotation::credential::{ApiStatus, CredentialState};

    fn credential(service: &str, name: &str) -> CredentialConfig {
        CredentialConfig::new(
            service,
            name,
            format!("secret-{}-0123456789", name),
            format!("https://{}.example.com/v1", service),
            100,
        )
    }

    fn manager(clock: Arc<ManualClock>) -> RotationManager {
        RotationManager::builder(
            RotationConfig::default().with_fallbacks(FallbackChains::llm_defaults()),
        )
        .clock(clock)
        .services(["qwen", "gemini", "groq", "tavily"])
        .credentials([
            credential("qwen", "qwen_1"),
            credential("qwen", "qwen_2"),
            credential("gemini", "gemini_1"),
        ])
        .build()
        .unwrap()
    }

    #[test]
    fn test_rate_limited_scenario() {
        let clock = Arc::new(ManualClock::starting_now());
        let manager = manager(clock.clone());

        let a = manager.select("qwen").unwrap();
        assert_eq!(a.name, "qwen_1");
        manager.report_failure(&a, &ProviderFailure::from_status(429, "rate limit"));

        let b = manager.select("qwen").unwrap();
        assert_eq!(b.name, "qwen_2");

        clock.advance(Duration::minutes(6));
        let again = manager.select("qwen").unwrap();
        assert_eq!(again.name, "qwen_1");
    }

    #[test]
    fn test_empty_pool_returns_none() {
        let manager = manager(Arc::new(ManualClock::starting_now()));
        assert!(manager.select("tavily").is_none());
        assert!(manager.select("tavily").is_none());
        assert!(manager.select("not-configured").is_none());
        assert_eq!(
            manager.metrics().signal_count("tavily", Signal::PoolExhausted),
            2
        );
        // No evaluation happened, so no sweep was recorded
        assert_eq!(
            manager.metrics().signal_count("tavily", Signal::HealthSweep),
            0
        );
    }

    #[test]
    fn test_errored_pool_falls_back() {
        let clock = Arc::new(ManualClock::starting_now());
        let manager = RotationManager::builder(
            RotationConfig::default().with_fallbacks(FallbackChains::llm_defaults()),
        )
        .clock(clock.clone())
        .credentials([credential("groq", "groq_1"), credential("gemini", "gemini_1")])
        .build()
        .unwrap();

        let failure = ProviderFailure::message("upstream connection reset");
        for _ in 0..3 {
            clock.advance(Duration::minutes(1));
            let handle = manager.select("groq").unwrap();
            manager.report_failure(&handle, &failure);
        }
        assert_eq!(
            manager.record("groq", 0).unwrap().state(),
            CredentialState::Errored
        );
        assert!(manager.select("groq").is_none());

        let selected = manager.select_with_fallback("groq").unwrap();
        assert!(selected.is_fallback());
        assert_eq!(selected.handle.service, "gemini");
        assert_eq!(selected.fallback_from.as_deref(), Some("groq"));
        assert_eq!(
            manager.metrics().signal_count("groq", Signal::FallbackActivated),
            1
        );
        // Each failure left the single-key pool empty until the next minute
        assert_eq!(
            manager
                .metrics()
                .signal_count("groq", Signal::AllCredentialsUnavailable),
            3
        );

        manager.reset_errors(Some("groq")).unwrap();
        assert_eq!(manager.select("groq").unwrap().name, "groq_1");
    }

    #[test]
    fn test_no_fallback_available() {
        let manager = manager(Arc::new(ManualClock::starting_now()));
        let err = manager.select_with_fallback("tavily").unwrap_err();
        assert_eq!(
            err,
            RotationError::NoCredentialAvailable {
                service: "tavily".to_string()
            }
        );
        assert_eq!(
            manager
                .metrics()
                .signal_count("tavily", Signal::FallbackUnavailable),
            1
        );
    }

    #[test]
    fn test_success_does_not_reset_errors() {
        let manager = manager(Arc::new(ManualClock::starting_now()));
        let handle = manager.select("gemini").unwrap();
        manager.report_failure(&handle, &ProviderFailure::message("boom"));
        manager.report_success(&handle);

        let record = manager.record("gemini", 0).unwrap();
        assert_eq!(record.error_count(), 1);
        assert_eq!(record.successes(), 1);
        assert!(record.last_used().is_some());
    }

    #[test]
    fn test_admin_requests_validate_targets() {
        let manager = manager(Arc::new(ManualClock::starting_now()));
        assert!(matches!(
            manager.reset_cooldowns("qwen", Some(7)),
            Err(RotationError::InvalidAdminRequest(_))
        ));
        assert!(matches!(
            manager.reset_errors(Some("nope")),
            Err(RotationError::InvalidAdminRequest(_))
        ));
        assert!(matches!(
            manager.set_offline("qwen", 2),
            Err(RotationError::InvalidAdminRequest(_))
        ));
        assert!(manager.reset_errors(None).is_ok());
    }

    #[test]
    fn test_reset_single_cooldown() {
        let manager = manager(Arc::new(ManualClock::starting_now()));
        let handle = manager.select("qwen").unwrap();
        manager.report_failure(&handle, &ProviderFailure::from_status(402, "no credits"));
        assert_eq!(
            manager.record("qwen", 0).unwrap().status(),
            ApiStatus::RateLimited
        );

        manager.reset_cooldowns("qwen", Some(0)).unwrap();
        assert_eq!(manager.record("qwen", 0).unwrap().status(), ApiStatus::Active);
    }

    #[test]
    fn test_offline_and_back() {
        let manager = manager(Arc::new(ManualClock::starting_now()));
        manager.set_offline("gemini", 0).unwrap();
        assert!(manager.select("gemini").is_none());
        let report = manager.service_report("gemini").unwrap();
        assert_eq!(report.offline, 1);

        manager.set_online("gemini", 0).unwrap();
        assert!(manager.select("gemini").is_some());
    }

    #[test]
    fn test_provider_rate_limit_with_reset_time() {
        let clock = Arc::new(ManualClock::starting_now());
        let manager = manager(clock.clone());
        let handle = manager.select("gemini").unwrap();

        let reset_at = clock.now() + Duration::seconds(90);
        assert_eq!(manager.report_rate_limited(&handle, Some(reset_at)), Some(reset_at));
        assert!(manager.select("gemini").is_none());

        clock.advance(Duration::seconds(91));
        assert!(manager.select("gemini").is_some());
    }

    #[test]
    fn test_forced_sweep_recovers_before_interval() {
        let clock = Arc::new(ManualClock::starting_now());
        let manager = manager(clock.clone());
        let handle = manager.select("gemini").unwrap();
        manager.report_failure(&handle, &ProviderFailure::message("flaky"));
        clock.advance(Duration::minutes(1));

        // Still within the five-minute interval, so nothing was swept yet
        assert!(matches!(
            manager.record("gemini", 0).unwrap().state(),
            CredentialState::Cooldown { .. }
        ));

        assert_eq!(manager.sweep(Some("gemini")).unwrap(), 1);
        assert_eq!(
            manager.record("gemini", 0).unwrap().state(),
            CredentialState::Active
        );
        assert_eq!(manager.service_report("gemini").unwrap().active, 1);
        assert_eq!(manager.sweep(None).unwrap(), 0);
        assert!(matches!(
            manager.sweep(Some("nope")),
            Err(RotationError::InvalidAdminRequest(_))
        ));
    }

    #[test]
    fn test_soft_errored_signal_follows_stored_state() {
        let clock = Arc::new(ManualClock::starting_now());
        let manager = RotationManager::builder(
            RotationConfig::default().with_health(HealthPolicy::multi_service()),
        )
        .clock(clock.clone())
        .credential(credential("exa", "exa_1"))
        .build()
        .unwrap();

        let failure = ProviderFailure::message("upstream timeout");
        for _ in 0..4 {
            clock.advance(Duration::minutes(1));
            let handle = manager.select("exa").unwrap();
            manager.report_failure(&handle, &failure);
        }
        // Threshold reached, but the record is still cooling down
        assert_eq!(manager.service_report("exa").unwrap().rate_limited, 1);
        assert_eq!(
            manager.metrics().signal_count("exa", Signal::CredentialErrored),
            0
        );

        clock.advance(Duration::minutes(1));
        assert_eq!(manager.sweep(Some("exa")).unwrap(), 1);
        assert_eq!(manager.service_report("exa").unwrap().error, 1);
        assert_eq!(
            manager.metrics().signal_count("exa", Signal::CredentialErrored),
            1
        );
    }

    #[test]
    fn test_report_does_not_mutate() {
        let clock = Arc::new(ManualClock::starting_now());
        let manager = manager(clock.clone());
        let handle = manager.select("gemini").unwrap();
        manager.report_failure(&handle, &ProviderFailure::message("flaky"));
        clock.advance(Duration::minutes(1));

        let first = manager.status_report();
        let second = manager.status_report();
        let gemini = first.service("gemini").unwrap();
        assert_eq!(gemini.rate_limited, 1);
        assert!(gemini.apis[0].available);
        assert_eq!(
            second.service("gemini").unwrap().rate_limited,
            gemini.rate_limited
        );
    }
}
