//! Read-only status snapshots
//!
//! Building a report never applies transitions. Availability flags are
//! computed from the projected state, while counts reflect stored state, so a
//! record whose cooldown lapsed but that has not been evaluated since still
//! counts as rate limited yet shows `available: true`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use super::classify::FailureKind;
use super::credential::{ApiStatus, CredentialState};
use super::health::HealthPolicy;
use super::pool::Pool;

/// Aggregate health classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// At least one credential in scope is available
    Healthy,
    Degraded,
}

impl HealthStatus {
    pub fn from_available(available: usize) -> Self {
        if available > 0 {
            Self::Healthy
        } else {
            Self::Degraded
        }
    }
}

/// Snapshot of every service a manager knows about
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub timestamp: DateTime<Utc>,
    pub health_status: HealthStatus,
    pub services: BTreeMap<String, ServiceReport>,
}

/// Snapshot of one pool
#[derive(Debug, Clone, Serialize)]
pub struct ServiceReport {
    pub total_apis: usize,
    pub active: usize,
    pub rate_limited: usize,
    pub error: usize,
    pub offline: usize,
    pub current_index: usize,
    pub exhaustions: u64,
    pub fallback_activations: u64,
    pub apis: Vec<CredentialReport>,
    pub summary: ServiceSummary,
}

/// Per-credential counters and flags
#[derive(Debug, Clone, Serialize)]
pub struct CredentialReport {
    pub index: usize,
    pub name: String,
    pub key_preview: String,
    pub status: ApiStatus,
    pub error_count: u32,
    pub requests_made: u32,
    pub total_requests: u64,
    pub successes: u64,
    pub last_used: Option<DateTime<Utc>>,
    pub in_cooldown: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_until: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_reason: Option<FailureKind>,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceSummary {
    pub total_requests: u64,
    pub total_errors: u64,
    /// Percentage of requests that were reported as failed
    pub error_rate: f64,
    pub available_keys: usize,
    pub health_status: HealthStatus,
}

impl ServiceReport {
    pub fn from_pool(pool: &Pool, now: DateTime<Utc>, policy: &HealthPolicy) -> Self {
        let apis: Vec<CredentialReport> = pool
            .records()
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let (cooldown_until, cooldown_reason) = match record.state() {
                    CredentialState::Cooldown { until, reason } => (Some(until), Some(reason)),
                    CredentialState::RateLimited { until } => (Some(until), None),
                    _ => (None, None),
                };
                CredentialReport {
                    index,
                    name: record.name().to_string(),
                    key_preview: record.key_preview(),
                    status: record.status(),
                    error_count: record.error_count(),
                    requests_made: record.requests_made(),
                    total_requests: record.total_requests(),
                    successes: record.successes(),
                    last_used: record.last_used(),
                    in_cooldown: cooldown_until.is_some_and(|until| now <= until),
                    cooldown_until,
                    cooldown_reason,
                    available: record.is_available_at(now, policy),
                }
            })
            .collect();

        let total_requests: u64 = apis.iter().map(|a| a.total_requests).sum();
        let total_errors: u64 = apis.iter().map(|a| u64::from(a.error_count)).sum();
        let available_keys = apis.iter().filter(|a| a.available).count();
        let error_rate = if total_requests > 0 {
            total_errors as f64 / total_requests as f64 * 100.0
        } else {
            0.0
        };

        Self {
            total_apis: pool.len(),
            active: pool.count_status(ApiStatus::Active),
            rate_limited: pool.count_status(ApiStatus::RateLimited),
            error: pool.count_status(ApiStatus::Error),
            offline: pool.count_status(ApiStatus::Offline),
            current_index: pool.cursor(),
            exhaustions: pool.exhaustions,
            fallback_activations: pool.fallback_activations,
            apis,
            summary: ServiceSummary {
                total_requests,
                total_errors,
                error_rate,
                available_keys,
                health_status: HealthStatus::from_available(available_keys),
            },
        }
    }
}

impl StatusReport {
    pub fn from_pools<'a>(
        pools: impl IntoIterator<Item = &'a Pool>,
        now: DateTime<Utc>,
        policy: &HealthPolicy,
    ) -> Self {
        let services: BTreeMap<String, ServiceReport> = pools
            .into_iter()
            .map(|pool| {
                (
                    pool.service().to_string(),
                    ServiceReport::from_pool(pool, now, policy),
                )
            })
            .collect();

        let available: usize = services.values().map(|s| s.summary.available_keys).sum();

        Self {
            timestamp: now,
            health_status: HealthStatus::from_available(available),
            services,
        }
    }

    pub fn service(&self, name: &str) -> Option<&ServiceReport> {
        self.services.get(name)
    }
}
