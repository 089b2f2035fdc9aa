//! Per-service credential pool
//!
//! Holds the credentials of one logical service in configuration order along
//! with the round-robin cursor. A pool has no lock of its own; the manager's
//! mutex covers every pool it owns.

use chrono::{DateTime, Duration, Utc};

use super::credential::{ApiStatus, CredentialConfig, CredentialRecord};
use super::health::{HealthPolicy, Transition};

/// A credential of this pool changed state while being brought up to date
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolTransition {
    pub index: usize,
    pub name: String,
    pub transition: Transition,
}

/// Ordered credentials for one logical service
#[derive(Debug, Clone)]
pub struct Pool {
    service: String,
    records: Vec<CredentialRecord>,
    /// Index of the next candidate; always < len, or 0 when empty
    cursor: usize,
    last_sweep: Option<DateTime<Utc>>,
    /// Set once the pool has been reported as entirely unavailable
    pub(crate) all_unavailable: bool,
    pub(crate) exhaustions: u64,
    pub(crate) fallback_activations: u64,
}

impl Pool {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            records: Vec::new(),
            cursor: 0,
            last_sweep: None,
            all_unavailable: false,
            exhaustions: 0,
            fallback_activations: 0,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn push(&mut self, config: CredentialConfig) {
        self.records.push(CredentialRecord::new(config));
    }

    pub fn records(&self) -> &[CredentialRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub(crate) fn set_cursor(&mut self, index: usize) {
        self.cursor = if self.records.is_empty() {
            0
        } else {
            index % self.records.len()
        };
    }

    pub fn get(&self, index: usize) -> Option<&CredentialRecord> {
        self.records.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut CredentialRecord> {
        self.records.get_mut(index)
    }

    pub(crate) fn records_mut(&mut self) -> &mut [CredentialRecord] {
        &mut self.records
    }

    /// Resolve a handle back to its record, tolerating a stale index
    pub fn position(&self, index: usize, name: &str) -> Option<usize> {
        match self.records.get(index) {
            Some(record) if record.name() == name => Some(index),
            _ => self.records.iter().position(|r| r.name() == name),
        }
    }

    // ------------------------------------------------------------------------
    // Health sweep
    // ------------------------------------------------------------------------

    pub fn needs_sweep(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        match self.last_sweep {
            Some(last) => now - last > interval,
            None => true,
        }
    }

    /// Bring every record up to date using the same rules as lazy evaluation
    pub fn sweep(&mut self, now: DateTime<Utc>, policy: &HealthPolicy) -> Vec<PoolTransition> {
        let mut transitions = Vec::new();
        for (index, record) in self.records.iter_mut().enumerate() {
            if let Some(transition) = record.refresh(now, policy) {
                transitions.push(PoolTransition {
                    index,
                    name: record.name().to_string(),
                    transition,
                });
            }
        }
        self.last_sweep = Some(now);
        transitions
    }

    // ------------------------------------------------------------------------
    // Read-only views
    // ------------------------------------------------------------------------

    pub fn available_count_at(&self, now: DateTime<Utc>, policy: &HealthPolicy) -> usize {
        self.records
            .iter()
            .filter(|r| r.is_available_at(now, policy))
            .count()
    }

    pub fn count_status(&self, status: ApiStatus) -> usize {
        self.records.iter().filter(|r| r.status() == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::rotation::credential::CredentialState;

    fn pool_of(names: &[&str]) -> Pool {
        let mut pool = Pool::new("groq");
        for name in names {
            pool.push(CredentialConfig::new(
                "groq",
                *name,
                format!("gsk_{}_secret", name),
                "https://api.groq.com/openai/v1",
                30,
            ));
        }
        pool
    }

    #[test]
    fn test_empty_pool_cursor_stays_zero() {
        let mut pool = Pool::new("tavily");
        assert!(pool.is_empty());
        pool.set_cursor(5);
        assert_eq!(pool.cursor(), 0);
    }

    #[test]
    fn test_cursor_wraps() {
        let mut pool = pool_of(&["a", "b", "c"]);
        pool.set_cursor(4);
        assert_eq!(pool.cursor(), 1);
    }

    #[test]
    fn test_position_tolerates_stale_index() {
        let pool = pool_of(&["a", "b"]);
        assert_eq!(pool.position(1, "b"), Some(1));
        assert_eq!(pool.position(0, "b"), Some(1));
        assert_eq!(pool.position(0, "zzz"), None);
    }

    #[test]
    fn test_sweep_recovers_expired_records() {
        let policy = HealthPolicy::default();
        let now = Utc::now();
        let mut pool = pool_of(&["a", "b"]);
        pool.get_mut(1).unwrap().state = CredentialState::RateLimited {
            until: now - Duration::seconds(5),
        };

        assert!(pool.needs_sweep(now, Duration::minutes(5)));
        let transitions = pool.sweep(now, &policy);
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].name, "b");
        assert_eq!(transitions[0].transition, Transition::Recovered);
        assert_eq!(pool.count_status(ApiStatus::Active), 2);

        assert!(!pool.needs_sweep(now + Duration::minutes(1), Duration::minutes(5)));
        assert!(pool.needs_sweep(now + Duration::minutes(6), Duration::minutes(5)));
    }

    #[test]
    fn test_available_count_is_read_only() {
        let policy = HealthPolicy::default();
        let now = Utc::now();
        let mut pool = pool_of(&["a", "b"]);
        pool.get_mut(0).unwrap().state = CredentialState::RateLimited {
            until: now - Duration::seconds(5),
        };
        assert_eq!(pool.available_count_at(now, &policy), 2);
        assert_eq!(pool.count_status(ApiStatus::RateLimited), 1);
    }
}
