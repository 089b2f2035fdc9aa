//! Health state machine
//!
//! Transitions are evaluated lazily: nothing changes on a timer, a record is
//! brought up to date whenever it is considered for selection or swept.
//! [`CredentialRecord::project`] computes the up-to-date view without touching
//! the record, so read-only reports and mutating evaluation share one set of
//! rules.

use chrono::{DateTime, Duration, Utc};

use super::classify::{CooldownPolicy, FailureKind};
use super::credential::{CredentialRecord, CredentialState};

// ============================================================================
// Health Policy
// ============================================================================

/// Thresholds and durations driving the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    /// Error count at which a credential is marked ERRORED
    pub error_threshold: u32,
    /// Error count at which an ERRORED credential stops being selectable
    pub exclusion_threshold: u32,
    /// Length of the request-counting window and of a cap-triggered rate limit
    pub rate_limit_window: Duration,
    pub cooldowns: CooldownPolicy,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            error_threshold: 3,
            exclusion_threshold: 3,
            rate_limit_window: Duration::minutes(1),
            cooldowns: CooldownPolicy::default(),
        }
    }
}

impl HealthPolicy {
    /// Lenient thresholds for managers fronting many services: a credential is
    /// flagged after its fourth failure but stays selectable until the sixth.
    pub fn multi_service() -> Self {
        Self {
            error_threshold: 4,
            exclusion_threshold: 6,
            ..Self::default()
        }
    }

    pub fn with_error_threshold(mut self, threshold: u32) -> Self {
        self.error_threshold = threshold;
        self
    }

    pub fn with_exclusion_threshold(mut self, threshold: u32) -> Self {
        self.exclusion_threshold = threshold;
        self
    }

    pub fn with_cooldowns(mut self, cooldowns: CooldownPolicy) -> Self {
        self.cooldowns = cooldowns;
        self
    }

    fn excluded_at(&self) -> u32 {
        self.exclusion_threshold.max(self.error_threshold)
    }
}

// ============================================================================
// Evaluation
// ============================================================================

/// A state change made while bringing a record up to date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// A timed exclusion expired
    Recovered,
    /// A timed exclusion expired with the error threshold already reached
    Errored,
    /// The per-minute request cap was reached
    CapReached { until: DateTime<Utc> },
}

/// Up-to-date view of a record at some instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projection {
    pub state: CredentialState,
    pub requests_made: u32,
    pub window_started: Option<DateTime<Utc>>,
    pub transition: Option<Transition>,
}

/// What recording a failure did to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    pub kind: FailureKind,
    pub error_count: u32,
    /// End of the exclusion now in effect, if timed
    pub excluded_until: Option<DateTime<Utc>>,
    /// The stored state became ERRORED with this report
    pub errored: bool,
    /// A payment_required report that was not the first for this record
    pub repeated_payment: bool,
}

impl CredentialRecord {
    /// Compute the state this record should be in at `now`, without mutating it
    pub fn project(&self, now: DateTime<Utc>, policy: &HealthPolicy) -> Projection {
        let mut view = Projection {
            state: self.state,
            requests_made: self.requests_made,
            window_started: self.window_started,
            transition: None,
        };

        match self.state {
            CredentialState::Offline => return view,
            CredentialState::RateLimited { until } | CredentialState::Cooldown { until, .. } => {
                if now <= until {
                    return view;
                }
                let errored = self.error_count >= policy.error_threshold;
                view.state = if errored {
                    CredentialState::Errored
                } else {
                    CredentialState::Active
                };
                view.requests_made = 0;
                view.window_started = None;
                view.transition = Some(if errored {
                    Transition::Errored
                } else {
                    Transition::Recovered
                });
            }
            CredentialState::Active | CredentialState::Errored => {}
        }

        if let Some(started) = view.window_started {
            if now - started >= policy.rate_limit_window {
                view.requests_made = 0;
                view.window_started = None;
            }
        }

        let countable = match view.state {
            CredentialState::Active => true,
            CredentialState::Errored => self.error_count < policy.excluded_at(),
            _ => false,
        };
        if countable
            && self.max_requests_per_minute > 0
            && view.requests_made >= self.max_requests_per_minute
        {
            let until = now + policy.rate_limit_window;
            view.state = CredentialState::RateLimited { until };
            view.transition = Some(Transition::CapReached { until });
        }

        view
    }

    /// Apply pending transitions; returns the transition made, if any
    pub fn refresh(&mut self, now: DateTime<Utc>, policy: &HealthPolicy) -> Option<Transition> {
        let view = self.project(now, policy);
        self.state = view.state;
        self.requests_made = view.requests_made;
        self.window_started = view.window_started;
        view.transition
    }

    /// Bring the record up to date and decide whether it may be selected
    pub fn evaluate(
        &mut self,
        now: DateTime<Utc>,
        policy: &HealthPolicy,
    ) -> (bool, Option<Transition>) {
        let transition = self.refresh(now, policy);
        (self.state_is_usable(self.state, policy), transition)
    }

    /// Whether the record would be selectable at `now`; never mutates
    pub fn is_available_at(&self, now: DateTime<Utc>, policy: &HealthPolicy) -> bool {
        self.state_is_usable(self.project(now, policy).state, policy)
    }

    fn state_is_usable(&self, state: CredentialState, policy: &HealthPolicy) -> bool {
        match state {
            CredentialState::Active => true,
            CredentialState::Errored => self.error_count < policy.excluded_at(),
            _ => false,
        }
    }

    /// Count a selection against the current window
    pub(crate) fn record_selection(&mut self, now: DateTime<Utc>) {
        if self.window_started.is_none() {
            self.window_started = Some(now);
        }
        self.requests_made = self.requests_made.saturating_add(1);
        self.total_requests = self.total_requests.saturating_add(1);
        self.last_used = Some(now);
    }

    /// Successful call; the error count is deliberately left alone
    pub(crate) fn record_success(&mut self, now: DateTime<Utc>) {
        self.successes = self.successes.saturating_add(1);
        self.last_used = Some(now);
    }

    /// Record a classified failure and apply its cooldown
    pub(crate) fn record_failure(
        &mut self,
        kind: FailureKind,
        now: DateTime<Utc>,
        policy: &HealthPolicy,
    ) -> FailureOutcome {
        self.error_count = self.error_count.saturating_add(1);
        if kind == FailureKind::PaymentRequired {
            self.payment_failures = self.payment_failures.saturating_add(1);
        }

        let mut outcome = FailureOutcome {
            kind,
            error_count: self.error_count,
            excluded_until: None,
            errored: false,
            repeated_payment: kind == FailureKind::PaymentRequired && self.payment_failures > 1,
        };

        match self.state {
            CredentialState::Offline => return outcome,
            CredentialState::Errored if self.error_count > policy.excluded_at() => {
                return outcome;
            }
            _ => {}
        }

        if self.error_count >= policy.excluded_at() {
            outcome.errored = self.state != CredentialState::Errored;
            self.state = CredentialState::Errored;
            return outcome;
        }

        let candidate = now + policy.cooldowns.duration_for(kind, self.payment_failures);
        self.state = match self.state {
            CredentialState::RateLimited { until } if until >= candidate => self.state,
            CredentialState::Cooldown { until, .. } if until >= candidate => self.state,
            _ => CredentialState::Cooldown {
                until: candidate,
                reason: kind,
            },
        };
        outcome.excluded_until = self.state.until();
        outcome
    }

    /// Provider told us to back off until `until`
    pub(crate) fn mark_rate_limited(&mut self, until: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.state {
            CredentialState::Offline | CredentialState::Errored => return None,
            CredentialState::RateLimited { until: current }
            | CredentialState::Cooldown { until: current, .. }
                if current >= until => {}
            _ => self.state = CredentialState::RateLimited { until },
        }
        self.state.until()
    }

    pub(crate) fn reset_errors(&mut self) {
        self.error_count = 0;
        if self.state == CredentialState::Errored {
            self.state = CredentialState::Active;
        }
    }

    pub(crate) fn reset_cooldown(&mut self) {
        self.payment_failures = 0;
        if matches!(
            self.state,
            CredentialState::RateLimited { .. } | CredentialState::Cooldown { .. }
        ) {
            self.state = CredentialState::Active;
            self.requests_made = 0;
            self.window_started = None;
        }
    }

    pub(crate) fn set_offline(&mut self) {
        self.state = CredentialState::Offline;
    }

    pub(crate) fn set_online(&mut self) {
        if self.state == CredentialState::Offline {
            self.state = CredentialState::Active;
        }
    }
}
