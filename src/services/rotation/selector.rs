//! Round-robin-with-skip selection
//!
//! Starting at the pool cursor, every index is visited once. The first record
//! that evaluates as usable is handed out and the cursor moves one past it, so
//! consecutive selections spread across the pool.

use chrono::{DateTime, Duration, Utc};

use super::credential::CredentialHandle;
use super::health::HealthPolicy;
use super::pool::{Pool, PoolTransition};

/// Result of one selection pass over a pool
#[derive(Debug, Default)]
pub struct Selection {
    pub handle: Option<CredentialHandle>,
    /// State changes made by the sweep and by lazy evaluation
    pub transitions: Vec<PoolTransition>,
    pub swept: bool,
}

/// Pick the next usable credential, sweeping first when the interval is due
pub fn select_next(
    pool: &mut Pool,
    now: DateTime<Utc>,
    policy: &HealthPolicy,
    sweep_interval: Duration,
) -> Selection {
    let mut selection = Selection::default();
    if pool.is_empty() {
        return selection;
    }

    if pool.needs_sweep(now, sweep_interval) {
        selection.transitions = pool.sweep(now, policy);
        selection.swept = true;
    }

    let len = pool.len();
    let start = pool.cursor();
    for offset in 0..len {
        let index = (start + offset) % len;
        let Some(record) = pool.get_mut(index) else {
            continue;
        };

        let (usable, transition) = record.evaluate(now, policy);
        if let Some(transition) = transition {
            selection.transitions.push(PoolTransition {
                index,
                name: record.name().to_string(),
                transition,
            });
        }
        if usable {
            record.record_selection(now);
            selection.handle = Some(record.handle(index));
            pool.set_cursor(index + 1);
            break;
        }
    }

    selection
}
