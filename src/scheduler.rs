//! Wake scheduler.
//!
//! Pure time-of-day arithmetic: given the current hour, pick the daily wake
//! target to sleep until.  The feeder wakes at a small set of fixed hours
//! (07:00 and 19:00 by default).  A target that is too close is skipped in
//! favour of the one after it, so a late wake never produces a short nap
//! followed by another full cycle.
//!
//! ```text
//!  hour ─┬─▶ delta to every target (wrap past midnight)
//!        │
//!        ├─▶ nearest delta  > lead window ──▶ sleep until nearest
//!        │
//!        └─▶ nearest delta <= lead window ──▶ sleep until the following one
//! ```
//!
//! The result of a full boot cycle is a [`SleepPlan`]; the scheduled
//! variant carries the [`WakeTarget`] picked here, the other variants come
//! from the dispatcher's degradation branches.

use heapless::Vec;
use log::debug;

use crate::retained::Level;

// ═══════════════════════════════════════════════════════════════
//  Wake targets
// ═══════════════════════════════════════════════════════════════

/// Maximum number of daily wake targets.
pub const MAX_TARGETS: usize = 4;

const HOURS_PER_DAY: f32 = 24.0;
const SECS_PER_HOUR: f64 = 3600.0;

/// Where the next sleep ends.  Derived each cycle, never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WakeTarget {
    /// Hour of day of the chosen target.
    pub target_hour: f32,
    /// Whole seconds from now until the target.
    pub seconds: u64,
}

/// Picks the next daily wake target.
#[derive(Debug, Clone)]
pub struct WakeScheduler {
    targets: Vec<f32, MAX_TARGETS>,
    min_lead_hours: f32,
}

impl WakeScheduler {
    /// Build a scheduler.  Targets outside `[0, 24)` and any beyond
    /// [`MAX_TARGETS`] are ignored.
    pub fn new(targets: &[f32], min_lead_hours: f32) -> Self {
        let mut kept = Vec::new();
        for &t in targets.iter().filter(|t| (0.0..HOURS_PER_DAY).contains(*t)) {
            if kept.push(t).is_err() {
                break;
            }
        }
        Self {
            targets: kept,
            min_lead_hours,
        }
    }

    pub fn targets(&self) -> &[f32] {
        &self.targets
    }

    pub fn min_lead_hours(&self) -> f32 {
        self.min_lead_hours
    }

    /// Hours from `hour` until the next occurrence of `target`.
    ///
    /// A target equal to the current hour is a full day away.
    fn hours_until(target: f32, hour: f32) -> f32 {
        if target > hour {
            target - hour
        } else {
            target + HOURS_PER_DAY - hour
        }
    }

    /// Choose the target to sleep until from `hour` (fractional, `[0, 24)`).
    ///
    /// The nearest target is taken only when it is strictly more than the
    /// lead window away; at exactly the window it is skipped.  Returns
    /// `None` when no targets are configured.
    pub fn next_wake_target(&self, hour: f32) -> Option<WakeTarget> {
        let hour = if hour.is_finite() {
            hour.rem_euclid(HOURS_PER_DAY)
        } else {
            0.0
        };

        let mut candidates: Vec<(f32, f32), MAX_TARGETS> = self
            .targets
            .iter()
            .map(|&t| (Self::hours_until(t, hour), t))
            .collect();
        candidates.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        let &(nearest_delta, nearest) = candidates.first()?;
        let (delta, target) = if nearest_delta > self.min_lead_hours {
            (nearest_delta, nearest)
        } else if let Some(&following) = candidates.get(1) {
            debug!(
                "Scheduler: {:.2}h to {:.2} is inside the {:.1}h window, skipping",
                nearest_delta, nearest, self.min_lead_hours
            );
            following
        } else {
            // A lone target comes round again a day later.
            (nearest_delta + HOURS_PER_DAY, nearest)
        };

        Some(WakeTarget {
            target_hour: target,
            seconds: (f64::from(delta) * SECS_PER_HOUR).round() as u64,
        })
    }

    /// Seconds until the next wake; 0 when no targets are configured.
    pub fn seconds_to_next_wake(&self, hour: f32) -> u64 {
        self.next_wake_target(hour).map_or(0, |t| t.seconds)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Sleep plans
// ═══════════════════════════════════════════════════════════════

/// Why the cycle chose its sleep duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SleepReason {
    /// Normal schedule towards a daily target.
    Scheduled { target_hour: f32 },
    /// Connectivity or time sync failed; retry soon.
    Recovery,
    /// No wake cause (power-on or reset); come back quickly.
    ColdBoot,
    /// Low-battery alert gave up waiting for the voltage to recover.
    BatteryExhausted,
}

/// Outcome of one boot cycle: how long to sleep and which button level
/// wakes the device early.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SleepPlan {
    pub reason: SleepReason,
    pub seconds: u64,
    pub wake_level: Level,
}

impl SleepPlan {
    pub fn scheduled(target: WakeTarget, wake_level: Level) -> Self {
        Self {
            reason: SleepReason::Scheduled {
                target_hour: target.target_hour,
            },
            seconds: target.seconds,
            wake_level,
        }
    }

    pub fn fixed(reason: SleepReason, seconds: u64, wake_level: Level) -> Self {
        Self {
            reason,
            seconds,
            wake_level,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
