//! Reconfiguration guard for the running schedule.
//!
//! There is no true signal for "is the scraper executing right now" — the
//! scraper is an external process on its own timer. The guard infers a safe
//! zone from trigger-time bookkeeping instead: between the worst-case end of
//! the previous run (`previous_fire + max_scroll + shutdown buffer`) and just
//! before the next fire there is provably no run in flight, so an interval
//! change may be applied. Outside that zone the guard defers, trading a small
//! amount of false caution for never touching a schedule mid-run.
//!
//! All decisions are pure functions of explicit time and state arguments so
//! they are testable without a timer.

use chrono::{DateTime, Duration, Utc};

use crate::config::ScraperConfig;
use crate::settings::{CLOCK_SKEW_SECS, SHUTDOWN_BUFFER_SECS};

/// Bookkeeping for the single periodic trigger.
///
/// `next_fire_time` advances monotonically on every fire or reschedule.
/// `last_known_interval` is the interval that produced `next_fire_time`, so
/// the previous fire time is always derivable and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleState {
    pub interval_seconds: i64,
    pub next_fire_time: DateTime<Utc>,
    pub last_known_interval: i64,
}

impl ScheduleState {
    /// A fresh schedule whose first fire is one interval from `now`.
    #[must_use]
    pub fn starting_at(interval_seconds: i64, now: DateTime<Utc>) -> Self {
        Self {
            interval_seconds,
            next_fire_time: now + Duration::seconds(interval_seconds),
            last_known_interval: interval_seconds,
        }
    }

    #[must_use]
    pub fn previous_fire_time(&self) -> DateTime<Utc> {
        self.next_fire_time - Duration::seconds(self.last_known_interval)
    }

    /// Advance past one fire: the next fire moves forward by exactly one
    /// interval, regardless of how long the run itself takes.
    #[must_use]
    pub fn after_fire(&self) -> Self {
        Self {
            interval_seconds: self.interval_seconds,
            next_fire_time: self.next_fire_time + Duration::seconds(self.interval_seconds),
            last_known_interval: self.interval_seconds,
        }
    }

    /// Apply a new interval while continuing the current cadence.
    ///
    /// The next fire is recomputed from the derived previous fire plus the
    /// new interval, advanced by whole intervals until it lies strictly in
    /// the future. The job never fires immediately because of a reschedule.
    #[must_use]
    pub fn rescheduled(&self, interval_seconds: i64, now: DateTime<Utc>) -> Self {
        let mut next = self.previous_fire_time() + Duration::seconds(interval_seconds);
        while next <= now {
            next += Duration::seconds(interval_seconds);
        }
        Self {
            interval_seconds,
            next_fire_time: next,
            last_known_interval: interval_seconds,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Reject { retry_at: DateTime<Utc> },
}

/// The inclusive time span in which the job is presumed idle.
fn idle_window(state: &ScheduleState, active: &ScraperConfig) -> (DateTime<Utc>, DateTime<Utc>) {
    let execution = Duration::seconds(active.max_scroll_seconds + SHUTDOWN_BUFFER_SECS);
    let start = state.previous_fire_time() + execution;
    let end = state.next_fire_time - Duration::seconds(CLOCK_SKEW_SECS);
    (start, end)
}

/// Decide whether a requested configuration can be applied at `now`.
///
/// `active` is the configuration the running schedule was built from; the
/// window is always computed from it, never from `requested` — the requested
/// scroll budget says nothing about a run that may already be in flight.
#[must_use]
pub fn decide(
    now: DateTime<Utc>,
    state: &ScheduleState,
    active: &ScraperConfig,
    requested: &ScraperConfig,
) -> GuardDecision {
    if requested.run_interval_seconds == active.run_interval_seconds {
        // Non-interval fields never desynchronize the schedule.
        return GuardDecision::Allow;
    }

    let (start, end) = idle_window(state, active);
    if start <= now && now <= end {
        return GuardDecision::Allow;
    }

    let retry_at = if now < start {
        start
    } else {
        // The next fire is imminent or just happened; the safe zone opens
        // again one full cycle after this window's start.
        start + Duration::seconds(state.interval_seconds)
    };
    GuardDecision::Reject { retry_at }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fire_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 3, 14, 12, 0, 0).unwrap()
    }

    fn active_config() -> ScraperConfig {
        ScraperConfig {
            run_interval_seconds: 120,
            max_scroll_seconds: 60,
            ..ScraperConfig::default()
        }
    }

    fn requested_config() -> ScraperConfig {
        ScraperConfig {
            run_interval_seconds: 300,
            ..active_config()
        }
    }

    fn state() -> ScheduleState {
        ScheduleState {
            interval_seconds: 120,
            next_fire_time: fire_at(),
            last_known_interval: 120,
        }
    }

    #[test]
    fn unchanged_interval_is_always_allowed() {
        // Even in the middle of a presumed run.
        let now = fire_at() - Duration::seconds(119);
        let decision = decide(now, &state(), &active_config(), &active_config());
        assert_eq!(decision, GuardDecision::Allow);
    }

    #[test]
    fn allow_at_skew_boundary() {
        // Window is [T-40, T-2]; T-2 is still inside.
        let now = fire_at() - Duration::seconds(2);
        let decision = decide(now, &state(), &active_config(), &requested_config());
        assert_eq!(decision, GuardDecision::Allow);
    }

    #[test]
    fn allow_at_window_start() {
        let now = fire_at() - Duration::seconds(40);
        let decision = decide(now, &state(), &active_config(), &requested_config());
        assert_eq!(decision, GuardDecision::Allow);
    }

    #[test]
    fn reject_while_run_presumed_in_flight() {
        let now = fire_at() - Duration::seconds(70);
        let decision = decide(now, &state(), &active_config(), &requested_config());
        assert_eq!(
            decision,
            GuardDecision::Reject {
                retry_at: fire_at() - Duration::seconds(40),
            }
        );
    }

    #[test]
    fn reject_when_next_fire_is_imminent() {
        // Past the window's end: retry one full cycle after the window start.
        let now = fire_at() - Duration::seconds(1);
        let decision = decide(now, &state(), &active_config(), &requested_config());
        assert_eq!(
            decision,
            GuardDecision::Reject {
                retry_at: fire_at() + Duration::seconds(80),
            }
        );
    }

    #[test]
    fn window_uses_active_scroll_budget_not_requested() {
        // Requested config shrinks the scroll budget; the window must still
        // be computed from the active one.
        let requested = ScraperConfig {
            run_interval_seconds: 300,
            max_scroll_seconds: 1,
            ..ScraperConfig::default()
        };
        let now = fire_at() - Duration::seconds(70);
        let decision = decide(now, &state(), &active_config(), &requested);
        assert!(matches!(decision, GuardDecision::Reject { .. }));
    }

    #[test]
    fn previous_fire_time_is_derived() {
        assert_eq!(
            state().previous_fire_time(),
            fire_at() - Duration::seconds(120)
        );
    }

    #[test]
    fn after_fire_advances_one_interval() {
        let advanced = state().after_fire();
        assert_eq!(advanced.next_fire_time, fire_at() + Duration::seconds(120));
        assert_eq!(advanced.last_known_interval, 120);
    }

    #[test]
    fn reschedule_continues_cadence() {
        // Previous fire was T-120; with a 300s interval the next fire is
        // T+180, not now + 300.
        let now = fire_at() - Duration::seconds(30);
        let rescheduled = state().rescheduled(300, now);
        assert_eq!(
            rescheduled.next_fire_time,
            fire_at() + Duration::seconds(180)
        );
        assert_eq!(rescheduled.interval_seconds, 300);
        assert_eq!(rescheduled.last_known_interval, 300);
    }

    #[test]
    fn reschedule_skips_past_fire_times() {
        // Shrinking the interval so far that previous + new <= now must
        // advance by whole cycles until the fire is in the future.
        let now = fire_at() - Duration::seconds(10);
        let rescheduled = state().rescheduled(90, now);
        assert!(rescheduled.next_fire_time > now);
        assert_eq!(
            rescheduled.next_fire_time,
            fire_at() - Duration::seconds(30) + Duration::seconds(90)
        );
    }

    #[test]
    fn starting_at_fires_one_interval_out() {
        let now = fire_at();
        let fresh = ScheduleState::starting_at(120, now);
        assert_eq!(fresh.next_fire_time, now + Duration::seconds(120));
        assert_eq!(fresh.previous_fire_time(), now);
    }
}
