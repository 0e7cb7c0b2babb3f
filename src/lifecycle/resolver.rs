//! Match phase resolver.
//!
//! Pure mapping from a match record and the current time to the phase,
//! the remaining countdown and the transition the caller should persist.

use chrono::{DateTime, Duration, Utc};
use std::fmt;

use crate::data::models::{Match, MatchStatus};

/// A one-way phase change that must be written to the collaborator store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    ToInProgress,
    ToFinished,
}

impl Transition {
    pub fn target(&self) -> MatchStatus {
        match self {
            Self::ToInProgress => MatchStatus::InProgress,
            Self::ToFinished => MatchStatus::Finished,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ToInProgress => write!(f, "ToInProgress"),
            Self::ToFinished => write!(f, "ToFinished"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub phase: MatchStatus,
    /// `None` outside InProgress and for the degraded InProgress state.
    pub remaining_seconds: Option<i64>,
    pub transition: Option<Transition>,
}

impl Resolution {
    /// InProgress with no countdown: start time or duration missing.
    pub fn is_degraded(&self) -> bool {
        self.phase == MatchStatus::InProgress && self.remaining_seconds.is_none()
    }
}

/// Scheduled end of an in-progress match, if both inputs are known.
pub fn end_time(m: &Match) -> Option<DateTime<Utc>> {
    let started_at = m.started_at?;
    let minutes = m.duration_minutes?;
    Some(started_at + Duration::minutes(i64::from(minutes)))
}

/// Whole seconds from `now` until `end`, rounded up and floored at zero, so
/// the countdown reads 0 only once `end` has actually been reached.
pub fn seconds_until(end: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (end - now).num_milliseconds().max(0);
    (millis + 999) / 1000
}

/// Decide the phase of `m` at `now`.
pub fn resolve_phase(m: &Match, now: DateTime<Utc>) -> Resolution {
    match m.status {
        MatchStatus::Finished => Resolution {
            phase: MatchStatus::Finished,
            remaining_seconds: None,
            transition: None,
        },
        MatchStatus::Upcoming => {
            let due = now >= m.scheduled_at && m.started_at.is_none();
            Resolution {
                phase: MatchStatus::Upcoming,
                remaining_seconds: None,
                transition: due.then_some(Transition::ToInProgress),
            }
        }
        MatchStatus::InProgress => {
            let remaining = end_time(m).map(|end| seconds_until(end, now));
            Resolution {
                phase: MatchStatus::InProgress,
                remaining_seconds: remaining,
                transition: (remaining == Some(0)).then_some(Transition::ToFinished),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, h, m, s).unwrap()
    }

    fn upcoming(kickoff: DateTime<Utc>) -> Match {
        Match::friendly("A", "B", kickoff, "", Some(90), None)
    }

    fn in_progress(started: DateTime<Utc>, duration: Option<u32>) -> Match {
        let mut m = upcoming(started);
        m.status = MatchStatus::InProgress;
        m.started_at = Some(started);
        m.duration_minutes = duration;
        m
    }

    #[test]
    fn test_finished_is_terminal() {
        let mut m = in_progress(at(9, 0, 0), Some(90));
        m.status = MatchStatus::Finished;
        let r = resolve_phase(&m, at(12, 0, 0));
        assert_eq!(r.phase, MatchStatus::Finished);
        assert_eq!(r.remaining_seconds, None);
        assert_eq!(r.transition, None);
    }

    #[test]
    fn test_upcoming_before_kickoff() {
        let r = resolve_phase(&upcoming(at(15, 0, 0)), at(14, 59, 59));
        assert_eq!(r.phase, MatchStatus::Upcoming);
        assert_eq!(r.transition, None);
    }

    #[test]
    fn test_upcoming_at_kickoff_requests_start() {
        let m = upcoming(at(15, 0, 0));
        assert_eq!(
            resolve_phase(&m, at(15, 0, 0)).transition,
            Some(Transition::ToInProgress)
        );
        assert_eq!(
            resolve_phase(&m, at(16, 0, 0)).transition,
            Some(Transition::ToInProgress)
        );
    }

    #[test]
    fn test_upcoming_with_start_time_does_not_retrigger() {
        let mut m = upcoming(at(15, 0, 0));
        m.started_at = Some(at(15, 0, 1));
        assert_eq!(resolve_phase(&m, at(15, 5, 0)).transition, None);
    }

    #[test]
    fn test_remaining_counts_down_to_zero_at_end() {
        let m = in_progress(at(9, 0, 0), Some(90));
        assert_eq!(resolve_phase(&m, at(9, 0, 0)).remaining_seconds, Some(5400));
        assert_eq!(resolve_phase(&m, at(10, 29, 59)).remaining_seconds, Some(1));
        assert_eq!(resolve_phase(&m, at(10, 29, 59)).transition, None);

        let end = resolve_phase(&m, at(10, 30, 0));
        assert_eq!(end.remaining_seconds, Some(0));
        assert_eq!(end.transition, Some(Transition::ToFinished));
    }

    #[test]
    fn test_overdue_clamps_to_zero() {
        let m = in_progress(at(9, 0, 0), Some(90));
        let r = resolve_phase(&m, at(10, 30, 1));
        assert_eq!(r.remaining_seconds, Some(0));
        assert_eq!(r.transition, Some(Transition::ToFinished));
        assert_eq!(r.phase, MatchStatus::InProgress);
    }

    #[test]
    fn test_missing_duration_is_degraded() {
        let m = in_progress(at(9, 0, 0), None);
        for hour in [9, 12, 23] {
            let r = resolve_phase(&m, at(hour, 0, 0));
            assert!(r.is_degraded());
            assert_eq!(r.transition, None);
        }
    }

    #[test]
    fn test_sub_second_remaining_rounds_up() {
        let m = in_progress(at(9, 0, 0), Some(1));
        let now = at(9, 0, 59) + Duration::milliseconds(500);
        let r = resolve_phase(&m, now);
        assert_eq!(r.remaining_seconds, Some(1));
        assert_eq!(r.transition, None);
    }

    #[test]
    fn test_remaining_is_monotonic() {
        let m = in_progress(at(9, 0, 0), Some(2));
        let mut previous = i64::MAX;
        for step in 0..300 {
            let now = at(9, 0, 0) + Duration::milliseconds(step * 450);
            let remaining = resolve_phase(&m, now).remaining_seconds.unwrap();
            assert!(remaining <= previous);
            previous = remaining;
        }
        assert_eq!(previous, 0);
    }
}
