//! Pure derivation of the active phase from the clock and the schedule.
//!
//! [`resolve`] is called on every tick. It is deterministic, allocation-free
//! apart from the returned value, and never performs I/O, so it is safe to
//! run while a reload is in flight.

use crate::common::PrayerKey;
use crate::schedule::DaySchedule;
use chrono::{DateTime, TimeZone, Timelike};
use std::time::Duration;

const SECONDS_PER_DAY: i64 = 86_400;

/// The derived view of "where in the daily cycle are we right now".
///
/// Recomputed from scratch on every tick; it carries no state between
/// ticks beyond the schedule it was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseState {
    /// The slot whose interval contains the current instant.
    pub current: Option<PrayerKey>,
    /// The slot whose start ends the current interval. `None` means the
    /// interval runs to local midnight.
    pub next: Option<PrayerKey>,
    /// How far through the current interval time has progressed, 0..=100.
    pub progress_percent: f64,
    /// Time remaining until the next boundary (next start or midnight).
    pub countdown: Duration,
}

impl PhaseState {
    /// The "no data yet" sentinel, used while no schedule is held.
    pub fn placeholder() -> Self {
        Self {
            current: None,
            next: None,
            progress_percent: 0.0,
            countdown: Duration::ZERO,
        }
    }

    /// The countdown as `HH:MM:SS`, or `--:--:--` in the sentinel state.
    pub fn countdown_display(&self) -> String {
        if self.current.is_none() {
            return "--:--:--".to_string();
        }
        let total = self.countdown.as_secs();
        format!(
            "{:02}:{:02}:{:02}",
            total / 3600,
            (total % 3600) / 60,
            total % 60
        )
    }
}

/// Resolves the phase for a wall-clock instant in the schedule's timezone.
pub fn resolve_at<Tz: TimeZone>(now: &DateTime<Tz>, schedule: Option<&DaySchedule>) -> PhaseState {
    resolve(now.num_seconds_from_midnight(), schedule)
}

/// Resolves the phase for a given second of the local day, in `[0, 86400)`.
///
/// The active entry is the greatest one whose start is at or before `now`.
/// Before the first boundary the engine is still in the final phase of the
/// previous cycle: the last entry stays active, the first entry is next,
/// and progress spans the wrapped night interval.
pub fn resolve(now_secs_of_day: u32, schedule: Option<&DaySchedule>) -> PhaseState {
    let Some(schedule) = schedule else {
        return PhaseState::placeholder();
    };

    let now = i64::from(now_secs_of_day);
    let entries = schedule.entries();
    let start_secs = |i: usize| i64::from(entries[i].start_minute) * 60;

    let active = (0..entries.len()).rev().find(|&i| start_secs(i) <= now);

    let (current, next, interval_start, interval_end) = match active {
        Some(i) if i + 1 < entries.len() => (
            entries[i].key,
            Some(entries[i + 1].key),
            start_secs(i),
            start_secs(i + 1),
        ),
        Some(i) => (entries[i].key, None, start_secs(i), SECONDS_PER_DAY),
        // Night wrap: the last entry is still active from the previous
        // cycle, so its interval started one day ago.
        None => (
            entries[5].key,
            Some(entries[0].key),
            start_secs(5) - SECONDS_PER_DAY,
            start_secs(0),
        ),
    };

    let progress_percent = if interval_end <= interval_start {
        100.0
    } else {
        let span = (interval_end - interval_start) as f64;
        let elapsed = (now - interval_start) as f64;
        (elapsed / span * 100.0).clamp(0.0, 100.0)
    };

    let countdown = Duration::from_secs((interval_end - now).max(0) as u64);

    PhaseState {
        current: Some(current),
        next,
        progress_percent,
        countdown,
    }
}
