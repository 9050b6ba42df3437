//! The day schedule data model and its validated construction.
//!
//! A [`DaySchedule`] is produced fresh by each successful pipeline run and
//! is immutable afterwards; the orchestrator replaces it wholesale on the
//! next run. Construction is the single point where source data is
//! validated: six `HH:MM` anchors, each within one day, in non-decreasing
//! order.

use crate::common::PrayerKey;
use thiserror::Error;

/// Minutes in one day; entry starts live in `[0, MINUTES_PER_DAY)`.
pub const MINUTES_PER_DAY: u16 = 1440;

/// A single time anchor within a [`DaySchedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub key: PrayerKey,
    /// Minutes since local midnight.
    pub start_minute: u16,
}

/// Localized calendar-date strings carried alongside the schedule.
///
/// These come straight from the schedule source and are passed through to
/// front-ends untouched; any of them may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayMetadata {
    pub hijri_date_long: Option<String>,
    pub hijri_date_short: Option<String>,
    pub gregorian_date_short: Option<String>,
    pub gregorian_date_long: Option<String>,
}

/// The six time anchors of one calendar day, plus date metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySchedule {
    entries: [ScheduleEntry; 6],
    pub metadata: DayMetadata,
}

/// A schedule payload that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("unparseable time '{0}', expected HH:MM")]
    BadTimeFormat(String),
    #[error("{key} starts at minute {start}, outside a single day")]
    MinuteOutOfDay { key: PrayerKey, start: u16 },
    #[error("{key} starts at minute {start}, before the preceding entry at minute {previous}")]
    OutOfOrder {
        key: PrayerKey,
        start: u16,
        previous: u16,
    },
}

impl DaySchedule {
    /// Builds a schedule from six start minutes in [`PrayerKey::ALL`] order.
    ///
    /// Adjacent equal starts are accepted (a zero-length interval); a
    /// decreasing pair is rejected as [`ScheduleError::OutOfOrder`].
    pub fn new(starts: [u16; 6], metadata: DayMetadata) -> Result<Self, ScheduleError> {
        for (key, &start) in PrayerKey::ALL.into_iter().zip(&starts) {
            if start >= MINUTES_PER_DAY {
                return Err(ScheduleError::MinuteOutOfDay { key, start });
            }
        }
        for (i, pair) in starts.windows(2).enumerate() {
            if pair[1] < pair[0] {
                return Err(ScheduleError::OutOfOrder {
                    key: PrayerKey::ALL[i + 1],
                    start: pair[1],
                    previous: pair[0],
                });
            }
        }
        let mut entries = [ScheduleEntry {
            key: PrayerKey::Fajr,
            start_minute: 0,
        }; 6];
        for (entry, (key, start)) in entries.iter_mut().zip(PrayerKey::ALL.into_iter().zip(starts))
        {
            entry.key = key;
            entry.start_minute = start;
        }
        Ok(Self { entries, metadata })
    }

    /// Builds a schedule by parsing six `HH:MM` strings in slot order.
    pub fn from_clock_times(times: [&str; 6], metadata: DayMetadata) -> Result<Self, ScheduleError> {
        let mut starts = [0u16; 6];
        for (slot, time) in starts.iter_mut().zip(times) {
            *slot = parse_clock_minutes(time)?;
        }
        Self::new(starts, metadata)
    }

    /// All six entries in chronological order.
    pub fn entries(&self) -> &[ScheduleEntry; 6] {
        &self.entries
    }

    /// The entry for a given slot.
    pub fn entry(&self, key: PrayerKey) -> &ScheduleEntry {
        &self.entries[key as usize]
    }
}

/// Parses an `HH:MM` wall-clock string into minutes since midnight.
pub fn parse_clock_minutes(time: &str) -> Result<u16, ScheduleError> {
    let bad = || ScheduleError::BadTimeFormat(time.to_string());
    let (hh, mm) = time.split_once(':').ok_or_else(bad)?;
    let hours: u16 = hh.trim().parse().map_err(|_| bad())?;
    let minutes: u16 = mm.trim().parse().map_err(|_| bad())?;
    if hours >= 24 || minutes >= 60 {
        return Err(bad());
    }
    Ok(hours * 60 + minutes)
}
