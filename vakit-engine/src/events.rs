//! Defines the lifecycle events broadcast by the Vakit engine.
//!
//! Consumers subscribe to this stream for coarse-grained notifications;
//! the full aggregate state travels on the watch channel instead.

use crate::common::PrayerKey;

/// Events describing the engine's load and phase lifecycle.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A pipeline run started for the given generation.
    LoadStarted { generation: u64 },
    /// A pipeline run settled and its result was adopted.
    LoadFinished { generation: u64 },
    /// A pipeline run settled after a newer one had started; its result
    /// was dropped.
    LoadDiscarded { generation: u64 },
    /// The active phase key changed between two ticks.
    PhaseChanged {
        previous: Option<PrayerKey>,
        current: Option<PrayerKey>,
    },
    /// The local calendar day rolled over; a reload is starting.
    MidnightRollover,
}
