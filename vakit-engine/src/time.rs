//! The master clock task and wall-clock arithmetic helpers.

use chrono::{DateTime, TimeZone, Timelike, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::trace;

/// The fixed cadence of the master clock.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// A single tick of the master clock.
#[derive(Debug, Clone)]
pub struct TickEvent {
    /// Monotonically increasing tick counter, starting at 1.
    pub tick_count: u64,
    /// The wall-clock instant the tick was emitted.
    pub timestamp: DateTime<Utc>,
}

/// The single source of "now" for the engine.
///
/// Runs as its own task and broadcasts an [`TickEvent`] once per
/// [`TICK_PERIOD`] until the shutdown signal arrives.
pub struct SystemClock {
    period: Duration,
    tick_sender: broadcast::Sender<Arc<TickEvent>>,
}

impl SystemClock {
    /// Creates a clock that broadcasts on the given sender.
    pub fn new(period: Duration, tick_sender: broadcast::Sender<Arc<TickEvent>>) -> Self {
        Self {
            period,
            tick_sender,
        }
    }

    /// Runs the tick loop until the shutdown signal is received.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut tick_count: u64 = 0;
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = interval.tick() => {
                    tick_count += 1;
                    trace!("Tick #{tick_count}");
                    self.tick_sender
                        .send(Arc::new(TickEvent {
                            tick_count,
                            timestamp: Utc::now(),
                        }))
                        .ok();
                }
            }
        }
    }
}

/// Seconds elapsed since local midnight of the given instant.
pub fn seconds_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> u32 {
    now.num_seconds_from_midnight()
}

/// Exact time remaining until the next local midnight.
///
/// Sub-second precise: the whole seconds already elapsed today plus the
/// fractional second of `now` are both subtracted from the 24-hour day.
pub fn next_midnight_delay<Tz: TimeZone>(now: &DateTime<Tz>) -> Duration {
    let elapsed = Duration::new(
        u64::from(seconds_of_day(now)),
        now.timestamp_subsec_nanos(),
    );
    Duration::from_secs(86_400).saturating_sub(elapsed)
}
