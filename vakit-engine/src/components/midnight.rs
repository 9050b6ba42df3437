//! The midnight rollover timer.
//!
//! Armed as a one-shot for the next local midnight; after firing it
//! recomputes and re-arms itself for the following one. Re-arming from the
//! outside cancels the pending timer first, so redundant arms (one per
//! location change) never produce duplicate fires.

use crate::time::next_midnight_delay;
use chrono::Utc;
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

type DelaySource = Arc<dyn Fn() -> Duration + Send + Sync>;

#[doc(hidden)]
pub(crate) struct MidnightScheduler {
    delay_source: DelaySource,
    fire_tx: mpsc::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl MidnightScheduler {
    pub(crate) fn new(timezone: Tz, fire_tx: mpsc::Sender<()>) -> Self {
        Self::with_delay_source(
            Arc::new(move || next_midnight_delay(&Utc::now().with_timezone(&timezone))),
            fire_tx,
        )
    }

    /// The delay source is injectable so tests can drive paused time
    /// instead of the wall clock.
    fn with_delay_source(delay_source: DelaySource, fire_tx: mpsc::Sender<()>) -> Self {
        Self {
            delay_source,
            fire_tx,
            handle: None,
        }
    }

    /// Arms the timer for the next local midnight, cancelling any pending
    /// one. Safe to call repeatedly.
    pub(crate) fn arm(&mut self) {
        if let Some(pending) = self.handle.take() {
            pending.abort();
        }
        let delay_source = self.delay_source.clone();
        let fire_tx = self.fire_tx.clone();
        self.handle = Some(tokio::spawn(async move {
            loop {
                let delay = delay_source();
                debug!("midnight rollover armed, firing in {}s", delay.as_secs());
                tokio::time::sleep(delay).await;
                if fire_tx.send(()).await.is_err() {
                    break;
                }
            }
        }));
    }
}

impl Drop for MidnightScheduler {
    fn drop(&mut self) {
        if let Some(pending) = self.handle.take() {
            pending.abort();
        }
    }
}
