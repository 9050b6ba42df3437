//! # Vakit
//!
//! The prayer data and phase orchestration engine behind location-bound
//! display panels.
//!
//! Vakit resolves an opaque location identifier to a data-source
//! configuration, acquires the day's schedule from a primary source with a
//! secondary fallback, tolerates independent failure of the auxiliary
//! sources (weather, rotating daily content), derives the active phase,
//! its progress, and the countdown to the next boundary on every clock
//! tick, and reloads everything at local midnight.
//!
//! ## Core Concepts
//!
//! - **SystemClock**: a 1 Hz ticker that acts as the single source of time.
//! - **Acquisition pipeline**: one run per location change or midnight,
//!   combining the primary/fallback schedule chain with concurrently
//!   fetched auxiliary data; partial failures never block the schedule.
//! - **Phase resolution**: a pure function recomputed on every tick; the
//!   displayed countdown keeps advancing even while a reload is pending.
//! - **Single-writer state**: one aggregate [`engine::EngineState`] value,
//!   written only by the engine's dispatcher and distributed over a watch
//!   channel; stale pipeline results are discarded by generation token.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vakit::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // 1. Load the configuration (built-in defaults, optional TOML).
//!     let config = VakitConfig::load(None)?;
//!
//!     // 2. Create the engine over the HTTP sources.
//!     let sources = Arc::new(HttpSources::new(&config.engine)?);
//!     let engine = VakitEngine::new(config.engine, config.locations, sources);
//!
//!     // 3. Subscribe to state changes before starting the engine.
//!     let mut state_rx = engine.subscribe_state();
//!     tokio::spawn(async move {
//!         while state_rx.changed().await.is_ok() {
//!             let state = state_rx.borrow().clone();
//!             println!("{:?} {}", state.phase.current, state.phase.countdown_display());
//!         }
//!     });
//!
//!     // 4. Select the location and run. The engine shuts down on Ctrl+C.
//!     engine.set_location("hannover").await?;
//!     engine.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub const ENGINE_NAME: &str = "Vakit Engine";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Declare all the modules in the crate.
pub mod common;
pub mod components;
pub mod config;
pub mod engine;
pub mod events;
pub mod phase;
pub mod pipeline;
pub mod schedule;
pub mod sources;
pub mod time;

/// A prelude module for easy importing of the most common Vakit types.
pub mod prelude {
    pub use crate::common::PrayerKey;
    pub use crate::config::{
        EngineConfig, LocationConfig, LocationRegistry, UnknownLocation, VakitConfig,
    };
    pub use crate::engine::{EngineState, EngineStatus, FatalError, VakitEngine};
    pub use crate::events::EngineEvent;
    pub use crate::phase::PhaseState;
    pub use crate::pipeline::{AuxiliaryData, PipelineResult, ScheduleUnavailable};
    pub use crate::schedule::{DayMetadata, DaySchedule, ScheduleEntry};
    pub use crate::sources::{
        ContentImageKey, ContentItem, HttpSources, SourceClient, SourceError, WeatherSnapshot,
    };
}
