//! The core engine that orchestrates the entire Vakit system.

use crate::components::midnight::MidnightScheduler;
use crate::config::{EngineConfig, LocationConfig, LocationRegistry, UnknownLocation};
use crate::events::EngineEvent;
use crate::phase::{self, PhaseState};
use crate::pipeline::{self, AuxiliaryData, PipelineResult, ScheduleUnavailable};
use crate::schedule::DaySchedule;
use crate::sources::SourceClient;
use crate::time::{SystemClock, TickEvent, TICK_PERIOD};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};

/// Where the engine is in its location session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// No location identifier has been received yet.
    Idle,
    /// A pipeline run is in flight.
    Loading,
    /// The last pipeline run has settled (possibly with a fatal error).
    Ready,
    /// The identifier did not resolve; terminal until it changes.
    Invalid,
}

/// A condition that blocks primary content entirely.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FatalError {
    #[error(transparent)]
    UnknownLocation(#[from] UnknownLocation),
    #[error(transparent)]
    ScheduleUnavailable(#[from] ScheduleUnavailable),
}

/// The single aggregate exposed to consumers.
///
/// Published as one immutable-per-version value on a watch channel; only
/// the engine's dispatcher ever writes it.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub config: Option<Arc<LocationConfig>>,
    pub schedule: Option<Arc<DaySchedule>>,
    pub auxiliary: AuxiliaryData,
    pub phase: PhaseState,
    pub status: EngineStatus,
    pub fatal_error: Option<FatalError>,
}

impl EngineState {
    fn idle() -> Self {
        Self {
            config: None,
            schedule: None,
            auxiliary: AuxiliaryData::default(),
            phase: PhaseState::placeholder(),
            status: EngineStatus::Idle,
            fatal_error: None,
        }
    }

    /// True while a pipeline run is in flight.
    pub fn is_loading(&self) -> bool {
        self.status == EngineStatus::Loading
    }
}

enum Command {
    SetLocation(String),
}

/// The main Vakit engine.
///
/// This struct is the central point of control. It resolves location
/// identifiers, drives the acquisition pipeline, recomputes the phase on
/// every clock tick, and publishes the aggregate state. The engine is
/// designed to be cloned and shared across tasks, providing a handle to
/// the running instance.
#[derive(Clone)]
pub struct VakitEngine {
    config: Arc<EngineConfig>,
    registry: Arc<LocationRegistry>,
    sources: Arc<dyn SourceClient>,
    tick_sender: broadcast::Sender<Arc<TickEvent>>,
    event_sender: broadcast::Sender<EngineEvent>,
    state_sender: Arc<watch::Sender<EngineState>>,
    command_tx: mpsc::Sender<Command>,
    command_rx: Arc<Mutex<Option<mpsc::Receiver<Command>>>>,
}

// Core implementation block for internal logic.
impl VakitEngine {
    /// Creates a new `VakitEngine` over the given sources.
    pub fn new(
        config: EngineConfig,
        registry: LocationRegistry,
        sources: Arc<dyn SourceClient>,
    ) -> Self {
        const CHANNEL_CAPACITY: usize = 64;
        let (tick_sender, _) = broadcast::channel(256);
        let (event_sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (state_sender, _) = watch::channel(EngineState::idle());
        let (command_tx, command_rx) = mpsc::channel(8);

        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            sources,
            tick_sender,
            event_sender,
            state_sender: Arc::new(state_sender),
            command_tx,
            command_rx: Arc::new(Mutex::new(Some(command_rx))),
        }
    }

    /// Runs the engine's main loop until a shutdown signal is received.
    ///
    /// This method will:
    /// 1. Spawn the `SystemClock` task.
    /// 2. Spawn the dispatcher task that reacts to commands, pipeline
    ///    results, midnight fires, and ticks.
    /// 3. Wait for a Ctrl+C signal to initiate a graceful shutdown.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!("Vakit engine starting up...");
        let (shutdown_tx, _) = broadcast::channel(1);

        let clock = SystemClock::new(TICK_PERIOD, self.tick_sender.clone());
        let clock_shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move { clock.run(clock_shutdown_rx).await });

        let dispatcher = self.clone();
        let dispatcher_shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move { dispatcher.dispatcher_loop(dispatcher_shutdown_rx).await });

        info!(
            "Engine running in {}. Press Ctrl+C to shut down.",
            self.config.timezone
        );
        tokio::signal::ctrl_c().await?;

        info!("Shutdown signal received. Broadcasting to all tasks...");
        if shutdown_tx.send(()).is_err() {
            error!("Failed to send shutdown signal. Some tasks may not terminate gracefully.");
        }
        info!("Vakit engine has shut down.");
        Ok(())
    }

    #[doc(hidden)]
    async fn dispatcher_loop(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut command_rx = match self.command_rx.lock().await.take() {
            Some(rx) => rx,
            None => {
                error!("dispatcher is already running; refusing to start twice");
                return;
            }
        };
        let (load_tx, mut load_rx) = mpsc::channel::<(u64, PipelineResult)>(8);
        let (midnight_tx, mut midnight_rx) = mpsc::channel::<()>(4);
        let mut midnight = MidnightScheduler::new(self.config.timezone, midnight_tx);
        let mut tick_rx = self.tick_sender.subscribe();
        // Every load carries the generation active at its start; a result
        // is adopted only if the generation still matches when it lands.
        let mut generation: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                Some(command) = command_rx.recv() => match command {
                    Command::SetLocation(identifier) => {
                        self.handle_location_change(identifier, &mut generation, &load_tx, &mut midnight);
                    }
                },
                Some((load_generation, result)) = load_rx.recv() => {
                    self.adopt_pipeline_result(load_generation, generation, result);
                }
                Some(()) = midnight_rx.recv() => {
                    self.handle_midnight(&mut generation, &load_tx);
                }
                Ok(tick) = tick_rx.recv() => {
                    self.advance_phase(&tick);
                }
            }
        }
    }

    fn handle_location_change(
        &self,
        identifier: String,
        generation: &mut u64,
        load_tx: &mpsc::Sender<(u64, PipelineResult)>,
        midnight: &mut MidnightScheduler,
    ) {
        // Bump the generation in every branch so a load still in flight
        // for the previous identifier can no longer publish.
        *generation += 1;
        match self.registry.resolve(&identifier) {
            Err(unknown) => {
                warn!("{unknown}");
                self.state_sender.send_modify(|state| {
                    state.config = None;
                    state.schedule = None;
                    state.auxiliary = AuxiliaryData::default();
                    state.phase = PhaseState::placeholder();
                    state.status = EngineStatus::Invalid;
                    state.fatal_error = Some(FatalError::UnknownLocation(unknown));
                });
            }
            Ok(location) => {
                let location = Arc::new(location.clone());
                info!("location '{identifier}' resolved to {}", location.mosque_name);
                self.state_sender.send_modify(|state| {
                    state.config = Some(location.clone());
                    state.schedule = None;
                    state.auxiliary = AuxiliaryData::default();
                    state.phase = PhaseState::placeholder();
                    state.status = EngineStatus::Loading;
                    state.fatal_error = None;
                });
                self.spawn_load(*generation, location, load_tx);
                midnight.arm();
            }
        }
    }

    fn handle_midnight(&self, generation: &mut u64, load_tx: &mpsc::Sender<(u64, PipelineResult)>) {
        let location = self.state_sender.borrow().config.clone();
        let Some(location) = location else {
            return;
        };
        info!("midnight rollover, reloading the schedule");
        self.event_sender.send(EngineEvent::MidnightRollover).ok();
        *generation += 1;
        // Keep the displayed data until the fresh result arrives.
        self.state_sender
            .send_modify(|state| state.status = EngineStatus::Loading);
        self.spawn_load(*generation, location, load_tx);
    }

    fn spawn_load(
        &self,
        generation: u64,
        location: Arc<LocationConfig>,
        load_tx: &mpsc::Sender<(u64, PipelineResult)>,
    ) {
        self.event_sender
            .send(EngineEvent::LoadStarted { generation })
            .ok();
        let sources = self.sources.clone();
        let load_tx = load_tx.clone();
        tokio::spawn(async move {
            let result = pipeline::load(sources.as_ref(), &location).await;
            load_tx.send((generation, result)).await.ok();
        });
    }

    fn adopt_pipeline_result(
        &self,
        load_generation: u64,
        current_generation: u64,
        result: PipelineResult,
    ) {
        if load_generation != current_generation {
            debug!(
                "discarding stale pipeline result (generation {load_generation}, current {current_generation})"
            );
            self.event_sender
                .send(EngineEvent::LoadDiscarded {
                    generation: load_generation,
                })
                .ok();
            return;
        }
        if let Some(unavailable) = &result.schedule_error {
            error!("{unavailable}");
        }
        let now = Utc::now().with_timezone(&self.config.timezone);
        self.state_sender.send_modify(|state| {
            state.schedule = result.schedule.map(Arc::new);
            state.auxiliary = AuxiliaryData {
                weather: result.weather,
                daily_content: result.daily_content,
            };
            state.fatal_error = result
                .schedule_error
                .map(FatalError::ScheduleUnavailable);
            state.status = EngineStatus::Ready;
            state.phase = phase::resolve_at(&now, state.schedule.as_deref());
        });
        self.event_sender
            .send(EngineEvent::LoadFinished {
                generation: load_generation,
            })
            .ok();
    }

    fn advance_phase(&self, tick: &TickEvent) {
        let now = tick.timestamp.with_timezone(&self.config.timezone);
        let mut transition = None;
        self.state_sender.send_modify(|state| {
            let next = phase::resolve_at(&now, state.schedule.as_deref());
            if next.current != state.phase.current {
                transition = Some((state.phase.current, next.current));
            }
            state.phase = next;
        });
        if let Some((previous, current)) = transition {
            debug!("phase changed: {previous:?} -> {current:?}");
            self.event_sender
                .send(EngineEvent::PhaseChanged { previous, current })
                .ok();
        }
    }
}

// Public API implementation block.
impl VakitEngine {
    /// Requests a switch to the given location identifier.
    ///
    /// The change is applied by the dispatcher; any pipeline run still in
    /// flight for the previous identifier is discarded at publish time.
    pub async fn set_location(&self, identifier: impl Into<String>) -> anyhow::Result<()> {
        self.command_tx
            .send(Command::SetLocation(identifier.into()))
            .await
            .map_err(|_| anyhow::anyhow!("engine dispatcher is gone"))
    }

    /// Returns a snapshot of the latest `EngineState`.
    pub fn state(&self) -> EngineState {
        self.state_sender.borrow().clone()
    }

    /// Subscribes to `EngineState` changes (fired on every tick, load
    /// completion, and error).
    pub fn subscribe_state(&self) -> watch::Receiver<EngineState> {
        self.state_sender.subscribe()
    }

    /// Subscribes to the `EngineEvent` stream.
    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_sender.subscribe()
    }

    /// Subscribes to the raw tick stream of the master clock.
    pub fn subscribe_ticks(&self) -> broadcast::Receiver<Arc<TickEvent>> {
        self.tick_sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::PrayerKey;
    use crate::schedule::DayMetadata;
    use crate::sources::testing::{sample_weather, StubSources};
    use crate::sources::SourceError;
    use chrono::NaiveDate;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn sample_schedule() -> DaySchedule {
        DaySchedule::new([300, 390, 720, 930, 1080, 1170], DayMetadata::default()).unwrap()
    }

    fn test_engine(sources: Arc<StubSources>) -> VakitEngine {
        let config = EngineConfig {
            timezone: chrono_tz::Tz::UTC,
            ..EngineConfig::default()
        };
        VakitEngine::new(config, LocationRegistry::default(), sources)
    }

    fn spawn_dispatcher(engine: &VakitEngine) -> broadcast::Sender<()> {
        let (shutdown_tx, _) = broadcast::channel(1);
        let dispatcher = engine.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move { dispatcher.dispatcher_loop(shutdown_rx).await });
        shutdown_tx
    }

    async fn next_event(rx: &mut broadcast::Receiver<EngineEvent>) -> EngineEvent {
        rx.recv().await.expect("event stream closed")
    }

    #[tokio::test]
    async fn unknown_location_is_fatal_and_makes_no_fetch() {
        let sources = Arc::new(StubSources::new(Ok(sample_schedule())));
        let engine = test_engine(sources.clone());
        let _shutdown = spawn_dispatcher(&engine);
        let mut state_rx = engine.subscribe_state();

        engine.set_location("atlantis").await.unwrap();
        state_rx.changed().await.unwrap();

        let state = engine.state();
        assert_eq!(state.status, EngineStatus::Invalid);
        assert!(matches!(
            state.fatal_error,
            Some(FatalError::UnknownLocation(_))
        ));
        assert!(state.config.is_none());
        assert_eq!(sources.primary_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn successful_load_reaches_ready_with_auxiliary_data() {
        let mut stub = StubSources::new(Ok(sample_schedule()));
        stub.weather = Ok(sample_weather());
        let sources = Arc::new(stub);
        let engine = test_engine(sources);
        let _shutdown = spawn_dispatcher(&engine);
        let mut events = engine.subscribe_events();

        engine.set_location("hannover").await.unwrap();
        loop {
            if let EngineEvent::LoadFinished { generation } = next_event(&mut events).await {
                assert_eq!(generation, 1);
                break;
            }
        }

        let state = engine.state();
        assert_eq!(state.status, EngineStatus::Ready);
        assert!(state.schedule.is_some());
        assert_eq!(state.auxiliary.weather, Some(sample_weather()));
        assert_eq!(state.fatal_error, None);
        assert!(state.phase.current.is_some());
    }

    #[tokio::test]
    async fn schedule_unavailable_is_fatal_but_keeps_auxiliary_data() {
        let mut stub = StubSources::new(Err(SourceError::Unreachable("timed out".into())));
        stub.weather = Ok(sample_weather());
        let sources = Arc::new(stub);
        let engine = test_engine(sources);
        let _shutdown = spawn_dispatcher(&engine);
        let mut events = engine.subscribe_events();

        engine.set_location("hannover").await.unwrap();
        while !matches!(
            next_event(&mut events).await,
            EngineEvent::LoadFinished { .. }
        ) {}

        let state = engine.state();
        assert_eq!(state.status, EngineStatus::Ready);
        assert!(state.schedule.is_none());
        assert!(matches!(
            state.fatal_error,
            Some(FatalError::ScheduleUnavailable(_))
        ));
        assert_eq!(state.auxiliary.weather, Some(sample_weather()));
        assert_eq!(state.phase, PhaseState::placeholder());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_result_is_discarded_after_a_location_change() {
        let stub = StubSources::new(Ok(sample_schedule()));
        // First primary fetch stalls; the second answers immediately.
        *stub.primary_delays.lock().unwrap() = vec![Duration::from_secs(5)];
        let sources = Arc::new(stub);
        let engine = test_engine(sources);
        let _shutdown = spawn_dispatcher(&engine);
        let mut events = engine.subscribe_events();

        engine.set_location("hannover").await.unwrap();
        engine.set_location("braunschweig").await.unwrap();

        let mut finished = None;
        let mut discarded = None;
        while finished.is_none() || discarded.is_none() {
            match next_event(&mut events).await {
                EngineEvent::LoadFinished { generation } => finished = Some(generation),
                EngineEvent::LoadDiscarded { generation } => discarded = Some(generation),
                _ => {}
            }
        }
        assert_eq!(finished, Some(2));
        assert_eq!(discarded, Some(1));

        let state = engine.state();
        assert_eq!(state.status, EngineStatus::Ready);
        assert_eq!(
            state.config.as_ref().unwrap().weather_city_name,
            "Braunschweig"
        );
        assert!(state.schedule.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn midnight_reloads_in_place_without_dropping_data() {
        let stub = StubSources::new(Ok(sample_schedule()));
        // The initial load answers at once; the midnight reload stalls so
        // the in-place loading state is observable.
        *stub.primary_delays.lock().unwrap() = vec![Duration::from_secs(3), Duration::ZERO];
        let sources = Arc::new(stub);
        let engine = test_engine(sources.clone());
        let _shutdown = spawn_dispatcher(&engine);
        let mut events = engine.subscribe_events();

        engine.set_location("hannover").await.unwrap();
        while !matches!(
            next_event(&mut events).await,
            EngineEvent::LoadFinished { .. }
        ) {}

        // Paused time auto-advances across the armed midnight timer.
        while !matches!(next_event(&mut events).await, EngineEvent::MidnightRollover) {}

        let state = engine.state();
        assert_eq!(state.status, EngineStatus::Loading);
        assert!(state.schedule.is_some(), "data dropped during reload");

        loop {
            if let EngineEvent::LoadFinished { generation } = next_event(&mut events).await {
                assert_eq!(generation, 2);
                break;
            }
        }
        assert_eq!(sources.primary_calls.load(Ordering::SeqCst), 2);
        assert_eq!(engine.state().status, EngineStatus::Ready);
    }

    #[tokio::test]
    async fn ticks_advance_the_phase_while_ready() {
        let sources = Arc::new(StubSources::new(Ok(sample_schedule())));
        let engine = test_engine(sources);
        let _shutdown = spawn_dispatcher(&engine);
        let mut events = engine.subscribe_events();

        engine.set_location("hannover").await.unwrap();
        while !matches!(
            next_event(&mut events).await,
            EngineEvent::LoadFinished { .. }
        ) {}

        let mut state_rx = engine.subscribe_state();
        let timestamp = NaiveDate::from_ymd_opt(2025, 10, 28)
            .unwrap()
            .and_hms_opt(7, 0, 0)
            .unwrap()
            .and_utc();
        engine
            .tick_sender
            .send(Arc::new(TickEvent {
                tick_count: 1,
                timestamp,
            }))
            .unwrap();
        state_rx.changed().await.unwrap();

        let state = engine.state();
        assert_eq!(state.phase.current, Some(PrayerKey::Sunrise));
        assert_eq!(state.phase.next, Some(PrayerKey::Dhuhr));
        assert_eq!(state.phase.countdown_display(), "05:00:00");
    }
}
