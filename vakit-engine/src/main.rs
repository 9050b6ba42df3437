use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use vakit::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    // 2. Load the configuration, merging an optional `vakit.toml`.
    let config = VakitConfig::load(Some("vakit"))?;
    let location = std::env::args().nth(1).unwrap_or_else(|| "hannover".to_string());

    // 3. Create the engine over the HTTP sources.
    let sources = Arc::new(HttpSources::new(&config.engine)?);
    let engine = VakitEngine::new(config.engine, config.locations, sources);

    // 4. Spawn concurrent tasks to observe the engine.
    spawn_observers(&engine);

    // 5. Select the location and run the engine.
    engine.set_location(&location).await?;
    engine.run().await?;

    Ok(())
}

/// Spawns tasks that log the engine's event stream and state transitions.
fn spawn_observers(engine: &VakitEngine) {
    let mut event_rx = engine.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            info!("[EVENT] => {:?}", event);
        }
    });

    let mut state_rx = engine.subscribe_state();
    tokio::spawn(async move {
        let mut last_status = None;
        while state_rx.changed().await.is_ok() {
            let state = state_rx.borrow().clone();
            if last_status != Some(state.status) {
                last_status = Some(state.status);
                info!("[STATE] => {:?}", state.status);
                if let Some(fatal) = &state.fatal_error {
                    warn!("[STATE] => fatal: {fatal}");
                }
            }
        }
    });
}
