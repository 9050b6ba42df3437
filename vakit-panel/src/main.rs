use anyhow::Result;
use colored::Colorize;
use rustyline::highlight::Highlighter;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use vakit::prelude::*;
use vakit::{ENGINE_NAME, VERSION as LIB_VERSION};

const PANEL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A custom helper struct for rustyline that enables syntax highlighting.
#[derive(Completer, Helper, Hinter, Validator)]
struct CommandHighlighter;

impl Highlighter for CommandHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            let colored_command = command.green().bold();
            let colored_rest = rest.green();
            Cow::Owned(format!("{} {}", colored_command, colored_rest))
        } else {
            Cow::Owned(line.green().bold().to_string())
        }
    }
    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn print_banner() {
    if std::env::var("QUIET_MODE").is_ok() {
        return;
    }
    let version_string = format!(
        "          Panel   v{:<8} Engine    v{:<8}",
        PANEL_VERSION, LIB_VERSION
    );
    println!("{}", ENGINE_NAME.cyan().bold());
    println!("{}", "-----------------------------------------------------------".dimmed());
    println!("{}", version_string);
    println!("{}", "-----------------------------------------------------------".dimmed());
}

/// Spawns a task that prints a countdown line per tick while enabled.
fn spawn_tick_printer(engine: &VakitEngine, is_printing: Arc<AtomicBool>) {
    let mut tick_rx = engine.subscribe_ticks();
    let handle = engine.clone();
    tokio::spawn(async move {
        while let Ok(tick) = tick_rx.recv().await {
            if is_printing.load(Ordering::Relaxed) {
                let state = handle.state();
                let current = state
                    .phase
                    .current
                    .map(|k| k.label())
                    .unwrap_or("--");
                println!(
                    "<-- [TICK #{}] {} | {} remaining | {:.1}%",
                    tick.tick_count,
                    current.bold(),
                    state.phase.countdown_display(),
                    state.phase.progress_percent
                );
            }
        }
    });
}

fn print_state(state: &EngineState) {
    let status = format!("{:?}", state.status);
    match state.status {
        EngineStatus::Ready => println!("Status: {}", status.green()),
        EngineStatus::Invalid => println!("Status: {}", status.red()),
        _ => println!("Status: {}", status.yellow()),
    }
    if let Some(fatal) = &state.fatal_error {
        println!("Fatal:  {}", fatal.to_string().red());
    }
    if let Some(config) = &state.config {
        println!("Site:   {}", config.mosque_name);
    }
    if let Some(schedule) = &state.schedule {
        for entry in schedule.entries() {
            println!(
                "  {:<8} {:02}:{:02}",
                entry.key.label(),
                entry.start_minute / 60,
                entry.start_minute % 60
            );
        }
        if let Some(date) = &schedule.metadata.hijri_date_long {
            println!("Hijri:  {date}");
        }
        if let Some(date) = &schedule.metadata.gregorian_date_short {
            println!("Date:   {date}");
        }
    }
    let current = state.phase.current.map(|k| k.label()).unwrap_or("--");
    let next = state.phase.next.map(|k| k.label()).unwrap_or("midnight");
    println!(
        "Phase:  {} -> {} | {} remaining | {:.1}%",
        current.bold(),
        next,
        state.phase.countdown_display(),
        state.phase.progress_percent
    );
    match &state.auxiliary.weather {
        Some(weather) => println!(
            "Wetter: {} {:.1}°C, {}% | {}",
            weather.city_name, weather.temperature, weather.humidity, weather.description
        ),
        None => println!("Wetter: {}", "unavailable".dimmed()),
    }
    match &state.auxiliary.daily_content {
        Some(items) => {
            for item in items {
                println!("  [{}] {}", item.title, item.source.dimmed());
            }
        }
        None => println!("Inhalt: {}", "unavailable".dimmed()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_target(false)
        .init();

    let config = VakitConfig::load(Some("vakit"))?;
    let sources = Arc::new(HttpSources::new(&config.engine)?);
    let engine = VakitEngine::new(config.engine, config.locations, sources);
    let engine_handle = engine.clone();

    // Create the shared flag for the tick printer.
    let is_printing_ticks = Arc::new(AtomicBool::new(false));
    spawn_tick_printer(&engine_handle, is_printing_ticks.clone());

    tokio::spawn(async move {
        if let Err(e) = engine.run().await {
            eprintln!("\nEngine stopped with an error: {}", e);
        }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut rl = Editor::new()?;
    rl.set_helper(Some(CommandHighlighter {}));

    println!(
        "{} is running. Type 'help' for commands or 'exit' to quit.",
        ENGINE_NAME.cyan()
    );

    loop {
        let prompt = format!("{}", ">> ".cyan().bold());
        let readline = rl.readline(&prompt);
        match readline {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let args = line.trim().split_whitespace().collect::<Vec<_>>();

                if let Some(command) = args.first() {
                    match *command {
                        "city" => {
                            if let Some(identifier) = args.get(1) {
                                engine_handle.set_location(*identifier).await?;
                                println!("--> Switching to '{}'.", identifier);
                            } else {
                                println!("Usage: city <IDENTIFIER>");
                            }
                        }
                        "state" => print_state(&engine_handle.state()),
                        "start" => {
                            if let Some(&"ticks") = args.get(1) {
                                is_printing_ticks.store(true, Ordering::Relaxed);
                                println!("--> Started printing the tick stream.");
                            } else {
                                println!("Unknown 'start' command. Try 'start ticks'.");
                            }
                        }
                        "stop" => {
                            if let Some(&"ticks") = args.get(1) {
                                is_printing_ticks.store(false, Ordering::Relaxed);
                                println!("--> Stopped printing the tick stream.");
                            } else {
                                println!("Unknown 'stop' command. Try 'stop ticks'.");
                            }
                        }
                        "help" => {
                            println!("Available commands:");
                            println!("  city <ID>     - Switches the panel to a location.");
                            println!("  state         - Prints the full engine state.");
                            println!("  start ticks   - Begins printing the live countdown.");
                            println!("  stop ticks    - Stops printing the live countdown.");
                            println!("  exit          - Quits the panel.");
                        }
                        "exit" => break,
                        "" => {}
                        _ => println!("Unknown command: '{}'. Type 'help'.", line),
                    }
                }
            }
            Err(_) => {
                println!("Exiting vakit panel...");
                break;
            }
        }
    }

    Ok(())
}
