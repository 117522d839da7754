//! Flick panel demo - replays a gesture script against the panel controller
//!
//! Runs the controller on a simulated shell with a 16ms frame clock and prints the
//! final panel state as JSON.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use calloop::{
    timer::{TimeoutAction, Timer},
    EventLoop,
};
use clap::Parser;
use tracing::{info, warn};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use flick_panel::demo::{self, DemoState, SimulatedHost};
use flick_panel::{NoFalsing, PanelConfig, PanelController};

/// Hard stop for scripts that never settle
const MAX_FRAMES: u64 = 10_000;

#[derive(Parser, Debug)]
#[command(name = "flick-panel")]
#[command(about = "Drag/fling/peek controller for the Flick quick settings panel", long_about = None)]
struct Args {
    /// Panel config (defaults to ~/.config/flick/panel.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Built-in scenario: open, close, peek, hint, cancel
    #[arg(short, long, default_value = "open")]
    scenario: String,

    /// JSON gesture script, overrides --scenario
    #[arg(long)]
    script: Option<PathBuf>,

    /// Fully expanded panel height in pixels
    #[arg(long, default_value_t = 1600.0)]
    max_height: f32,

    /// Print every panel event, not only the final state
    #[arg(long)]
    events: bool,

    /// Enable verbose debug output
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    // Set up panic hook to log panics before crashing
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC: {}", panic_info);
        if let Ok(home) = std::env::var("HOME") {
            let crash_log = format!("{}/.local/state/flick/crash.log", home);
            if let Ok(mut f) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&crash_log)
            {
                use std::io::Write;
                let _ = writeln!(f, "[{}] PANIC (panel): {}", chrono::Local::now(), panic_info);
            }
        }
    }));

    // Set up log directory (~/.local/state/flick or /tmp/flick)
    let log_dir = std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".local/state")))
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
        .join("flick");

    std::fs::create_dir_all(&log_dir).ok();

    let args = Args::parse();

    let file_appender = rolling::daily(&log_dir, "panel.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Quiet by default, verbose with --debug
    let default_filter = if args.debug {
        "debug,flick_panel=debug"
    } else {
        "warn,flick_panel=info"
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    info!(log_path = %log_dir.display(), "Flick panel demo starting");

    let config = PanelConfig::load_or_default(args.config.as_deref());

    let script = match &args.script {
        Some(path) => demo::load_script(path)?,
        None => demo::builtin_script(&args.scenario, args.max_height).ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown scenario '{}', expected one of: {}",
                args.scenario,
                demo::SCENARIOS.join(", ")
            )
        })?,
    };

    let host = SimulatedHost::new(args.max_height);
    let controller = PanelController::new(host, NoFalsing, config);
    let mut state = DemoState::new(controller, script);

    let mut event_loop: EventLoop<DemoState> = EventLoop::try_new()?;
    event_loop
        .handle()
        .insert_source(Timer::immediate(), |_, _, state| {
            state.tick();
            TimeoutAction::ToDuration(Duration::from_millis(demo::FRAME_MS))
        })
        .map_err(|e| anyhow::anyhow!("Failed to insert frame timer: {:?}", e))?;

    while !state.is_finished() {
        if state.frames() >= MAX_FRAMES {
            warn!("Script did not settle after {} frames, stopping", MAX_FRAMES);
            break;
        }
        event_loop
            .dispatch(Some(Duration::from_millis(1)), &mut state)
            .map_err(|e| anyhow::anyhow!("Event loop error: {:?}", e))?;
    }

    let snapshot = state.controller.dump();
    info!("Finished after {} frames ({} ms): {}", state.frames(), state.now_ms(), snapshot);

    if args.events {
        for (at_ms, event) in &state.event_log {
            println!("{}", serde_json::json!({ "at_ms": at_ms, "event": event }));
        }
    }
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    Ok(())
}
