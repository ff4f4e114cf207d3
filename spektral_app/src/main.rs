//! Spektral - Text Control Surface
//!
//! Starts the equalizer engine and reads one command per line from stdin.

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use spektral_core::{EngineConfig, EqualizerEngine, Event};
use spektral_dsp::{MAX_GAIN, MIN_GAIN};
use tracing::{debug, error, info, warn};

const HELP: &str = "commands: set <band> <gain> | flat | bands | bypass on|off | state | quit";

/// One line of user input
#[derive(Debug, Clone, PartialEq)]
enum ControlCommand {
    SetGain { band: usize, gain: f32 },
    Flat,
    Bands,
    Bypass(bool),
    State,
    Quit,
}

fn parse_command(line: &str) -> Result<ControlCommand> {
    let mut words = line.split_whitespace();
    let command = match (words.next(), words.next(), words.next()) {
        (Some("set"), Some(band), Some(gain)) => ControlCommand::SetGain {
            band: band.parse().with_context(|| format!("bad band index '{}'", band))?,
            gain: gain.parse().with_context(|| format!("bad gain '{}'", gain))?,
        },
        (Some("flat"), None, None) => ControlCommand::Flat,
        (Some("bands"), None, None) => ControlCommand::Bands,
        (Some("bypass"), Some("on"), None) => ControlCommand::Bypass(true),
        (Some("bypass"), Some("off"), None) => ControlCommand::Bypass(false),
        (Some("state"), None, None) => ControlCommand::State,
        (Some("quit" | "exit"), None, None) => ControlCommand::Quit,
        _ => bail!("unknown command '{}'", line.trim()),
    };

    if words.next().is_some() {
        bail!("too many arguments in '{}'", line.trim());
    }
    Ok(command)
}

/// Apply a command; returns false when the user asked to quit
fn execute(engine: &EqualizerEngine, command: ControlCommand) -> Result<bool> {
    match command {
        ControlCommand::SetGain { band, gain } => {
            let stored = engine.set_band_gain(band, gain)?;
            if stored != gain {
                warn!(
                    "Gain {} outside [{}, {}], stored {}",
                    gain, MIN_GAIN, MAX_GAIN, stored
                );
            }
            println!("band {} = {:.3}", band, stored);
        }
        ControlCommand::Flat => {
            engine.reset_gains();
            println!("all bands = 1.000");
        }
        ControlCommand::Bands => {
            let gains = engine.gains();
            for (band, gain) in engine.bands().iter().zip(gains) {
                println!(
                    "{:>3}  {:<10} bins {:>5}..{:<5} {:>8.1}-{:<8.1} Hz  gain {:.3}",
                    band.index, band.label, band.lo, band.hi, band.low_hz, band.high_hz, gain
                );
            }
        }
        ControlCommand::Bypass(on) => engine.set_bypass(on)?,
        ControlCommand::State => engine.request_state()?,
        ControlCommand::Quit => return Ok(false),
    }
    Ok(true)
}

fn log_event(event: Event) {
    match event {
        Event::Started => info!("Audio started"),
        Event::Stopped => info!("Audio stopped"),
        Event::Error { message } => error!("Engine error: {}", message),
        Event::LevelUpdate { peak } => debug!("Output peak {:.3}", peak),
        Event::StateUpdate {
            is_running,
            is_bypassed,
            gains,
        } => info!(
            "State: running={} bypassed={} gains={:?}",
            is_running, is_bypassed, gains
        ),
        Event::BufferUnderrun => warn!("Buffer underrun"),
        Event::BufferOverrun => warn!("Buffer overrun"),
    }
}

fn load_config() -> Result<EngineConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading configuration from {}", path);
            EngineConfig::load(&path).with_context(|| format!("failed to load {}", path))
        }
        None => Ok(EngineConfig::default()),
    }
}

fn main() -> Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spektral=debug".into()),
        )
        .init();

    info!("Starting Spektral");

    let config = load_config()?;
    let engine = Arc::new(EqualizerEngine::with_config(config).context("engine startup failed")?);
    engine.start()?;

    // Events are logged from their own thread so stdin can block
    let done = Arc::new(AtomicBool::new(false));
    let event_thread = {
        let engine = Arc::clone(&engine);
        let done = Arc::clone(&done);
        thread::Builder::new()
            .name("spektral-events".into())
            .spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    if let Some(event) = engine.wait_event_timeout(Duration::from_millis(100)) {
                        log_event(event);
                    }
                }
            })?
    };

    println!("{}", HELP);
    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let keep_going = match parse_command(&line) {
            Ok(command) => execute(&engine, command).unwrap_or_else(|e| {
                eprintln!("error: {}", e);
                true
            }),
            Err(e) => {
                eprintln!("error: {}\n{}", e, HELP);
                true
            }
        };
        if !keep_going {
            break;
        }
    }

    engine.stop()?;
    done.store(true, Ordering::Relaxed);
    let _ = event_thread.join();

    info!("Spektral stopped");
    Ok(())
}
