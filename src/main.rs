//! audiodeck - Record a take, play it back, watch the levels

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use audiodeck::audio::{list_input_devices, list_output_devices, DeviceInfo};
use audiodeck::config::{default_config_path, load_config};
use audiodeck::deck::{channel_observer, DeckPhase};
use audiodeck::{AudioDeck, CpalDevice, DeckConfig, DeckEvent};

/// How long to wait for the device to flush a stopped recording
const FINALIZE_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on a single inbox wait, so events are printed promptly
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[command(name = "audiodeck")]
#[command(about = "Single-slot audio recorder and player with live metering")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print deck events as JSON lines
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, env = "AUDIODECK_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available audio devices
    Devices,

    /// Record a take into the scratch directory
    Record {
        /// Seconds to record
        #[arg(short, long, default_value = "5")]
        seconds: f64,

        /// Play the take back once it is saved
        #[arg(long)]
        play: bool,
    },

    /// Play an audio file to the end
    Play {
        /// File to play
        path: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose)?;

    let config = resolve_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Devices => list_devices(),
        Commands::Record { seconds, play } => run_record(&config, seconds, play, cli.json)?,
        Commands::Play { path } => run_play(&config, &path, cli.json)?,
        Commands::Config => {
            let text = toml::to_string_pretty(&config).context("Failed to render config")?;
            print!("{}", text);
        }
    }

    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    // Logs go to stderr so event output on stdout stays machine readable
    let filter = EnvFilter::from_default_env().add_directive(LevelFilter::from_level(level).into());
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

fn resolve_config(path: Option<&Path>) -> Result<DeckConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) => path,
            None => {
                warn!("No config directory available, using defaults");
                return Ok(DeckConfig::default());
            }
        },
    };

    load_config(&path).with_context(|| format!("Failed to load {}", path.display()))
}

fn list_devices() {
    print_devices("Input devices:", list_input_devices());
    println!();
    print_devices("Output devices:", list_output_devices());
}

fn print_devices<E: std::fmt::Display>(title: &str, devices: Result<Vec<DeviceInfo>, E>) {
    println!("{}", title);
    match devices {
        Ok(devices) => {
            for device in devices {
                let default_marker = if device.is_default { " (default)" } else { "" };
                println!("  - {}{}", device.name, default_marker);
            }
        }
        Err(e) => {
            println!("  Error: {}", e);
        }
    }
}

fn open_deck(config: &DeckConfig) -> (AudioDeck<CpalDevice>, Receiver<DeckEvent>) {
    let device = CpalDevice::new(config.input_device.clone(), config.output_device.clone());
    let mut deck = AudioDeck::new(device, config);

    let (tx, rx) = mpsc::channel();
    deck.set_observer(channel_observer(tx));
    (deck, rx)
}

fn run_record(config: &DeckConfig, seconds: f64, play: bool, json: bool) -> Result<()> {
    if !seconds.is_finite() || seconds <= 0.0 {
        bail!("--seconds must be positive, got {}", seconds);
    }

    let (mut deck, events) = open_deck(config);
    let started = deck.start_recording().context("Failed to start recording")?;
    info!("Recording {:.1}s to {}", seconds, started.path.display());

    let deadline = Instant::now() + Duration::from_secs_f64(seconds);
    drive(&mut deck, &events, json, deadline, |_, _| false);

    deck.stop_recording();
    let mut outcome = Finalize::Pending;
    drive(
        &mut deck,
        &events,
        json,
        Instant::now() + FINALIZE_TIMEOUT,
        |phase, event| {
            outcome = finalize_step(phase, event);
            outcome != Finalize::Pending
        },
    );

    let (path, duration) = match outcome {
        Finalize::Saved { path, duration } => (path, duration),
        Finalize::Abandoned => bail!("Recording was not saved"),
        Finalize::Pending => bail!("Timed out waiting for the recording to finish"),
    };

    if !json {
        println!("Saved {} ({:.2}s)", path.display(), duration);
    }

    if play {
        play_to_end(&mut deck, &events, json, duration)?;
    }
    Ok(())
}

fn run_play(config: &DeckConfig, path: &Path, json: bool) -> Result<()> {
    let (mut deck, events) = open_deck(config);
    deck.open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let duration = deck.file_duration().unwrap_or_default();
    play_to_end(&mut deck, &events, json, duration)
}

fn play_to_end(
    deck: &mut AudioDeck<CpalDevice>,
    events: &Receiver<DeckEvent>,
    json: bool,
    duration: f64,
) -> Result<()> {
    deck.play();
    if !deck.is_playing() {
        bail!("Nothing loaded to play");
    }

    // Generous margin over the file length for device start-up latency
    let deadline = Instant::now() + Duration::from_secs_f64(duration + 5.0);
    let mut finished = false;
    drive(deck, events, json, deadline, |_, event| {
        finished = matches!(event, Some(DeckEvent::FinishedPlaying));
        finished
    });

    if !finished {
        deck.pause();
        bail!("Playback did not finish in time");
    }
    Ok(())
}

/// Where a stopped recording stands
#[derive(Debug, Clone, PartialEq)]
enum Finalize {
    /// Still waiting for the device to flush the file
    Pending,
    Saved { path: PathBuf, duration: f64 },
    /// The deck left finalizing without loading the take
    Abandoned,
}

/// Advance a stopped recording on one event, or on `None` once the queued
/// events are drained. Error events alone never end the wait: the device may
/// still report the take as saved.
fn finalize_step(phase: DeckPhase, event: Option<&DeckEvent>) -> Finalize {
    match event {
        Some(DeckEvent::Recorded { path, duration }) => Finalize::Saved {
            path: path.clone(),
            duration: *duration,
        },
        Some(_) => Finalize::Pending,
        None if phase == DeckPhase::Finalizing => Finalize::Pending,
        None => Finalize::Abandoned,
    }
}

/// Pump the deck and print its events until `deadline` or until `done`
/// accepts. `done` sees each event, then `None` once the queue is drained.
fn drive(
    deck: &mut AudioDeck<CpalDevice>,
    events: &Receiver<DeckEvent>,
    json: bool,
    deadline: Instant,
    mut done: impl FnMut(DeckPhase, Option<&DeckEvent>) -> bool,
) {
    loop {
        while let Ok(event) = events.try_recv() {
            print_event(&event, json);
            if done(deck.phase(), Some(&event)) {
                return;
            }
        }
        if done(deck.phase(), None) {
            return;
        }

        let now = Instant::now();
        if now >= deadline {
            return;
        }
        deck.wait((deadline - now).min(POLL_INTERVAL));
    }
}

fn print_event(event: &DeckEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to encode event: {}", e),
        }
        return;
    }

    match event {
        DeckEvent::Amplitude { decibels } => {
            println!("{:>8.1} dB  {}", decibels, meter_bar(*decibels))
        }
        DeckEvent::PlaybackLocation { time } => println!("{:>8.2} s", time),
        DeckEvent::Recorded { path, duration } => {
            println!("recorded {} ({:.2}s)", path.display(), duration)
        }
        DeckEvent::FinishedPlaying => println!("finished"),
        DeckEvent::Error { fault } => println!("error: {}", fault),
    }
}

/// Text meter over the -60..0 dBFS range
fn meter_bar(decibels: f32) -> String {
    const WIDTH: f32 = 40.0;
    let filled = (((decibels + 60.0) / 60.0).clamp(0.0, 1.0) * WIDTH) as usize;
    "#".repeat(filled)
}
