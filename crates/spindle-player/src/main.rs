//! Spindle Player - variable-speed streaming turntable
//!
//! Streams one track from disk through the ring-buffer engine to the audio
//! device and drives it from a line-based console on stdin.
//!
//! ## Usage
//!
//! ```text
//! spindle-player <track> [--config <path>]
//! spindle-player --list-devices
//! ```
//!
//! Set `RUST_LOG=debug` for reader and seek diagnostics.

mod config;
mod console;

use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use crossbeam::channel::{self, Receiver, RecvTimeoutError};

use spindle_core::audio::{get_output_devices, start_audio_output};
use spindle_core::player::Player;
use spindle_core::transport::{TransportCommand, TransportEvent};

use console::{parse_line, ConsoleCommand, HELP};

const USAGE: &str = "usage: spindle-player <track> [--config <path>] | --list-devices";

/// How often events are drained while waiting for input
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Default, PartialEq)]
struct Args {
    track: Option<PathBuf>,
    config: Option<PathBuf>,
    list_devices: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().context("--config needs a path")?;
                parsed.config = Some(PathBuf::from(path));
            }
            "--list-devices" => parsed.list_devices = true,
            "--help" | "-h" => bail!(USAGE),
            flag if flag.starts_with('-') => bail!("unknown flag {}\n{}", flag, USAGE),
            _ if parsed.track.is_none() => parsed.track = Some(PathBuf::from(arg)),
            _ => bail!("only one track can be given\n{}", USAGE),
        }
    }
    Ok(parsed)
}

fn main() -> Result<()> {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args(std::env::args().skip(1))?;

    if args.list_devices {
        for device in get_output_devices()? {
            println!("{}", device);
        }
        return Ok(());
    }

    let Some(track) = args.track else {
        bail!(USAGE);
    };

    log::info!("spindle-player starting up");
    let config = config::load(args.config.as_deref())?;

    let (mut player, engine) = Player::new(config.stream.clone())?;
    let audio = start_audio_output(&config.audio, engine)?;
    log::info!(
        "Output: {} @ {}Hz, {} frames (~{:.1}ms)",
        audio.device_name(),
        audio.sample_rate(),
        audio.buffer_size(),
        audio.latency_ms()
    );

    player.load_track(&track)?;
    player.apply(TransportCommand::Play)?;

    println!("{}", HELP);
    let lines = spawn_console_reader()?;
    run_console(&mut player, &lines);

    player.shutdown()?;
    drop(audio);
    log::info!("spindle-player stopped");
    Ok(())
}

/// Read stdin lines on a separate thread so events keep flowing while idle
fn spawn_console_reader() -> Result<Receiver<String>> {
    let (tx, rx) = channel::unbounded();
    std::thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("Failed to spawn console thread")?;
    Ok(rx)
}

fn run_console(player: &mut Player, lines: &Receiver<String>) {
    loop {
        match lines.recv_timeout(POLL_INTERVAL) {
            Ok(line) => match parse_line(&line) {
                Ok(Some(command)) => {
                    if !handle_command(player, command) {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => println!("{} ({})", e, HELP),
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        for event in player.poll_events() {
            report_event(&event);
        }
    }
}

/// Returns `false` when the console should exit
fn handle_command(player: &mut Player, command: ConsoleCommand) -> bool {
    match command {
        ConsoleCommand::Transport(command) => {
            if let Err(e) = player.apply(command) {
                println!("load failed: {}", e);
            }
        }
        ConsoleCommand::ToggleHold => {
            let command = if player.is_seek_held() {
                TransportCommand::EndSeekHold
            } else {
                TransportCommand::BeginSeekHold
            };
            // Only loads can fail
            let _ = player.apply(command);
        }
        ConsoleCommand::Status => print_status(player),
        ConsoleCommand::Help => println!("{}", HELP),
        ConsoleCommand::Quit => return false,
    }
    true
}

fn print_status(player: &Player) {
    let atomics = player.atomics();
    println!(
        "{} | {:?} | rate {:.3} | frame {:.0}/{} ({}%){}",
        player
            .track()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "no track".to_string()),
        atomics.play_state(),
        atomics.rate(),
        atomics.position(),
        atomics.track_length(),
        atomics.percent(),
        if player.is_seek_held() { " | held" } else { "" }
    );
}

fn report_event(event: &TransportEvent) {
    match event {
        TransportEvent::Position { percent } if percent % 10 == 0 => println!("position {}%", percent),
        TransportEvent::Position { .. } => {}
        TransportEvent::ReadBacklog { blocks } => println!("reader behind by {} blocks", blocks),
        TransportEvent::ShortRead { .. } => println!("end of track buffered"),
        TransportEvent::TrackLoaded { path, frames } => println!("loaded {} ({} frames)", path.display(), frames),
        TransportEvent::TrackLoadFailed { path, reason } => println!("could not load {}: {}", path.display(), reason),
        TransportEvent::SeekCompleted { .. } => {}
        TransportEvent::SeekFailed { target, reason } => println!("seek to frame {:.0} failed: {}", target, reason),
    }
}
