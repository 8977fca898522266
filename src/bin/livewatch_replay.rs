//! livewatch replay tool
//!
//! Feeds a JSON-lines file of poll events through a file-backed controller
//! and prints every notification as a JSON line on stdout. Notifications
//! beyond `notification_capacity` per input line are dropped by the bus.
//!
//! Each input line is one of
//!
//! ```text
//! {"event":"updateLiveList","at":1700000000,"poll":{"service":"twitch","entries":[...],"channelIds":["c1"]}}
//! {"event":"saveStreamList"}
//! ```
//!
//! `at` (Unix seconds) is optional and defaults to the current time.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use livewatch::{open_store, LiveConfig, LiveController, NotificationBus, PollResult};

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
enum ReplayLine {
    UpdateLiveList {
        poll: PollResult,
        #[serde(default, with = "chrono::serde::ts_seconds_option")]
        at: Option<DateTime<Utc>>,
    },
    SaveStreamList,
}

/// Command-line arguments
struct Args {
    /// Directory holding the saved list
    state_dir: PathBuf,
    /// JSON-lines event file
    events: PathBuf,
    /// Optional JSON config file
    config: Option<PathBuf>,
}

fn usage() -> ! {
    eprintln!("usage: livewatch-replay --state-dir <dir> --events <file.jsonl> [--config <file.json>]");
    std::process::exit(2);
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut state_dir = None;
    let mut events = None;
    let mut config = None;

    let mut i = 1;
    while i < args.len() {
        let value = || args.get(i + 1).map(PathBuf::from).unwrap_or_else(|| usage());
        match args[i].as_str() {
            "--state-dir" | "-s" => state_dir = Some(value()),
            "--events" | "-e" => events = Some(value()),
            "--config" | "-c" => config = Some(value()),
            "--help" | "-h" => usage(),
            other => {
                eprintln!("error: unknown argument: {other}");
                usage();
            }
        }
        i += 2;
    }

    match (state_dir, events) {
        (Some(state_dir), Some(events)) => Args {
            state_dir,
            events,
            config,
        },
        _ => usage(),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<LiveConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(LiveConfig::from_json_str(&std::fs::read_to_string(path)?)?),
        None => Ok(LiveConfig::default()),
    }
}

fn replay(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(args.config.as_ref())?;
    let store = Arc::new(open_store(&args.state_dir, None)?);
    info!(state_dir = %args.state_dir.display(), "store opened");

    let bus = Arc::new(NotificationBus::from_config(&config));
    let notifications = bus.subscribe();
    let controller = LiveController::open(store, bus, config)?;
    let mut out = io::stdout().lock();

    let reader = BufReader::new(File::open(&args.events)?);
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<ReplayLine>(&line)? {
            ReplayLine::UpdateLiveList { poll, at } => {
                if let Err(err) = controller.update_at(poll, at.unwrap_or_else(Utc::now)) {
                    error!(line = number + 1, error = %err, "poll rejected");
                }
            }
            ReplayLine::SaveStreamList => controller.request_save(),
        }

        for notification in notifications.drain() {
            writeln!(out, "{}", serde_json::to_string(&notification)?)?;
        }
    }
    out.flush()?;

    controller.flush()?;
    let (writes, failures) = controller.save_stats();
    info!(entries = controller.snapshot()?.len(), writes, failures, "replay finished");
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = parse_args();
    match replay(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "replay failed");
            ExitCode::FAILURE
        }
    }
}
