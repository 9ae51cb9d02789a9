use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use dayplan_engine::temporal::{parse_date, parse_rfc3339, parse_timezone};
use dayplan_engine::{
    summarize_day, tomorrow, SearchOptions, Snapshot, SnapshotSource, UnknownBusyPolicy,
};

mod render;

#[derive(Parser)]
#[command(
    name = "dayplan",
    version,
    about = "Summarize a day across calendars, flag conflicts, and propose free slots"
)]
struct Cli {
    /// Calendar snapshot (JSON). Use "-" or omit to read stdin.
    snapshot: Option<PathBuf>,

    /// IANA timezone the day is summarized in
    #[arg(long, default_value = "America/Chicago")]
    timezone: String,

    /// Day to summarize (YYYY-MM-DD). Defaults to tomorrow.
    #[arg(long)]
    date: Option<String>,

    /// Present instant (RFC 3339). Defaults to the system clock.
    #[arg(long)]
    now: Option<String>,

    /// Number of calendar days searched for a replacement slot
    #[arg(long, default_value_t = 14)]
    horizon_days: u32,

    /// Treat calendars whose free/busy lookup failed as free
    #[arg(long)]
    assume_free_on_error: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let tz = parse_timezone(&cli.timezone)?;
    let now = match &cli.now {
        Some(s) => parse_rfc3339(s)?,
        None => Utc::now(),
    };
    let date = match &cli.date {
        Some(s) => parse_date(s)?,
        None => tomorrow(now, tz)?,
    };
    let options = SearchOptions {
        horizon_days: cli.horizon_days,
        unknown_busy: if cli.assume_free_on_error {
            UnknownBusyPolicy::AssumeFree
        } else {
            UnknownBusyPolicy::Exclude
        },
        ..Default::default()
    };

    let json = read_input(cli.snapshot.as_ref())?;
    let snapshot = Snapshot::from_json(&json).context("failed to load calendar snapshot")?;
    let credentials = snapshot.credentials();
    if credentials.is_empty() {
        tracing::warn!("snapshot lists no calendars");
    }
    let source = SnapshotSource::new(snapshot);

    let report = summarize_day(&source, &credentials, tz, date, now, options)
        .context("failed to summarize day")?;

    match cli.format {
        Format::Text => print!("{}", render::render_text(&report, cli.horizon_days)),
        Format::Json => {
            let out =
                serde_json::to_string_pretty(&report).context("failed to serialize report")?;
            println!("{out}");
        }
    }

    Ok(())
}

fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(p) if p.as_os_str() != "-" => {
            fs::read_to_string(p).with_context(|| format!("failed to read {}", p.display()))
        }
        _ => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}
