use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::Parser;
use doorsensor::{DoorsensorConfig, HistoryStore, LogCodec, TimeDeltaFormatter, TransitionRecord};
use serde::Serialize;

/// Print the current door state from the last line of the door log.
#[derive(Parser, Debug)]
#[command(name = "lastdoor")]
#[command(about = "Report the door state recorded in the door log")]
struct Args {
    /// Path to doorsensor configuration file (for log path and timezone)
    #[arg(short = 'c', long, default_value = "doorsensor.toml")]
    config: PathBuf,

    /// Read this log instead of log.path from the configuration
    #[arg(short, long)]
    log: Option<PathBuf>,

    /// Emit the record as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct LastDoor<'a> {
    #[serde(flatten)]
    record: &'a TransitionRecord,
    human_timestamp: String,
    elapsed: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = DoorsensorConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    let codec = LogCodec::new(config.timezone()?);
    let formatter = TimeDeltaFormatter::new(config.log.duration_parts);

    let path = args.log.unwrap_or_else(|| PathBuf::from(&config.log.path));
    let store = HistoryStore::new(&path);

    let line = store
        .read_last()
        .await?
        .ok_or_else(|| anyhow!("No door transitions recorded in {}", path.display()))?;
    let record = codec.decode(&line)?;

    let elapsed = (Utc::now() - record.timestamp)
        .to_std()
        .unwrap_or(Duration::ZERO);
    let report = LastDoor {
        record: &record,
        human_timestamp: codec.human_timestamp(&record.timestamp),
        elapsed: formatter.format(elapsed),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "The door is {} since {} ({})",
            record.state, report.human_timestamp, report.elapsed
        );
    }

    Ok(())
}
