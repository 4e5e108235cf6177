//! tape - record keyboard/mouse input and play it back
//!
//! Results are printed to stdout as a JSON envelope; logs go to stderr.
//!
//! Supported: Windows (record, playback), any platform (show, dry-run playback)

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use inputtape_core::prelude::*;
use inputtape_recorder::prelude::*;

#[derive(Parser)]
#[command(name = "tape")]
#[command(about = "Record keyboard and mouse input to an event log and replay it")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record input until the end key is pressed
    Record {
        /// End key (CTRL, SHIFT, ALT match either side)
        #[arg(long)]
        endkey: Option<String>,
        #[arg(short, long, default_value = "log.txt")]
        file: PathBuf,
        /// JSON recorder config; flags override it
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        key_mode: Option<KeyMode>,
        #[arg(long)]
        mouse_mode: Option<MouseMode>,
        #[arg(long)]
        sys_keys: Option<SysKeyMode>,
        /// Attach the foreground window title to each record
        #[arg(long)]
        window_title: bool,
        /// Attach a wall-clock timestamp to each record
        #[arg(long)]
        timestamps: bool,
    },
    /// Replay a recorded log
    Playback {
        #[arg(short, long, default_value = "1")]
        repeat: u32,
        #[arg(long, default_value = "CTRL")]
        endkey: String,
        #[arg(short, long, default_value = "log.txt")]
        file: PathBuf,
        /// Log the requests instead of injecting them
        #[arg(long)]
        dry_run: bool,
    },
    /// Summarize a recorded log
    Show {
        #[arg(short, long, default_value = "log.txt")]
        file: PathBuf,
        /// Include every record
        #[arg(long)]
        all: bool,
    },
}

#[derive(Serialize)]
struct Output<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Error>,
}

impl<T: Serialize> Output<T> {
    fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }
    fn err(e: Error) -> Output<()> {
        Output { success: false, data: None, error: Some(e) }
    }
}

fn print_json<T: Serialize>(output: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(output)?);
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let token = CancelToken::new();
    let on_interrupt = token.clone();
    if let Err(e) = ctrlc::set_handler(move || on_interrupt.cancel()) {
        error!("failed to install Ctrl-C handler: {}", e);
    }

    let result = match cli.command {
        Commands::Record {
            endkey,
            file,
            config,
            key_mode,
            mouse_mode,
            sys_keys,
            window_title,
            timestamps,
        } => {
            let overrides = RecordFlags { endkey, key_mode, mouse_mode, sys_keys, window_title, timestamps };
            load_config(config.as_deref())
                .map(|base| overrides.apply(base))
                .and_then(|config| cmd_record(&file, config, &token))
        }
        Commands::Playback { repeat, endkey, file, dry_run } => {
            let config = PlayerConfig { repeat, end_key: endkey, ..Default::default() };
            cmd_playback(&file, &config, dry_run, token)
        }
        Commands::Show { file, all } => cmd_show(&file, all),
    };

    if let Err(e) = result {
        if let Some(err) = e.downcast_ref::<Error>() {
            let _ = print_json(&Output::<()>::err(err.clone()));
        }
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Command-line settings that take precedence over the config file
struct RecordFlags {
    endkey: Option<String>,
    key_mode: Option<KeyMode>,
    mouse_mode: Option<MouseMode>,
    sys_keys: Option<SysKeyMode>,
    window_title: bool,
    timestamps: bool,
}

impl RecordFlags {
    fn apply(self, mut config: RecorderConfig) -> RecorderConfig {
        if let Some(k) = self.endkey {
            config.end_key = k;
        }
        if let Some(m) = self.key_mode {
            config.key_mode = m;
        }
        if let Some(m) = self.mouse_mode {
            config.mouse_mode = m;
        }
        if let Some(m) = self.sys_keys {
            config.sys_keys = m;
        }
        config.window_title |= self.window_title;
        config.timestamps |= self.timestamps;
        config
    }
}

fn load_config(path: Option<&Path>) -> Result<RecorderConfig> {
    let Some(path) = path else {
        return Ok(RecorderConfig::default());
    };
    let text = std::fs::read_to_string(path).map_err(|e| {
        Error::new(ErrorCode::Config, format!("cannot read {}: {}", path.display(), e))
    })?;
    let config = serde_json::from_str(&text).map_err(|e| {
        Error::new(ErrorCode::Config, format!("invalid config {}: {}", path.display(), e))
    })?;
    Ok(config)
}

fn cmd_record(file: &Path, config: RecorderConfig, token: &CancelToken) -> Result<()> {
    // fail fast on a bad end key before any hook is installed
    let end_key = EndKey::parse(&config.end_key)?;
    info!("Recording to {} (press {} to stop)", file.display(), end_key);
    let stats = record(file, config, token)?;
    print_json(&Output::ok(serde_json::json!({
        "file": file,
        "stats": stats,
    })))
}

fn cmd_playback(file: &Path, config: &PlayerConfig, dry_run: bool, token: CancelToken) -> Result<()> {
    let end_key = EndKey::parse(&config.end_key)?;
    let interval = Duration::from_millis(config.poll_interval_ms);

    // the poller is optional for dry runs so they work off Windows
    let poller = match SystemKeyState::new() {
        Ok(keys) => Some(KeyPoller::spawn(keys, end_key.clone(), token.clone(), interval)),
        Err(e) if dry_run => {
            info!("end key polling unavailable: {}", e);
            None
        }
        Err(e) => return Err(e.into()),
    };

    let injector: Box<dyn Injector> = if dry_run {
        Box::new(DryRunInjector::default())
    } else {
        Box::new(SystemInjector::new()?)
    };

    info!("Playing {} x{} (hold {} to stop)", file.display(), config.repeat, end_key);
    let mut player = Player::new(injector).with_cancel(token);
    let stats = player
        .play(file, config.repeat)
        .with_context(|| format!("playback of {} failed", file.display()))?;
    if let Some(p) = poller {
        p.stop();
    }

    print_json(&Output::ok(serde_json::json!({
        "file": file,
        "dry_run": dry_run,
        "stats": stats,
    })))
}

#[derive(Debug, Serialize)]
struct LogSummary {
    records: usize,
    /// Sum of all recorded waits, in seconds
    duration: f64,
    kinds: BTreeMap<&'static str, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    events: Option<Vec<serde_json::Value>>,
}

fn summarize(file: &Path, all: bool) -> Result<LogSummary> {
    let mut summary = LogSummary {
        records: 0,
        duration: 0.0,
        kinds: BTreeMap::new(),
        events: all.then(Vec::new),
    };
    for record in LogReader::open(file)?.records() {
        let record = record?;
        summary.records += 1;
        summary.duration += record.wait_time;
        *summary.kinds.entry(record.event.tag()).or_default() += 1;
        if let Some(events) = summary.events.as_mut() {
            events.push(serde_json::to_value(&record)?);
        }
    }
    Ok(summary)
}

fn cmd_show(file: &Path, all: bool) -> Result<()> {
    let summary = summarize(file, all)?;
    print_json(&Output::ok(summary))
}
