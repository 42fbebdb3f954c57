//! Binary entrypoint for the picture frame core.
//!
//! Delegates all logic to the library crate; no local modules here.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, fmt};

use picframe::decode::DecodePool;
use picframe::library::Library;
use picframe::render::TraceRenderer;
use picframe::show::{ShowOptions, run_show};

#[derive(Debug, Parser)]
#[command(name = "picframe", about = "Headless slideshow core")]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,

    /// Override per-slide delay, e.g. "10s" or "1500ms"
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    delay: Option<Duration>,

    /// Stop after this many full passes through the catalog
    #[arg(long, value_name = "COUNT")]
    passes: Option<u64>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter =
        EnvFilter::from_default_env().add_directive(format!("picframe={}", level).parse()?);
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let cfg = picframe::config::from_yaml_file(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    cfg.validate().context("validating configuration")?;

    let rules = cfg.rules.compile()?;
    let library = Library::new(cfg.library_root.clone(), rules);
    let pool = DecodePool::new(cfg.decode_workers).context("starting decode workers")?;
    info!(root = %cfg.library_root.display(), workers = cfg.decode_workers, "starting show");

    let mut opts = ShowOptions::from_config(&cfg);
    if let Some(delay) = cli.delay {
        opts.slide_delay = delay;
    }
    opts.max_passes = cli.passes;

    let running = AtomicBool::new(true);
    let mut renderer = TraceRenderer::default();
    run_show(&opts, &library, &pool, &mut renderer, &running)
}
