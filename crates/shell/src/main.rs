mod app;

use std::{
    fs::{self, OpenOptions},
    io,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use loadout_core::{
    config::{self, AppConfig},
    StandardRules,
};
use tracing_subscriber::{prelude::*, EnvFilter};

fn main() -> Result<()> {
    init_logging()?;

    let path = config::ensure_default_config()?;
    let config = AppConfig::load_from(&path)?;
    let catalogs = config.catalogs()?;

    let mut session = app::Session::new(&config, catalogs, Arc::new(StandardRules))?;
    let stdin = io::stdin();
    session.run(stdin.lock(), io::stdout())
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("loadout.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Console output goes to stderr so it does not interleave with the prompt.
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(io::stderr)
        .with_filter(EnvFilter::new("warn"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .compact()
        .with_ansi(false)
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}
