use std::env;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use crate::backup::Scheduler;
use crate::cli::args::Cli;
use crate::config::{load_config, Config, FileConfig, DEFAULT_LOG_MAX_BYTES};
use crate::error::{DirsnapError, LockError};
use crate::instance;
use crate::logging::{init_tracing, LogFileSettings};
use crate::signal_handler::install_shutdown_handler;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod args;

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut raw = FileConfig::default();
    if let Some(path) = &cli.config {
        match load_config(path) {
            Ok(file) => raw = file,
            Err(err) => exit_for_error(&err),
        }
    }
    let raw = raw.overlay(cli.to_file_config());

    let config = match raw.to_config() {
        Ok(config) => config,
        Err(err) => exit_for_error(&err.into()),
    };

    init_tracing(raw.log_prefix.clone().map(|prefix| LogFileSettings {
        prefix,
        max_bytes: raw.log_max_bytes.unwrap_or(DEFAULT_LOG_MAX_BYTES),
    }));

    let guard = match raw.instance_id.as_deref().map(instance::acquire).transpose() {
        Ok(guard) => guard,
        Err(err) => exit_for_error(&err.into()),
    };
    install_shutdown_handler(guard.as_ref().map(|g| g.path().to_path_buf()))?;

    print_banner(&config, raw.log_prefix.as_deref());
    Scheduler::new(config).run()
}

fn print_banner(config: &Config, log_prefix: Option<&str>) {
    info!("dirsnap {}", VERSION);
    if let Ok(cwd) = env::current_dir() {
        info!("working directory: {}", cwd.display());
    }
    info!("source: {}", config.source().display());
    info!("destinations:");
    for dest in config.destinations() {
        info!("    {}", dest.display());
    }
    info!("continuous mode: {}", config.is_continuous());
    match config.repeat_delay() {
        Some(delay) => info!("repeat delay (in seconds): {}", delay.as_secs()),
        None => info!("repeat delay (in seconds): <none>"),
    }
    info!("keep count: {}", config.keep_count());
    info!("log file prefix: {}", log_prefix.unwrap_or("<none>"));
    match config.time_of_day() {
        Some(time) => info!("time: {}", time),
        None => info!("time: <none>"),
    }
}

pub fn exit_for_error(err: &DirsnapError) -> ! {
    eprintln!("{}", err);
    match err {
        DirsnapError::Config(_) => {
            eprintln!("run `dirsnap --help` for usage information");
            std::process::exit(2);
        }
        DirsnapError::Lock(LockError::AlreadyRunning(_)) => {
            eprintln!("exiting since application already running");
            std::process::exit(1);
        }
        _ => std::process::exit(1),
    }
}
