use std::fs;
use std::path::PathBuf;

use tracing::info;

use crate::error::{DirsnapError, Result};

/// On SIGINT or SIGTERM, removes the instance lock file (if any) and exits.
pub fn install_shutdown_handler(lock_path: Option<PathBuf>) -> Result<()> {
    ctrlc::set_handler(move || {
        info!("shutting down");
        if let Some(path) = &lock_path {
            let _ = fs::remove_file(path);
        }
        std::process::exit(130);
    })
    .map_err(|e| DirsnapError::message(format!("signal handler setup failed: {}", e)))
}
