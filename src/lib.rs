pub mod backup;
pub mod cli;
pub mod config;
pub mod error;
pub mod instance;
pub mod logging;
pub mod signal_handler;
pub mod types;
pub mod util;

pub use backup::copy::{classify_failure, CopyOutcome, TreeCopier, IGNORE_MARKER};
pub use backup::retention::enforce_retention;
pub use backup::{NextRun, Scheduler, SchedulerState};
pub use config::{Config, Schedule};
pub use error::{DirsnapError, Result};
pub use types::TimeOfDay;
