use std::path::PathBuf;

use clap::Parser;

use crate::config::FileConfig;
use crate::types::TimeOfDay;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "dirsnap",
    version,
    about = "Periodic timestamped snapshots of a directory tree"
)]
pub struct Cli {
    /// Directory tree to back up
    #[arg(short, long)]
    pub source: Option<PathBuf>,
    /// Destination directory; repeat for several
    #[arg(short = 'd', long = "dest")]
    pub destinations: Vec<PathBuf>,
    /// Snapshots kept per destination
    #[arg(short = 'k', long = "keep")]
    pub keep_count: Option<usize>,
    /// Seconds between runs
    #[arg(
        short = 'r',
        long = "repeat",
        value_name = "SECONDS",
        conflicts_with_all = ["time", "continuous"]
    )]
    pub repeat_delay: Option<u64>,
    /// Run daily at this local time
    #[arg(short = 't', long, value_name = "HH:MM:SS", conflicts_with = "continuous")]
    pub time: Option<TimeOfDay>,
    /// Continuous mode: seconds between successful runs; failures wait for a destination
    #[arg(short = 'c', long, value_name = "SECONDS")]
    pub continuous: Option<u64>,
    /// Write rotating log files named <PREFIX><N>.log
    #[arg(short = 'l', long, value_name = "PREFIX")]
    pub log_prefix: Option<String>,
    /// Maximum size of one log file
    #[arg(long, value_name = "BYTES")]
    pub log_max_bytes: Option<u64>,
    /// Refuse to start while another instance with this id runs
    #[arg(long)]
    pub id: Option<String>,
    /// YAML settings file; command-line values take precedence
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn to_file_config(&self) -> FileConfig {
        FileConfig {
            source: self.source.clone(),
            destinations: self.destinations.clone(),
            keep_count: self.keep_count,
            repeat_delay_seconds: self.continuous.or(self.repeat_delay),
            time_of_day: self.time.map(|t| t.to_string()),
            continuous: self.continuous.is_some(),
            log_prefix: self.log_prefix.clone(),
            log_max_bytes: self.log_max_bytes,
            instance_id: self.id.clone(),
        }
    }
}
