use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::types::TimeOfDay;
use crate::util::paths::dedup_paths;

pub const DEFAULT_LOG_MAX_BYTES: u64 = 1024 * 1024;

/// Settings as read from a YAML file or assembled from command-line flags. Every field
/// is optional so two sources can be layered before validation.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub source: Option<PathBuf>,
    #[serde(default)]
    pub destinations: Vec<PathBuf>,
    #[serde(default)]
    pub keep_count: Option<usize>,
    #[serde(default)]
    pub repeat_delay_seconds: Option<u64>,
    #[serde(default)]
    pub time_of_day: Option<String>,
    #[serde(default)]
    pub continuous: bool,
    #[serde(default)]
    pub log_prefix: Option<String>,
    #[serde(default)]
    pub log_max_bytes: Option<u64>,
    #[serde(default)]
    pub instance_id: Option<String>,
}

impl FileConfig {
    /// Layers `over` on top of `self`: scalar values from `over` win, destinations
    /// are concatenated. The schedule (repeat delay, time of day, continuous mode)
    /// is taken as a whole from `over` when it names either a delay or a time.
    pub fn overlay(mut self, over: FileConfig) -> FileConfig {
        if over.source.is_some() {
            self.source = over.source;
        }
        self.destinations.extend(over.destinations);
        if over.keep_count.is_some() {
            self.keep_count = over.keep_count;
        }
        if over.repeat_delay_seconds.is_some() || over.time_of_day.is_some() {
            self.repeat_delay_seconds = over.repeat_delay_seconds;
            self.time_of_day = over.time_of_day;
            self.continuous = over.continuous;
        } else {
            self.continuous |= over.continuous;
        }
        if over.log_prefix.is_some() {
            self.log_prefix = over.log_prefix;
        }
        if over.log_max_bytes.is_some() {
            self.log_max_bytes = over.log_max_bytes;
        }
        if over.instance_id.is_some() {
            self.instance_id = over.instance_id;
        }
        self
    }

    pub fn to_config(&self) -> Result<Config, ConfigError> {
        let source = self
            .source
            .clone()
            .ok_or_else(|| ConfigError::Invalid("source not set".to_string()))?;
        let keep_count = self
            .keep_count
            .ok_or_else(|| ConfigError::Invalid("keep count not set".to_string()))?;
        let time_of_day = match &self.time_of_day {
            Some(text) => Some(
                text.parse::<TimeOfDay>()
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?,
            ),
            None => None,
        };
        let schedule = match (self.repeat_delay_seconds, time_of_day) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Invalid(
                    "time and repeat delay both set, which makes no sense".to_string(),
                ));
            }
            (Some(secs), None) => Schedule::Every(Duration::from_secs(secs)),
            (None, Some(time)) => Schedule::Daily(time),
            (None, None) => {
                return Err(ConfigError::Invalid(
                    "time and repeat delay not set".to_string(),
                ));
            }
        };
        Config::new(source, &self.destinations, keep_count, schedule, self.continuous)
    }
}

/// When the next cycle is due after a cycle completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Every(Duration),
    Daily(TimeOfDay),
}

/// Immutable runtime configuration for the backup engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    source: PathBuf,
    destinations: Vec<PathBuf>,
    keep_count: usize,
    schedule: Schedule,
    continuous: bool,
}

impl Config {
    /// Builds a configuration from its own copy of `destinations`, dropping
    /// duplicates by path identity.
    pub fn new(
        source: impl Into<PathBuf>,
        destinations: &[PathBuf],
        keep_count: usize,
        schedule: Schedule,
        continuous: bool,
    ) -> Result<Self, ConfigError> {
        let destinations = dedup_paths(destinations.iter().cloned());
        if destinations.is_empty() {
            return Err(ConfigError::Invalid("no destinations set".to_string()));
        }
        if continuous && !matches!(schedule, Schedule::Every(_)) {
            return Err(ConfigError::Invalid(
                "continuous mode needs a repeat delay, not a time of day".to_string(),
            ));
        }
        Ok(Self {
            source: source.into(),
            destinations,
            keep_count,
            schedule,
            continuous,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destinations(&self) -> &[PathBuf] {
        &self.destinations
    }

    pub fn keep_count(&self) -> usize {
        self.keep_count
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    pub fn is_continuous(&self) -> bool {
        self.continuous
    }

    pub fn repeat_delay(&self) -> Option<Duration> {
        match self.schedule {
            Schedule::Every(delay) => Some(delay),
            Schedule::Daily(_) => None,
        }
    }

    pub fn time_of_day(&self) -> Option<TimeOfDay> {
        match self.schedule {
            Schedule::Daily(time) => Some(time),
            Schedule::Every(_) => None,
        }
    }
}
