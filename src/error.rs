use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirsnapError {
    #[error("{0}")]
    Message(String),
    #[error("{0}")]
    Config(ConfigError),
    #[error("{0}")]
    Lock(LockError),
    #[error("{0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parse config: {0}")]
    Parse(String),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum RetentionError {
    #[error("invalid entry in destination (not a directory): {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("invalid entry in destination (not a timestamp): {}", .0.display())]
    NotATimestamp(PathBuf),
    #[error("read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("delete {}: {source}", path.display())]
    Delete { path: PathBuf, source: io::Error },
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("instance {0} is already running")]
    AlreadyRunning(String),
    #[error("instance id {0} must use only letters, digits, '.', '-', '_'")]
    InvalidId(String),
    #[error("lock {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeParseError {
    #[error("time {0:?} must be HH:MM:SS")]
    Format(String),
    #[error("{field} {value} out of range")]
    OutOfRange { field: &'static str, value: u32 },
}

pub type Result<T> = std::result::Result<T, DirsnapError>;

impl DirsnapError {
    pub fn message(msg: impl Into<String>) -> Self {
        DirsnapError::Message(msg.into())
    }
}

impl From<ConfigError> for DirsnapError {
    fn from(err: ConfigError) -> Self {
        DirsnapError::Config(err)
    }
}

impl From<LockError> for DirsnapError {
    fn from(err: LockError) -> Self {
        DirsnapError::Lock(err)
    }
}
