use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::config::model::FileConfig;
use crate::error::{ConfigError, DirsnapError, Result};

pub fn load_config(path: &Path) -> Result<FileConfig> {
    let mut contents = String::new();
    File::open(path)
        .map_err(DirsnapError::Io)?
        .read_to_string(&mut contents)
        .map_err(DirsnapError::Io)?;
    let cfg: FileConfig =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
    Ok(cfg)
}
