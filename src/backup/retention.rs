use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::RetentionError;

const EVICTING_SUFFIX: &str = ".evicting";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Snapshot {
    stamp: i64,
    path: PathBuf,
}

/// Evicts the oldest snapshot under `dest` when it already holds `keep_count` or more.
///
/// Every direct child must be a directory named with a decimal timestamp; anything else
/// fails the whole pass before anything is deleted. Returns the evicted snapshot path.
pub fn enforce_retention(dest: &Path, keep_count: usize) -> Result<Option<PathBuf>, RetentionError> {
    let (snapshots, leftovers) = scan_destination(dest)?;

    for leftover in leftovers {
        warn!("removing interrupted eviction {}", leftover.display());
        fs::remove_dir_all(&leftover).map_err(|source| RetentionError::Delete {
            path: leftover.clone(),
            source,
        })?;
    }

    if snapshots.len() < keep_count {
        return Ok(None);
    }
    let Some(oldest) = snapshots.into_iter().min_by_key(|s| s.stamp) else {
        return Ok(None);
    };

    info!("too many entries in destination, removing oldest");
    info!("removing {}", oldest.path.display());
    evict(&oldest.path)?;
    info!("removed");
    Ok(Some(oldest.path))
}

fn scan_destination(dest: &Path) -> Result<(Vec<Snapshot>, Vec<PathBuf>), RetentionError> {
    let read_err = |source| RetentionError::Read {
        path: dest.to_path_buf(),
        source,
    };
    let mut snapshots = Vec::new();
    let mut leftovers = Vec::new();
    for entry in fs::read_dir(dest).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        let is_dir = entry
            .file_type()
            .map_err(|source| RetentionError::Read {
                path: path.clone(),
                source,
            })?
            .is_dir();
        if !is_dir {
            return Err(RetentionError::NotADirectory(path));
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(base) = name.strip_suffix(EVICTING_SUFFIX) {
            if parse_stamp(base).is_some() {
                leftovers.push(path);
                continue;
            }
        }
        match parse_stamp(&name) {
            Some(stamp) => snapshots.push(Snapshot { stamp, path }),
            None => return Err(RetentionError::NotATimestamp(path)),
        }
    }
    Ok((snapshots, leftovers))
}

fn parse_stamp(name: &str) -> Option<i64> {
    name.parse::<i64>().ok()
}

// The rename takes the snapshot out of the namespace in one step; a failed removal
// leaves only a `.evicting` directory for the next pass to finish.
fn evict(path: &Path) -> Result<(), RetentionError> {
    let mut staged = path.as_os_str().to_owned();
    staged.push(EVICTING_SUFFIX);
    let staged = PathBuf::from(staged);
    fs::rename(path, &staged).map_err(|source| RetentionError::Delete {
        path: path.to_path_buf(),
        source,
    })?;
    fs::remove_dir_all(&staged).map_err(|source| RetentionError::Delete {
        path: staged.clone(),
        source,
    })
}
