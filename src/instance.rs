use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::LockError;
use crate::util::paths::is_safe_name;

/// Holds the advisory lock on `<id>.lock` for as long as it lives.
#[derive(Debug)]
pub struct InstanceGuard {
    path: PathBuf,
    file: File,
}

impl InstanceGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        let _ = fs::remove_file(&self.path);
    }
}

pub fn lock_path(dir: &Path, id: &str) -> Result<PathBuf, LockError> {
    if !is_safe_name(id) {
        return Err(LockError::InvalidId(id.to_string()));
    }
    Ok(dir.join(format!("{}.lock", id)))
}

/// Takes the single-instance lock for `id` in the working directory.
pub fn acquire(id: &str) -> Result<InstanceGuard, LockError> {
    acquire_in(Path::new("."), id)
}

pub fn acquire_in(dir: &Path, id: &str) -> Result<InstanceGuard, LockError> {
    let path = lock_path(dir, id)?;
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .map_err(|source| LockError::Io {
            path: path.clone(),
            source,
        })?;
    match file.try_lock_exclusive() {
        Ok(()) => Ok(InstanceGuard { path, file }),
        Err(err) if is_contended(&err) => Err(LockError::AlreadyRunning(id.to_string())),
        Err(source) => Err(LockError::Io { path, source }),
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
