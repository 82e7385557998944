use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, warn};
use walkdir::WalkDir;

/// A source directory holding an entry with this name is not copied, nor is anything
/// beneath it.
pub const IGNORE_MARKER: &str = ".sjdbignore";

// EIO on Linux.
const EIO: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Success,
    /// The snapshot is usable but this many entries could not be copied.
    PartialFailure(usize),
    /// The destination medium went away; no usable snapshot was produced.
    Disconnected,
}

impl CopyOutcome {
    pub fn is_usable(&self) -> bool {
        !matches!(self, CopyOutcome::Disconnected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Isolated,
    Disconnected,
}

/// Decides whether a failed entry means the destination medium itself is gone.
///
/// This is a heuristic: the destination root vanishing, a read-only filesystem and
/// low-level I/O errors all count as disconnection.
pub fn classify_failure(dest_root: &Path, err: &io::Error) -> FailureClass {
    if !dest_root.exists() {
        return FailureClass::Disconnected;
    }
    if err.kind() == io::ErrorKind::ReadOnlyFilesystem || err.raw_os_error() == Some(EIO) {
        return FailureClass::Disconnected;
    }
    let message = err.to_string().to_lowercase();
    if message.contains("read-only") || message.contains("input/output") {
        return FailureClass::Disconnected;
    }
    FailureClass::Isolated
}

/// Filesystem writes performed while mirroring a tree.
pub trait EntryOps {
    fn create_dir(&self, path: &Path) -> io::Result<()>;
    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl EntryOps for LocalFs {
    fn create_dir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir(path)
    }

    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64> {
        fs::copy(from, to)
    }
}

#[derive(Debug, Default)]
pub struct TreeCopier<O = LocalFs> {
    ops: O,
}

impl TreeCopier<LocalFs> {
    pub fn new() -> Self {
        Self { ops: LocalFs }
    }
}

impl<O: EntryOps> TreeCopier<O> {
    pub fn with_ops(ops: O) -> Self {
        Self { ops }
    }

    /// Copies `source` into a new timestamp-named snapshot under `dest_root`.
    pub fn copy(&self, source: &Path, dest_root: &Path) -> CopyOutcome {
        let snapshot = match self.create_snapshot_dir(dest_root) {
            Ok(path) => path,
            Err(err) => {
                warn!("failed to create snapshot in {}: {}", dest_root.display(), err);
                return CopyOutcome::Disconnected;
            }
        };
        info!("copying to {}", snapshot.display());
        self.copy_tree(source, &snapshot, dest_root)
    }

    /// Creates `<dest_root>/<epoch millis>`, moving to the next millisecond while the
    /// name is taken.
    pub fn create_snapshot_dir(&self, dest_root: &Path) -> io::Result<PathBuf> {
        let mut stamp = Utc::now().timestamp_millis();
        loop {
            let candidate = dest_root.join(stamp.to_string());
            match self.ops.create_dir(&candidate) {
                Ok(()) => return Ok(candidate),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => stamp += 1,
                Err(err) => return Err(err),
            }
        }
    }

    /// Mirrors the contents of `source` into the existing directory `snapshot`.
    ///
    /// Entry failures are logged and counted. After each one the destination is
    /// checked with [`classify_failure`] against `dest_root`, and the copy stops at the
    /// first sign of disconnection.
    pub fn copy_tree(&self, source: &Path, snapshot: &Path, dest_root: &Path) -> CopyOutcome {
        let mut failures = 0usize;
        let mut walker = WalkDir::new(source)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        while let Some(next) = walker.next() {
            let entry = match next {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| source.display().to_string());
                    let err = io::Error::from(err);
                    warn!("failed to copy entity at {}: {}", path, err);
                    failures += 1;
                    if classify_failure(dest_root, &err) == FailureClass::Disconnected {
                        warn!("destination {} disconnected, aborting copy", dest_root.display());
                        return CopyOutcome::Disconnected;
                    }
                    continue;
                }
            };

            let src_path = entry.path();
            let rel = src_path.strip_prefix(source).unwrap_or(src_path);
            let target = snapshot.join(rel);
            let ft = entry.file_type();

            let result = if ft.is_dir() {
                if contains_marker(src_path) {
                    info!(
                        "ignoring directory {} because it contains {}",
                        src_path.display(),
                        IGNORE_MARKER
                    );
                    if entry.depth() == 0 {
                        break;
                    }
                    walker.skip_current_dir();
                    continue;
                }
                if entry.depth() == 0 {
                    continue;
                }
                let created = self.ops.create_dir(&target);
                if created.is_err() {
                    walker.skip_current_dir();
                }
                created
            } else if ft.is_file() {
                self.ops.copy_file(src_path, &target).map(|_| ())
            } else {
                info!("ignoring unrecognized entity at {}", src_path.display());
                continue;
            };

            if let Err(err) = result {
                warn!("failed to copy entity at {}: {}", src_path.display(), err);
                failures += 1;
                if classify_failure(dest_root, &err) == FailureClass::Disconnected {
                    warn!("destination {} disconnected, aborting copy", dest_root.display());
                    return CopyOutcome::Disconnected;
                }
            }
        }

        if failures == 0 {
            CopyOutcome::Success
        } else {
            CopyOutcome::PartialFailure(failures)
        }
    }
}

fn contains_marker(dir: &Path) -> bool {
    fs::symlink_metadata(dir.join(IGNORE_MARKER)).is_ok()
}
