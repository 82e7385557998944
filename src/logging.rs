use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileSettings {
    /// Path prefix of the log files; `<prefix><N>.log` is written.
    pub prefix: String,
    pub max_bytes: u64,
}

/// Installs the global subscriber: stdout always, plus rotating log files when
/// `file` is set. `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing(file: Option<LogFileSettings>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout = fmt::layer().with_target(false).with_writer(io::stdout);
    let file_layer = file.map(|settings| {
        fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(RotatingFile::open(settings))
    });
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stdout)
        .with(file_layer)
        .try_init();
}

/// Size-bounded log sink numbering its files `<prefix>1.log`, `<prefix>2.log`, ...
#[derive(Debug)]
pub struct RotatingFile {
    dir: PathBuf,
    stem: String,
    max_bytes: u64,
    index: Mutex<u32>,
}

impl RotatingFile {
    pub fn open(settings: LogFileSettings) -> Self {
        let prefix = Path::new(&settings.prefix);
        let dir = match prefix.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let stem = prefix
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let index = count_log_files(&dir, &stem).max(1);
        Self {
            dir,
            stem,
            max_bytes: settings.max_bytes,
            index: Mutex::new(index),
        }
    }

    pub fn current_path(&self) -> PathBuf {
        let index = self.index.lock().map(|i| *i).unwrap_or(1);
        self.path_for(index)
    }

    fn path_for(&self, index: u32) -> PathBuf {
        self.dir.join(format!("{}{}.log", self.stem, index))
    }

    fn append(&self, buf: &[u8]) -> io::Result<()> {
        let mut index = self
            .index
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        let mut path = self.path_for(*index);
        let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        if size + buf.len() as u64 > self.max_bytes {
            *index += 1;
            path = self.path_for(*index);
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(buf)
    }
}

fn count_log_files(dir: &Path, stem: &str) -> u32 {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    let count = entries
        .filter_map(|e| e.ok())
        .filter(|e| is_log_file_name(&e.file_name().to_string_lossy(), stem))
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

fn is_log_file_name(name: &str, stem: &str) -> bool {
    name.strip_prefix(stem)
        .and_then(|rest| rest.strip_suffix(".log"))
        .map(|digits| digits.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}

pub struct RotatingWriter<'a>(&'a RotatingFile);

impl Write for RotatingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.append(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for RotatingFile {
    type Writer = RotatingWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingWriter(self)
    }
}
