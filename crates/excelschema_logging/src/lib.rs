//! Tracing setup for programs that embed the schema engine.
//!
//! Console output goes to stderr. An optional log file is written under
//! `$EXCELSCHEMA_HOME/logs` (default `~/.excelschema/logs`) and rotated by
//! size.
//!
//! ```no_run
//! use excelschema_logging::{init_logging, LogConfig, LogFile};
//!
//! let mut config = LogConfig::new("importer");
//! config.file = LogFile::DefaultDir;
//! init_logging(config)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "excelschema=info";
const VERBOSE_LOG_FILTER: &str = "excelschema=debug";
const HOME_ENV: &str = "EXCELSCHEMA_HOME";

/// Where, if anywhere, log lines are persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LogFile {
    /// Console only
    #[default]
    Disabled,
    /// `<home>/logs/<app_name>.log`
    DefaultDir,
    /// `<dir>/<app_name>.log`
    Dir(PathBuf),
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Log engine internals (per batch, per widening) to the console
    pub verbose: bool,
    pub file: LogFile,
    pub rotation: Rotation,
}

impl<'a> LogConfig<'a> {
    pub fn new(app_name: &'a str) -> Self {
        Self {
            app_name,
            verbose: false,
            file: LogFile::Disabled,
            rotation: Rotation::default(),
        }
    }
}

/// Size-based rotation limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rotation {
    /// Files kept, counting the active one
    pub max_files: usize,
    /// Bytes written to the active file before it is rotated
    pub max_bytes: u64,
}

impl Default for Rotation {
    fn default() -> Self {
        Self {
            max_files: 5,
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the filter for both outputs. Fails if a subscriber
/// is already installed or the log file cannot be opened.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let env_filter = || EnvFilter::try_from_default_env().ok();

    let console_filter = env_filter().unwrap_or_else(|| {
        EnvFilter::new(if config.verbose {
            VERBOSE_LOG_FILTER
        } else {
            DEFAULT_LOG_FILTER
        })
    });

    let file_layer = match log_file_dir(&config.file)? {
        Some(dir) => {
            let writer = RotatingWriter::open(&dir, config.app_name, config.rotation)
                .context("Failed to initialize rotating log writer")?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(env_filter().unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::debug!(app = config.app_name, file = ?config.file, "Logging initialized");
    Ok(())
}

fn log_file_dir(file: &LogFile) -> Result<Option<PathBuf>> {
    match file {
        LogFile::Disabled => Ok(None),
        LogFile::DefaultDir => ensure_logs_dir().map(Some),
        LogFile::Dir(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            Ok(Some(dir.clone()))
        }
    }
}

/// Home directory for engine state: `$EXCELSCHEMA_HOME` or `~/.excelschema`
pub fn excelschema_home() -> Result<PathBuf> {
    if let Ok(override_path) = std::env::var(HOME_ENV) {
        return Ok(PathBuf::from(override_path));
    }
    dirs::home_dir()
        .map(|home| home.join(".excelschema"))
        .ok_or_else(|| anyhow!("Could not determine home directory; set {}", HOME_ENV))
}

/// `<home>/logs`
pub fn logs_dir() -> Result<PathBuf> {
    Ok(excelschema_home()?.join("logs"))
}

/// Create the logs directory if needed and return it.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir()?;
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

// ============================================================================
// Rotating file
// ============================================================================

/// `<name>.log` plus up to `max_files - 1` older `<name>.log.N` files.
struct RotatingFile {
    dir: PathBuf,
    stem: String,
    rotation: Rotation,
    file: Option<File>,
    written: u64,
}

impl RotatingFile {
    fn open(dir: &Path, app_name: &str, rotation: Rotation) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let mut log = Self {
            dir: dir.to_path_buf(),
            stem: sanitize_name(app_name),
            rotation: Rotation {
                max_files: rotation.max_files.max(1),
                ..rotation
            },
            file: None,
            written: 0,
        };
        log.reopen()?;
        if log.written > log.rotation.max_bytes {
            log.rotate()?;
        }
        Ok(log)
    }

    fn active_path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", self.stem))
    }

    fn archived_path(&self, generation: usize) -> PathBuf {
        self.dir.join(format!("{}.log.{}", self.stem, generation))
    }

    fn reopen(&mut self) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.active_path())?;
        self.written = file.metadata()?.len();
        self.file = Some(file);
        Ok(())
    }

    fn rotate(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }
        self.shift_archives()?;
        self.reopen()
    }

    /// Move `.log.N` to `.log.N+1`, dropping the oldest, then `.log` to `.log.1`.
    fn shift_archives(&self) -> io::Result<()> {
        let oldest = self.rotation.max_files - 1;
        if oldest == 0 {
            // Single file: truncate in place
            return match fs::remove_file(self.active_path()) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
                _ => Ok(()),
            };
        }

        let last = self.archived_path(oldest);
        if last.exists() {
            fs::remove_file(&last)?;
        }
        for generation in (1..oldest).rev() {
            let src = self.archived_path(generation);
            if src.exists() {
                fs::rename(&src, self.archived_path(generation + 1))?;
            }
        }
        let active = self.active_path();
        if active.exists() {
            fs::rename(active, self.archived_path(1))?;
        }
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.rotation.max_bytes {
            self.rotate()?;
        }
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "log file unavailable"))?;
        let n = file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// Cloneable handle handed to `tracing_subscriber::fmt` as a `MakeWriter`.
#[derive(Clone)]
struct RotatingWriter {
    inner: Arc<Mutex<RotatingFile>>,
}

impl RotatingWriter {
    fn open(dir: &Path, app_name: &str, rotation: Rotation) -> Result<Self> {
        let file = RotatingFile::open(dir, app_name, rotation)
            .with_context(|| format!("Failed to open log file for {} in {}", app_name, dir.display()))?;
        Ok(Self {
            inner: Arc::new(Mutex::new(file)),
        })
    }

    fn with_file<T>(&self, f: impl FnOnce(&mut RotatingFile) -> io::Result<T>) -> io::Result<T> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        f(&mut guard)
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for RotatingWriter {
    type Writer = RotatingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl Write for RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with_file(|file| file.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with_file(|file| file.flush())
    }
}

fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "excelschema".to_string()
    } else {
        cleaned
    }
}
