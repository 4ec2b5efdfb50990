use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use ota_engine::EngineConfig;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};

/// Only records from the workspace crates (`ota_agent`, `ota_engine`, ...).
const TARGET_PREFIX: &str = "ota";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub path: PathBuf,
    pub level: LevelFilter,
    /// Size at which the file is rotated; 0 disables rotation.
    pub max_bytes: u64,
    /// Mirror records to stderr.
    pub echo: bool,
}

impl LogSettings {
    pub fn from_config(config: &EngineConfig, path: PathBuf, echo: bool) -> Self {
        Self {
            path,
            level: if config.debug_logging {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            },
            max_bytes: config.max_log_size_bytes,
            echo,
        }
    }
}

/// Log file that rotates to `<name>.1` once it reaches `max_bytes`, and
/// reopens itself if the file disappears while the agent is running.
struct RotatingLogFile {
    path: PathBuf,
    max_bytes: u64,
    written: u64,
    file: Option<File>,
}

impl RotatingLogFile {
    fn open(path: PathBuf, max_bytes: u64) -> io::Result<Self> {
        let mut log = Self {
            path,
            max_bytes,
            written: 0,
            file: None,
        };
        log.reopen()?;
        Ok(log)
    }

    fn reopen(&mut self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.written = file.metadata()?.len();
        self.file = Some(file);
        Ok(())
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file = None;
        std::fs::rename(&self.path, backup_path(&self.path))?;
        self.reopen()
    }

    fn needs_rotation(&self, incoming: usize) -> bool {
        self.max_bytes > 0
            && self.written > 0
            && self.written.saturating_add(incoming as u64) > self.max_bytes
    }
}

impl Write for RotatingLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.file.is_none() || !self.path.exists() {
            self.reopen()?;
        }
        if self.needs_rotation(buf.len()) {
            self.rotate()?;
        }
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::other("log file not available"))?;
        let written = file.write(buf)?;
        self.written += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.as_mut().map_or(Ok(()), File::flush)
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".1");
    path.with_file_name(name)
}

/// Install the global logger. Returns `false` when the log file could not be
/// opened; stderr echo still works in that case.
pub fn init_logging(settings: &LogSettings) -> bool {
    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str(TARGET_PREFIX)
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    let file_ready = match RotatingLogFile::open(settings.path.clone(), settings.max_bytes) {
        Ok(file) => {
            loggers.push(WriteLogger::new(settings.level, config.clone(), file));
            true
        }
        Err(error) => {
            eprintln!(
                "Failed to open log file {}: {error}",
                settings.path.display()
            );
            false
        }
    };
    if settings.echo {
        loggers.push(TermLogger::new(
            settings.level,
            config,
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
    }

    if !loggers.is_empty() && CombinedLogger::init(loggers).is_ok() {
        log::debug!("Logging to {} at {}", settings.path.display(), settings.level);
    }
    file_ready
}
