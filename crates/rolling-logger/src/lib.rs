//! Rolling file logger
//!
//! Writes one log file per day (`<app>.<YYYY-MM-DD>.log`), keeps the newest
//! `max_files` of them, and mirrors the most recent lines into an in-memory
//! ring buffer. Records from the `log` facade are forwarded as well.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock};

use chrono::{Local, NaiveDate};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_MAX_FILES: usize = 7;
const BUFFER_LINES: usize = 500;

static INITIALIZED: OnceLock<()> = OnceLock::new();
static RECENT: Mutex<VecDeque<String>> = Mutex::new(VecDeque::new());

fn recent() -> MutexGuard<'static, VecDeque<String>> {
    RECENT.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn remember(text: &str) {
    let mut buffer = recent();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        if buffer.len() == BUFFER_LINES {
            buffer.pop_front();
        }
        buffer.push_back(line.to_string());
    }
}

/// Most recent log lines, oldest first
pub fn recent_lines() -> Vec<String> {
    recent().iter().cloned().collect()
}

fn file_name(app_name: &str, date: NaiveDate) -> String {
    format!("{}.{}.log", app_name, date.format("%Y-%m-%d"))
}

/// Delete the oldest `<app>.*.log` files so at most `max_files` remain
fn prune(dir: &Path, app_name: &str, max_files: usize) -> io::Result<()> {
    let prefix = format!("{}.", app_name);
    let mut logs: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(&prefix) && n.ends_with(".log"))
                .unwrap_or(false)
        })
        .collect();
    // Dates in the name sort chronologically
    logs.sort();
    let excess = logs.len().saturating_sub(max_files.max(1));
    for path in logs.into_iter().take(excess) {
        fs::remove_file(path)?;
    }
    Ok(())
}

struct DayFile {
    date: NaiveDate,
    file: File,
}

/// Appends to the file of the current day, switching files at midnight
pub struct RollingWriter {
    dir: PathBuf,
    app_name: String,
    max_files: usize,
    current: Mutex<Option<DayFile>>,
}

impl RollingWriter {
    pub fn new(dir: impl Into<PathBuf>, app_name: &str, max_files: usize) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            app_name: app_name.to_string(),
            max_files,
            current: Mutex::new(None),
        })
    }

    fn write_on(&self, date: NaiveDate, buf: &[u8]) -> io::Result<usize> {
        let mut current = self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if current.as_ref().map(|day| day.date) != Some(date) {
            let path = self.dir.join(file_name(&self.app_name, date));
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            *current = Some(DayFile { date, file });
            prune(&self.dir, &self.app_name, self.max_files)?;
        }
        match current.as_mut() {
            Some(day) => day.file.write_all(buf)?,
            None => return Err(io::Error::other("log file unavailable")),
        }
        remember(&String::from_utf8_lossy(buf));
        Ok(buf.len())
    }
}

pub struct RollingHandle<'a> {
    writer: &'a RollingWriter,
}

impl Write for RollingHandle<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write_on(Local::now().date_naive(), buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut current = self.writer.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match current.as_mut() {
            Some(day) => day.file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for RollingWriter {
    type Writer = RollingHandle<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RollingHandle { writer: self }
    }
}

/// Initialize the global logger, keeping the default number of daily files
pub fn init_logger(log_dir: impl AsRef<Path>, app_name: &str) -> Result<(), String> {
    init_logger_with_retention(log_dir, app_name, DEFAULT_MAX_FILES)
}

/// Initialize the global logger. Filtering honors `RUST_LOG` and defaults to `info`.
pub fn init_logger_with_retention(
    log_dir: impl AsRef<Path>,
    app_name: &str,
    max_files: usize,
) -> Result<(), String> {
    if INITIALIZED.get().is_some() {
        return Err("Logger already initialized".to_string());
    }

    let writer = RollingWriter::new(log_dir.as_ref(), app_name, max_files)
        .map_err(|e| format!("Failed to create log dir {}: {}", log_dir.as_ref().display(), e))?;
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer().with_ansi(false).with_writer(writer);
    let console_layer = fmt::layer().with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| format!("Failed to install logger: {}", e))?;

    let _ = INITIALIZED.set(());
    tracing::info!("Logger initialized for {} in {}", app_name, log_dir.as_ref().display());
    Ok(())
}

fn ensure_initialized() -> Result<(), String> {
    INITIALIZED
        .get()
        .map(|_| ())
        .ok_or_else(|| "Logger not initialized".to_string())
}

pub fn info(message: &str) -> Result<(), String> {
    ensure_initialized()?;
    log::info!("{}", message);
    Ok(())
}

pub fn error(message: &str) -> Result<(), String> {
    ensure_initialized()?;
    log::error!("{}", message);
    Ok(())
}
