pub mod file;

use crate::file::DailyFile;
#[cfg(feature = "color")]
use colored::*;
use log::{Level, Log, Metadata, Record, SetLoggerError, error, info, warn};
use serde::de::Error as SerdeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};
use tokio::sync::broadcast::{Receiver, Sender};

const TIMESTAMP_FORMAT_LOCAL: &[FormatItem] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]");
const TIMESTAMP_FORMAT_OFFSET: &[FormatItem] = format_description!(
    "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3][offset_hour sign:mandatory]:[offset_minute]"
);
const TIMESTAMP_FORMAT_UTC: &[FormatItem] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]Z");

pub const FRONTEND_TARGET: &str = "frontend";
pub const DEFAULT_RETENTION_DAYS: u32 = 7;
pub const DEFAULT_RECENT_EVENTS: usize = 256;

pub enum TimestampFormat {
    Local,
    Offset,
    UTC,
    Relative,
}

pub struct FarmdeskLogger {
    pub use_colors: bool,
    pub show_timestamp: bool,
    pub show_target: bool,
    pub current_level: Level,
    pub timestamp_format: TimestampFormat,
    pub target_levels: Vec<(String, Level)>,
    pub start_instant: Instant,
    pub printed_error: AtomicBool,
    pub recent: Mutex<VecDeque<LogEvent>>,
    pub recent_depth: usize,
    pub file: Option<Mutex<DailyFile>>,
    pub channel: Sender<LogEvent>,
}

pub struct FarmdeskLoggerBuilder {
    use_colors: bool,
    show_timestamp: bool,
    show_target: bool,
    current_level: Level,
    timestamp_format: TimestampFormat,
    target_levels: Vec<(String, Level)>,
    log_dir: Option<PathBuf>,
    file_prefix: String,
    retention_days: u32,
    recent_depth: usize,
}

impl Default for FarmdeskLoggerBuilder {
    fn default() -> Self {
        Self {
            use_colors: true,
            show_timestamp: true,
            show_target: true,
            timestamp_format: TimestampFormat::Local,
            current_level: Level::Info,
            target_levels: vec![],
            log_dir: None,
            file_prefix: "farmdesk".to_string(),
            retention_days: DEFAULT_RETENTION_DAYS,
            recent_depth: DEFAULT_RECENT_EVENTS,
        }
    }
}

impl FarmdeskLoggerBuilder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn use_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }
    pub fn show_timestamp(mut self, show_timestamp: bool) -> Self {
        self.show_timestamp = show_timestamp;
        self
    }
    pub fn show_target(mut self, show_target: bool) -> Self {
        self.show_target = show_target;
        self
    }
    pub fn timestamp_format(mut self, timestamp_format: TimestampFormat) -> Self {
        self.timestamp_format = timestamp_format;
        self
    }
    pub fn current_level(mut self, current_level: Level) -> Self {
        self.current_level = current_level;
        self
    }
    pub fn with_target_level(mut self, target: &str, current_level: Level) -> Self {
        self.target_levels.push((target.to_string(), current_level));
        self
    }
    /// Also write every enabled line to a daily file in `dir`.
    pub fn log_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.log_dir = Some(dir.as_ref().to_path_buf());
        self
    }
    pub fn file_prefix(mut self, prefix: &str) -> Self {
        self.file_prefix = prefix.to_string();
        self
    }
    pub fn retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }
    pub fn recent_depth(mut self, depth: usize) -> Self {
        self.recent_depth = depth;
        self
    }
    pub fn build(mut self) -> FarmdeskLogger {
        self.target_levels.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        FarmdeskLogger {
            use_colors: self.use_colors,
            show_timestamp: self.show_timestamp,
            show_target: self.show_target,
            current_level: self.current_level,
            timestamp_format: self.timestamp_format,
            target_levels: self.target_levels,
            start_instant: Instant::now(),
            printed_error: AtomicBool::new(false),
            recent: Mutex::new(VecDeque::with_capacity(self.recent_depth)),
            recent_depth: self.recent_depth,
            file: self.log_dir.map(|dir| {
                Mutex::new(DailyFile::new(dir, &self.file_prefix, self.retention_days))
            }),
            channel: Sender::new(1024),
        }
    }
    pub fn init(self) -> Result<Arc<FarmdeskLogger>, SetLoggerError> {
        self.build().init()
    }
}

impl FarmdeskLogger {
    pub fn build() -> FarmdeskLoggerBuilder {
        FarmdeskLoggerBuilder::new()
    }
    pub fn init(self) -> Result<Arc<Self>, SetLoggerError> {
        let logger = Arc::new(self);
        // SAFETY: the cloned Arc is leaked so the pointee outlives every use of the
        // 'static reference handed to `log`, which keeps it for the rest of the process.
        let static_logger: &'static Self = unsafe { &*Arc::into_raw(logger.clone()) };
        log::set_logger(static_logger).map(|_| {
            log::set_max_level(logger.max_level().to_level_filter());
            logger
        })
    }
    pub fn subscribe(&self) -> Receiver<LogEvent> {
        self.channel.subscribe()
    }
    /// Most recent events, oldest first.
    pub fn recent_events(&self) -> Vec<LogEvent> {
        match self.recent.lock() {
            Ok(recent) => recent.iter().cloned().collect(),
            Err(_) => vec![],
        }
    }
    fn max_level(&self) -> Level {
        self.target_levels
            .iter()
            .map(|(_, l)| *l)
            .fold(self.current_level, |a, b| a.max(b))
    }
    fn level_for(&self, target: &str) -> Level {
        self.target_levels
            .iter()
            .find(|(pattern, _)| target.starts_with(pattern))
            .map(|(_, level)| *level)
            .unwrap_or(self.current_level)
    }
    fn now(&self) -> OffsetDateTime {
        match self.timestamp_format {
            TimestampFormat::Local | TimestampFormat::Offset => match OffsetDateTime::now_local() {
                Ok(local) => local,
                Err(_) => {
                    if !self.printed_error.swap(true, Ordering::SeqCst) {
                        eprintln!("Failed to detect Local Offset, Defaulting to UTC");
                    }
                    OffsetDateTime::now_utc()
                }
            },
            _ => OffsetDateTime::now_utc(),
        }
    }
    fn format_timestamp(&self, timestamp: &OffsetDateTime) -> String {
        match self.timestamp_format {
            TimestampFormat::Offset => timestamp.format(&TIMESTAMP_FORMAT_OFFSET),
            TimestampFormat::Local => timestamp.format(&TIMESTAMP_FORMAT_LOCAL),
            TimestampFormat::UTC => timestamp.format(&TIMESTAMP_FORMAT_UTC),
            TimestampFormat::Relative => {
                let duration = Instant::now().duration_since(self.start_instant);
                let total_seconds = duration.as_secs();
                return format!(
                    "{:02}:{:02}:{:02}.{:03}",
                    total_seconds / 3600,
                    (total_seconds % 3600) / 60,
                    total_seconds % 60,
                    duration.subsec_millis()
                );
            }
        }
        .unwrap_or_default()
    }
    fn remember(&self, event: &LogEvent) {
        if let Ok(mut recent) = self.recent.lock() {
            if recent.len() >= self.recent_depth {
                recent.pop_front();
            }
            if self.recent_depth > 0 {
                recent.push_back(event.clone());
            }
        }
    }
}

#[cfg(feature = "color")]
fn colorize(level: Level, level_str: String) -> String {
    match level {
        Level::Error => level_str.red().to_string(),
        Level::Warn => level_str.yellow().to_string(),
        Level::Info => level_str.cyan().to_string(),
        Level::Debug => level_str.purple().to_string(),
        Level::Trace => level_str.magenta().to_string(),
    }
}

#[cfg(not(feature = "color"))]
fn colorize(_level: Level, level_str: String) -> String {
    level_str
}

pub fn serialize_level<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&level.to_string().to_lowercase())
}

pub fn parse_level(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(Level::Error),
        "warn" | "warning" => Some(Level::Warn),
        "info" => Some(Level::Info),
        "debug" => Some(Level::Debug),
        "trace" => Some(Level::Trace),
        _ => None,
    }
}

pub fn deserialize_level<'de, D>(deserializer: D) -> Result<Level, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_level(&s).ok_or_else(|| D::Error::custom(format!("Unknown log level: {s}")))
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogEvent {
    #[serde(
        serialize_with = "serialize_level",
        deserialize_with = "deserialize_level"
    )]
    pub level: Level,
    pub target: String,
    pub message: String,
    pub timestamp: OffsetDateTime,
}

impl Log for FarmdeskLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level_for(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let log_event = LogEvent {
            level: record.level(),
            target: if record.target().is_empty() {
                record.module_path().unwrap_or_default()
            } else {
                record.target()
            }
            .to_string(),
            message: record.args().to_string(),
            timestamp: self.now(),
        };
        let timestamp = if self.show_timestamp {
            format!("{} ", self.format_timestamp(&log_event.timestamp))
        } else {
            String::new()
        };
        let level_str = format!("{:<5}", log_event.level.to_string());
        let target_module = if self.show_target {
            log_event.target.as_str()
        } else {
            ""
        };
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let line = format!("{timestamp}{level_str} [{target_module}] {}", log_event.message);
                if let Err(e) = file.write_line(log_event.timestamp.date(), &line) {
                    if !self.printed_error.swap(true, Ordering::SeqCst) {
                        eprintln!("Failed to write log file: {e}");
                    }
                }
            }
        }
        let level_prefix = if self.use_colors {
            colorize(record.level(), level_str)
        } else {
            level_str
        };
        println!(
            "{}{} [{}] {}",
            timestamp, level_prefix, target_module, log_event.message
        );
        self.remember(&log_event);
        let _ = self.channel.send(log_event);
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
    }
}

/// Records an error reported by the UI layer.
pub fn log_frontend_error(message: &str) {
    error!(target: FRONTEND_TARGET, "{message}");
}

pub fn log_frontend_info(message: &str) {
    info!(target: FRONTEND_TARGET, "{message}");
}

pub fn log_frontend_warn(message: &str) {
    warn!(target: FRONTEND_TARGET, "{message}");
}
