use chrono::Local;
use std::fs::{create_dir_all, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::settings;

pub struct Logger {
    log_path: PathBuf,
}

impl Logger {
    pub fn new() -> Self {
        let log_dir = Self::get_log_dir();
        let log_path = log_dir.join("pipdeck.log");

        if let Err(e) = create_dir_all(&log_dir) {
            eprintln!("Failed to create log directory: {}", e);
        }

        Self { log_path }
    }

    fn get_log_dir() -> PathBuf {
        // ~/.local/share/pipdeck on most systems
        if let Some(data_dir) = dirs::data_local_dir() {
            data_dir.join("pipdeck")
        } else {
            std::env::temp_dir().join("pipdeck")
        }
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        if !level.enabled_for(&settings::get().log_level) {
            return;
        }

        self.rotate_if_needed();

        let log_entry = format_entry(level, message);

        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
        {
            let _ = file.write_all(log_entry.as_bytes());
        }

        if matches!(level, LogLevel::Error | LogLevel::Warning) {
            eprint!("{}", log_entry);
        }
    }

    fn rotate_if_needed(&self) {
        let max_mb = settings::get().max_log_size_mb.max(1);
        let max_bytes = max_mb * 1024 * 1024;

        if let Ok(meta) = std::fs::metadata(&self.log_path) {
            if meta.len() <= max_bytes {
                return;
            }

            let rotated = self.log_path.with_extension("log.1");
            let _ = std::fs::remove_file(&rotated);
            let _ = std::fs::rename(&self.log_path, rotated);
        }
    }
}

fn format_entry(level: LogLevel, message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    format!("[{}] {}: {}\n", timestamp, level.as_str(), message)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Debug,
}

impl LogLevel {
    fn as_str(&self) -> &str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Debug => "DEBUG",
        }
    }

    fn rank(&self) -> i32 {
        match self {
            LogLevel::Error => 0,
            LogLevel::Warning => 1,
            LogLevel::Info => 2,
            LogLevel::Debug => 3,
        }
    }

    /// Unknown level names behave like "info".
    fn enabled_for(&self, configured: &str) -> bool {
        let threshold = match configured {
            "error" => 0,
            "warn" => 1,
            "info" => 2,
            "debug" => 3,
            _ => 2,
        };
        self.rank() <= threshold
    }
}

static LOGGER: OnceLock<Logger> = OnceLock::new();

pub fn get_logger() -> &'static Logger {
    LOGGER.get_or_init(Logger::new)
}

pub fn log_info(message: &str) {
    get_logger().log(LogLevel::Info, message);
}

pub fn log_warning(message: &str) {
    get_logger().log(LogLevel::Warning, message);
}

pub fn log_error(message: &str) {
    get_logger().log(LogLevel::Error, message);
}

pub fn log_debug(message: &str) {
    get_logger().log(LogLevel::Debug, message);
}
