use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::OnceLock;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AppSettings {
    pub pip_command: String, // split on whitespace, e.g. "python3 -m pip"
    pub python_command: String,
    pub probe_imports: bool,
    pub search_url: String, // "{query}" is replaced with the encoded query
    pub theme: String,      // "default", "light", "dark"
    pub log_level: String,  // error, warn, info, debug
    pub max_log_size_mb: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            pip_command: "python3 -m pip".to_string(),
            python_command: "python3".to_string(),
            probe_imports: true,
            search_url: "https://www.google.com/search?q={query}".to_string(),
            theme: "default".to_string(),
            log_level: "info".to_string(),
            max_log_size_mb: 10,
        }
    }
}

impl AppSettings {
    /// The pip command line as program + leading arguments.
    pub fn pip_argv(&self) -> Vec<String> {
        let argv: Vec<String> = self
            .pip_command
            .split_whitespace()
            .map(ToString::to_string)
            .collect();
        if argv.is_empty() {
            vec!["pip".to_string()]
        } else {
            argv
        }
    }
}

pub static SETTINGS: OnceLock<Mutex<AppSettings>> = OnceLock::new();

pub fn init() {
    let settings = load_settings().unwrap_or_default();
    let _ = SETTINGS.set(Mutex::new(settings));
}

pub fn get() -> AppSettings {
    SETTINGS
        .get()
        .and_then(|s| s.lock().ok().map(|cfg| cfg.clone()))
        .unwrap_or_default()
}

fn get_config_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("pipdeck");
    std::fs::create_dir_all(&path).ok();
    path.push("settings.json");
    path
}

fn load_settings() -> Option<AppSettings> {
    let path = get_config_path();
    match fs::read_to_string(&path) {
        Ok(content) => serde_json::from_str(&content).ok(),
        Err(_) => {
            // First run: write the defaults out so they can be edited by hand.
            let defaults = AppSettings::default();
            let _ = save_settings(&defaults);
            Some(defaults)
        }
    }
}

fn save_settings(settings: &AppSettings) -> anyhow::Result<()> {
    let path = get_config_path();
    let content = serde_json::to_string_pretty(settings)?;
    fs::write(path, content)?;
    Ok(())
}
