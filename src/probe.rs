use crate::logger::{log_debug, log_warning};
use std::collections::HashMap;
use std::io::Write;
use std::process::{Command, Stdio};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStatus {
    Loadable,
    NotLoadable,
    ProbeSkipped,
}

impl ImportStatus {
    pub fn label(self) -> &'static str {
        match self {
            ImportStatus::Loadable => "OK",
            ImportStatus::NotLoadable => "Not Functional",
            ImportStatus::ProbeSkipped => "Unknown",
        }
    }
}

/// Answers "can this package be imported?" for a batch of distribution names.
pub trait ImportProber: Send + Sync {
    /// Every name in `names` gets an entry in the result.
    fn probe_all(&self, names: &[String]) -> HashMap<String, ImportStatus>;
}

const MARKER: &str = "@@PIPDECK-PROBE@@";

// Reads module names from stdin, imports each with output captured, then
// prints the marker followed by {module: bool}.
const PROBE_SCRIPT: &str = r#"
import importlib, io, json, sys
names = [line.strip() for line in sys.stdin if line.strip()]
out = sys.stdout
results = {}
for name in names:
    sys.stdout = io.StringIO()
    sys.stderr = io.StringIO()
    try:
        importlib.import_module(name)
        results[name] = True
    except BaseException:
        results[name] = False
sys.stdout = out
sys.stderr = sys.__stderr__
out.write("@@PIPDECK-PROBE@@" + json.dumps(results) + "\n")
out.flush()
"#;

pub struct PythonProber {
    python: String,
    enabled: bool,
}

impl PythonProber {
    pub fn new(python: impl Into<String>, enabled: bool) -> Self {
        Self {
            python: python.into(),
            enabled,
        }
    }

    pub fn from_settings() -> Self {
        let settings = crate::settings::get();
        Self::new(settings.python_command, settings.probe_imports)
    }

    fn run_script(&self, modules: &[&str]) -> Result<String, String> {
        let mut child = Command::new(&self.python)
            .arg("-c")
            .arg(PROBE_SCRIPT)
            .env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| format!("Failed to execute {}: {}", self.python, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            let input = modules.join("\n");
            // An interpreter that exits early closes the pipe; still reap it below.
            if let Err(e) = stdin.write_all(input.as_bytes()) {
                log_warning(&format!("Failed to send module names to {}: {}", self.python, e));
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| format!("Probe interpreter failed: {}", e))?;

        // The marker line is enough even if an import killed the exit status later on.
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl ImportProber for PythonProber {
    fn probe_all(&self, names: &[String]) -> HashMap<String, ImportStatus> {
        let mut statuses: HashMap<String, ImportStatus> = names
            .iter()
            .map(|n| (n.clone(), ImportStatus::ProbeSkipped))
            .collect();

        if !self.enabled {
            log_debug("Import probing disabled in settings");
            return statuses;
        }

        let candidates: Vec<(&String, String)> = names
            .iter()
            .filter_map(|name| module_name_for(name).map(|module| (name, module)))
            .collect();
        if candidates.is_empty() {
            return statuses;
        }

        let modules: Vec<&str> = candidates.iter().map(|(_, m)| m.as_str()).collect();
        let results = match self
            .run_script(&modules)
            .and_then(|stdout| parse_probe_output(&stdout))
        {
            Ok(results) => results,
            Err(e) => {
                log_warning(&format!("Import probe skipped: {}", e));
                return statuses;
            }
        };

        for (name, module) in candidates {
            if let Some(&ok) = results.get(&module) {
                let status = if ok {
                    ImportStatus::Loadable
                } else {
                    ImportStatus::NotLoadable
                };
                statuses.insert(name.clone(), status);
            }
        }
        statuses
    }
}

/// Maps a distribution name to the module the probe imports, or `None` if
/// the result would not be a dotted Python identifier.
pub fn module_name_for(distribution: &str) -> Option<String> {
    let module = distribution.trim().replace('-', "_");
    let valid = !module.is_empty()
        && module.split('.').all(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) if first.is_ascii_alphabetic() || first == '_' => {
                    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
                }
                _ => false,
            }
        });
    valid.then_some(module)
}

pub fn parse_probe_output(stdout: &str) -> Result<HashMap<String, bool>, String> {
    let payload = stdout
        .lines()
        .rev()
        .find_map(|line| line.strip_prefix(MARKER))
        .ok_or_else(|| "probe output has no result line".to_string())?;
    serde_json::from_str(payload).map_err(|e| format!("unreadable probe result: {}", e))
}
