use crate::error::{DetailsUnavailable, FetchError, UninstallError};
use crate::logger::{log_debug, log_error, log_info};
use serde::Deserialize;
use std::collections::HashSet;
use std::process::{Command, Output};

/// One entry of `pip list --format=json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListedPackage {
    pub name: String,
    pub version: String,
}

/// The operations the app needs from a package manager.
pub trait PackageManager: Send + Sync {
    fn list_installed(&self) -> Result<Vec<ListedPackage>, FetchError>;
    fn show(&self, name: &str) -> Result<String, DetailsUnavailable>;
    fn uninstall(&self, name: &str) -> Result<(), UninstallError>;
}

pub struct PipBackend {
    argv: Vec<String>,
}

impl PipBackend {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }

    pub fn from_settings() -> Self {
        Self::new(crate::settings::get().pip_argv())
    }

    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("pip")
    }

    pub fn is_available(&self) -> bool {
        crate::utils::command_exists(self.program())
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(self.program());
        cmd.args(&self.argv[1.min(self.argv.len())..])
            .args(args)
            .env("PIP_DISABLE_PIP_VERSION_CHECK", "1")
            .env("PYTHONIOENCODING", "utf-8");
        cmd
    }

    fn run(&self, args: &[&str]) -> std::io::Result<Output> {
        log_debug(&format!("Running {} {}", self.argv.join(" "), args.join(" ")));
        self.command(args).output()
    }
}

impl PackageManager for PipBackend {
    fn list_installed(&self) -> Result<Vec<ListedPackage>, FetchError> {
        let output = self
            .run(&["list", "--format=json"])
            .map_err(|source| {
                log_error(&format!("Failed to execute {}: {}", self.program(), source));
                FetchError::Spawn {
                    program: self.program().to_string(),
                    source,
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            log_error(&format!("pip list failed: {}", stderr));
            return Err(FetchError::CommandFailed {
                code: output.status.code(),
                stderr,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let packages = parse_list_output(&stdout)?;
        log_info(&format!("pip list returned {} packages", packages.len()));
        Ok(packages)
    }

    fn show(&self, name: &str) -> Result<String, DetailsUnavailable> {
        let unavailable = |reason: String| DetailsUnavailable {
            name: name.to_string(),
            reason,
        };

        let output = self
            .run(&["show", name])
            .map_err(|e| unavailable(format!("failed to execute {}: {}", self.program(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(unavailable(stderr.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if stdout.trim().is_empty() {
            return Err(unavailable("empty output".to_string()));
        }
        Ok(stdout)
    }

    fn uninstall(&self, name: &str) -> Result<(), UninstallError> {
        log_info(&format!("Uninstalling package: {}", name));

        let output = self
            .run(&["uninstall", "-y", name])
            .map_err(|source| UninstallError::Spawn {
                program: self.program().to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            log_error(&format!("Failed to uninstall {}: {}", name, stderr));
            return Err(UninstallError::CommandFailed {
                name: name.to_string(),
                code: output.status.code(),
                stderr,
            });
        }

        log_info(&format!("Successfully uninstalled package: {}", name));
        Ok(())
    }
}

/// Parses `pip list --format=json`. Later duplicates of a name are dropped.
pub fn parse_list_output(stdout: &str) -> Result<Vec<ListedPackage>, FetchError> {
    // pip may print notices before the JSON array when the version check is not disabled
    let json = match stdout.find('[') {
        Some(start) => &stdout[start..],
        None => return Err(FetchError::Parse("no JSON array in output".to_string())),
    };

    let listed: Vec<ListedPackage> =
        serde_json::from_str(json.trim()).map_err(|e| FetchError::Parse(e.to_string()))?;

    let mut seen = HashSet::new();
    Ok(listed
        .into_iter()
        .filter(|pkg| seen.insert(pkg.name.to_lowercase()))
        .collect())
}
