use thiserror::Error;

/// Listing installed packages failed. The previous record set stays in place.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Package listing failed (exit code {}): {stderr}", display_code(.code))]
    CommandFailed { code: Option<i32>, stderr: String },

    #[error("Could not parse package listing: {0}")]
    Parse(String),
}

/// Removing a package failed. Nothing was changed.
#[derive(Debug, Error)]
pub enum UninstallError {
    #[error("Failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to uninstall {name} (exit code {}): {stderr}", display_code(.code))]
    CommandFailed {
        name: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// `pip show` had nothing to say about a package. Callers fall back to a fixed text.
#[derive(Debug, Error)]
#[error("No details available for {name}: {reason}")]
pub struct DetailsUnavailable {
    pub name: String,
    pub reason: String,
}

fn display_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}
