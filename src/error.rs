use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the profile store, session state and activation core.
///
/// The command layer wraps these in `anyhow::Error`; none of them is fatal
/// beyond the current invocation.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Profile '{0}' not found")]
    ProfileNotFound(String),

    #[error("Storage unavailable at {path:?}: {source}")]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Reachability check failed: {0}")]
    ReachabilityCheckFailed(String),

    #[error("No profiles available")]
    NoProfilesAvailable,

    #[error(
        "Invalid profile name '{0}'. Only alphanumeric characters, dots, hyphens (-), and underscores (_) are allowed."
    )]
    InvalidProfileName(String),

    #[error("Invalid config file {path:?}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },
}

impl ProxyError {
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StorageUnavailable {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
