//! Error taxonomy for module synchronization.
//!
//! Only the variants below abort the *current* module. Dirty working copies and
//! failed fast-forward pulls are reported as [`crate::module::Status::Skipped`]
//! or as warnings, never as errors.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// A module was handed to a synchronizer that does not own its source.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Path for {name} doesn't contain a module: {}", path.display())]
    MissingModule { name: String, path: PathBuf },

    #[error("No cached checkout for {name}; fetch the source first")]
    CacheMiss { name: String },

    #[error("Unable to parse {}: {source}", path.display())]
    MetadataParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Legacy manifest {} is invalid: {message}", path.display())]
    LegacyFormat { path: PathBuf, message: String },

    #[error(transparent)]
    Command(#[from] CommandFailure),

    #[error("Failed to sync {name}: {message}")]
    Sync { name: String, message: String },

    #[error("Invalid version requirement '{input}': {message}")]
    Requirement { input: String, message: String },

    #[error("Failed to evaluate {}: {message}", path.display())]
    Specfile { path: PathBuf, message: String },

    #[error(transparent)]
    Git(#[from] git2::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn sync(name: impl fmt::Display, message: impl fmt::Display) -> Self {
        Error::Sync {
            name: name.to_string(),
            message: message.to_string(),
        }
    }
}

/// A version-control command that exited non-zero or ran past its timeout.
///
/// `output` holds stdout followed by stderr so callers can classify failures by
/// text (see [`CommandFailure::already_exists`]).
#[derive(Debug, Clone, Error)]
pub struct CommandFailure {
    pub command: String,
    pub status: Option<i32>,
    pub output: String,
    pub timed_out: bool,
}

impl CommandFailure {
    /// True when the command failed because the target (e.g. a remote) already exists.
    pub fn already_exists(&self) -> bool {
        self.output.contains("already exists")
    }
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.timed_out {
            return write!(f, "`{}` timed out", self.command);
        }
        match self.status {
            Some(code) => write!(f, "`{}` exited with status {}", self.command, code)?,
            None => write!(f, "`{}` was terminated", self.command)?,
        }
        let output = self.output.trim();
        if !output.is_empty() {
            write!(f, ": {}", output)?;
        }
        Ok(())
    }
}
