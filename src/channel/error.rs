use std::io::ErrorKind;
use thiserror::Error;

/// Errors raised by execution and file channels before a command produces an exit code
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid command: {reason}")]
    InvalidCommand { reason: String },

    #[error("Command timed out after {seconds}s: {command}")]
    Timeout { command: String, seconds: u64 },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File transfer failed for {path}: {reason}")]
    Transfer { path: String, reason: String },

    #[error("Remote operation failed: {0}")]
    Remote(String),
}

impl ChannelError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        ChannelError::Io {
            path: path.into(),
            source,
        }
    }

    /// Exit code a POSIX shell would report for the same failure.
    ///
    /// Keeps native spawn failures and raw `sh` failures on the same rc.
    pub fn shell_exit_code(&self) -> Option<i32> {
        match self {
            ChannelError::Spawn { source, .. } => match source.kind() {
                ErrorKind::NotFound => Some(127),
                ErrorKind::PermissionDenied => Some(126),
                _ => None,
            },
            _ => None,
        }
    }
}
