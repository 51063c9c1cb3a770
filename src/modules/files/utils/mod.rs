//! Utility functions for file operations

pub mod atomic;
pub mod backup;
pub mod checksum;
pub mod permissions;

pub use atomic::*;
pub use backup::*;
pub use checksum::*;
pub use permissions::*;

use thiserror::Error;

/// Common file operation errors
#[derive(Error, Debug)]
pub enum FileError {
    #[error("Invalid target path: {path}")]
    InvalidPath { path: String },

    #[error("Temporary file already closed: {path}")]
    Closed { path: String },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}
