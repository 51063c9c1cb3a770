//! Execution modules with a raw POSIX shell fallback

pub mod core;
pub mod error;
pub mod files;
pub mod interface;
pub mod probe;
pub mod registry;

// Re-export commonly used types
pub use error::*;
pub use interface::*;
pub use probe::{probe, select_mode, ProbeReport};
pub use registry::ModuleRegistry;
