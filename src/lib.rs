//! Rustle POSIX - command execution and line editing with a raw shell fallback
//!
//! Every module runs either natively, through structured channel calls, or in
//! raw mode, where only POSIX shell one-liners reach the target. Both paths
//! return the same [`ModuleResult`] shape.

pub mod channel;
pub mod cli;
pub mod config;
pub mod modules;

pub use channel::{Channel, ExecutionChannel, FileChannel, LocalChannel, SshChannel};
pub use config::PosixConfig;
pub use modules::{ExecMode, ExecutionContext, ModuleArgs, ModuleRegistry, ModuleResult};
