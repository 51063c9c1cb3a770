//! Core execution modules

pub mod command;
pub mod expand;
pub mod runner;

pub use command::{CommandArgs, CommandModule, CommandRequest, CommandSpec};
pub use runner::{runner_for, CommandRunner, NativeRunner, RawRunner};
