use thiserror::Error;

use crate::channel::ChannelError;
use crate::modules::files::utils::FileError;

/// Errors that can occur during module operations
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("Module not found: {name}")]
    ModuleNotFound { name: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("File operation failed: {0}")]
    File(#[from] FileError),

    #[error("Module execution failed: {message}")]
    ExecutionFailed { message: String },
}

/// Errors raised while validating module arguments, before any side effect
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("missing required arguments: {arg}")]
    MissingRequiredArg { arg: String },

    #[error("One of {} is required", quote_list(.args))]
    MissingOneOf { args: Vec<String> },

    #[error("Invalid argument value: {arg} = {value} - {reason}")]
    InvalidArgValue {
        arg: String,
        value: String,
        reason: String,
    },

    #[error("Only one of {} can be specified", quote_list(.args))]
    MutuallyExclusive { args: Vec<String> },

    #[error("Invalid {arg} pattern: {pattern}: {source}")]
    InvalidPattern {
        arg: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("{message}")]
    Requirement { message: String },

    #[error("{message}")]
    Unsupported { message: String },
}

impl ValidationError {
    pub fn exclusive(args: &[&str]) -> Self {
        ValidationError::MutuallyExclusive {
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn one_of(args: &[&str]) -> Self {
        ValidationError::MissingOneOf {
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn requirement(message: impl Into<String>) -> Self {
        ValidationError::Requirement {
            message: message.into(),
        }
    }
}

fn quote_list(args: &[String]) -> String {
    let quoted: Vec<String> = args.iter().map(|a| format!("'{a}'")).collect();
    match quoted.split_last() {
        Some((last, rest)) if !rest.is_empty() => format!("{} or {}", rest.join(", "), last),
        Some((last, _)) => last.clone(),
        None => String::new(),
    }
}
