use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::cli::options::ExecutionOptions;
use crate::config::{ConfigError, PosixConfig};
use crate::modules::{probe, ExecutionContext, ModuleArgs, ModuleRegistry, ModuleResult, ProbeReport};

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid module argument '{arg}': expected KEY=VALUE")]
    InvalidArgument { arg: String },

    #[error("Invalid --args-json: {0}")]
    ArgsJson(#[from] serde_json::Error),

    #[error("--args-json must be a JSON object")]
    ArgsNotObject,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Module not found: {name}")]
    UnknownModule { name: String },
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Main rustle-posix CLI implementation
pub struct RustlePosixCliImpl {
    registry: ModuleRegistry,
    context: ExecutionContext,
}

impl RustlePosixCliImpl {
    pub fn new(options: &ExecutionOptions) -> Result<Self> {
        let config = PosixConfig::discover(options.config.as_deref())?;
        config.validate()?;
        Ok(Self::with_config(options, config))
    }

    pub fn with_config(options: &ExecutionOptions, config: PosixConfig) -> Self {
        let channel = config.build_channel(options.host.as_deref());
        let context = ExecutionContext::new(channel, config)
            .with_check_mode(options.check)
            .with_diff_mode(options.diff)
            .with_verbosity(options.verbosity);
        info!(
            "Targeting {} (check_mode={}, diff_mode={})",
            context.host_info.hostname, context.check_mode, context.diff_mode
        );

        Self {
            registry: ModuleRegistry::with_core_modules(),
            context,
        }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub async fn run_module(&self, module: &str, args: &ModuleArgs) -> ModuleResult {
        debug!("Running module {} with {} argument(s)", module, args.args.len());
        self.registry.run(module, args, &self.context).await
    }

    pub async fn probe(&self) -> ProbeReport {
        probe(self.context.channel.as_ref(), &self.context.config).await
    }
}

/// Merge `--args-json` with repeated `KEY=VALUE` pairs; pairs win
pub fn parse_module_args(pairs: &[String], json: Option<&str>) -> Result<ModuleArgs> {
    let mut args: HashMap<String, Value> = match json {
        Some(json) => match serde_json::from_str(json)? {
            Value::Object(map) => map.into_iter().collect(),
            _ => return Err(CliError::ArgsNotObject),
        },
        None => HashMap::new(),
    };

    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .filter(|(key, _)| !key.is_empty())
            .ok_or_else(|| CliError::InvalidArgument { arg: pair.clone() })?;
        args.insert(key.to_string(), parse_scalar(value));
    }

    Ok(ModuleArgs::from_map(args))
}

/// Booleans and flow sequences are typed, anything else stays the literal string
fn parse_scalar(value: &str) -> Value {
    if value.trim_start().starts_with('[') {
        if let Ok(items) = serde_yaml::from_str::<Vec<String>>(value) {
            return Value::from(items);
        }
    }
    match serde_yaml::from_str::<Value>(value) {
        Ok(parsed @ Value::Bool(_)) => parsed,
        _ => Value::String(value.to_string()),
    }
}
