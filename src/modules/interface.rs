//! Module interface traits and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use similar::TextDiff;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::channel::{Channel, LocalChannel};
use crate::config::PosixConfig;
use crate::modules::error::{ModuleError, ValidationError};

/// Unified interface for all execution modules
#[async_trait]
pub trait ExecutionModule: Send + Sync {
    /// Module name (e.g., "command", "slurp")
    fn name(&self) -> &'static str;

    /// Alternate names the registry also resolves
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    /// Module version
    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Execute the module with given arguments
    async fn execute(
        &self,
        args: &ModuleArgs,
        context: &ExecutionContext,
    ) -> Result<ModuleResult, ModuleError>;

    /// Validate module arguments before execution
    fn validate_args(&self, args: &ModuleArgs) -> Result<(), ValidationError>;

    /// Run every decision without mutating the target
    async fn check_mode(
        &self,
        args: &ModuleArgs,
        context: &ExecutionContext,
    ) -> Result<ModuleResult, ModuleError> {
        let context = context.clone().with_check_mode(true);
        self.execute(args, &context).await
    }

    /// Get module documentation
    fn documentation(&self) -> ModuleDocumentation;
}

/// Which execution path served an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecMode {
    /// Structured channel calls, available when the native runtime is present
    Native,
    /// POSIX shell one-liners only
    Raw,
}

impl ExecMode {
    pub fn is_raw(self) -> bool {
        self == ExecMode::Raw
    }
}

impl fmt::Display for ExecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecMode::Native => write!(f, "native"),
            ExecMode::Raw => write!(f, "raw"),
        }
    }
}

/// Module execution arguments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleArgs {
    pub args: HashMap<String, Value>,
}

impl ModuleArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(args: HashMap<String, Value>) -> Self {
        Self { args }
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.args.insert(key.to_string(), value.into());
        self
    }

    /// First non-null value among `names`, with the name that matched
    pub fn lookup(&self, names: &[&str]) -> Option<(String, &Value)> {
        names.iter().find_map(|name| match self.args.get(*name) {
            Some(Value::Null) | None => None,
            Some(value) => Some((name.to_string(), value)),
        })
    }

    pub fn get_string(&self, names: &[&str]) -> Result<Option<String>, ValidationError> {
        match self.lookup(names) {
            None => Ok(None),
            Some((_, Value::String(s))) => Ok(Some(s.clone())),
            Some((_, Value::Number(n))) => Ok(Some(n.to_string())),
            Some((_, Value::Bool(b))) => Ok(Some(b.to_string())),
            Some((name, other)) => Err(ValidationError::InvalidArgValue {
                arg: name,
                value: other.to_string(),
                reason: "expected a string".to_string(),
            }),
        }
    }

    /// Boolean argument accepting the usual YAML spellings
    pub fn get_bool(&self, names: &[&str]) -> Result<Option<bool>, ValidationError> {
        let Some((name, value)) = self.lookup(names) else {
            return Ok(None);
        };

        let parsed = match value {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Some(false),
                Some(1) => Some(true),
                _ => None,
            },
            Value::String(s) => match s.to_lowercase().as_str() {
                "yes" | "on" | "true" | "1" | "y" | "t" => Some(true),
                "no" | "off" | "false" | "0" | "n" | "f" => Some(false),
                _ => None,
            },
            _ => None,
        };

        parsed.map(Some).ok_or_else(|| ValidationError::InvalidArgValue {
            arg: name,
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        })
    }

    pub fn get_string_list(&self, names: &[&str]) -> Result<Option<Vec<String>>, ValidationError> {
        match self.lookup(names) {
            None => Ok(None),
            Some((_, Value::Array(items))) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    Value::Number(n) => Ok(n.to_string()),
                    Value::Bool(b) => Ok(b.to_string()),
                    other => Err(ValidationError::InvalidArgValue {
                        arg: names[0].to_string(),
                        value: other.to_string(),
                        reason: "list items must be scalars".to_string(),
                    }),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some((name, other)) => Err(ValidationError::InvalidArgValue {
                arg: name,
                value: other.to_string(),
                reason: "expected a list".to_string(),
            }),
        }
    }

    /// Tri-state `_force_raw`: `None` leaves the choice to the prober
    pub fn force_raw(&self) -> Result<Option<bool>, ValidationError> {
        self.get_bool(&["_force_raw"])
    }
}

/// Module execution context
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub host_info: HostInfo,
    pub channel: Arc<dyn Channel>,
    /// Extra environment exported to commands and used for argument expansion
    pub environment: HashMap<String, String>,
    pub check_mode: bool,
    pub diff_mode: bool,
    pub verbosity: u8,
    pub config: Arc<PosixConfig>,
}

impl ExecutionContext {
    pub fn new(channel: Arc<dyn Channel>, config: PosixConfig) -> Self {
        let host_info = HostInfo::for_host(channel.host());
        Self {
            host_info,
            channel,
            environment: HashMap::new(),
            check_mode: false,
            diff_mode: false,
            verbosity: 0,
            config: Arc::new(config),
        }
    }

    /// Context targeting the local machine with default configuration
    pub fn local() -> Self {
        Self::new(Arc::new(LocalChannel::new()), PosixConfig::default())
    }

    pub fn with_check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    pub fn with_diff_mode(mut self, diff_mode: bool) -> Self {
        self.diff_mode = diff_mode;
        self
    }

    pub fn with_environment(mut self, environment: HashMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }
}

#[derive(Debug, Clone)]
pub struct HostInfo {
    pub hostname: String,
    pub local: bool,
}

impl HostInfo {
    pub fn detect() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            hostname,
            local: true,
        }
    }

    /// Host facts for a channel target; remote hosts are only known by name
    pub fn for_host(host: &str) -> Self {
        if host == "localhost" {
            return Self::detect();
        }
        Self {
            hostname: host.to_string(),
            local: false,
        }
    }
}

/// Module execution result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleResult {
    pub changed: bool,
    pub failed: bool,
    pub msg: Option<String>,
    pub rc: Option<i32>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    #[serde(default)]
    pub stdout_lines: Vec<String>,
    #[serde(default)]
    pub stderr_lines: Vec<String>,
    /// Whether the raw fallback served this result
    pub raw: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<Diff>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(flatten)]
    pub results: HashMap<String, Value>,
}

impl ModuleResult {
    pub fn new(mode: ExecMode) -> Self {
        Self {
            raw: mode.is_raw(),
            ..Default::default()
        }
    }

    pub fn failure(mode: ExecMode, msg: impl Into<String>) -> Self {
        let mut result = Self::new(mode);
        result.fail(msg);
        result
    }

    pub fn fail(&mut self, msg: impl Into<String>) {
        self.failed = true;
        self.msg = Some(msg.into());
    }

    /// Record process output; the `*_lines` fields always follow
    pub fn set_output(&mut self, rc: i32, stdout: String, stderr: String) {
        self.rc = Some(rc);
        self.stdout_lines = stdout.lines().map(str::to_string).collect();
        self.stderr_lines = stderr.lines().map(str::to_string).collect();
        self.stdout = Some(stdout);
        self.stderr = Some(stderr);
    }

    pub fn insert_result(&mut self, key: &str, value: impl Into<Value>) {
        self.results.insert(key.to_string(), value.into());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    pub before: Option<String>,
    pub after: Option<String>,
    pub before_header: Option<String>,
    pub after_header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unified_diff: Option<String>,
}

impl Diff {
    /// Before/after content of `path` with a unified diff between them
    pub fn between(path: &str, before: &str, after: &str) -> Self {
        let unified_diff = TextDiff::from_lines(before, after)
            .unified_diff()
            .header(path, path)
            .to_string();
        Self {
            before: Some(before.to_string()),
            after: Some(after.to_string()),
            before_header: Some(path.to_string()),
            after_header: Some(path.to_string()),
            unified_diff: Some(unified_diff),
        }
    }
}

/// Module documentation
#[derive(Debug, Clone)]
pub struct ModuleDocumentation {
    pub description: String,
    pub arguments: Vec<ArgumentSpec>,
    pub examples: Vec<String>,
    pub return_values: Vec<ReturnValueSpec>,
}

#[derive(Debug, Clone)]
pub struct ArgumentSpec {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub argument_type: String,
    pub default: Option<String>,
}

impl ArgumentSpec {
    pub fn new(name: &str, argument_type: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            required: false,
            argument_type: argument_type.to_string(),
            default: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }
}

#[derive(Debug, Clone)]
pub struct ReturnValueSpec {
    pub name: String,
    pub description: String,
    pub returned: String,
    pub value_type: String,
}

impl ReturnValueSpec {
    pub fn new(name: &str, value_type: &str, returned: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            returned: returned.to_string(),
            value_type: value_type.to_string(),
        }
    }
}
