//! Runtime configuration loaded from YAML

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::channel::{Channel, LocalChannel, SshChannel};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "RUSTLE_POSIX_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Whether the native runtime understands `expand_argument_vars`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgumentVarsSupport {
    #[default]
    Supported,
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshConfig {
    pub host: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    /// Extra `-o` options passed to ssh and scp
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PosixConfig {
    /// Interpreter whose presence enables native mode
    pub native_runtime: String,
    pub probe_timeout_secs: u64,
    pub command_timeout_secs: Option<u64>,
    pub argument_vars: ArgumentVarsSupport,
    pub ssh: Option<SshConfig>,
}

impl Default for PosixConfig {
    fn default() -> Self {
        Self {
            native_runtime: "python3".to_string(),
            probe_timeout_secs: 10,
            command_timeout_secs: None,
            argument_vars: ArgumentVarsSupport::Supported,
            ssh: None,
        }
    }
}

impl PosixConfig {
    /// `$RUSTLE_POSIX_CONFIG`, else `<config dir>/rustle-posix/config.yml`
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("rustle-posix").join("config.yml"))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Load an explicit file, or the default location when it exists
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => {
                debug!("Loading config from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.native_runtime.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "native_runtime must not be empty".to_string(),
            ));
        }
        if self.probe_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "probe_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }

    /// Channel to the configured target. `host` overrides the ssh host;
    /// `localhost` or no ssh section means the local machine.
    pub fn build_channel(&self, host: Option<&str>) -> Arc<dyn Channel> {
        let ssh = match (host, &self.ssh) {
            (Some("localhost"), _) | (Some("127.0.0.1"), _) => None,
            (Some(host), Some(ssh)) => Some(SshConfig {
                host: host.to_string(),
                ..ssh.clone()
            }),
            (Some(host), None) => Some(SshConfig {
                host: host.to_string(),
                user: None,
                port: None,
                options: Vec::new(),
            }),
            (None, ssh) => ssh.clone(),
        };

        match ssh {
            Some(ssh) => Arc::new(
                SshChannel::new(ssh.host)
                    .with_user(ssh.user)
                    .with_port(ssh.port)
                    .with_options(ssh.options)
                    .with_timeout(self.command_timeout()),
            ),
            None => Arc::new(LocalChannel::new().with_timeout(self.command_timeout())),
        }
    }
}
