//! Native and raw command runners
//!
//! Both runners answer the same three questions for the command module: does
//! a path exist, is it a directory, and what did the command produce. The
//! native runner uses structured channel calls; the raw runner only sends
//! POSIX shell one-liners.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::command::{CommandRequest, CommandSpec};
use super::expand::expand_argv;
use crate::channel::{Channel, ChannelError, ChannelOutput, ChannelRequest, PathKind};
use crate::modules::interface::ExecMode;

#[async_trait]
pub trait CommandRunner: Send + Sync {
    fn mode(&self) -> ExecMode;

    async fn path_exists(&self, path: &str) -> Result<bool, ChannelError>;

    async fn is_directory(&self, path: &str) -> Result<bool, ChannelError>;

    /// Run the command; `env` is exported to it and feeds native expansion
    async fn run(
        &self,
        request: &CommandRequest,
        env: &HashMap<String, String>,
    ) -> Result<ChannelOutput, ChannelError>;
}

pub fn runner_for<'a>(mode: ExecMode, channel: &'a dyn Channel) -> Box<dyn CommandRunner + 'a> {
    match mode {
        ExecMode::Native => Box::new(NativeRunner { channel }),
        ExecMode::Raw => Box::new(RawRunner { channel }),
    }
}

pub struct NativeRunner<'a> {
    channel: &'a dyn Channel,
}

impl<'a> NativeRunner<'a> {
    pub fn new(channel: &'a dyn Channel) -> Self {
        Self { channel }
    }

    fn program_argv(
        request: &CommandRequest,
        target_env: &HashMap<String, String>,
    ) -> Vec<String> {
        match &request.spec {
            CommandSpec::Argv(argv) if request.expand_vars => expand_argv(argv, target_env),
            CommandSpec::Argv(argv) => argv.clone(),
            CommandSpec::Shell(script) => vec![
                request
                    .executable
                    .clone()
                    .unwrap_or_else(|| "/bin/sh".to_string()),
                "-c".to_string(),
                script.clone(),
            ],
        }
    }
}

#[async_trait]
impl CommandRunner for NativeRunner<'_> {
    fn mode(&self) -> ExecMode {
        ExecMode::Native
    }

    async fn path_exists(&self, path: &str) -> Result<bool, ChannelError> {
        Ok(self.channel.stat(Path::new(path)).await?.exists())
    }

    async fn is_directory(&self, path: &str) -> Result<bool, ChannelError> {
        Ok(self.channel.stat(Path::new(path)).await? == PathKind::Directory)
    }

    async fn run(
        &self,
        request: &CommandRequest,
        env: &HashMap<String, String>,
    ) -> Result<ChannelOutput, ChannelError> {
        let target_env = if request.needs_target_env() {
            let mut target_env = self.channel.environment().await?;
            target_env.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
            target_env
        } else {
            HashMap::new()
        };

        let channel_request = ChannelRequest::argv(Self::program_argv(request, &target_env))
            .with_stdin(request.stdin.clone())
            .with_cwd(request.chdir.as_ref().map(PathBuf::from))
            .with_env(env);
        self.channel.run(channel_request).await
    }
}

pub struct RawRunner<'a> {
    channel: &'a dyn Channel,
}

impl<'a> RawRunner<'a> {
    pub fn new(channel: &'a dyn Channel) -> Self {
        Self { channel }
    }

    async fn succeeds(&self, line: String) -> Result<bool, ChannelError> {
        Ok(self.channel.run(ChannelRequest::shell(line)).await?.success())
    }

    /// The complete shell line sent to the target
    pub fn command_line(request: &CommandRequest, env: &HashMap<String, String>) -> String {
        let mut line = String::new();

        if let Some(chdir) = &request.chdir {
            line.push_str(&format!("cd {} && ", shell_words::quote(chdir)));
        }

        let mut assignments: Vec<(&String, &String)> = env.iter().collect();
        assignments.sort();
        for (key, value) in assignments {
            line.push_str(&format!("{key}={} ", shell_words::quote(value)));
        }

        match &request.spec {
            CommandSpec::Argv(argv) => line.push_str(&shell_words::join(argv)),
            CommandSpec::Shell(script) => {
                let shell = request.executable.as_deref().unwrap_or("sh");
                line.push_str(&shell_words::join([shell, "-c", script.as_str()]));
            }
        }

        line
    }
}

#[async_trait]
impl CommandRunner for RawRunner<'_> {
    fn mode(&self) -> ExecMode {
        ExecMode::Raw
    }

    async fn path_exists(&self, path: &str) -> Result<bool, ChannelError> {
        self.succeeds(format!("test -e {}", shell_words::quote(path)))
            .await
    }

    async fn is_directory(&self, path: &str) -> Result<bool, ChannelError> {
        self.succeeds(format!("cd {}", shell_words::quote(path))).await
    }

    async fn run(
        &self,
        request: &CommandRequest,
        env: &HashMap<String, String>,
    ) -> Result<ChannelOutput, ChannelError> {
        let line = Self::command_line(request, env);
        self.channel
            .run(ChannelRequest::shell(line).with_stdin(request.stdin.clone()))
            .await
    }
}
