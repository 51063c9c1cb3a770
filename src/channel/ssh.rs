//! Channel to a remote host over the system `ssh` and `scp` clients

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;
use uuid::Uuid;

use super::process::run_process;
use super::{
    ChannelError, ChannelOutput, ChannelRequest, CommandLine, ExecutionChannel, FileAttributes,
    FileChannel, PathKind,
};

#[derive(Debug, Clone)]
pub struct SshChannel {
    host: String,
    user: Option<String>,
    port: Option<u16>,
    options: Vec<String>,
    timeout: Option<Duration>,
}

impl SshChannel {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: None,
            port: None,
            options: vec!["BatchMode=yes".to_string()],
            timeout: None,
        }
    }

    pub fn with_user(mut self, user: Option<String>) -> Self {
        self.user = user;
        self
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    pub fn with_options(mut self, options: impl IntoIterator<Item = String>) -> Self {
        self.options.extend(options);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{user}@{}", self.host),
            None => self.host.clone(),
        }
    }

    fn ssh_command(&self) -> Command {
        let mut cmd = Command::new("ssh");
        for option in &self.options {
            cmd.arg("-o").arg(option);
        }
        if let Some(port) = self.port {
            cmd.arg("-p").arg(port.to_string());
        }
        cmd.arg(self.destination());
        cmd
    }

    fn scp_command(&self) -> Command {
        let mut cmd = Command::new("scp");
        cmd.arg("-q");
        for option in &self.options {
            cmd.arg("-o").arg(option);
        }
        if let Some(port) = self.port {
            cmd.arg("-P").arg(port.to_string());
        }
        cmd
    }

    fn remote_spec(&self, path: &Path) -> String {
        format!("{}:{}", self.destination(), path.display())
    }

    /// Render a request as the single command line the remote shell receives
    fn remote_line(request: &ChannelRequest) -> Result<String, ChannelError> {
        let mut line = String::new();

        if let Some(cwd) = &request.cwd {
            line.push_str(&format!(
                "cd {} && ",
                shell_words::quote(&cwd.display().to_string())
            ));
        }
        for (key, value) in &request.env {
            line.push_str(&format!("{key}={} ", shell_words::quote(value)));
        }

        match &request.command {
            CommandLine::Argv(argv) if argv.is_empty() => {
                return Err(ChannelError::InvalidCommand {
                    reason: "empty argument vector".to_string(),
                })
            }
            CommandLine::Argv(argv) => line.push_str(&shell_words::join(argv)),
            // The login shell may not be POSIX, so always go through sh
            CommandLine::Shell(script) => {
                line.push_str(&shell_words::join(["sh", "-c", script.as_str()]))
            }
        }

        Ok(line)
    }

    async fn run_line(&self, line: &str) -> Result<ChannelOutput, ChannelError> {
        self.run(ChannelRequest::shell(line)).await
    }

    async fn run_checked(&self, line: &str, path: &Path) -> Result<ChannelOutput, ChannelError> {
        let output = self.run_line(line).await?;
        if !output.success() {
            return Err(ChannelError::Transfer {
                path: path.display().to_string(),
                reason: output.stderr_text().trim().to_string(),
            });
        }
        Ok(output)
    }
}

#[async_trait]
impl ExecutionChannel for SshChannel {
    fn host(&self) -> &str {
        &self.host
    }

    async fn run(&self, request: ChannelRequest) -> Result<ChannelOutput, ChannelError> {
        let line = Self::remote_line(&request)?;
        debug!("Executing command on {}: {}", self.host, line);

        let mut cmd = self.ssh_command();
        cmd.arg(&line);
        run_process(cmd, &line, request.stdin, self.timeout).await
    }

    async fn environment(&self) -> Result<HashMap<String, String>, ChannelError> {
        let output = self.run(ChannelRequest::argv(["env"])).await?;
        if !output.success() {
            return Err(ChannelError::Remote(output.stderr_text()));
        }
        Ok(output
            .stdout_text()
            .lines()
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect())
    }
}

#[async_trait]
impl FileChannel for SshChannel {
    async fn stat(&self, path: &Path) -> Result<PathKind, ChannelError> {
        let output = self
            .run(ChannelRequest::shell(PathKind::probe_script(
                &path.display().to_string(),
            )))
            .await?;
        if !output.success() {
            return Err(ChannelError::Remote(output.stderr_text()));
        }
        output
            .stdout_text()
            .parse()
            .map_err(ChannelError::Remote)
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>, ChannelError> {
        let local = tempfile::NamedTempFile::new()
            .map_err(|e| ChannelError::io("local temp file", e))?;

        let mut cmd = self.scp_command();
        cmd.arg(self.remote_spec(path)).arg(local.path());
        let output = run_process(cmd, "scp download", None, self.timeout).await?;
        if !output.success() {
            return Err(ChannelError::Transfer {
                path: path.display().to_string(),
                reason: output.stderr_text().trim().to_string(),
            });
        }

        tokio::fs::read(local.path())
            .await
            .map_err(|e| ChannelError::io(local.path().display().to_string(), e))
    }

    async fn write_temp(&self, dest: &Path, data: &[u8]) -> Result<PathBuf, ChannelError> {
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let temp = parent.join(format!(".{}.tmp.{}", name, Uuid::new_v4().simple()));

        // Seed the temp file from dest so scp keeps its mode and owner
        let q_dest = shell_words::quote(&dest.display().to_string()).into_owned();
        let q_temp = shell_words::quote(&temp.display().to_string()).into_owned();
        self.run_checked(
            &format!("if [ -f {q_dest} ]; then cp -p {q_dest} {q_temp}; fi"),
            dest,
        )
        .await?;

        let local = tempfile::NamedTempFile::new()
            .map_err(|e| ChannelError::io("local temp file", e))?;
        tokio::fs::write(local.path(), data)
            .await
            .map_err(|e| ChannelError::io(local.path().display().to_string(), e))?;

        let mut cmd = self.scp_command();
        cmd.arg(local.path()).arg(self.remote_spec(&temp));
        let output = run_process(cmd, "scp upload", None, self.timeout).await?;
        if !output.success() {
            let _ = self.remove_file(&temp).await;
            return Err(ChannelError::Transfer {
                path: dest.display().to_string(),
                reason: output.stderr_text().trim().to_string(),
            });
        }

        Ok(temp)
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), ChannelError> {
        let argv = [
            "mv".to_string(),
            "-f".to_string(),
            from.display().to_string(),
            to.display().to_string(),
        ];
        self.run_checked(&shell_words::join(argv), to).await.map(|_| ())
    }

    async fn remove_file(&self, path: &Path) -> Result<(), ChannelError> {
        let argv = ["rm".to_string(), "-f".to_string(), path.display().to_string()];
        self.run_checked(&shell_words::join(argv), path)
            .await
            .map(|_| ())
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), ChannelError> {
        let argv = ["mkdir".to_string(), "-p".to_string(), path.display().to_string()];
        self.run_checked(&shell_words::join(argv), path)
            .await
            .map(|_| ())
    }

    async fn copy(&self, src: &Path, dest: &Path) -> Result<(), ChannelError> {
        let argv = [
            "cp".to_string(),
            "-p".to_string(),
            src.display().to_string(),
            dest.display().to_string(),
        ];
        self.run_checked(&shell_words::join(argv), src)
            .await
            .map(|_| ())
    }

    async fn attributes(&self, path: &Path) -> Result<FileAttributes, ChannelError> {
        let output = self
            .run_checked(&FileAttributes::ls_script(&path.display().to_string()), path)
            .await?;
        FileAttributes::from_ls_output(&output.stdout_text()).map_err(ChannelError::Remote)
    }

    async fn set_mode(&self, path: &Path, mode: u32) -> Result<(), ChannelError> {
        let argv = ["chmod".to_string(), format!("{mode:04o}"), path.display().to_string()];
        self.run_checked(&shell_words::join(argv), path)
            .await
            .map(|_| ())
    }

    async fn set_owner(
        &self,
        path: &Path,
        owner: Option<&str>,
        group: Option<&str>,
    ) -> Result<(), ChannelError> {
        let target = path.display().to_string();
        if let Some(owner) = owner {
            self.run_checked(&shell_words::join(["chown", owner, target.as_str()]), path)
                .await?;
        }
        if let Some(group) = group {
            self.run_checked(&shell_words::join(["chgrp", group, target.as_str()]), path)
                .await?;
        }
        Ok(())
    }
}
