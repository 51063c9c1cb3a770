//! Channel to the machine this process runs on

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::process::run_process;
use super::{
    ChannelError, ChannelOutput, ChannelRequest, CommandLine, ExecutionChannel, FileAttributes,
    FileChannel, PathKind,
};
use crate::modules::files::utils::AtomicWriter;

#[derive(Debug, Clone)]
pub struct LocalChannel {
    shell: String,
    timeout: Option<Duration>,
}

impl Default for LocalChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalChannel {
    pub fn new() -> Self {
        Self {
            shell: "/bin/sh".to_string(),
            timeout: None,
        }
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_command(&self, request: &ChannelRequest) -> Result<Command, ChannelError> {
        let mut cmd = match &request.command {
            CommandLine::Argv(argv) => {
                let (program, args) =
                    argv.split_first()
                        .ok_or_else(|| ChannelError::InvalidCommand {
                            reason: "empty argument vector".to_string(),
                        })?;
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
            CommandLine::Shell(line) => {
                let mut cmd = Command::new(&self.shell);
                cmd.arg("-c").arg(line);
                cmd
            }
        };

        if let Some(cwd) = &request.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &request.env {
            cmd.env(key, value);
        }

        Ok(cmd)
    }
}

#[async_trait]
impl ExecutionChannel for LocalChannel {
    fn host(&self) -> &str {
        "localhost"
    }

    async fn run(&self, request: ChannelRequest) -> Result<ChannelOutput, ChannelError> {
        let label = request.command.to_string();
        debug!("Executing locally: {}", label);
        let cmd = self.build_command(&request)?;
        run_process(cmd, &label, request.stdin, self.timeout).await
    }

    async fn environment(&self) -> Result<HashMap<String, String>, ChannelError> {
        Ok(std::env::vars().collect())
    }
}

#[async_trait]
impl FileChannel for LocalChannel {
    async fn stat(&self, path: &Path) -> Result<PathKind, ChannelError> {
        match tokio::fs::metadata(path).await {
            Ok(metadata) => Ok(PathKind::from_metadata(&metadata)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PathKind::Missing),
            Err(e) => Err(ChannelError::io(path.display().to_string(), e)),
        }
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>, ChannelError> {
        tokio::fs::read(path)
            .await
            .map_err(|e| ChannelError::io(path.display().to_string(), e))
    }

    async fn write_temp(&self, dest: &Path, data: &[u8]) -> Result<PathBuf, ChannelError> {
        let to_channel = |e: crate::modules::files::utils::FileError| ChannelError::Transfer {
            path: dest.display().to_string(),
            reason: e.to_string(),
        };

        let mut writer = AtomicWriter::new(dest).await.map_err(to_channel)?;
        writer.write_all(data).await.map_err(to_channel)?;
        if tokio::fs::try_exists(dest).await.unwrap_or(false) {
            writer.preserve_metadata(dest).await.map_err(to_channel)?;
        }
        writer.into_temp_path().await.map_err(to_channel)
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), ChannelError> {
        tokio::fs::rename(from, to)
            .await
            .map_err(|e| ChannelError::io(to.display().to_string(), e))
    }

    async fn remove_file(&self, path: &Path) -> Result<(), ChannelError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ChannelError::io(path.display().to_string(), e)),
        }
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), ChannelError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| ChannelError::io(path.display().to_string(), e))
    }

    async fn copy(&self, src: &Path, dest: &Path) -> Result<(), ChannelError> {
        tokio::fs::copy(src, dest)
            .await
            .map(|_| ())
            .map_err(|e| ChannelError::io(src.display().to_string(), e))
    }

    async fn attributes(&self, path: &Path) -> Result<FileAttributes, ChannelError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| ChannelError::io(path.display().to_string(), e))?;
        ownership::attributes(&metadata)
    }

    async fn set_mode(&self, path: &Path, mode: u32) -> Result<(), ChannelError> {
        ownership::set_mode(path, mode).await
    }

    async fn set_owner(
        &self,
        path: &Path,
        owner: Option<&str>,
        group: Option<&str>,
    ) -> Result<(), ChannelError> {
        ownership::set_owner(path, owner, group)
    }
}

#[cfg(unix)]
mod ownership {
    use nix::unistd::{chown, Gid, Group, Uid, User};
    use std::os::unix::fs::{MetadataExt, PermissionsExt};
    use std::path::Path;

    use crate::channel::{ChannelError, FileAttributes};

    pub fn attributes(metadata: &std::fs::Metadata) -> Result<FileAttributes, ChannelError> {
        let uid = metadata.uid();
        let gid = metadata.gid();
        Ok(FileAttributes {
            mode: metadata.mode() & 0o7777,
            uid,
            gid,
            owner: User::from_uid(Uid::from_raw(uid))
                .ok()
                .flatten()
                .map(|user| user.name),
            group: Group::from_gid(Gid::from_raw(gid))
                .ok()
                .flatten()
                .map(|group| group.name),
        })
    }

    pub async fn set_mode(path: &Path, mode: u32) -> Result<(), ChannelError> {
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .await
            .map_err(|e| ChannelError::io(path.display().to_string(), e))
    }

    pub fn set_owner(
        path: &Path,
        owner: Option<&str>,
        group: Option<&str>,
    ) -> Result<(), ChannelError> {
        let uid = owner.map(|owner| resolve_user(path, owner)).transpose()?;
        let gid = group.map(|group| resolve_group(path, group)).transpose()?;
        chown(path, uid, gid)
            .map_err(|e| ChannelError::io(path.display().to_string(), e.into()))
    }

    fn resolve_user(path: &Path, owner: &str) -> Result<Uid, ChannelError> {
        if let Ok(id) = owner.parse() {
            return Ok(Uid::from_raw(id));
        }
        match User::from_name(owner) {
            Ok(Some(user)) => Ok(user.uid),
            Ok(None) => Err(ChannelError::Remote(format!("no such user: {owner}"))),
            Err(e) => Err(ChannelError::io(path.display().to_string(), e.into())),
        }
    }

    fn resolve_group(path: &Path, group: &str) -> Result<Gid, ChannelError> {
        if let Ok(id) = group.parse() {
            return Ok(Gid::from_raw(id));
        }
        match Group::from_name(group) {
            Ok(Some(group)) => Ok(group.gid),
            Ok(None) => Err(ChannelError::Remote(format!("no such group: {group}"))),
            Err(e) => Err(ChannelError::io(path.display().to_string(), e.into())),
        }
    }
}

#[cfg(not(unix))]
mod ownership {
    use std::path::Path;

    use crate::channel::{ChannelError, FileAttributes};

    fn unsupported() -> ChannelError {
        ChannelError::Remote("file modes and ownership need a unix host".to_string())
    }

    pub fn attributes(_metadata: &std::fs::Metadata) -> Result<FileAttributes, ChannelError> {
        Err(unsupported())
    }

    pub async fn set_mode(_path: &Path, _mode: u32) -> Result<(), ChannelError> {
        Err(unsupported())
    }

    pub fn set_owner(
        _path: &Path,
        _owner: Option<&str>,
        _group: Option<&str>,
    ) -> Result<(), ChannelError> {
        Err(unsupported())
    }
}
