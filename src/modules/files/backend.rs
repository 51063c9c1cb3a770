//! Dual-mode file access for the file modules
//!
//! [`NativeBackend`] goes through the structured file channel, [`RawBackend`]
//! only sends POSIX shell one-liners. Each write is staged in a sibling
//! temporary file, optionally validated and backed up, then renamed over the
//! destination.

use async_trait::async_trait;
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

use super::utils::{backup_path_for, FilePermissions};
use crate::channel::{Channel, ChannelError, ChannelOutput, ChannelRequest, FileAttributes, PathKind};
use crate::modules::interface::ExecMode;

#[async_trait]
pub trait FileBackend: Send + Sync {
    fn mode(&self) -> ExecMode;

    async fn stat(&self, path: &str) -> Result<PathKind, ChannelError>;

    async fn read(&self, path: &str) -> Result<Vec<u8>, ChannelError>;

    async fn create_parent_dirs(&self, path: &str) -> Result<(), ChannelError>;

    /// Write `content` to a temporary file next to `path`, returning its path
    async fn stage(&self, path: &str, content: &[u8]) -> Result<String, ChannelError>;

    /// Run a validation command with `%s` replaced by the staged file
    async fn validate(&self, command: &str, staged: &str) -> Result<ChannelOutput, ChannelError>;

    /// Copy `path` aside, returning the backup location
    async fn backup(&self, path: &str) -> Result<String, ChannelError>;

    /// Atomically move the staged file over `path`
    async fn commit(&self, staged: &str, path: &str) -> Result<(), ChannelError>;

    /// Best-effort removal of a staged file
    async fn discard(&self, staged: &str);

    async fn attributes(&self, path: &str) -> Result<FileAttributes, ChannelError>;

    async fn set_mode(&self, path: &str, mode: u32) -> Result<(), ChannelError>;

    async fn set_owner(
        &self,
        path: &str,
        owner: Option<&str>,
        group: Option<&str>,
    ) -> Result<(), ChannelError>;
}

/// Enforce `permissions` on `path`. Ownership goes first since chown clears
/// setuid and setgid bits.
pub async fn apply_permissions(
    backend: &dyn FileBackend,
    path: &str,
    permissions: &FilePermissions,
) -> Result<(), ChannelError> {
    if permissions.owner.is_some() || permissions.group.is_some() {
        backend
            .set_owner(path, permissions.owner.as_deref(), permissions.group.as_deref())
            .await?;
    }
    if let Some(mode) = permissions.mode {
        backend.set_mode(path, mode).await?;
    }
    Ok(())
}

pub fn backend_for<'a>(mode: ExecMode, channel: &'a dyn Channel) -> Box<dyn FileBackend + 'a> {
    match mode {
        ExecMode::Native => Box::new(NativeBackend { channel }),
        ExecMode::Raw => Box::new(RawBackend { channel }),
    }
}

/// `command` with every `%s` replaced by the shell-quoted staged path
pub fn validation_command(command: &str, staged: &str) -> String {
    command.replace("%s", &shell_words::quote(staged))
}

fn parent_dir(path: &str) -> Option<&Path> {
    Path::new(path)
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
}

pub struct NativeBackend<'a> {
    channel: &'a dyn Channel,
}

impl<'a> NativeBackend<'a> {
    pub fn new(channel: &'a dyn Channel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl FileBackend for NativeBackend<'_> {
    fn mode(&self) -> ExecMode {
        ExecMode::Native
    }

    async fn stat(&self, path: &str) -> Result<PathKind, ChannelError> {
        self.channel.stat(Path::new(path)).await
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, ChannelError> {
        self.channel.read(Path::new(path)).await
    }

    async fn create_parent_dirs(&self, path: &str) -> Result<(), ChannelError> {
        match parent_dir(path) {
            Some(parent) => self.channel.create_dir_all(parent).await,
            None => Ok(()),
        }
    }

    async fn stage(&self, path: &str, content: &[u8]) -> Result<String, ChannelError> {
        let staged = self.channel.write_temp(Path::new(path), content).await?;
        Ok(staged.display().to_string())
    }

    async fn validate(&self, command: &str, staged: &str) -> Result<ChannelOutput, ChannelError> {
        let line = validation_command(command, staged);
        let argv = shell_words::split(&line).map_err(|e| ChannelError::InvalidCommand {
            reason: format!("{line}: {e}"),
        })?;
        self.channel.run(ChannelRequest::argv(argv)).await
    }

    async fn backup(&self, path: &str) -> Result<String, ChannelError> {
        let backup = backup_path_for(path);
        self.channel
            .copy(Path::new(path), Path::new(&backup))
            .await?;
        Ok(backup)
    }

    async fn commit(&self, staged: &str, path: &str) -> Result<(), ChannelError> {
        self.channel.rename(Path::new(staged), Path::new(path)).await
    }

    async fn discard(&self, staged: &str) {
        if let Err(e) = self.channel.remove_file(Path::new(staged)).await {
            debug!("Failed to remove staged file {}: {}", staged, e);
        }
    }

    async fn attributes(&self, path: &str) -> Result<FileAttributes, ChannelError> {
        self.channel.attributes(Path::new(path)).await
    }

    async fn set_mode(&self, path: &str, mode: u32) -> Result<(), ChannelError> {
        self.channel.set_mode(Path::new(path), mode).await
    }

    async fn set_owner(
        &self,
        path: &str,
        owner: Option<&str>,
        group: Option<&str>,
    ) -> Result<(), ChannelError> {
        self.channel.set_owner(Path::new(path), owner, group).await
    }
}

pub struct RawBackend<'a> {
    channel: &'a dyn Channel,
}

impl<'a> RawBackend<'a> {
    pub fn new(channel: &'a dyn Channel) -> Self {
        Self { channel }
    }

    async fn shell(&self, line: String, stdin: Option<Vec<u8>>) -> Result<ChannelOutput, ChannelError> {
        self.channel
            .run(ChannelRequest::shell(line).with_stdin(stdin))
            .await
    }

    /// Run `line` and turn a non-zero exit into an error naming `path`
    async fn checked(
        &self,
        line: String,
        stdin: Option<Vec<u8>>,
        path: &str,
    ) -> Result<ChannelOutput, ChannelError> {
        let output = self.shell(line, stdin).await?;
        if !output.success() {
            let stderr = output.stderr_text();
            return Err(ChannelError::Transfer {
                path: path.to_string(),
                reason: if stderr.trim().is_empty() {
                    format!("exited with rc {}", output.rc)
                } else {
                    stderr.trim().to_string()
                },
            });
        }
        Ok(output)
    }

    /// Sibling temp path with the same naming as the native writer
    pub fn staging_path(path: &str) -> String {
        let target = Path::new(path);
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let temp = format!(".{}.tmp.{}", name, Uuid::new_v4().simple());
        match parent_dir(path) {
            Some(parent) => parent.join(temp).display().to_string(),
            None => temp,
        }
    }

    /// Shell line that fills `staged` from stdin, carrying over the mode and
    /// owner of an existing `path`
    pub fn stage_script(path: &str, staged: &str) -> String {
        let dest = shell_words::quote(path);
        let temp = shell_words::quote(staged);
        format!(
            "if [ -f {dest} ]; then cp -p {dest} {temp} && cat > {temp}; \
             else (set -C && cat > {temp}); fi"
        )
    }
}

#[async_trait]
impl FileBackend for RawBackend<'_> {
    fn mode(&self) -> ExecMode {
        ExecMode::Raw
    }

    async fn stat(&self, path: &str) -> Result<PathKind, ChannelError> {
        let output = self.checked(PathKind::probe_script(path), None, path).await?;
        output.stdout_text().parse().map_err(ChannelError::Remote)
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, ChannelError> {
        let output = self
            .checked(format!("cat {}", shell_words::quote(path)), None, path)
            .await?;
        Ok(output.stdout)
    }

    async fn create_parent_dirs(&self, path: &str) -> Result<(), ChannelError> {
        let Some(parent) = parent_dir(path) else {
            return Ok(());
        };
        let parent = parent.display().to_string();
        self.checked(
            format!("mkdir -p {}", shell_words::quote(&parent)),
            None,
            &parent,
        )
        .await
        .map(|_| ())
    }

    async fn stage(&self, path: &str, content: &[u8]) -> Result<String, ChannelError> {
        let staged = Self::staging_path(path);
        let script = Self::stage_script(path, &staged);
        if let Err(e) = self.checked(script, Some(content.to_vec()), path).await {
            self.discard(&staged).await;
            return Err(e);
        }
        Ok(staged)
    }

    async fn validate(&self, command: &str, staged: &str) -> Result<ChannelOutput, ChannelError> {
        self.shell(validation_command(command, staged), None).await
    }

    async fn backup(&self, path: &str) -> Result<String, ChannelError> {
        let backup = backup_path_for(path);
        self.checked(
            format!(
                "cp -p {} {}",
                shell_words::quote(path),
                shell_words::quote(&backup)
            ),
            None,
            path,
        )
        .await?;
        Ok(backup)
    }

    async fn commit(&self, staged: &str, path: &str) -> Result<(), ChannelError> {
        self.checked(
            format!(
                "mv -f {} {}",
                shell_words::quote(staged),
                shell_words::quote(path)
            ),
            None,
            path,
        )
        .await
        .map(|_| ())
    }

    async fn discard(&self, staged: &str) {
        let line = format!("rm -f {}", shell_words::quote(staged));
        if let Err(e) = self.shell(line, None).await {
            debug!("Failed to remove staged file {}: {}", staged, e);
        }
    }

    async fn attributes(&self, path: &str) -> Result<FileAttributes, ChannelError> {
        let output = self.checked(FileAttributes::ls_script(path), None, path).await?;
        FileAttributes::from_ls_output(&output.stdout_text()).map_err(ChannelError::Remote)
    }

    async fn set_mode(&self, path: &str, mode: u32) -> Result<(), ChannelError> {
        self.checked(
            format!("chmod {mode:04o} {}", shell_words::quote(path)),
            None,
            path,
        )
        .await
        .map(|_| ())
    }

    async fn set_owner(
        &self,
        path: &str,
        owner: Option<&str>,
        group: Option<&str>,
    ) -> Result<(), ChannelError> {
        let target = shell_words::quote(path);
        if let Some(owner) = owner {
            let line = format!("chown {} {target}", shell_words::quote(owner));
            self.checked(line, None, path).await?;
        }
        if let Some(group) = group {
            let line = format!("chgrp {} {target}", shell_words::quote(group));
            self.checked(line, None, path).await?;
        }
        Ok(())
    }
}
