//! A local channel that records every call made through it

use async_trait::async_trait;
use rustle_posix::channel::{
    ChannelError, ChannelOutput, ChannelRequest, CommandLine, ExecutionChannel, FileAttributes,
    FileChannel, LocalChannel, PathKind,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Argv(Vec<String>),
    Shell(String),
    Environment,
    File(&'static str, PathBuf),
}

#[derive(Debug, Default)]
pub struct RecordingChannel {
    inner: LocalChannel,
    calls: Mutex<Vec<Call>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn shell_lines(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Shell(line) => Some(line),
                _ => None,
            })
            .collect()
    }

    /// True when every recorded call was a shell one-liner
    pub fn only_shell(&self) -> bool {
        self.calls()
            .iter()
            .all(|call| matches!(call, Call::Shell(_)))
    }

    pub fn file_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::File(..)))
            .count()
    }
}

#[async_trait]
impl ExecutionChannel for RecordingChannel {
    fn host(&self) -> &str {
        self.inner.host()
    }

    async fn run(&self, request: ChannelRequest) -> Result<ChannelOutput, ChannelError> {
        self.record(match &request.command {
            CommandLine::Argv(argv) => Call::Argv(argv.clone()),
            CommandLine::Shell(line) => Call::Shell(line.clone()),
        });
        self.inner.run(request).await
    }

    async fn environment(&self) -> Result<HashMap<String, String>, ChannelError> {
        self.record(Call::Environment);
        self.inner.environment().await
    }
}

#[async_trait]
impl FileChannel for RecordingChannel {
    async fn stat(&self, path: &Path) -> Result<PathKind, ChannelError> {
        self.record(Call::File("stat", path.to_path_buf()));
        self.inner.stat(path).await
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>, ChannelError> {
        self.record(Call::File("read", path.to_path_buf()));
        self.inner.read(path).await
    }

    async fn write_temp(&self, dest: &Path, data: &[u8]) -> Result<PathBuf, ChannelError> {
        self.record(Call::File("write_temp", dest.to_path_buf()));
        self.inner.write_temp(dest, data).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), ChannelError> {
        self.record(Call::File("rename", to.to_path_buf()));
        self.inner.rename(from, to).await
    }

    async fn remove_file(&self, path: &Path) -> Result<(), ChannelError> {
        self.record(Call::File("remove_file", path.to_path_buf()));
        self.inner.remove_file(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), ChannelError> {
        self.record(Call::File("create_dir_all", path.to_path_buf()));
        self.inner.create_dir_all(path).await
    }

    async fn copy(&self, src: &Path, dest: &Path) -> Result<(), ChannelError> {
        self.record(Call::File("copy", src.to_path_buf()));
        self.inner.copy(src, dest).await
    }

    async fn attributes(&self, path: &Path) -> Result<FileAttributes, ChannelError> {
        self.record(Call::File("attributes", path.to_path_buf()));
        self.inner.attributes(path).await
    }

    async fn set_mode(&self, path: &Path, mode: u32) -> Result<(), ChannelError> {
        self.record(Call::File("set_mode", path.to_path_buf()));
        self.inner.set_mode(path, mode).await
    }

    async fn set_owner(
        &self,
        path: &Path,
        owner: Option<&str>,
        group: Option<&str>,
    ) -> Result<(), ChannelError> {
        self.record(Call::File("set_owner", path.to_path_buf()));
        self.inner.set_owner(path, owner, group).await
    }
}
