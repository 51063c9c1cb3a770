//! Execution and file channels to the managed host
//!
//! A channel is how every module reaches its target. The execution half runs
//! argv or shell command lines; the file half stats, reads and atomically
//! replaces files. Native mode uses both halves, raw mode only ever hands
//! POSIX shell one-liners to the execution half.

pub mod attributes;
pub mod error;
pub mod local;
pub mod process;
pub mod ssh;

pub use attributes::FileAttributes;
pub use error::ChannelError;
pub use local::LocalChannel;
pub use ssh::SshChannel;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

/// A command line in either structured or shell form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// Program and arguments, spawned without a shell
    Argv(Vec<String>),
    /// A string handed to the target's POSIX shell
    Shell(String),
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandLine::Argv(argv) => write!(f, "{}", shell_words::join(argv)),
            CommandLine::Shell(line) => write!(f, "{line}"),
        }
    }
}

/// A single command invocation sent over an execution channel
#[derive(Debug, Clone)]
pub struct ChannelRequest {
    pub command: CommandLine,
    pub stdin: Option<Vec<u8>>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl ChannelRequest {
    pub fn argv<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(CommandLine::Argv(argv.into_iter().map(Into::into).collect()))
    }

    pub fn shell(line: impl Into<String>) -> Self {
        Self::new(CommandLine::Shell(line.into()))
    }

    fn new(command: CommandLine) -> Self {
        Self {
            command,
            stdin: None,
            cwd: None,
            env: BTreeMap::new(),
        }
    }

    pub fn with_stdin(mut self, stdin: Option<Vec<u8>>) -> Self {
        self.stdin = stdin;
        self
    }

    pub fn with_cwd(mut self, cwd: Option<PathBuf>) -> Self {
        self.cwd = cwd;
        self
    }

    pub fn with_env(mut self, env: &HashMap<String, String>) -> Self {
        self.env.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }
}

/// Exit code and captured output of a finished command
#[derive(Debug, Clone, Default)]
pub struct ChannelOutput {
    pub rc: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ChannelOutput {
    pub fn success(&self) -> bool {
        self.rc == 0
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// What a path on the target currently is (symlinks are followed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathKind {
    Missing,
    File,
    Directory,
    Block,
    Char,
    Pipe,
    Socket,
    Other,
}

impl PathKind {
    pub fn exists(self) -> bool {
        self != PathKind::Missing
    }

    /// POSIX `test` one-liner printing the kind of `path`, parsed by [`PathKind::from_str`]
    pub fn probe_script(path: &str) -> String {
        let q = shell_words::quote(path);
        format!(
            "if [ ! -e {q} ]; then echo missing; \
             elif [ -d {q} ]; then echo directory; \
             elif [ -f {q} ]; then echo file; \
             elif [ -b {q} ]; then echo block; \
             elif [ -c {q} ]; then echo char; \
             elif [ -p {q} ]; then echo pipe; \
             elif [ -S {q} ]; then echo socket; \
             else echo other; fi"
        )
    }

    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        let file_type = metadata.file_type();
        if file_type.is_dir() {
            return PathKind::Directory;
        }
        if file_type.is_file() {
            return PathKind::File;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::FileTypeExt;
            if file_type.is_block_device() {
                return PathKind::Block;
            }
            if file_type.is_char_device() {
                return PathKind::Char;
            }
            if file_type.is_fifo() {
                return PathKind::Pipe;
            }
            if file_type.is_socket() {
                return PathKind::Socket;
            }
        }

        PathKind::Other
    }
}

impl std::str::FromStr for PathKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "missing" => Ok(PathKind::Missing),
            "file" => Ok(PathKind::File),
            "directory" => Ok(PathKind::Directory),
            "block" => Ok(PathKind::Block),
            "char" => Ok(PathKind::Char),
            "pipe" => Ok(PathKind::Pipe),
            "socket" => Ok(PathKind::Socket),
            "other" => Ok(PathKind::Other),
            other => Err(format!("Unknown path kind: {other}")),
        }
    }
}

impl fmt::Display for PathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PathKind::Missing => "missing path",
            PathKind::File => "file",
            PathKind::Directory => "directory",
            PathKind::Block => "block device",
            PathKind::Char => "character device",
            PathKind::Pipe => "pipe",
            PathKind::Socket => "socket",
            PathKind::Other => "special file",
        };
        write!(f, "{name}")
    }
}

/// Runs command lines on the target
#[async_trait]
pub trait ExecutionChannel: Send + Sync {
    /// Host label used in logs
    fn host(&self) -> &str;

    async fn run(&self, request: ChannelRequest) -> Result<ChannelOutput, ChannelError>;

    /// Environment of the target, used for native argument expansion
    async fn environment(&self) -> Result<HashMap<String, String>, ChannelError>;
}

/// Structured file access on the target
#[async_trait]
pub trait FileChannel: Send + Sync {
    async fn stat(&self, path: &Path) -> Result<PathKind, ChannelError>;

    async fn read(&self, path: &Path) -> Result<Vec<u8>, ChannelError>;

    /// Stage `data` in a temporary file next to `dest`, carrying over the
    /// metadata of an existing `dest`. Returns the temporary path.
    async fn write_temp(&self, dest: &Path, data: &[u8]) -> Result<PathBuf, ChannelError>;

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), ChannelError>;

    async fn remove_file(&self, path: &Path) -> Result<(), ChannelError>;

    async fn create_dir_all(&self, path: &Path) -> Result<(), ChannelError>;

    async fn copy(&self, src: &Path, dest: &Path) -> Result<(), ChannelError>;

    async fn attributes(&self, path: &Path) -> Result<FileAttributes, ChannelError>;

    async fn set_mode(&self, path: &Path, mode: u32) -> Result<(), ChannelError>;

    /// Change the owning user and/or group, each given by name or numeric id
    async fn set_owner(
        &self,
        path: &Path,
        owner: Option<&str>,
        group: Option<&str>,
    ) -> Result<(), ChannelError>;

    /// Replace `dest` with `data` in one rename
    async fn write_atomic(&self, dest: &Path, data: &[u8]) -> Result<(), ChannelError> {
        let temp = self.write_temp(dest, data).await?;
        if let Err(e) = self.rename(&temp, dest).await {
            let _ = self.remove_file(&temp).await;
            return Err(e);
        }
        Ok(())
    }
}

/// A full connection to one host
pub trait Channel: ExecutionChannel + FileChannel + fmt::Debug {}

impl<T: ExecutionChannel + FileChannel + fmt::Debug> Channel for T {}
