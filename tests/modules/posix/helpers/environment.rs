//! Test environment setup and management

use rustle_posix::channel::{Channel, LocalChannel};
use rustle_posix::config::PosixConfig;
use rustle_posix::modules::{ExecutionContext, ModuleArgs, ModuleRegistry, ModuleResult};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

/// Runtime that never exists, so probing always falls back to raw mode
pub const MISSING_RUNTIME: &str = "rustle-posix-missing-runtime";

/// Runtime that always answers the probe, so probing selects native mode
pub const FAKE_RUNTIME: &str = "sh -c 'echo Python 3.12.1' --";

/// Isolated temp directory plus a context that targets the local machine
pub struct TestEnvironment {
    temp_dir: TempDir,
    context: ExecutionContext,
    registry: ModuleRegistry,
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self::with_config(PosixConfig::default())
    }

    pub fn with_config(config: PosixConfig) -> Self {
        Self::with_channel(Arc::new(LocalChannel::new()), config)
    }

    pub fn with_channel(channel: Arc<dyn Channel>, config: PosixConfig) -> Self {
        let temp_dir = tempdir().expect("Failed to create temporary directory");
        Self {
            temp_dir,
            context: ExecutionContext::new(channel, config),
            registry: ModuleRegistry::with_core_modules(),
        }
    }

    /// Environment whose probe always picks `runtime`
    pub fn with_runtime(runtime: &str) -> Self {
        Self::with_config(PosixConfig {
            native_runtime: runtime.to_string(),
            ..Default::default()
        })
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn check_context(&self) -> ExecutionContext {
        self.context.clone().with_check_mode(true)
    }

    pub fn diff_context(&self) -> ExecutionContext {
        self.context.clone().with_diff_mode(true)
    }

    pub async fn execute_module(&self, name: &str, args: ModuleArgs) -> ModuleResult {
        self.execute_module_with_context(name, args, &self.context)
            .await
    }

    pub async fn execute_module_with_context(
        &self,
        name: &str,
        args: ModuleArgs,
        context: &ExecutionContext,
    ) -> ModuleResult {
        self.registry.run(name, &args, context).await
    }

    pub fn create_test_file(&self, relative_path: &str, content: &str) -> PathBuf {
        let file_path = self.temp_path(relative_path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(&file_path, content).expect("Failed to write test file");
        file_path
    }

    pub fn create_test_directory(&self, relative_path: &str) -> PathBuf {
        let dir_path = self.temp_path(relative_path);
        std::fs::create_dir_all(&dir_path).expect("Failed to create test directory");
        dir_path
    }

    pub fn temp_path(&self, relative_path: &str) -> PathBuf {
        self.temp_dir.path().join(relative_path)
    }

    pub fn temp_dir(&self) -> &std::path::Path {
        self.temp_dir.path()
    }

    pub fn read_file(&self, relative_path: &str) -> String {
        std::fs::read_to_string(self.temp_path(relative_path)).expect("Failed to read test file")
    }

    /// Names of every entry in the temp directory, sorted
    pub fn entries(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.temp_dir.path())
            .expect("Failed to list temp directory")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}
