//! Atomic file replacement through a sibling temporary file

use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::FileError;

/// Stages content in a temporary file next to the target, so the caller can
/// replace the target with a single rename and readers never observe partial
/// content. An unfinished writer removes its temporary file on drop.
pub struct AtomicWriter {
    temp_path: PathBuf,
    temp_file: Option<File>,
    armed: bool,
}

impl AtomicWriter {
    /// Create a new atomic writer for the target path
    pub async fn new(target_path: impl AsRef<Path>) -> Result<Self, FileError> {
        let temp_path = create_temp_file_path(target_path.as_ref())?;

        let temp_file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await?;

        Ok(AtomicWriter {
            temp_path,
            temp_file: Some(temp_file),
            armed: true,
        })
    }

    /// Write data to the temporary file
    pub async fn write_all(&mut self, data: &[u8]) -> Result<(), FileError> {
        let file = self.temp_file.as_mut().ok_or_else(|| FileError::Closed {
            path: self.temp_path.display().to_string(),
        })?;
        file.write_all(data).await?;
        Ok(())
    }

    /// Copy mode and ownership of `source` onto the temporary file
    pub async fn preserve_metadata(&mut self, source: &Path) -> Result<(), FileError> {
        let metadata = tokio::fs::metadata(source).await?;
        tokio::fs::set_permissions(&self.temp_path, metadata.permissions()).await?;

        #[cfg(unix)]
        {
            use nix::unistd::{chown, Gid, Uid};
            use std::os::unix::fs::MetadataExt;

            // Only root can give files away; anyone else keeps their own uid
            if let Err(e) = chown(
                &self.temp_path,
                Some(Uid::from_raw(metadata.uid())),
                Some(Gid::from_raw(metadata.gid())),
            ) {
                tracing::debug!(
                    "Could not preserve ownership of {}: {}",
                    source.display(),
                    e
                );
            }
        }

        Ok(())
    }

    async fn close(&mut self) -> Result<(), FileError> {
        if let Some(mut file) = self.temp_file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        Ok(())
    }

    /// Flush and keep the temporary file in place for a later rename.
    ///
    /// The caller owns the returned path from here on.
    pub async fn into_temp_path(mut self) -> Result<PathBuf, FileError> {
        self.close().await?;
        self.armed = false;
        Ok(self.temp_path.clone())
    }
}

impl Drop for AtomicWriter {
    fn drop(&mut self) {
        if self.armed {
            self.temp_file.take();
            let _ = std::fs::remove_file(&self.temp_path);
        }
    }
}

/// Generate a unique temporary file path in the same directory as the target
fn create_temp_file_path(target_path: &Path) -> Result<PathBuf, FileError> {
    let parent = match target_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let file_name = target_path
        .file_name()
        .ok_or_else(|| FileError::InvalidPath {
            path: target_path.display().to_string(),
        })?
        .to_string_lossy();

    let temp_name = format!(".{}.tmp.{}", file_name, Uuid::new_v4().simple());
    Ok(parent.join(temp_name))
}
