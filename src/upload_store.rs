//! Raw upload persistence for `POST /store`.

use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

/// Writes uploads into a single directory, created on first use.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store `data` under the base name of `file_name`, returning the stored name.
    /// Existing files with the same name are overwritten.
    pub async fn save(&self, file_name: Option<&str>, data: &[u8]) -> std::io::Result<String> {
        let name = file_name
            .and_then(safe_file_name)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(&name);
        tokio::fs::write(&path, data).await?;

        debug!("UploadStore: wrote {:?} ({} bytes)", path, data.len());
        Ok(name)
    }
}

/// Last path component of a client-supplied name, if it is a usable file name.
fn safe_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(|c| c == '/' || c == '\\').next()?.trim();
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }
    Some(base.to_string())
}
