//! Filesystem blob store
//!
//! Objects are written below a root directory. URLs are formed from a public
//! base URL, which defaults to a `file://` URL of the root.

use crate::store::{BlobStore, StoreError};
use std::fs;
use std::path::{Component, Path, PathBuf};

pub struct LocalStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalStore {
    /// Create the root directory if needed
    pub fn new(root: &Path, public_base_url: Option<&str>) -> Result<Self, StoreError> {
        fs::create_dir_all(root)?;
        let root = root.canonicalize()?;

        let public_base_url = match public_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("file://{}", root.display()),
        };

        tracing::info!("Local store writing to {:?} ({})", root, public_base_url);

        Ok(Self {
            root,
            public_base_url,
        })
    }

    /// Map a destination path to a file below the root
    fn resolve(&self, destination_path: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(destination_path);
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));

        if destination_path.is_empty() || !plain {
            return Err(StoreError::InvalidPath(destination_path.to_string()));
        }

        Ok(self.root.join(relative))
    }
}

impl BlobStore for LocalStore {
    fn name(&self) -> &'static str {
        "local"
    }

    fn store(&self, bytes: &[u8], destination_path: &str) -> Result<String, StoreError> {
        let path = self.resolve(destination_path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;

        tracing::debug!("Stored {} bytes at {:?}", bytes.len(), path);

        Ok(format!("{}/{}", self.public_base_url, destination_path))
    }
}
