//! Synchronous file loader rooted at the content directory. States load
//! shaders, tracks, and other documents through it during `init`; errors
//! carry the resolved path so the log points at the missing file.
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("resource not found at {0}")]
    Missing(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct ResourceLoader {
    root: PathBuf,
}

impl ResourceLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    pub fn load_bytes(&self, relative: impl AsRef<Path>) -> Result<Vec<u8>, ResourceError> {
        let path = self.resolve(relative);
        if !path.is_file() {
            return Err(ResourceError::Missing(path));
        }
        fs::read(&path).map_err(|source| ResourceError::Read { path, source })
    }

    pub fn load_text(&self, relative: impl AsRef<Path>) -> Result<String, ResourceError> {
        let path = self.resolve(relative);
        if !path.is_file() {
            return Err(ResourceError::Missing(path));
        }
        fs::read_to_string(&path).map_err(|source| ResourceError::Read { path, source })
    }
}
