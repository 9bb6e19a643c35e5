//! Store configuration
//!
//! A store can be described by a small JSON document:
//!
//! ```json
//! { "kind": "file", "path": "data/entries.txt", "separator": "\n" }
//! ```
//!
//! Only `kind` and `path` are required. The configuration is validated on
//! load; `DirectoryStore::from_config` and `FileStore::from_config` validate
//! again before opening.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::fs::{Encoding, DEFAULT_CHUNK_SIZE, MIN_CHUNK_SIZE};
use crate::store::{ReadMode, StoreError, StoreResult};

/// Which backend a configuration describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Directory,
    File,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Directory => write!(f, "directory"),
            StoreKind::File => write!(f, "file"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend kind (required)
    pub kind: StoreKind,

    /// Store directory or file (required)
    pub path: PathBuf,

    /// Token separator for file stores (default "\n")
    #[serde(default = "default_separator")]
    pub separator: String,

    /// Record file extension for directory stores (default "txt")
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Text encoding (default "utf-8")
    #[serde(default)]
    pub encoding: Encoding,

    /// Read path for file stores (default "streaming")
    #[serde(default)]
    pub read_mode: ReadMode,

    /// Streaming chunk size in bytes (default 16 KiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: usize,
}

fn default_separator() -> String {
    "\n".to_string()
}
fn default_extension() -> String {
    "txt".to_string()
}
fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl StoreConfig {
    /// Defaults for a directory store at `path`.
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self::with_kind(StoreKind::Directory, path.into())
    }

    /// Defaults for a file store at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::with_kind(StoreKind::File, path.into())
    }

    fn with_kind(kind: StoreKind, path: PathBuf) -> Self {
        Self {
            kind,
            path,
            separator: default_separator(),
            extension: default_extension(),
            encoding: Encoding::default(),
            read_mode: ReadMode::default(),
            chunk_size_bytes: default_chunk_size(),
        }
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> StoreResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            StoreError::config(format!(
                "Failed to read config {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate configuration JSON
    pub fn from_json(json: &str) -> StoreResult<Self> {
        let config: StoreConfig = serde_json::from_str(json)
            .map_err(|e| StoreError::config(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    pub fn to_json(&self) -> StoreResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| StoreError::config(format!("Failed to serialize config: {}", e)))
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.path.as_os_str().is_empty() {
            return Err(StoreError::config("path must not be empty"));
        }

        if self.separator.is_empty() {
            return Err(StoreError::config("separator must not be empty"));
        }

        if self.extension.starts_with('.') {
            return Err(StoreError::config(format!(
                "extension '{}' must not start with '.'",
                self.extension
            )));
        }
        if self.extension.contains(['/', '\\']) {
            return Err(StoreError::config(format!(
                "extension '{}' must not contain path separators",
                self.extension
            )));
        }

        if self.chunk_size_bytes < MIN_CHUNK_SIZE {
            return Err(StoreError::config(format!(
                "chunk_size_bytes must be >= {}, got {}",
                MIN_CHUNK_SIZE, self.chunk_size_bytes
            )));
        }

        Ok(())
    }
}
