//! Filesystem primitives used by the record stores

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::encoding::Encoding;
use super::errors::{FsError, FsResult};
use crate::crash_point::{maybe_crash, points};

/// Extension given to the sibling file used by `overwrite_whole_text`
pub const TEMP_EXTENSION: &str = "filestore-tmp";

/// Options for `delete`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Succeed when the path does not exist
    pub allow_missing: bool,
    /// Remove directories together with their contents
    pub recursive: bool,
}

impl DeleteOptions {
    /// Options that tolerate an absent path.
    pub fn allow_missing() -> Self {
        Self {
            allow_missing: true,
            recursive: false,
        }
    }

    /// Also delete directory contents.
    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }
}

/// One child of a listed directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub path: PathBuf,
    pub is_dir: bool,
}

impl DirEntryInfo {
    /// File extension, if any and if valid UTF-8
    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|ext| ext.to_str())
    }
}

/// Returns whether `path` exists.
pub fn exists(path: &Path) -> bool {
    path.exists()
}

/// Creates a new, empty file. Fails if the file already exists.
pub fn create_file(path: &Path) -> FsResult<()> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map(|_| ())
        .map_err(|e| FsError::new("create_file", path, e))
}

/// Creates a directory and any missing parents.
pub fn create_directory(path: &Path) -> FsResult<()> {
    fs::create_dir_all(path).map_err(|e| FsError::new("create_directory", path, e))
}

/// Deletes a file or directory.
///
/// Returns `true` if something was removed, `false` if the path was absent
/// and `options.allow_missing` is set.
pub fn delete(path: &Path, options: DeleteOptions) -> FsResult<bool> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound && options.allow_missing => {
            return Ok(false)
        }
        Err(e) => return Err(FsError::new("delete", path, e)),
    };

    let result = if metadata.is_dir() {
        if options.recursive {
            fs::remove_dir_all(path)
        } else {
            fs::remove_dir(path)
        }
    } else {
        fs::remove_file(path)
    };

    match result {
        Ok(()) => Ok(true),
        // Removed concurrently between the metadata call and the delete
        Err(e) if e.kind() == io::ErrorKind::NotFound && options.allow_missing => Ok(false),
        Err(e) => Err(FsError::new("delete", path, e)),
    }
}

/// Lists the direct children of `dir` in enumeration order.
pub fn list_children(dir: &Path) -> FsResult<Vec<DirEntryInfo>> {
    let mut children = Vec::new();

    for entry in fs::read_dir(dir).map_err(|e| FsError::new("list_children", dir, e))? {
        let entry = entry.map_err(|e| FsError::new("list_children", dir, e))?;
        let file_type = entry
            .file_type()
            .map_err(|e| FsError::new("list_children", entry.path(), e))?;
        children.push(DirEntryInfo {
            path: entry.path(),
            is_dir: file_type.is_dir(),
        });
    }

    Ok(children)
}

/// Reads and decodes the whole file.
pub fn read_whole_text(path: &Path, encoding: Encoding) -> FsResult<String> {
    let bytes = fs::read(path).map_err(|e| FsError::new("read_whole_text", path, e))?;
    encoding
        .decode(&bytes)
        .map_err(|e| FsError::new("read_whole_text", path, e))
}

/// Replaces the file's content in place (truncate, write, fsync).
pub fn write_whole_text(path: &Path, text: &str, encoding: Encoding) -> FsResult<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| FsError::new("write_whole_text", path, e))?;

    file.write_all(&encoding.encode(text))
        .map_err(|e| FsError::new("write_whole_text", path, e))?;

    file.sync_all()
        .map_err(|e| FsError::new("write_whole_text", path, e))
}

/// Path of the temporary sibling used while overwriting `path`.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(TEMP_EXTENSION);
    path.with_file_name(name)
}

/// Replaces the file's content atomically.
///
/// 1. Write the new content to a temp sibling
/// 2. fsync the temp file
/// 3. Rename over the target (atomic on POSIX)
/// 4. fsync the parent directory
///
/// A reader of `path` observes either the old or the new content, never a
/// mix.
pub fn overwrite_whole_text(path: &Path, text: &str, encoding: Encoding) -> FsResult<()> {
    let temp_path = temp_path_for(path);

    if let Err(e) = write_whole_text(&temp_path, text, encoding) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    maybe_crash(points::OVERWRITE_BEFORE_RENAME);

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        FsError::new("overwrite_whole_text", path, e)
    })?;

    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    maybe_crash(points::OVERWRITE_AFTER_RENAME);

    Ok(())
}

/// Reads up to `max_bytes` starting at `offset`. Returns fewer bytes (or
/// none) near the end of the file.
pub fn read_chunk(path: &Path, offset: u64, max_bytes: usize) -> FsResult<Vec<u8>> {
    let mut file = File::open(path).map_err(|e| FsError::new("read_chunk", path, e))?;
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| FsError::new("read_chunk", path, e))?;

    let mut buffer = Vec::with_capacity(max_bytes);
    file.take(max_bytes as u64)
        .read_to_end(&mut buffer)
        .map_err(|e| FsError::new("read_chunk", path, e))?;

    Ok(buffer)
}

/// Size of the file in bytes.
pub fn file_size(path: &Path) -> FsResult<u64> {
    fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| FsError::new("file_size", path, e))
}
