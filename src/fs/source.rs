//! Byte sources consumed by the chunked character decoder

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use super::errors::{FsError, FsResult};

/// Forward-only source of bytes, read in bounded chunks.
pub trait ByteSource {
    /// Reads up to `max_bytes` from the current position.
    ///
    /// Returns an empty buffer once the source is exhausted.
    fn read_chunk(&mut self, max_bytes: usize) -> io::Result<Vec<u8>>;
}

/// A file opened for sequential chunk reads.
///
/// Holds one read handle for its whole lifetime; the handle is closed when
/// the source is dropped.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    file: File,
    offset: u64,
}

impl FileSource {
    /// Opens `path` for reading from the start.
    pub fn open(path: &Path) -> FsResult<Self> {
        let file = File::open(path).map_err(|e| FsError::new("open", path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            offset: 0,
        })
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes read so far
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl ByteSource for FileSource {
    fn read_chunk(&mut self, max_bytes: usize) -> io::Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(max_bytes);
        (&mut self.file)
            .take(max_bytes as u64)
            .read_to_end(&mut buffer)?;
        self.offset += buffer.len() as u64;
        Ok(buffer)
    }
}

/// In-memory byte source
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    bytes: Vec<u8>,
    position: usize,
}

impl MemorySource {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            position: 0,
        }
    }
}

impl ByteSource for MemorySource {
    fn read_chunk(&mut self, max_bytes: usize) -> io::Result<Vec<u8>> {
        let end = self.bytes.len().min(self.position + max_bytes);
        let chunk = self.bytes[self.position..end].to_vec();
        self.position = end;
        Ok(chunk)
    }
}
