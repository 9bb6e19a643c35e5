//! Filesystem layer for filestore
//!
//! The record stores never touch `std::fs` directly. Every interaction with
//! durable storage goes through the narrow primitives in this module:
//!
//! - Existence checks, file / directory creation, deletion
//! - Directory listing
//! - Whole-text reads and writes (atomic overwrite via temp + rename)
//! - Byte-range chunk reads and size queries
//! - Chunked character decoding (`CharDecoder`) over a `ByteSource`

mod decoder;
mod encoding;
mod errors;
mod ops;
mod source;

pub use decoder::{CharDecoder, DEFAULT_CHUNK_SIZE, MIN_CHUNK_SIZE};
pub use encoding::{Encoding, UnknownEncoding};
pub use errors::{FsError, FsResult};
pub use ops::{
    create_directory, create_file, delete, exists, file_size, list_children,
    overwrite_whole_text, read_chunk, read_whole_text, temp_path_for, write_whole_text,
    DeleteOptions, DirEntryInfo, TEMP_EXTENSION,
};
pub use source::{ByteSource, FileSource, MemorySource};
