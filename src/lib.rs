//! filestore - An embedded record store backed by plain files
//!
//! Records are caller-defined values with a caller-defined id. A converter
//! turns a record into a text token and back. Two backends persist tokens:
//!
//! - `DirectoryStore`: one file per record
//! - `FileStore`: a single file of separator-joined tokens, read either
//!   eagerly or through a bounded-memory streaming reader
//!
//! There is no cache and no engine: every call goes to the filesystem.

pub mod config;
pub mod convert;
pub mod crash_point;
pub mod fs;
pub mod store;

pub use config::{StoreConfig, StoreKind};
pub use convert::{
    CollectionConverter, ConvertError, ConvertResult, DisplayConverter, FnConverter,
    JsonConverter, RecordConverter,
};
pub use fs::Encoding;
pub use store::{
    DirectoryStore, FileStore, ReadMode, RecordStore, RecordStream, SerializedStore, StoreError,
    StoreResult,
};
