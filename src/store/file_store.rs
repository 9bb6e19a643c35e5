//! Single-file record store
//!
//! All records live in one text file as tokens joined by a separator.
//! Reads decode the file either eagerly (whole file in memory) or through
//! `RecordStream`. Every mutation is one read-modify-rewrite, and the
//! rewrite replaces the file atomically. A record whose token would be
//! empty is refused with `Encode`, since it could not be read back.

use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::hash::Hash;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::batch;
use super::errors::{StoreError, StoreResult};
use super::stream::RecordStream;
use super::{IdFn, RecordIter, RecordStore};
use crate::config::{StoreConfig, StoreKind};
use crate::convert::{CollectionConverter, RecordConverter};
use crate::fs::{self, Encoding, DEFAULT_CHUNK_SIZE};

/// How `FileStore` decodes the backing file on reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadMode {
    /// Read the whole file, then split it
    Eager,
    /// Decode incrementally with bounded memory
    #[default]
    Streaming,
}

pub struct FileStore<T, Id, C> {
    path: PathBuf,
    id_fn: IdFn<T, Id>,
    converter: CollectionConverter<C>,
    encoding: Encoding,
    read_mode: ReadMode,
    chunk_size: usize,
}

impl<T, Id, C> FileStore<T, Id, C>
where
    Id: Eq + Hash + Display,
    C: RecordConverter<T>,
{
    /// Opens a store over an existing file whose tokens are joined by
    /// `separator`.
    ///
    /// # Errors
    ///
    /// `Config` for an empty separator, `ContainerMissing` if `path` is not
    /// an existing file.
    pub fn open<F>(
        path: impl Into<PathBuf>,
        separator: &str,
        id_fn: F,
        converter: C,
    ) -> StoreResult<Self>
    where
        F: Fn(&T) -> Id + Send + Sync + 'static,
    {
        let converter = CollectionConverter::new(converter, separator)
            .map_err(|e| StoreError::config(e.to_string()))?;
        Self::open_with(path, id_fn, converter)
    }

    /// Opens a store with an already-built collection converter.
    pub fn open_with<F>(
        path: impl Into<PathBuf>,
        id_fn: F,
        converter: CollectionConverter<C>,
    ) -> StoreResult<Self>
    where
        F: Fn(&T) -> Id + Send + Sync + 'static,
    {
        let path = path.into();
        if !path.is_file() {
            return Err(StoreError::ContainerMissing { path });
        }

        Ok(Self {
            path,
            id_fn: Box::new(id_fn),
            converter,
            encoding: Encoding::default(),
            read_mode: ReadMode::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Opens a store described by a file `config`.
    pub fn from_config<F>(config: &StoreConfig, id_fn: F, converter: C) -> StoreResult<Self>
    where
        F: Fn(&T) -> Id + Send + Sync + 'static,
    {
        config.validate()?;
        if config.kind != StoreKind::File {
            return Err(StoreError::config(format!(
                "expected a file store config, got kind '{}'",
                config.kind
            )));
        }

        Ok(Self::open(&config.path, &config.separator, id_fn, converter)?
            .with_encoding(config.encoding)
            .with_read_mode(config.read_mode)
            .with_chunk_size(config.chunk_size_bytes))
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_read_mode(mut self, read_mode: ReadMode) -> Self {
        self.read_mode = read_mode;
        self
    }

    /// Chunk size for the streaming read path.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn separator(&self) -> &str {
        self.converter.separator()
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn read_mode(&self) -> ReadMode {
        self.read_mode
    }

    fn eager_records(&self) -> StoreResult<Vec<T>> {
        let text = fs::read_whole_text(&self.path, self.encoding)?;
        self.converter
            .tokens(&text)
            .enumerate()
            .map(|(index, token)| {
                self.converter.converter().from_token(token).map_err(|e| {
                    StoreError::decode(format!("{}#{}", self.path.display(), index), e)
                })
            })
            .collect()
    }

    /// Current collection, read according to the configured mode.
    fn load(&self) -> StoreResult<Vec<T>> {
        match self.read_mode {
            ReadMode::Eager => self.eager_records(),
            ReadMode::Streaming => self.stream()?.collect(),
        }
    }

    /// Replaces the file content with `records`.
    fn rewrite(&self, records: &[T]) -> StoreResult<()> {
        let tokens = records
            .iter()
            .map(|record| {
                self.converter
                    .encode_element(record)
                    .map_err(|e| StoreError::encode(&self.id_of(record), e))
            })
            .collect::<StoreResult<Vec<_>>>()?;

        let text = self.converter.join_tokens(&tokens);
        fs::overwrite_whole_text(&self.path, &text, self.encoding)?;
        Ok(())
    }
}

impl<T, Id, C> RecordStore for FileStore<T, Id, C>
where
    Id: Eq + Hash + Display,
    C: RecordConverter<T>,
{
    type Record = T;
    type Id = Id;

    fn id_of(&self, record: &T) -> Id {
        (self.id_fn)(record)
    }

    fn stream(&self) -> StoreResult<RecordIter<'_, T>> {
        match self.read_mode {
            ReadMode::Eager => {
                let records = self.eager_records()?;
                Ok(Box::new(records.into_iter().map(Ok::<T, StoreError>)))
            }
            ReadMode::Streaming => Ok(Box::new(RecordStream::open(
                &self.path,
                self.encoding,
                self.chunk_size,
                &self.converter,
            )?)),
        }
    }

    fn insert_all<I>(&self, records: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = T>,
    {
        let incoming: Vec<T> = records.into_iter().collect();
        let mut current = self.load()?;

        let existing: HashSet<Id> = current.iter().map(|r| self.id_of(r)).collect();
        let ids: Vec<Id> = incoming.iter().map(|r| self.id_of(r)).collect();
        let duplicates = batch::collisions(&ids, |id| existing.contains(id));
        if !duplicates.is_empty() {
            let err = StoreError::duplicate_ids(duplicates);
            warn!(store = %self.path.display(), error = %err, "rejected insert batch");
            return Err(err);
        }

        current.extend(incoming);
        self.rewrite(&current)?;

        debug!(
            store = %self.path.display(),
            inserted = ids.len(),
            total = current.len(),
            "inserted records"
        );
        Ok(())
    }

    fn update_all<I>(&self, records: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = T>,
    {
        let incoming: Vec<T> = records.into_iter().collect();
        let mut current = self.load()?;

        let mut positions: HashMap<Id, usize> = HashMap::with_capacity(current.len());
        for (i, record) in current.iter().enumerate() {
            positions.entry(self.id_of(record)).or_insert(i);
        }

        let ids: Vec<Id> = incoming.iter().map(|r| self.id_of(r)).collect();
        let missing = batch::missing(&ids, |id| positions.contains_key(id));
        if !missing.is_empty() {
            let err = StoreError::not_found(missing);
            warn!(store = %self.path.display(), error = %err, "rejected update batch");
            return Err(err);
        }

        let updated = incoming.len();
        for (record, id) in incoming.into_iter().zip(&ids) {
            if let Some(&i) = positions.get(id) {
                current[i] = record;
            }
        }
        self.rewrite(&current)?;

        debug!(store = %self.path.display(), updated, "updated records");
        Ok(())
    }

    fn update_where<P, M>(&self, mut predicate: P, mut mutator: M) -> StoreResult<usize>
    where
        P: FnMut(&T) -> bool,
        M: FnMut(&mut T),
    {
        let mut current = self.load()?;
        let mut updated = 0;

        for record in current.iter_mut() {
            if !predicate(&*record) {
                continue;
            }

            let before = self.id_of(record);
            mutator(record);
            let after = self.id_of(record);
            if let Err(err) = batch::ensure_same_id(&before, &after) {
                warn!(store = %self.path.display(), error = %err, "rejected conditional update");
                return Err(err);
            }
            updated += 1;
        }

        self.rewrite(&current)?;

        debug!(store = %self.path.display(), updated, "updated matching records");
        Ok(updated)
    }

    fn remove(&self, id: &Id) -> StoreResult<()> {
        self.remove_where(|record| self.id_of(record) == *id)
            .map(|_| ())
    }

    fn remove_where<P>(&self, mut predicate: P) -> StoreResult<usize>
    where
        P: FnMut(&T) -> bool,
    {
        let mut current = self.load()?;
        let before = current.len();
        current.retain(|record| !predicate(record));
        let removed = before - current.len();

        self.rewrite(&current)?;

        debug!(store = %self.path.display(), removed, "removed matching records");
        Ok(removed)
    }

    fn clear(&self) -> StoreResult<()> {
        self.rewrite(&[])?;
        debug!(store = %self.path.display(), "cleared store");
        Ok(())
    }
}
