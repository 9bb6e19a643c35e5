//! Directory-backed record store
//!
//! Each record lives in its own file, `root/<id>.<ext>`, where `<id>` is the
//! record id's `Display` form. Only regular files whose extension matches
//! (ASCII case-insensitive) are treated as records; anything else in the
//! directory is ignored. Lookups, updates and removals act on the file that
//! is actually present, so `7.TXT` is the record with id 7 for extension
//! `txt`. New records are always written with the configured extension.
//!
//! Batch writes are checked up front and then written one file at a time.
//! A process crash part-way through a batch can leave a prefix of the batch
//! on disk; a rejected batch never writes anything.

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::batch;
use super::errors::{StoreError, StoreResult};
use super::{IdFn, RecordIter, RecordStore};
use crate::config::{StoreConfig, StoreKind};
use crate::convert::RecordConverter;
use crate::crash_point::{maybe_crash, points};
use crate::fs::{self, DeleteOptions, DirEntryInfo, Encoding, FsError};

/// Default record file extension
pub const DEFAULT_EXTENSION: &str = "txt";

pub struct DirectoryStore<T, Id, C> {
    root: PathBuf,
    id_fn: IdFn<T, Id>,
    converter: C,
    extension: String,
    encoding: Encoding,
}

impl<T, Id, C> DirectoryStore<T, Id, C>
where
    Id: Eq + Hash + Display,
    C: RecordConverter<T>,
{
    /// Opens a store over an existing directory.
    ///
    /// # Errors
    ///
    /// Returns `ContainerMissing` if `root` is not an existing directory.
    pub fn open<F>(root: impl Into<PathBuf>, id_fn: F, converter: C) -> StoreResult<Self>
    where
        F: Fn(&T) -> Id + Send + Sync + 'static,
    {
        let root = root.into();
        if !root.is_dir() {
            return Err(StoreError::ContainerMissing { path: root });
        }

        Ok(Self {
            root,
            id_fn: Box::new(id_fn),
            converter,
            extension: DEFAULT_EXTENSION.to_string(),
            encoding: Encoding::default(),
        })
    }

    /// Opens a store described by a directory `config`.
    pub fn from_config<F>(config: &StoreConfig, id_fn: F, converter: C) -> StoreResult<Self>
    where
        F: Fn(&T) -> Id + Send + Sync + 'static,
    {
        config.validate()?;
        if config.kind != StoreKind::Directory {
            return Err(StoreError::config(format!(
                "expected a directory store config, got kind '{}'",
                config.kind
            )));
        }

        Ok(Self::open(&config.path, id_fn, converter)?
            .with_extension(&config.extension)
            .with_encoding(config.encoding))
    }

    /// Sets the record file extension (a leading `.` is ignored).
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn converter(&self) -> &C {
        &self.converter
    }

    /// File that holds (or would hold) the record with `id`, using the
    /// configured extension exactly.
    pub fn path_for(&self, id: &Id) -> PathBuf {
        if self.extension.is_empty() {
            self.root.join(id.to_string())
        } else {
            self.root.join(format!("{}.{}", id, self.extension))
        }
    }

    /// Id text of a record file, or `None` for entries that are not records.
    fn record_stem(&self, entry: &DirEntryInfo) -> Option<String> {
        if entry.is_dir {
            return None;
        }
        let matches = match entry.extension() {
            Some(ext) => ext.eq_ignore_ascii_case(&self.extension),
            None => self.extension.is_empty() && entry.path.extension().is_none(),
        };
        if !matches {
            return None;
        }
        entry
            .path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string)
    }

    fn record_paths(&self) -> StoreResult<Vec<PathBuf>> {
        Ok(fs::list_children(&self.root)?
            .into_iter()
            .filter(|entry| self.record_stem(entry).is_some())
            .map(|entry| entry.path)
            .collect())
    }

    /// Record files keyed by id text. When an id has files differing only
    /// in extension case, the exact extension wins.
    fn record_files(&self) -> StoreResult<HashMap<String, PathBuf>> {
        let mut files = HashMap::new();
        for entry in fs::list_children(&self.root)? {
            let Some(stem) = self.record_stem(&entry) else {
                continue;
            };
            let exact = entry.extension() == Some(self.extension.as_str());
            if exact || !files.contains_key(&stem) {
                files.insert(stem, entry.path);
            }
        }
        Ok(files)
    }

    /// Actual file of the record with `id`, whatever its extension case.
    fn locate(&self, id: &Id) -> StoreResult<Option<PathBuf>> {
        let exact = self.path_for(id);
        if exact.is_file() {
            return Ok(Some(exact));
        }
        if self.extension.is_empty() {
            return Ok(None);
        }
        Ok(self.record_files()?.remove(&id.to_string()))
    }

    fn read_record(&self, path: &Path) -> StoreResult<T> {
        let token = fs::read_whole_text(path, self.encoding)?;
        self.converter
            .from_token(&token)
            .map_err(|e| StoreError::decode(path.display().to_string(), e))
    }

    fn encode(&self, record: &T, id: &Id) -> StoreResult<String> {
        self.converter
            .to_token(record)
            .map_err(|e| StoreError::encode(id, e))
    }

    /// Encodes every record up front so a converter failure writes nothing.
    fn encode_all(&self, records: &[T], ids: &[Id]) -> StoreResult<Vec<String>> {
        records
            .iter()
            .zip(ids)
            .map(|(record, id)| self.encode(record, id))
            .collect()
    }

    fn overwrite_all(&self, targets: &[PathBuf], tokens: Vec<String>) -> StoreResult<()> {
        for (i, (path, token)) in targets.iter().zip(tokens).enumerate() {
            if i == 1 {
                maybe_crash(points::DIR_BATCH_AFTER_FIRST_WRITE);
            }
            fs::overwrite_whole_text(path, &token, self.encoding)?;
        }
        Ok(())
    }
}

impl<T, Id, C> RecordStore for DirectoryStore<T, Id, C>
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
        let paths = self.record_paths()?;
        Ok(Box::new(
            paths.into_iter().map(move |path| self.read_record(&path)),
        ))
    }

    fn select(&self, id: &Id) -> StoreResult<Option<T>> {
        match self.locate(id)? {
            Some(path) => self.read_record(&path).map(Some),
            None => Ok(None),
        }
    }

    fn contains(&self, id: &Id) -> StoreResult<bool> {
        Ok(self.locate(id)?.is_some())
    }

    fn insert_all<I>(&self, records: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = T>,
    {
        let records: Vec<T> = records.into_iter().collect();
        let ids: Vec<Id> = records.iter().map(|r| self.id_of(r)).collect();
        let files = self.record_files()?;

        let duplicates = batch::collisions(&ids, |id| files.contains_key(&id.to_string()));
        if !duplicates.is_empty() {
            let err = StoreError::duplicate_ids(duplicates);
            warn!(store = %self.root.display(), error = %err, "rejected insert batch");
            return Err(err);
        }

        // A non-record entry (such as a directory) may sit at a target path
        if let Some(path) = ids
            .iter()
            .map(|id| self.path_for(id))
            .find(|path| fs::exists(path))
        {
            let err = StoreError::Io(FsError::new(
                "insert",
                &path,
                io::Error::new(io::ErrorKind::AlreadyExists, "path is not a record file"),
            ));
            warn!(store = %self.root.display(), error = %err, "rejected insert batch");
            return Err(err);
        }

        let tokens = self.encode_all(&records, &ids)?;
        for (i, (id, token)) in ids.iter().zip(tokens).enumerate() {
            if i == 1 {
                maybe_crash(points::DIR_BATCH_AFTER_FIRST_WRITE);
            }
            let path = self.path_for(id);
            fs::create_file(&path)?;
            fs::write_whole_text(&path, &token, self.encoding)?;
        }

        debug!(store = %self.root.display(), inserted = ids.len(), "inserted records");
        Ok(())
    }

    fn update_all<I>(&self, records: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = T>,
    {
        let records: Vec<T> = records.into_iter().collect();
        let ids: Vec<Id> = records.iter().map(|r| self.id_of(r)).collect();
        let files = self.record_files()?;

        let missing = batch::missing(&ids, |id| files.contains_key(&id.to_string()));
        if !missing.is_empty() {
            let err = StoreError::not_found(missing);
            warn!(store = %self.root.display(), error = %err, "rejected update batch");
            return Err(err);
        }

        let targets: Vec<PathBuf> = ids
            .iter()
            .filter_map(|id| files.get(&id.to_string()).cloned())
            .collect();
        let tokens = self.encode_all(&records, &ids)?;
        self.overwrite_all(&targets, tokens)?;

        debug!(store = %self.root.display(), updated = ids.len(), "updated records");
        Ok(())
    }

    fn update_where<P, M>(&self, mut predicate: P, mut mutator: M) -> StoreResult<usize>
    where
        P: FnMut(&T) -> bool,
        M: FnMut(&mut T),
    {
        let mut targets = Vec::new();
        let mut records = Vec::new();
        let mut ids = Vec::new();

        for path in self.record_paths()? {
            let mut record = self.read_record(&path)?;
            if !predicate(&record) {
                continue;
            }

            let before = self.id_of(&record);
            mutator(&mut record);
            let after = self.id_of(&record);
            if let Err(err) = batch::ensure_same_id(&before, &after) {
                warn!(store = %self.root.display(), error = %err, "rejected conditional update");
                return Err(err);
            }

            targets.push(path);
            records.push(record);
            ids.push(after);
        }

        let tokens = self.encode_all(&records, &ids)?;
        self.overwrite_all(&targets, tokens)?;

        debug!(store = %self.root.display(), updated = ids.len(), "updated matching records");
        Ok(ids.len())
    }

    fn remove(&self, id: &Id) -> StoreResult<()> {
        let removed = match self.locate(id)? {
            Some(path) => fs::delete(&path, DeleteOptions::allow_missing())?,
            None => false,
        };
        debug!(store = %self.root.display(), id = %id, removed, "removed record");
        Ok(())
    }

    fn remove_where<P>(&self, mut predicate: P) -> StoreResult<usize>
    where
        P: FnMut(&T) -> bool,
    {
        let mut matched = Vec::new();
        for path in self.record_paths()? {
            let record = self.read_record(&path)?;
            if predicate(&record) {
                matched.push(path);
            }
        }

        for path in &matched {
            fs::delete(path, DeleteOptions::allow_missing())?;
        }

        debug!(store = %self.root.display(), removed = matched.len(), "removed matching records");
        Ok(matched.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{ConvertError, ConvertResult, FnConverter};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq)]
    struct Entry {
        key: i32,
        value: String,
    }

    fn entry(key: i32, value: &str) -> Entry {
        Entry {
            key,
            value: value.to_string(),
        }
    }

    type EntryConverter = FnConverter<fn(&Entry) -> String, fn(&str) -> ConvertResult<Entry>>;

    fn to_token(e: &Entry) -> String {
        format!("{} | {}", e.key, e.value)
    }

    fn from_token(token: &str) -> ConvertResult<Entry> {
        let (key, value) = token
            .split_once(" | ")
            .ok_or_else(|| ConvertError::malformed(token, "missing ' | '"))?;
        let key = key
            .parse()
            .map_err(|_| ConvertError::malformed(token, "key is not an integer"))?;
        Ok(entry(key, value))
    }

    fn open(temp: &TempDir) -> DirectoryStore<Entry, i32, EntryConverter> {
        let converter: EntryConverter = FnConverter::new(to_token, from_token);
        DirectoryStore::open(temp.path(), |e: &Entry| e.key, converter).unwrap()
    }

    fn sorted(mut entries: Vec<Entry>) -> Vec<Entry> {
        entries.sort_by_key(|e| e.key);
        entries
    }

    #[test]
    fn test_open_missing_directory() {
        let temp = TempDir::new().unwrap();
        let converter: EntryConverter = FnConverter::new(to_token, from_token);
        let result = DirectoryStore::open(temp.path().join("nope"), |e: &Entry| e.key, converter);
        assert!(matches!(result, Err(StoreError::ContainerMissing { .. })));
    }

    #[test]
    fn test_insert_writes_one_file_per_record() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        store.insert(entry(1, "a")).unwrap();

        let content = std::fs::read_to_string(temp.path().join("1.txt")).unwrap();
        assert_eq!(content, "1 | a");
        assert_eq!(store.select(&1).unwrap(), Some(entry(1, "a")));
        assert_eq!(store.select(&2).unwrap(), None);
    }

    #[test]
    fn test_insert_duplicate_rejected() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        store.insert(entry(1, "a")).unwrap();

        let err = store.insert(entry(1, "other")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId { ref ids } if ids == &["1"]));
        assert_eq!(store.select(&1).unwrap(), Some(entry(1, "a")));
    }

    #[test]
    fn test_insert_batch_is_all_or_nothing() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        store.insert(entry(2, "b")).unwrap();

        let err = store
            .insert_all(vec![entry(1, "a"), entry(2, "x"), entry(3, "c")])
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId { ref ids } if ids == &["2"]));

        assert!(!temp.path().join("1.txt").exists());
        assert!(!temp.path().join("3.txt").exists());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_insert_batch_with_repeated_id_rejected() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);

        let err = store
            .insert_all(vec![entry(5, "a"), entry(5, "b")])
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId { ref ids } if ids == &["5"]));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_update_missing_rejected() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        store.insert(entry(1, "a")).unwrap();

        let err = store
            .update_all(vec![entry(1, "z"), entry(7, "q"), entry(8, "r")])
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { ref ids } if ids == &["7", "8"]));
        assert_eq!(store.select(&1).unwrap(), Some(entry(1, "a")));
    }

    #[test]
    fn test_update_overwrites() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        store.insert_all(vec![entry(1, "a"), entry(2, "b")]).unwrap();

        store.update(entry(2, "x")).unwrap();

        assert_eq!(
            sorted(store.select_all().unwrap()),
            vec![entry(1, "a"), entry(2, "x")]
        );
    }

    #[test]
    fn test_update_where_mutates_matches_only() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        store
            .insert_all(vec![entry(1, "a"), entry(2, "b"), entry(3, "c")])
            .unwrap();

        let updated = store
            .update_where(|e| e.key >= 2, |e| e.value.push('!'))
            .unwrap();

        assert_eq!(updated, 2);
        assert_eq!(
            sorted(store.select_all().unwrap()),
            vec![entry(1, "a"), entry(2, "b!"), entry(3, "c!")]
        );
    }

    #[test]
    fn test_update_where_rejects_id_change() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        store.insert_all(vec![entry(1, "a"), entry(2, "b")]).unwrap();

        let err = store
            .update_where(|_| true, |e| {
                e.key += 10;
                e.value = "changed".into();
            })
            .unwrap_err();

        assert!(matches!(err, StoreError::IdChanged { .. }));
        assert_eq!(
            sorted(store.select_all().unwrap()),
            vec![entry(1, "a"), entry(2, "b")]
        );
    }

    #[test]
    fn test_remove_absent_is_not_error() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        store.insert(entry(1, "a")).unwrap();

        store.remove(&42).unwrap();
        assert_eq!(store.count().unwrap(), 1);

        store.remove(&1).unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_remove_where_and_clear() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        store
            .insert_all((1..=6).map(|k| entry(k, "v")))
            .unwrap();

        assert_eq!(store.remove_where(|e| e.key % 2 == 0).unwrap(), 3);
        assert_eq!(
            sorted(store.select_all().unwrap())
                .iter()
                .map(|e| e.key)
                .collect::<Vec<_>>(),
            vec![1, 3, 5]
        );
        assert_eq!(store.remove_where(|e| e.key > 100).unwrap(), 0);

        store.clear().unwrap();
        assert!(store.select_all().unwrap().is_empty());
    }

    #[test]
    fn test_foreign_files_are_ignored() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        store.insert(entry(1, "a")).unwrap();

        std::fs::write(temp.path().join("notes.md"), b"not a record").unwrap();
        std::fs::create_dir(temp.path().join("sub.txt")).unwrap();
        std::fs::write(temp.path().join("2.TXT"), b"2 | b").unwrap();

        assert_eq!(
            sorted(store.select_all().unwrap()),
            vec![entry(1, "a"), entry(2, "b")]
        );
    }

    fn file_names(temp: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_extension_case_variant_is_the_stored_record() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        std::fs::write(temp.path().join("2.TXT"), b"2 | b").unwrap();

        assert_eq!(store.select(&2).unwrap(), Some(entry(2, "b")));
        assert!(store.contains(&2).unwrap());

        let err = store.insert(entry(2, "again")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId { ref ids } if ids == &["2"]));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_extension_case_variant_is_updated_and_removed_in_place() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        std::fs::write(temp.path().join("7.TXT"), b"7 | q").unwrap();

        store.update(entry(7, "u")).unwrap();
        assert_eq!(file_names(&temp), vec!["7.TXT"]);
        assert_eq!(store.select(&7).unwrap(), Some(entry(7, "u")));

        assert_eq!(store.update_where(|_| true, |e| e.value.push('!')).unwrap(), 1);
        assert_eq!(file_names(&temp), vec!["7.TXT"]);
        assert_eq!(store.select_all().unwrap(), vec![entry(7, "u!")]);

        store.remove(&7).unwrap();
        assert!(file_names(&temp).is_empty());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_directory_at_record_path_is_not_a_record() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        std::fs::create_dir(temp.path().join("5.txt")).unwrap();

        assert_eq!(store.select(&5).unwrap(), None);
        assert!(!store.contains(&5).unwrap());

        let err = store
            .insert_all(vec![entry(4, "d"), entry(5, "e")])
            .unwrap_err();
        assert_eq!(err.code(), "FILESTORE_IO_ERROR");
        assert!(err.to_string().contains("5.txt"));
        assert_eq!(file_names(&temp), vec!["5.txt"]);

        let err = store.update(entry(5, "e")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { ref ids } if ids == &["5"]));
    }

    #[test]
    fn test_custom_extension() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp).with_extension(".rec");
        store.insert(entry(9, "nine")).unwrap();

        assert!(temp.path().join("9.rec").exists());
        assert_eq!(store.extension(), "rec");
    }

    #[test]
    fn test_decode_error_names_file() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        std::fs::write(temp.path().join("3.txt"), b"garbage").unwrap();

        let err = store.select(&3).unwrap_err();
        assert_eq!(err.code(), "FILESTORE_DECODE_FAILED");
        assert!(err.to_string().contains("3.txt"));
    }

    #[test]
    fn test_stream_is_restartable_per_call() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp);
        store.insert_all(vec![entry(1, "a"), entry(2, "b")]).unwrap();

        let first: Vec<Entry> = store.stream().unwrap().collect::<StoreResult<_>>().unwrap();
        let second: Vec<Entry> = store.stream().unwrap().collect::<StoreResult<_>>().unwrap();
        assert_eq!(sorted(first), sorted(second));
    }
}
