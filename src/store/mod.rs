//! Record stores
//!
//! A record store persists caller-defined records as files, with no
//! database engine and no in-memory cache. Every call re-reads the backing
//! directory or file; every mutating call writes back before returning.
//!
//! # Backends
//!
//! - `DirectoryStore`: one file per record, `root/<id>.<ext>`
//! - `FileStore`: all records in one file, separated by a fixed token
//!
//! # Guarantees
//!
//! - No two stored records share an id
//! - Rejected batches (duplicate, missing, or changed ids) leave storage
//!   untouched
//! - No locking: concurrent mutating calls on the same path can lose
//!   updates. Wrap a store in `SerializedStore`, or serialize externally.

mod batch;
mod dir_store;
mod errors;
mod file_store;
mod serialized;
mod stream;

use std::fmt::Display;
use std::hash::Hash;

pub use dir_store::DirectoryStore;
pub use errors::{StoreError, StoreResult};
pub use file_store::{FileStore, ReadMode};
pub use serialized::SerializedStore;
pub use stream::RecordStream;

/// Identity function supplied by the caller
pub type IdFn<T, Id> = Box<dyn Fn(&T) -> Id + Send + Sync>;

/// Lazily produced records; each item is decoded on demand.
pub type RecordIter<'a, T> = Box<dyn Iterator<Item = StoreResult<T>> + 'a>;

/// CRUD contract shared by every backend.
///
/// Single-record forms default to the batch forms, and reads default to a
/// scan of `stream()`. Backends override where they can do better.
pub trait RecordStore {
    type Record;
    type Id: Eq + Hash + Display;

    /// Identity of `record`.
    fn id_of(&self, record: &Self::Record) -> Self::Id;

    /// Fresh traversal over every stored record.
    fn stream(&self) -> StoreResult<RecordIter<'_, Self::Record>>;

    /// All stored records.
    fn select_all(&self) -> StoreResult<Vec<Self::Record>> {
        self.stream()?.collect()
    }

    /// The record with `id`, if stored.
    fn select(&self, id: &Self::Id) -> StoreResult<Option<Self::Record>> {
        for record in self.stream()? {
            let record = record?;
            if self.id_of(&record) == *id {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// All records matching `predicate`.
    fn select_where<P>(&self, mut predicate: P) -> StoreResult<Vec<Self::Record>>
    where
        P: FnMut(&Self::Record) -> bool,
    {
        let mut selected = Vec::new();
        for record in self.stream()? {
            let record = record?;
            if predicate(&record) {
                selected.push(record);
            }
        }
        Ok(selected)
    }

    /// Inserts one record. Fails with `DuplicateId` if its id is stored.
    fn insert(&self, record: Self::Record) -> StoreResult<()> {
        self.insert_all(std::iter::once(record))
    }

    /// Inserts a batch. If any id is already stored or repeats within the
    /// batch, fails with `DuplicateId` naming every colliding id and writes
    /// nothing.
    fn insert_all<I>(&self, records: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = Self::Record>;

    /// Replaces one stored record. Fails with `NotFound` if absent.
    fn update(&self, record: Self::Record) -> StoreResult<()> {
        self.update_all(std::iter::once(record))
    }

    /// Replaces a batch. If any id is not stored, fails with `NotFound`
    /// naming every missing id and writes nothing.
    fn update_all<I>(&self, records: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = Self::Record>;

    /// Applies `mutator` to every record matching `predicate` and writes
    /// them back. Returns the number of updated records.
    ///
    /// Fails with `IdChanged` if the mutator changes any record's id; no
    /// record is written in that case.
    fn update_where<P, M>(&self, predicate: P, mutator: M) -> StoreResult<usize>
    where
        P: FnMut(&Self::Record) -> bool,
        M: FnMut(&mut Self::Record);

    /// Removes the record with `id`. Absent ids are not an error.
    fn remove(&self, id: &Self::Id) -> StoreResult<()>;

    /// Removes every record matching `predicate`. Returns how many were
    /// removed.
    fn remove_where<P>(&self, predicate: P) -> StoreResult<usize>
    where
        P: FnMut(&Self::Record) -> bool;

    /// Removes every record.
    fn clear(&self) -> StoreResult<()> {
        self.remove_where(|_| true).map(|_| ())
    }

    /// Number of stored records.
    fn count(&self) -> StoreResult<usize> {
        let mut count = 0;
        for record in self.stream()? {
            record?;
            count += 1;
        }
        Ok(count)
    }

    /// Whether a record with `id` is stored.
    fn contains(&self, id: &Self::Id) -> StoreResult<bool> {
        Ok(self.select(id)?.is_some())
    }
}
