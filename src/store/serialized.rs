//! In-process serialization for a shared store
//!
//! Stores perform no locking of their own. `SerializedStore` holds a single
//! mutex and takes it for the whole of every call, so two threads sharing
//! one store cannot interleave a read-modify-write. A `stream()` traversal
//! holds the lock until its iterator is dropped.
//!
//! The lock is not re-entrant. Calling any method of the same
//! `SerializedStore` while one of its streams is still alive, on the same
//! thread, deadlocks. Collect or drop the stream first, or run nested calls
//! through `inner()`.
//!
//! This does not coordinate separate processes or separate store values
//! opened on the same path.

use std::sync::{Mutex, MutexGuard};

use super::errors::{StoreError, StoreResult};
use super::{RecordIter, RecordStore};

pub struct SerializedStore<S> {
    inner: S,
    lock: Mutex<()>,
}

impl<S: RecordStore> SerializedStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            lock: Mutex::new(()),
        }
    }

    /// The wrapped store. Calls made through it bypass the lock.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn acquire(&self, op: &'static str) -> StoreResult<MutexGuard<'_, ()>> {
        self.lock.lock().map_err(|_| StoreError::LockPoisoned(op))
    }
}

/// Iterator that keeps the store locked for the rest of a traversal.
struct Guarded<'a, T> {
    // declared before the guard so the read handle closes before unlock
    records: RecordIter<'a, T>,
    _guard: MutexGuard<'a, ()>,
}

impl<T> Iterator for Guarded<'_, T> {
    type Item = StoreResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.records.next()
    }
}

impl<S: RecordStore> RecordStore for SerializedStore<S> {
    type Record = S::Record;
    type Id = S::Id;

    fn id_of(&self, record: &S::Record) -> S::Id {
        self.inner.id_of(record)
    }

    fn stream(&self) -> StoreResult<RecordIter<'_, S::Record>> {
        let guard = self.acquire("stream")?;
        let records = self.inner.stream()?;
        Ok(Box::new(Guarded {
            records,
            _guard: guard,
        }))
    }

    fn select_all(&self) -> StoreResult<Vec<S::Record>> {
        let _guard = self.acquire("select_all")?;
        self.inner.select_all()
    }

    fn select(&self, id: &S::Id) -> StoreResult<Option<S::Record>> {
        let _guard = self.acquire("select")?;
        self.inner.select(id)
    }

    fn select_where<P>(&self, predicate: P) -> StoreResult<Vec<S::Record>>
    where
        P: FnMut(&S::Record) -> bool,
    {
        let _guard = self.acquire("select_where")?;
        self.inner.select_where(predicate)
    }

    fn insert(&self, record: S::Record) -> StoreResult<()> {
        let _guard = self.acquire("insert")?;
        self.inner.insert(record)
    }

    fn insert_all<I>(&self, records: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = S::Record>,
    {
        let _guard = self.acquire("insert_all")?;
        self.inner.insert_all(records)
    }

    fn update(&self, record: S::Record) -> StoreResult<()> {
        let _guard = self.acquire("update")?;
        self.inner.update(record)
    }

    fn update_all<I>(&self, records: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = S::Record>,
    {
        let _guard = self.acquire("update_all")?;
        self.inner.update_all(records)
    }

    fn update_where<P, M>(&self, predicate: P, mutator: M) -> StoreResult<usize>
    where
        P: FnMut(&S::Record) -> bool,
        M: FnMut(&mut S::Record),
    {
        let _guard = self.acquire("update_where")?;
        self.inner.update_where(predicate, mutator)
    }

    fn remove(&self, id: &S::Id) -> StoreResult<()> {
        let _guard = self.acquire("remove")?;
        self.inner.remove(id)
    }

    fn remove_where<P>(&self, predicate: P) -> StoreResult<usize>
    where
        P: FnMut(&S::Record) -> bool,
    {
        let _guard = self.acquire("remove_where")?;
        self.inner.remove_where(predicate)
    }

    fn clear(&self) -> StoreResult<()> {
        let _guard = self.acquire("clear")?;
        self.inner.clear()
    }

    fn count(&self) -> StoreResult<usize> {
        let _guard = self.acquire("count")?;
        self.inner.count()
    }

    fn contains(&self, id: &S::Id) -> StoreResult<bool> {
        let _guard = self.acquire("contains")?;
        self.inner.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::DisplayConverter;
    use crate::store::FileStore;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    type Numbers = FileStore<u32, u32, DisplayConverter<u32>>;

    fn numbers(temp: &TempDir) -> Numbers {
        let path = temp.path().join("numbers.txt");
        std::fs::write(&path, "").unwrap();
        FileStore::open(path, ",", |n: &u32| *n, DisplayConverter::new()).unwrap()
    }

    #[test]
    fn test_delegates_to_inner_store() {
        let temp = TempDir::new().unwrap();
        let store = SerializedStore::new(numbers(&temp));

        store.insert_all(vec![1, 2, 3]).unwrap();
        assert_eq!(store.count().unwrap(), 3);
        assert!(store.contains(&2).unwrap());

        store.remove(&2).unwrap();
        assert_eq!(store.select_all().unwrap(), vec![1, 3]);
        assert_eq!(
            std::fs::read_to_string(store.inner().path()).unwrap(),
            "1,3"
        );
    }

    #[test]
    fn test_concurrent_inserts_are_not_lost() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(SerializedStore::new(numbers(&temp)));

        let handles: Vec<_> = (0..4u32)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..10u32 {
                        store.insert(t * 100 + i).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut all = store.select_all().unwrap();
        all.sort_unstable();
        let mut expected: Vec<u32> = (0..4u32)
            .flat_map(|t| (0..10u32).map(move |i| t * 100 + i))
            .collect();
        expected.sort_unstable();
        assert_eq!(all, expected);
    }

    #[test]
    fn test_stream_holds_lock_until_dropped() {
        let temp = TempDir::new().unwrap();
        let store = SerializedStore::new(numbers(&temp));
        store.insert_all(vec![1, 2]).unwrap();

        let stream = store.stream().unwrap();
        assert!(store.lock.try_lock().is_err());
        drop(stream);
        assert!(store.lock.try_lock().is_ok());
    }

    #[test]
    fn test_poisoned_lock_is_reported() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(SerializedStore::new(numbers(&temp)));

        let poisoner = Arc::clone(&store);
        let _ = thread::spawn(move || {
            let _guard = poisoner.lock.lock().unwrap();
            panic!("poison the store lock");
        })
        .join();

        let err = store.count().unwrap_err();
        assert!(matches!(err, StoreError::LockPoisoned("count")));
        assert_eq!(err.code(), "FILESTORE_LOCK_POISONED");
    }
}
