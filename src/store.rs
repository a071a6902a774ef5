//! sled-backed persistence for every market record
//!
//! All records live in one sled tree keyed `"{kind}/{id}"` and are encoded
//! as CBOR. Writes that touch more than one record are collected in a
//! [`WriteSet`] and applied as a single batch, so a reservation and the
//! resource whose status it drives are never stored half-updated.
use crate::error::{MarketError, MarketResult};
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// A value that can be stored under its own id.
pub trait Record: minicbor::Encode<()> + for<'b> minicbor::Decode<'b, ()> {
    /// Key prefix and the noun used in `NotFound` errors.
    const KIND: &'static str;

    fn id(&self) -> &str;
}

fn key_for<T: Record>(id: &str) -> String {
    format!("{}/{}", T::KIND, id)
}

#[derive(Clone)]
pub struct Store {
    instance: Arc<sled::Db>,
    locks: Arc<KeyedLocks>,
}

impl Store {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self {
            instance,
            locks: Arc::new(KeyedLocks::default()),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> MarketResult<Self> {
        let db = sled::open(path)?;
        Ok(Self::new(Arc::new(db)))
    }

    pub fn get<T: Record>(&self, id: &str) -> MarketResult<Option<T>> {
        match self.instance.get(key_for::<T>(id))? {
            Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Like [`Store::get`] but a missing record is a `NotFound` error.
    pub fn fetch<T: Record>(&self, id: &str) -> MarketResult<T> {
        self.get(id)?.ok_or_else(|| MarketError::not_found(T::KIND, id))
    }

    pub fn all<T: Record>(&self) -> MarketResult<Vec<T>> {
        self.filter(|_: &T| true)
    }

    pub fn filter<T: Record>(&self, predicate: impl Fn(&T) -> bool) -> MarketResult<Vec<T>> {
        let prefix = format!("{}/", T::KIND);
        let mut found = vec![];

        for entry in self.instance.scan_prefix(prefix) {
            let (_, bytes) = entry?;
            let record: T = minicbor::decode(&bytes)?;
            if predicate(&record) {
                found.push(record);
            }
        }

        Ok(found)
    }

    pub fn put<T: Record>(&self, record: &T) -> MarketResult<()> {
        self.instance
            .insert(key_for::<T>(record.id()), minicbor::to_vec(record)?)?;
        Ok(())
    }

    /// Returns whether a record was removed.
    pub fn remove<T: Record>(&self, id: &str) -> MarketResult<bool> {
        Ok(self.instance.remove(key_for::<T>(id))?.is_some())
    }

    pub fn write_set(&self) -> WriteSet {
        WriteSet::default()
    }

    /// Hold the lock serialising check-then-write sequences on one resource.
    pub fn lock(&self, resource_id: &str) -> ResourceGuard<'_> {
        self.locks.lock(resource_id)
    }

    /// Resources currently locked or waited on.
    pub fn locked_resources(&self) -> usize {
        self.locks.len()
    }
}

/// Records to be written together; nothing is stored until [`WriteSet::commit`].
#[derive(Default)]
pub struct WriteSet {
    batch: sled::Batch,
    pending: usize,
}

impl WriteSet {
    pub fn put<T: Record>(&mut self, record: &T) -> MarketResult<&mut Self> {
        self.batch
            .insert(key_for::<T>(record.id()).as_bytes(), minicbor::to_vec(record)?);
        self.pending += 1;
        Ok(self)
    }

    pub fn delete<T: Record>(&mut self, id: &str) -> &mut Self {
        self.batch.remove(key_for::<T>(id).as_bytes());
        self.pending += 1;
        self
    }

    pub fn len(&self) -> usize {
        self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending == 0
    }

    pub fn commit(self, store: &Store) -> MarketResult<()> {
        store.instance.apply_batch(self.batch)?;
        Ok(())
    }
}

/// One mutex per resource id, created on first use and dropped once nobody holds it.
#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn lock(&self, key: &str) -> ResourceGuard<'_> {
        let entry = self.locks.lock().entry(key.to_string()).or_default().clone();

        ResourceGuard {
            key: key.to_string(),
            guard: Some(entry.lock_arc()),
            owner: self,
        }
    }

    /// Resources with a live entry.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, key: &str) {
        let mut locks = self.locks.lock();
        // the map holds the last reference: no one is waiting on this resource
        if locks.get(key).is_some_and(|entry| Arc::strong_count(entry) == 1) {
            locks.remove(key);
        }
    }
}

/// Exclusive hold on one resource, released on drop.
pub struct ResourceGuard<'a> {
    key: String,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
    owner: &'a KeyedLocks,
}

impl Drop for ResourceGuard<'_> {
    fn drop(&mut self) {
        // unlock first so the entry's only remaining reference is the map's
        self.guard.take();
        self.owner.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, minicbor::Encode, minicbor::Decode)]
    struct Crate {
        #[n(0)]
        id: String,
        #[n(1)]
        weight: u32,
    }

    impl Record for Crate {
        const KIND: &'static str = "crate";

        fn id(&self) -> &str {
            &self.id
        }
    }

    fn store() -> (tempfile::TempDir, Store) {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("store.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn put_get_and_filter() {
        let (_dir, store) = store();
        store.put(&Crate { id: "a".into(), weight: 10 }).unwrap();
        store.put(&Crate { id: "b".into(), weight: 30 }).unwrap();

        let a: Crate = store.fetch("a").unwrap();
        assert_eq!(a.weight, 10);

        let heavy = store.filter(|c: &Crate| c.weight > 20).unwrap();
        assert_eq!(heavy, vec![Crate { id: "b".into(), weight: 30 }]);
    }

    #[test]
    fn missing_record_is_not_found() {
        let (_dir, store) = store();
        let err = store.fetch::<Crate>("ghost").unwrap_err();
        assert!(err.is_not_found());
        assert!(store.get::<Crate>("ghost").unwrap().is_none());
    }

    #[test]
    fn write_set_applies_everything_on_commit() {
        let (_dir, store) = store();
        store.put(&Crate { id: "old".into(), weight: 1 }).unwrap();

        let mut writes = store.write_set();
        writes
            .put(&Crate { id: "new".into(), weight: 2 })
            .unwrap()
            .delete::<Crate>("old");
        assert_eq!(writes.len(), 2);

        // nothing visible before commit
        assert!(store.get::<Crate>("new").unwrap().is_none());

        writes.commit(&store).unwrap();
        assert!(store.get::<Crate>("old").unwrap().is_none());
        assert_eq!(store.fetch::<Crate>("new").unwrap().weight, 2);
    }

    #[test]
    fn same_key_is_exclusive_and_entries_are_dropped_when_idle() {
        let locks = Arc::new(KeyedLocks::default());

        let held = locks.lock("equipment_1");
        let other = locks.lock("equipment_2");
        assert_eq!(locks.len(), 2);

        let contender = {
            let locks = Arc::clone(&locks);
            std::thread::spawn(move || {
                let _second = locks.lock("equipment_1");
            })
        };
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(!contender.is_finished());

        drop(held);
        contender.join().unwrap();
        drop(other);
        assert!(locks.is_empty());
    }
}
