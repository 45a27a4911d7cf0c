//! Table layer: the hash table the ordered map mirrors.
//!
//! `SlotTable` is the contract the map consumes. It owns keys and values,
//! hands out stable slot indices for present keys and an `Epoch` that
//! moves exactly when the slot layout changes. `HashSlotTable` is the
//! default implementation over `hashbrown`'s raw SwissTable: deletions
//! leave tombstones and never move other entries, so slot indices only
//! change when the table rehashes.

use crate::error::OrderError;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use hashbrown::raw::RawTable;
use std::collections::hash_map::RandomState;

/// Layout generation of a table. Two equal epochs from the same table
/// guarantee identical slot assignments for every present key.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Epoch(u64);

impl Epoch {
    pub const fn initial() -> Self {
        Epoch(0)
    }

    /// The epoch following `self`.
    #[must_use]
    pub const fn advance(self) -> Self {
        Epoch(self.0.wrapping_add(1))
    }

    /// Number of layout changes since the table was created.
    pub const fn generation(self) -> u64 {
        self.0
    }
}

/// Hash table contract consumed by `OrderedMap`.
///
/// Implementations must keep `lookup_slot` deterministic for a fixed
/// epoch, and must advance the epoch whenever an operation may have moved
/// a present key to a different slot or changed `capacity()`.
pub trait SlotTable<K, V> {
    /// Hash a key or borrowed form of it with the table's hasher.
    fn hash_key<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash;

    /// Number of slots; slot indices are in `0..capacity()`.
    fn capacity(&self) -> usize;

    fn epoch(&self) -> Epoch;

    /// Slot currently holding `q`, or `None` when absent.
    fn lookup_slot<Q>(&self, q: &Q, hash: u64) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq;

    fn get<Q>(&self, q: &Q, hash: u64) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq;

    fn get_mut<Q>(&mut self, q: &Q, hash: u64) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq;

    /// Insert an absent key and report the slot it landed in. On error the
    /// table must be left untouched.
    fn set(&mut self, key: K, value: V, hash: u64) -> Result<usize, OrderError>;

    /// Remove `q` and hand back the stored key and value.
    fn delete<Q>(&mut self, q: &Q, hash: u64) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq;

    /// Make room for `additional` more entries without further layout
    /// changes.
    fn try_reserve(&mut self, additional: usize) -> Result<(), OrderError>;

    fn shrink_to_fit(&mut self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry. Slot layout may be kept.
    fn clear(&mut self);
}

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    hash: u64,
}

/// Default `SlotTable` built on `hashbrown::raw::RawTable`.
pub struct HashSlotTable<K, V, S = RandomState> {
    hasher: S,
    raw: RawTable<Entry<K, V>>,
    epoch: Epoch,
}

impl<K, V> HashSlotTable<K, V> {
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, RandomState::new())
    }
}

impl<K, V> Default for HashSlotTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> HashSlotTable<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            raw: RawTable::new(),
            epoch: Epoch::initial(),
        }
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            hasher,
            raw: RawTable::with_capacity(capacity),
            epoch: Epoch::initial(),
        }
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Layout changes (resizes and in-place rehashes) so far.
    pub fn rehash_count(&self) -> u64 {
        self.epoch.generation()
    }

    // Items that fit before the raw table has to rehash.
    fn growth_left(&self) -> usize {
        self.raw.capacity() - self.raw.len()
    }
}

impl<K, V, S> SlotTable<K, V> for HashSlotTable<K, V, S>
where
    K: Eq,
    S: BuildHasher,
{
    fn hash_key<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    fn capacity(&self) -> usize {
        self.raw.buckets()
    }

    fn epoch(&self) -> Epoch {
        self.epoch
    }

    fn lookup_slot<Q>(&self, q: &Q, hash: u64) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let bucket = self.raw.find(hash, |e| e.key.borrow() == q)?;
        // SAFETY: the bucket was just produced by this table's `find`.
        Some(unsafe { self.raw.bucket_index(&bucket) })
    }

    fn get<Q>(&self, q: &Q, hash: u64) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        self.raw
            .get(hash, |e| e.key.borrow() == q)
            .map(|e| &e.value)
    }

    fn get_mut<Q>(&mut self, q: &Q, hash: u64) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        self.raw
            .get_mut(hash, |e| e.key.borrow() == q)
            .map(|e| &mut e.value)
    }

    fn set(&mut self, key: K, value: V, hash: u64) -> Result<usize, OrderError> {
        // Reserve up front so the insert below never rehashes on its own
        // and every layout change is visible in the epoch.
        self.try_reserve(1)?;
        let bucket = self.raw.insert(hash, Entry { key, value, hash }, |e| e.hash);
        // SAFETY: the bucket was just produced by this table's `insert`.
        Ok(unsafe { self.raw.bucket_index(&bucket) })
    }

    fn delete<Q>(&mut self, q: &Q, hash: u64) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        self.raw
            .remove_entry(hash, |e| e.key.borrow() == q)
            .map(|e| (e.key, e.value))
    }

    fn try_reserve(&mut self, additional: usize) -> Result<(), OrderError> {
        let rehashes = additional > self.growth_left();
        self.raw.try_reserve(additional, |e| e.hash)?;
        if rehashes {
            self.epoch = self.epoch.advance();
        }
        Ok(())
    }

    fn shrink_to_fit(&mut self) {
        let before = self.raw.buckets();
        self.raw.shrink_to(self.raw.len(), |e| e.hash);
        if self.raw.buckets() != before {
            self.epoch = self.epoch.advance();
        }
    }

    fn len(&self) -> usize {
        self.raw.len()
    }

    fn clear(&mut self) {
        self.raw.clear();
    }
}
