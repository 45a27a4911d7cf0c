//! OrderedMap: hash table + order list + slot mirror.
//!
//! Values live in the table. The order list holds one node per key, and
//! the slot mirror turns the table's slot for a key into that key's node
//! in O(1). The mirror is rebuilt lazily, only after the table's epoch
//! moves.

use crate::cursor::{Cursor, Direction, Iter};
use crate::error::OrderError;
use crate::order_list::{End, Node, NodeId, OrderList};
use crate::reentrancy::DebugReentrancy;
use crate::slot_mirror::SlotMirror;
use crate::table::{HashSlotTable, SlotTable};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::marker::PhantomData;

fn violation(what: &'static str) -> OrderError {
    log::error!("ordered map invariant violated: {what}");
    OrderError::InvariantViolation(what)
}

/// Insertion-ordered hash map with O(1) move-to-end and pop from either
/// end.
///
/// New keys always join at the back. Overwriting the value of a present
/// key keeps its position and is not a structural change.
pub struct OrderedMap<K, V, T = HashSlotTable<K, V>> {
    table: T,
    list: OrderList<K>,
    mirror: SlotMirror,
    reentrancy: DebugReentrancy,
    _values: PhantomData<V>,
}

impl<K, V> OrderedMap<K, V>
where
    K: Eq,
{
    pub fn new() -> Self {
        Self::with_table(HashSlotTable::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_table(HashSlotTable::with_capacity(capacity))
    }
}

impl<K, V> Default for OrderedMap<K, V>
where
    K: Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> OrderedMap<K, V, HashSlotTable<K, V, S>>
where
    K: Eq,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_table(HashSlotTable::with_hasher(hasher))
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self::with_table(HashSlotTable::with_capacity_and_hasher(capacity, hasher))
    }
}

impl<K, V, T> OrderedMap<K, V, T>
where
    K: Eq,
    T: SlotTable<K, V>,
{
    /// Build a map over `table`. The table is cleared first: order can only
    /// be tracked for keys inserted through the map.
    pub fn with_table(mut table: T) -> Self {
        table.clear();
        let mirror = SlotMirror::new(table.capacity(), table.epoch());
        Self {
            table,
            list: OrderList::new(),
            mirror,
            reentrancy: DebugReentrancy::new(),
            _values: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    /// Counter of order-affecting changes. Value overwrites and no-op moves
    /// leave it untouched.
    pub fn mutation_count(&self) -> u64 {
        self.list.mutations()
    }

    /// How many times the slot mirror was rebuilt after a layout change.
    pub fn mirror_rebuilds(&self) -> u64 {
        self.mirror.rebuilds()
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter("get");
        let hash = self.table.hash_key(q);
        self.table.get(q, hash)
    }

    /// Mutable access to a value. Position and mutation count are unchanged.
    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter("get_mut");
        let hash = self.table.hash_key(q);
        self.table.get_mut(q, hash)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter("contains_key");
        let hash = self.table.hash_key(q);
        self.table.lookup_slot(q, hash).is_some()
    }

    pub fn first(&self) -> Option<(&K, &V)> {
        self.peek(End::Front)
    }

    pub fn last(&self) -> Option<(&K, &V)> {
        self.peek(End::Back)
    }

    fn peek(&self, end: End) -> Option<(&K, &V)> {
        let (node, value) = self.node_entry(self.list.end(end)?)?;
        Some((&node.key, value))
    }

    /// Remove `q`, returning its value.
    pub fn delete<Q>(&mut self, q: &Q) -> Result<V, OrderError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.delete_entry(q).map(|(_, v)| v)
    }

    /// Remove `q`, returning the stored key and value.
    pub fn delete_entry<Q>(&mut self, q: &Q) -> Result<(K, V), OrderError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.table.hash_key(q);
        self.synchronize()?;
        let (slot, id) = self.resolve(q, hash)?.ok_or(OrderError::absent())?;
        self.remove_node(slot, id)
    }

    /// Remove and return the entry at `end`.
    pub fn pop_item(&mut self, end: End) -> Result<(K, V), OrderError> {
        if self.list.end(end).is_none() {
            return Err(OrderError::EmptyCollection);
        }
        self.synchronize()?;
        let id = self.list.end(end).ok_or(OrderError::EmptyCollection)?;
        let node = self
            .list
            .node(id)
            .ok_or_else(|| violation("order list end is a freed node"))?;
        let slot = self
            .table
            .lookup_slot(&node.key, node.hash)
            .ok_or_else(|| violation("linked key missing from table"))?;
        if self.mirror.get(slot) != Some(id) {
            return Err(violation("mirror slot does not hold the end node"));
        }
        self.remove_node(slot, id)
    }

    /// Move `q` to the back (`last == true`) or the front of the order.
    pub fn move_to_end<Q>(&mut self, q: &Q, last: bool) -> Result<(), OrderError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.move_to(q, if last { End::Back } else { End::Front })
    }

    /// Move `q` to `end`. Already being there is a no-op that does not
    /// count as a mutation.
    pub fn move_to<Q>(&mut self, q: &Q, end: End) -> Result<(), OrderError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.table.hash_key(q);
        self.synchronize()?;
        let (_, id) = self.resolve(q, hash)?.ok_or(OrderError::absent())?;
        if self.list.is_at(id, end) {
            return Ok(());
        }
        self.list.unlink(id);
        self.list.append(id, end);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.list.clear();
        self.mirror.discard();
        self.table.clear();
    }

    /// Make room for `additional` more entries up front.
    pub fn reserve(&mut self, additional: usize) -> Result<(), OrderError> {
        self.table.try_reserve(additional)
    }

    pub fn shrink_to_fit(&mut self) {
        self.table.shrink_to_fit();
    }

    /// Entries in order. Reverse with `.rev()`.
    pub fn iter(&self) -> Iter<'_, K, V, T> {
        Iter::new(self)
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> + ExactSizeIterator + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> + ExactSizeIterator + '_ {
        self.iter().map(|(_, v)| v)
    }

    /// Walk every structure and verify they agree: the list is acyclic with
    /// open ends, holds exactly `len()` nodes that all resolve in the table,
    /// and an in-sync mirror maps each node's slot back to that node.
    pub fn check_consistency(&self) -> Result<(), OrderError> {
        let allocated = self.list.allocated();
        let mut count = 0usize;
        let mut prev: Option<NodeId> = None;
        for id in self.list.ids() {
            count += 1;
            if count > allocated {
                return Err(violation("order list has a cycle"));
            }
            let node = self
                .list
                .node(id)
                .ok_or_else(|| violation("order list links a freed node"))?;
            if node.prev() != prev {
                return Err(violation("back link does not match forward link"));
            }
            let slot = self
                .table
                .lookup_slot(&node.key, node.hash)
                .ok_or_else(|| violation("linked key missing from table"))?;
            if self.mirror.is_synchronized(&self.table) && self.mirror.get(slot) != Some(id) {
                return Err(violation("mirror slot does not hold the key's node"));
            }
            prev = Some(id);
        }
        if prev != self.list.end(End::Back) {
            return Err(violation("last node is not the list tail"));
        }
        if count != self.list.len() || count != allocated {
            return Err(violation("node count disagrees with list bookkeeping"));
        }
        if count != self.table.len() {
            return Err(violation("node count disagrees with table size"));
        }
        if self.mirror.is_synchronized(&self.table) {
            for (_, id) in self.mirror.occupied() {
                if self.list.node(id).is_none() {
                    return Err(violation("mirror holds a freed node"));
                }
            }
            if self.mirror.occupied().count() != count {
                return Err(violation("mirror entry count disagrees with table size"));
            }
        }
        Ok(())
    }

    fn synchronize(&mut self) -> Result<(), OrderError> {
        let _g = self.reentrancy.enter("slot mirror rebuild");
        self.mirror.ensure_synchronized(&self.table, &self.list)
    }

    /// Slot and node for `q`. Requires a synchronized mirror.
    fn resolve<Q>(&self, q: &Q, hash: u64) -> Result<Option<(usize, NodeId)>, OrderError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let Some(slot) = self.table.lookup_slot(q, hash) else {
            return Ok(None);
        };
        let id = self
            .mirror
            .get(slot)
            .ok_or_else(|| violation("table slot has no mirrored node"))?;
        match self.list.node(id) {
            Some(node) if node.key.borrow() == q => Ok(Some((slot, id))),
            _ => Err(violation("mirrored node does not hold the slot's key")),
        }
    }

    // Mirror and list are cleaned up before the table delete: the table may
    // shuffle its own entries while deleting.
    fn remove_node(&mut self, slot: usize, id: NodeId) -> Result<(K, V), OrderError> {
        self.mirror.clear_slot(slot);
        self.list.unlink(id);
        let node = self
            .list
            .free(id)
            .ok_or_else(|| violation("resolved node already freed"))?;
        self.table
            .delete(&node.key, node.hash)
            .ok_or_else(|| violation("mirrored key missing from table"))
    }

    /// Node currently holding `q`, syncing the mirror first if needed.
    pub(crate) fn locate<Q>(&mut self, q: &Q) -> Result<Option<NodeId>, OrderError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.table.hash_key(q);
        self.synchronize()?;
        Ok(self.resolve(q, hash)?.map(|(_, id)| id))
    }

    pub(crate) fn end_node(&self, end: End) -> Option<NodeId> {
        self.list.end(end)
    }

    pub(crate) fn node(&self, id: NodeId) -> Option<&Node<K>> {
        self.list.node(id)
    }

    pub(crate) fn node_entry(&self, id: NodeId) -> Option<(&Node<K>, &V)> {
        let node = self.list.node(id)?;
        let value = self.table.get(&node.key, node.hash)?;
        Some((node, value))
    }
}

impl<K, V, T> OrderedMap<K, V, T>
where
    K: Eq + Hash + Clone,
    T: SlotTable<K, V>,
{
    /// Insert or overwrite. A new key joins at the back; overwriting keeps
    /// the position and returns the previous value.
    ///
    /// If the table cannot take a new key, the node is unlinked again and
    /// the map is left exactly as it was.
    pub fn set(&mut self, key: K, value: V) -> Result<Option<V>, OrderError> {
        let hash = self.table.hash_key(&key);
        self.synchronize()?;
        if self.resolve(&key, hash)?.is_some() {
            let slot = self
                .table
                .get_mut(&key, hash)
                .ok_or_else(|| violation("resolved key has no value"))?;
            return Ok(Some(core::mem::replace(slot, value)));
        }
        self.insert_new(key, value, hash)?;
        Ok(None)
    }

    /// Value for `key`, inserting `default()` at the back when absent.
    pub fn get_or_insert_with<F>(&mut self, key: K, default: F) -> Result<&mut V, OrderError>
    where
        F: FnOnce() -> V,
    {
        let hash = self.table.hash_key(&key);
        self.synchronize()?;
        if self.resolve(&key, hash)?.is_none() {
            let id = self.insert_new(key, default(), hash)?;
            let node = self
                .list
                .node(id)
                .ok_or_else(|| violation("inserted node missing"))?;
            return self
                .table
                .get_mut(&node.key, hash)
                .ok_or_else(|| violation("inserted key missing from table"));
        }
        self.table
            .get_mut(&key, hash)
            .ok_or_else(|| violation("resolved key has no value"))
    }

    /// `set` every pair in order, stopping at the first error.
    pub fn try_extend<I>(&mut self, iter: I) -> Result<(), OrderError>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in iter {
            self.set(k, v)?;
        }
        Ok(())
    }

    /// Detached cursor starting at the front (`Forward`) or back
    /// (`Reverse`). It holds no borrow, so the map may be changed between
    /// steps; see `Cursor` for how such changes are reported.
    pub fn cursor(&self, direction: Direction) -> Cursor<K> {
        Cursor::new(self, direction)
    }

    // Link a fresh node at the tail, then hand the pair to the table.
    fn insert_new(&mut self, key: K, value: V, hash: u64) -> Result<NodeId, OrderError> {
        let saved = self.list.mutations();
        let id = self.list.alloc(key.clone(), hash);
        self.list.append_tail(id);
        match self.table.set(key, value, hash) {
            Ok(slot) => {
                // After a rehash the mirror is stale and picks the node up
                // on its next rebuild.
                if self.mirror.is_synchronized(&self.table) {
                    self.mirror.store(slot, id);
                }
                Ok(id)
            }
            Err(err) => {
                self.list.unlink(id);
                let _ = self.list.free(id);
                self.list.restore_mutations(saved);
                log::debug!("insert rolled back: {err}");
                Err(err)
            }
        }
    }
}

impl<K, V> OrderedMap<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn try_from_iter<I>(iter: I) -> Result<Self, OrderError>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut map = Self::new();
        map.try_extend(iter)?;
        Ok(map)
    }
}

impl<K, V, T> fmt::Debug for OrderedMap<K, V, T>
where
    K: Eq + fmt::Debug,
    V: fmt::Debug,
    T: SlotTable<K, V>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Equality is order-sensitive.
impl<K, V, T> PartialEq for OrderedMap<K, V, T>
where
    K: Eq,
    V: PartialEq,
    T: SlotTable<K, V>,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<K, V, T> Eq for OrderedMap<K, V, T>
where
    K: Eq,
    V: Eq,
    T: SlotTable<K, V>,
{
}

impl<'a, K, V, T> IntoIterator for &'a OrderedMap<K, V, T>
where
    K: Eq,
    T: SlotTable<K, V>,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
