//! Iteration over an `OrderedMap`.
//!
//! `Iter` borrows the map and walks node links directly; the borrow rules
//! out mutation, so it never fails.
//!
//! `Cursor` holds no borrow. It remembers the *key* it will visit next,
//! not a node, and re-resolves that key through the table on every step,
//! so whatever happened to the map in between can never leave it pointing
//! at a freed node. Between steps it compares the map's mutation counter
//! and length with the values it captured:
//!
//! - counter and length both changed: the cursor is poisoned and every
//!   later step returns `ConcurrentModification(SizeChanged)`;
//! - only the counter changed: this step returns
//!   `ConcurrentModification(Mutated)` and the cursor adopts the new
//!   counter, so the caller may keep stepping;
//! - the next key is gone: `KeyNotFound`, and the cursor is exhausted.

use crate::error::{Modification, OrderError};
use crate::order_list::{End, NodeId};
use crate::ordered_map::OrderedMap;
use crate::table::SlotTable;
use core::hash::Hash;
use core::iter::FusedIterator;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Direction {
    /// Front to back, insertion order.
    Forward,
    Reverse,
}

impl Direction {
    fn start(self) -> End {
        match self {
            Direction::Forward => End::Front,
            Direction::Reverse => End::Back,
        }
    }

    fn toward(self) -> End {
        match self {
            Direction::Forward => End::Back,
            Direction::Reverse => End::Front,
        }
    }
}

#[derive(Debug, Clone)]
enum State<K> {
    Active(K),
    Exhausted,
    Poisoned(OrderError),
}

/// Detached cursor created by `OrderedMap::cursor`.
#[derive(Debug, Clone)]
pub struct Cursor<K> {
    state: State<K>,
    direction: Direction,
    mutations: u64,
    len: usize,
}

impl<K> Cursor<K>
where
    K: Eq + Hash + Clone,
{
    pub(crate) fn new<V, T>(map: &OrderedMap<K, V, T>, direction: Direction) -> Self
    where
        T: SlotTable<K, V>,
    {
        let state = map
            .end_node(direction.start())
            .and_then(|id| map.node(id))
            .map_or(State::Exhausted, |node| State::Active(node.key.clone()));
        Self {
            state,
            direction,
            mutations: map.mutation_count(),
            len: map.len(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_poisoned(&self) -> bool {
        matches!(self.state, State::Poisoned(_))
    }

    /// True once no further item can be produced.
    pub fn is_finished(&self) -> bool {
        !matches!(self.state, State::Active(_))
    }

    /// Advance one entry. `Ok(None)` marks the end of the sequence.
    pub fn next<'m, V, T>(
        &mut self,
        map: &'m mut OrderedMap<K, V, T>,
    ) -> Result<Option<(&'m K, &'m V)>, OrderError>
    where
        T: SlotTable<K, V>,
    {
        let key = match core::mem::replace(&mut self.state, State::Exhausted) {
            State::Poisoned(err) => {
                self.state = State::Poisoned(err.clone());
                return Err(err);
            }
            State::Exhausted => return Ok(None),
            State::Active(key) => key,
        };

        let mutations = map.mutation_count();
        if mutations != self.mutations {
            if map.len() != self.len {
                let err = OrderError::ConcurrentModification(Modification::SizeChanged);
                log::debug!("cursor poisoned: {err}");
                self.state = State::Poisoned(err.clone());
                return Err(err);
            }
            self.mutations = mutations;
            self.state = State::Active(key);
            return Err(OrderError::ConcurrentModification(Modification::Mutated));
        }

        let id = map.locate(&key)?.ok_or(OrderError::disappeared())?;
        let map: &'m OrderedMap<K, V, T> = map;
        let (node, value) = map
            .node_entry(id)
            .ok_or(OrderError::InvariantViolation("located node has no entry"))?;
        if let Some(next) = node.toward(self.direction.toward()).and_then(|n| map.node(n)) {
            self.state = State::Active(next.key.clone());
        }
        Ok(Some((&node.key, value)))
    }

    pub fn next_key<'m, V, T>(
        &mut self,
        map: &'m mut OrderedMap<K, V, T>,
    ) -> Result<Option<&'m K>, OrderError>
    where
        T: SlotTable<K, V>,
    {
        Ok(self.next(map)?.map(|(k, _)| k))
    }

    pub fn next_value<'m, V, T>(
        &mut self,
        map: &'m mut OrderedMap<K, V, T>,
    ) -> Result<Option<&'m V>, OrderError>
    where
        T: SlotTable<K, V>,
    {
        Ok(self.next(map)?.map(|(_, v)| v))
    }
}

/// Borrowing, double-ended iterator over entries in order.
pub struct Iter<'a, K, V, T> {
    map: &'a OrderedMap<K, V, T>,
    front: Option<NodeId>,
    back: Option<NodeId>,
    remaining: usize,
}

impl<'a, K, V, T> Iter<'a, K, V, T>
where
    K: Eq,
    T: SlotTable<K, V>,
{
    pub(crate) fn new(map: &'a OrderedMap<K, V, T>) -> Self {
        Self {
            map,
            front: map.end_node(End::Front),
            back: map.end_node(End::Back),
            remaining: map.len(),
        }
    }
}

impl<'a, K, V, T> Iterator for Iter<'a, K, V, T>
where
    K: Eq,
    T: SlotTable<K, V>,
{
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let (node, value) = self.map.node_entry(self.front?)?;
        self.front = node.next();
        self.remaining -= 1;
        Some((&node.key, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V, T> DoubleEndedIterator for Iter<'a, K, V, T>
where
    K: Eq,
    T: SlotTable<K, V>,
{
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let (node, value) = self.map.node_entry(self.back?)?;
        self.back = node.prev();
        self.remaining -= 1;
        Some((&node.key, value))
    }
}

impl<'a, K, V, T> ExactSizeIterator for Iter<'a, K, V, T>
where
    K: Eq,
    T: SlotTable<K, V>,
{
}

impl<'a, K, V, T> FusedIterator for Iter<'a, K, V, T>
where
    K: Eq,
    T: SlotTable<K, V>,
{
}
