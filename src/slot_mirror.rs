//! SlotMirror: table slot index -> node occupying that slot.
//!
//! The mirror is only trusted while its epoch and length match the table.
//! Any other state is stale and is rebuilt in one O(n) pass before use;
//! rebuilds therefore happen once per table layout change, not per call.

use crate::error::OrderError;
use crate::order_list::{NodeId, OrderList};
use crate::table::{Epoch, SlotTable};

#[derive(Debug)]
pub(crate) struct SlotMirror {
    slots: Vec<Option<NodeId>>,
    // `None` marks the mirror as discarded.
    epoch: Option<Epoch>,
    rebuilds: u64,
}

impl SlotMirror {
    /// A mirror in sync with a freshly created table of `capacity` slots.
    pub(crate) fn new(capacity: usize, epoch: Epoch) -> Self {
        Self {
            slots: vec![None; capacity],
            epoch: Some(epoch),
            rebuilds: 0,
        }
    }

    pub(crate) fn is_synchronized<K, V, T>(&self, table: &T) -> bool
    where
        T: SlotTable<K, V>,
    {
        self.epoch == Some(table.epoch()) && self.slots.len() == table.capacity()
    }

    /// Rebuild from `list` if the table's layout moved since the last sync.
    pub(crate) fn ensure_synchronized<K, V, T>(
        &mut self,
        table: &T,
        list: &OrderList<K>,
    ) -> Result<(), OrderError>
    where
        K: Eq,
        T: SlotTable<K, V>,
    {
        if self.is_synchronized(table) {
            return Ok(());
        }
        let epoch = table.epoch();
        let capacity = table.capacity();
        log::trace!(
            "rebuilding slot mirror: {} nodes into {} slots at epoch {:?}",
            list.len(),
            capacity,
            epoch
        );
        let mut slots = vec![None; capacity];
        for id in list.ids() {
            let node = list
                .node(id)
                .ok_or(OrderError::InvariantViolation("order list links a freed node"))?;
            let slot = table
                .lookup_slot(&node.key, node.hash)
                .ok_or(OrderError::InvariantViolation("linked key missing from table"))?;
            let cell = slots
                .get_mut(slot)
                .ok_or(OrderError::InvariantViolation("table slot out of range"))?;
            if cell.replace(id).is_some() {
                return Err(OrderError::InvariantViolation(
                    "two nodes resolve to one slot",
                ));
            }
        }
        self.slots = slots;
        self.epoch = Some(epoch);
        self.rebuilds += 1;
        Ok(())
    }

    pub(crate) fn get(&self, slot: usize) -> Option<NodeId> {
        self.slots.get(slot).copied().flatten()
    }

    pub(crate) fn store(&mut self, slot: usize, id: NodeId) {
        if let Some(cell) = self.slots.get_mut(slot) {
            *cell = Some(id);
        }
    }

    pub(crate) fn clear_slot(&mut self, slot: usize) -> Option<NodeId> {
        self.slots.get_mut(slot).and_then(Option::take)
    }

    /// Drop the contents and force a rebuild on next use.
    pub(crate) fn discard(&mut self) {
        self.slots = Vec::new();
        self.epoch = None;
    }

    pub(crate) fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Occupied slots, for consistency checks.
    pub(crate) fn occupied(&self) -> impl Iterator<Item = (usize, NodeId)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, id)| id.map(|id| (slot, id)))
    }
}
