//! OrderList: arena-backed doubly linked list of nodes in iteration order.
//!
//! Nodes live in a `SlotMap` and link to each other through generational
//! `NodeId`s, so a stale id is detected instead of dereferenced. Every
//! link change bumps the mutation counter that cursors compare against.

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Stable, generational address of a node in the arena.
    pub(crate) struct NodeId;
}

/// One end of the order.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum End {
    Front,
    Back,
}

#[derive(Debug)]
pub(crate) struct Node<K> {
    pub(crate) key: K,
    pub(crate) hash: u64,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

impl<K> Node<K> {
    pub(crate) fn prev(&self) -> Option<NodeId> {
        self.prev
    }

    pub(crate) fn next(&self) -> Option<NodeId> {
        self.next
    }

    pub(crate) fn toward(&self, end: End) -> Option<NodeId> {
        match end {
            End::Front => self.prev,
            End::Back => self.next,
        }
    }
}

#[derive(Debug)]
pub(crate) struct OrderList<K> {
    nodes: SlotMap<NodeId, Node<K>>,
    first: Option<NodeId>,
    last: Option<NodeId>,
    linked: usize,
    mutations: u64,
}

impl<K> OrderList<K> {
    pub(crate) fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            first: None,
            last: None,
            linked: 0,
            mutations: 0,
        }
    }

    /// Allocate a detached node. It joins the order on `append_*`.
    pub(crate) fn alloc(&mut self, key: K, hash: u64) -> NodeId {
        self.nodes.insert(Node {
            key,
            hash,
            prev: None,
            next: None,
        })
    }

    /// Take a node out of the arena. It must already be unlinked.
    pub(crate) fn free(&mut self, id: NodeId) -> Option<Node<K>> {
        let node = self.nodes.remove(id)?;
        debug_assert!(node.prev.is_none() && node.next.is_none());
        debug_assert!(self.first != Some(id) && self.last != Some(id));
        Some(node)
    }

    pub(crate) fn node(&self, id: NodeId) -> Option<&Node<K>> {
        self.nodes.get(id)
    }

    pub(crate) fn end(&self, end: End) -> Option<NodeId> {
        match end {
            End::Front => self.first,
            End::Back => self.last,
        }
    }

    pub(crate) fn is_at(&self, id: NodeId, end: End) -> bool {
        self.end(end) == Some(id)
    }

    /// Number of linked nodes.
    pub(crate) fn len(&self) -> usize {
        self.linked
    }

    /// Number of nodes in the arena, linked or not.
    pub(crate) fn allocated(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn mutations(&self) -> u64 {
        self.mutations
    }

    /// Put the counter back after undoing a change nobody could observe.
    pub(crate) fn restore_mutations(&mut self, saved: u64) {
        self.mutations = saved;
    }

    fn bump(&mut self) {
        self.mutations = self.mutations.wrapping_add(1);
    }

    pub(crate) fn append_head(&mut self, id: NodeId) {
        let old_first = self.first;
        if let Some(node) = self.nodes.get_mut(id) {
            node.prev = None;
            node.next = old_first;
        } else {
            return;
        }
        match old_first {
            Some(f) => {
                if let Some(n) = self.nodes.get_mut(f) {
                    n.prev = Some(id);
                }
            }
            None => self.last = Some(id),
        }
        self.first = Some(id);
        self.linked += 1;
        self.bump();
    }

    pub(crate) fn append_tail(&mut self, id: NodeId) {
        let old_last = self.last;
        if let Some(node) = self.nodes.get_mut(id) {
            node.prev = old_last;
            node.next = None;
        } else {
            return;
        }
        match old_last {
            Some(l) => {
                if let Some(n) = self.nodes.get_mut(l) {
                    n.next = Some(id);
                }
            }
            None => self.first = Some(id),
        }
        self.last = Some(id);
        self.linked += 1;
        self.bump();
    }

    pub(crate) fn append(&mut self, id: NodeId, end: End) {
        match end {
            End::Front => self.append_head(id),
            End::Back => self.append_tail(id),
        }
    }

    /// Detach a linked node, patching both neighbours and the endpoints.
    pub(crate) fn unlink(&mut self, id: NodeId) {
        let (prev, next) = match self.nodes.get_mut(id) {
            Some(node) => (node.prev.take(), node.next.take()),
            None => return,
        };
        let was_linked = prev.is_some() || next.is_some() || self.first == Some(id);
        match prev {
            Some(p) => {
                if let Some(n) = self.nodes.get_mut(p) {
                    n.next = next;
                }
            }
            None if self.first == Some(id) => self.first = next,
            None => {}
        }
        match next {
            Some(nx) => {
                if let Some(n) = self.nodes.get_mut(nx) {
                    n.prev = prev;
                }
            }
            None if self.last == Some(id) => self.last = prev,
            None => {}
        }
        if was_linked {
            self.linked -= 1;
            self.bump();
        }
    }

    /// Drop every node and reset to empty.
    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.first = None;
        self.last = None;
        self.linked = 0;
        self.bump();
    }

    /// Node ids in order, front to back.
    pub(crate) fn ids(&self) -> Ids<'_, K> {
        Ids {
            list: self,
            cur: self.first,
        }
    }
}

pub(crate) struct Ids<'a, K> {
    list: &'a OrderList<K>,
    cur: Option<NodeId>,
}

impl<'a, K> Iterator for Ids<'a, K> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.cur?;
        self.cur = self.list.node(id).and_then(|n| n.next);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(l: &OrderList<&'static str>) -> Vec<&'static str> {
        l.ids().map(|id| l.node(id).unwrap().key).collect()
    }

    fn list_of(ks: &[&'static str]) -> (OrderList<&'static str>, Vec<NodeId>) {
        let mut l = OrderList::new();
        let ids = ks
            .iter()
            .enumerate()
            .map(|(i, k)| {
                let id = l.alloc(*k, i as u64);
                l.append_tail(id);
                id
            })
            .collect();
        (l, ids)
    }

    #[test]
    fn append_tail_and_head_order() {
        let mut l = OrderList::new();
        let b = l.alloc("b", 0);
        l.append_tail(b);
        let c = l.alloc("c", 0);
        l.append_tail(c);
        let a = l.alloc("a", 0);
        l.append_head(a);
        assert_eq!(keys(&l), ["a", "b", "c"]);
        assert_eq!(l.end(End::Front), Some(a));
        assert_eq!(l.end(End::Back), Some(c));
        assert_eq!(l.len(), 3);
        assert_eq!(l.mutations(), 3);
    }

    /// Invariant: unlinking either endpoint or a middle node patches the
    /// neighbours and keeps `first.prev` and `last.next` empty.
    #[test]
    fn unlink_endpoints_and_middle() {
        let (mut l, ids) = list_of(&["a", "b", "c", "d"]);
        l.unlink(ids[0]);
        assert_eq!(keys(&l), ["b", "c", "d"]);
        assert_eq!(l.node(ids[1]).unwrap().prev(), None);
        l.unlink(ids[3]);
        assert_eq!(keys(&l), ["b", "c"]);
        assert_eq!(l.node(ids[2]).unwrap().next(), None);
        l.unlink(ids[1]);
        l.unlink(ids[2]);
        assert!(keys(&l).is_empty());
        assert_eq!(l.end(End::Front), None);
        assert_eq!(l.end(End::Back), None);
        assert_eq!(l.len(), 0);
        // Detached nodes can be freed.
        for id in ids {
            assert!(l.free(id).is_some());
        }
        assert_eq!(l.allocated(), 0);
    }

    #[test]
    fn unlink_single_node() {
        let (mut l, ids) = list_of(&["only"]);
        let before = l.mutations();
        l.unlink(ids[0]);
        assert_eq!(l.mutations(), before + 1);
        assert!(l.end(End::Front).is_none());
        // Unlinking again is a no-op and does not count as a mutation.
        l.unlink(ids[0]);
        assert_eq!(l.mutations(), before + 1);
    }

    #[test]
    fn relink_moves_node() {
        let (mut l, ids) = list_of(&["a", "b", "c"]);
        l.unlink(ids[0]);
        l.append(ids[0], End::Back);
        assert_eq!(keys(&l), ["b", "c", "a"]);
        l.unlink(ids[0]);
        l.append(ids[0], End::Front);
        assert_eq!(keys(&l), ["a", "b", "c"]);
        assert!(l.is_at(ids[0], End::Front));
        assert!(l.is_at(ids[2], End::Back));
    }

    #[test]
    fn stale_id_after_free_does_not_resolve() {
        let (mut l, ids) = list_of(&["a"]);
        l.unlink(ids[0]);
        let node = l.free(ids[0]).unwrap();
        assert_eq!(node.key, "a");
        let reused = l.alloc("b", 1);
        assert_ne!(reused, ids[0]);
        assert!(l.node(ids[0]).is_none());
    }

    #[test]
    fn clear_bumps_and_empties() {
        let (mut l, _) = list_of(&["a", "b"]);
        let before = l.mutations();
        l.clear();
        assert_eq!(l.mutations(), before + 1);
        assert_eq!(l.len(), 0);
        assert_eq!(l.allocated(), 0);
        assert!(l.ids().next().is_none());
    }
}
