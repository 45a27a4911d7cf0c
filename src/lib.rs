//! slot-ordered-map: a single-threaded hash map that remembers insertion
//! order, with O(1) move-to-end and pop from either end.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: keep a hash table's O(1) lookups while iterating in insertion
//!   order, without rebuilding any auxiliary index on every operation.
//! - Layers:
//!   - `SlotTable<K, V>`: the hash table being mirrored. Owns keys and
//!     values, reports the slot each key occupies and an `Epoch` that
//!     moves exactly when the slot layout changes. `HashSlotTable` is the
//!     default, on top of `hashbrown`'s raw SwissTable.
//!   - `OrderList<K>`: nodes (key, cached hash, prev/next) in a `slotmap`
//!     arena, linked in iteration order, plus the mutation counter.
//!   - `SlotMirror`: slot index -> node, sized to the table. Trusted only
//!     while its epoch equals the table's; otherwise rebuilt in one pass.
//!   - `OrderedMap<K, V, T>`: composes the three and exposes the API.
//!   - `Cursor<K>`: detached iterator that re-resolves keys on each step.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` through the reentrancy guard.
//! - O(1) amortized set/delete/pop/move; the O(n) mirror rebuild runs
//!   once per table layout change, never speculatively.
//! - Keys are `Clone`: the node and the table each own a copy.
//! - New keys always join at the back, even when the table reuses the
//!   slot of a deleted key.
//!
//! Failure boundaries
//! - `set` links the new node before handing the pair to the table; if
//!   the table fails, the node is unlinked and freed and the mutation
//!   counter restored, so nothing of the attempt is observable.
//! - `delete` clears the mirror slot and unlinks the node before the table
//!   delete, and returns `(K, V)` so user `Drop` code runs only once the
//!   structure is consistent again.
//! - Bookkeeping disagreements surface as `OrderError::InvariantViolation`
//!   and are logged at error level.
//!
//! Reentrancy policy
//! - The map calls user code only through `K: Hash`/`K: Eq`. The mirror
//!   rebuild and read paths hold a debug-only reentrancy guard; nested
//!   entry from such a callback panics in debug builds.
//! - Mutation between cursor steps is allowed and detected through the
//!   mutation counter and length (see `cursor`).

mod cursor;
mod error;
mod order_list;
mod ordered_map;
#[cfg(test)]
mod ordered_map_proptest;
mod reentrancy;
mod slot_mirror;
pub mod table;

// Public surface
pub use cursor::{Cursor, Direction, Iter};
pub use error::{Modification, OrderError};
pub use hashbrown::TryReserveError;
pub use order_list::End;
pub use ordered_map::OrderedMap;
pub use reentrancy::{DebugReentrancy, ReentrancyGuard};
pub use table::{Epoch, HashSlotTable, SlotTable};
