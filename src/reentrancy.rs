//! Debug-only reentrancy guard.
//!
//! The map calls user code (`K: Hash`, `K: Eq`) while it walks the table.
//! Sections that must not be observed half-done, most importantly the
//! slot-mirror rebuild, hold a guard; entering a second guarded section
//! from inside such a callback panics in debug builds and names both
//! sections. Release builds compile the guard away.

use core::cell::Cell;
use core::marker::PhantomData;

/// Per-map reentrancy tracker. Guard entry points with
/// `let _g = self.reentrancy.enter("section");`.
#[derive(Debug)]
pub struct DebugReentrancy {
    #[cfg(debug_assertions)]
    active: Cell<Option<&'static str>>,
    // !Send + !Sync: the map is single-threaded.
    _nosend: PhantomData<*mut ()>,
}

impl DebugReentrancy {
    pub const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            active: Cell::new(None),
            _nosend: PhantomData,
        }
    }

    /// Enter the named section. In debug builds, panics if another section
    /// of the same map is still active.
    #[inline]
    pub fn enter(&self, section: &'static str) -> ReentrancyGuard<'_> {
        #[cfg(debug_assertions)]
        {
            if let Some(outer) = self.active.get() {
                panic!("reentrancy detected: `{section}` entered while `{outer}` is in progress");
            }
            self.active.set(Some(section));
            return ReentrancyGuard { owner: self };
        }

        #[cfg(not(debug_assertions))]
        {
            let _ = section;
            return ReentrancyGuard { _z: PhantomData };
        }
    }

    /// Name of the section currently held, if any. Always `None` in
    /// release builds.
    pub fn active_section(&self) -> Option<&'static str> {
        #[cfg(debug_assertions)]
        {
            return self.active.get();
        }
        #[cfg(not(debug_assertions))]
        {
            return None;
        }
    }
}

impl Default for DebugReentrancy {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard returned by `DebugReentrancy::enter`.
pub struct ReentrancyGuard<'a> {
    #[cfg(debug_assertions)]
    owner: &'a DebugReentrancy,
    #[cfg(not(debug_assertions))]
    _z: PhantomData<&'a ()>,
}

impl<'a> Drop for ReentrancyGuard<'a> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            debug_assert!(self.owner.active.get().is_some());
            self.owner.active.set(None);
        }
    }
}
