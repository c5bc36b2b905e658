//! Macro scopes: allocation and the per-expansion scope stack.
//!
//! The [`ScopeAllocator`] is the only state shared between concurrently
//! expanding trees. Each expansion owns its own [`ScopeStack`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// A unique tag for one macro invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MacroScope(u64);

impl MacroScope {
    pub const fn new(id: u64) -> Self {
        MacroScope(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MacroScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out strictly increasing macro scopes.
///
/// Allocation is a single atomic increment, so one allocator can be shared
/// (behind an `Arc`) by expansions running on different threads. Scopes are
/// never reused; an aborted expansion only leaves a gap in the numbering.
#[derive(Debug, Default)]
pub struct ScopeAllocator {
    next: AtomicU64,
}

impl ScopeAllocator {
    /// Creates an allocator whose first scope is 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an allocator that continues after `last`, e.g. to keep a
    /// numbering stable across sessions that share generated names.
    pub fn starting_after(last: u64) -> Self {
        Self {
            next: AtomicU64::new(last),
        }
    }

    pub fn allocate(&self) -> MacroScope {
        MacroScope(self.next.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Number of scopes allocated so far (including gaps from aborts).
    pub fn allocated(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

/// The scopes active on the current expansion call chain, outermost first.
#[derive(Debug, Default, Clone)]
pub struct ScopeStack {
    scopes: Vec<MacroScope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_scopes(&self) -> &[MacroScope] {
        &self.scopes
    }

    /// The innermost active scope.
    pub fn current_scope(&self) -> Option<MacroScope> {
        self.scopes.last().copied()
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub(crate) fn push(&mut self, scope: MacroScope) {
        self.scopes.push(scope);
    }

    pub(crate) fn pop(&mut self, scope: MacroScope) {
        let popped = self.scopes.pop();
        debug_assert_eq!(popped, Some(scope), "unbalanced macro scope stack");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn allocation_is_strictly_increasing() {
        let alloc = ScopeAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        assert_eq!(a, MacroScope::new(1));
        assert!(b > a);
        assert_eq!(alloc.allocated(), 2);
    }

    #[test]
    fn starting_after_continues_numbering() {
        let alloc = ScopeAllocator::starting_after(41);
        assert_eq!(alloc.allocate(), MacroScope::new(42));
    }

    #[test]
    fn concurrent_allocation_is_unique() {
        let alloc = Arc::new(ScopeAllocator::new());
        let per_thread = 1000;
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let alloc = Arc::clone(&alloc);
                std::thread::spawn(move || {
                    (0..per_thread).map(|_| alloc.allocate()).collect::<Vec<_>>()
                })
            })
            .collect();
        let mut seen = HashSet::new();
        for handle in handles {
            for scope in handle.join().unwrap() {
                assert!(seen.insert(scope), "duplicate scope {scope}");
            }
        }
        assert_eq!(seen.len(), 8 * per_thread);
    }

    #[test]
    fn stack_reports_outermost_first() {
        let mut stack = ScopeStack::new();
        stack.push(MacroScope::new(1));
        stack.push(MacroScope::new(2));
        assert_eq!(stack.current_scopes(), &[MacroScope::new(1), MacroScope::new(2)]);
        assert_eq!(stack.current_scope(), Some(MacroScope::new(2)));
        stack.pop(MacroScope::new(2));
        assert_eq!(stack.depth(), 1);
    }
}
