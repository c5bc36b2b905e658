//! Macro registry for storage and lookup of handlers by syntax kind.
//!
//! # Priority
//!
//! Each kind maps to an ordered list of handlers, highest priority first.
//! A new registration is inserted at the *front*, so the most recently
//! registered handler for a kind is tried first and earlier ones act as
//! fallbacks when it declines.
//!
//! Handlers are never removed; a registry lives for a whole session.
//!
//! # Thread Safety
//! Registration needs `&mut self`. Once built, a registry can be shared by
//! reference across threads since every handler is `Send + Sync`.
//!
//! # Summary Table
//! | Method            | Position | Error on Duplicate Name |
//! |-------------------|----------|-------------------------|
//! | register          | front    | No                      |
//! | register_unique   | front    | Yes                     |
//! | lookup            | N/A      | N/A                     |

use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::SyntaxKind;
use crate::err_msg;
use crate::macros::types::{HandlerRef, MacroHandler};
use crate::MacroError;

/// Registry of macro handlers keyed by syntax kind.
///
/// # Example
/// ```rust
/// use hygiene::ast::builder::atom;
/// use hygiene::macros::{Expansion, FnMacro, MacroRegistry};
/// let mut reg = MacroRegistry::new();
/// reg.register("pair", FnMacro::new("first", |_, _| Ok(Expansion::Unsupported)));
/// reg.register("pair", FnMacro::new("second", |_, _| Ok(Expansion::Rewritten(atom("x")))));
/// let names: Vec<_> = reg.lookup(&"pair".into()).iter().map(|h| h.name().to_string()).collect();
/// assert_eq!(names, vec!["second", "first"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MacroRegistry {
    handlers: HashMap<SyntaxKind, Vec<HandlerRef>>,
}

impl MacroRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `kind` with the highest priority.
    pub fn register<H>(&mut self, kind: impl Into<SyntaxKind>, handler: H)
    where
        H: MacroHandler + 'static,
    {
        self.register_shared(kind, Arc::new(handler));
    }

    /// Registers an already shared handler with the highest priority.
    pub fn register_shared(&mut self, kind: impl Into<SyntaxKind>, handler: HandlerRef) {
        let kind = kind.into();
        tracing::debug!(kind = %kind, handler = handler.name(), "registered macro handler");
        self.handlers.entry(kind).or_default().insert(0, handler);
    }

    /// Registers a handler, returning an error if one with the same name is
    /// already registered for `kind`.
    ///
    /// # Errors
    /// Returns `MacroError::Registry` on a duplicate name.
    pub fn register_unique(
        &mut self,
        kind: impl Into<SyntaxKind>,
        handler: HandlerRef,
    ) -> Result<(), MacroError> {
        let kind = kind.into();
        if self
            .lookup(&kind)
            .iter()
            .any(|existing| existing.name() == handler.name())
        {
            return Err(err_msg!(
                Registry,
                "macro `{}` is already registered for `{}`",
                handler.name(),
                kind
            ));
        }
        self.register_shared(kind, handler);
        Ok(())
    }

    /// Handlers for `kind`, highest priority first.
    pub fn lookup(&self, kind: &SyntaxKind) -> &[HandlerRef] {
        self.handlers.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Checks if any handler is registered for `kind`.
    pub fn contains(&self, kind: &SyntaxKind) -> bool {
        !self.lookup(kind).is_empty()
    }

    /// Total number of registered handlers across all kinds.
    pub fn len(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered kinds, sorted for stable output.
    pub fn kinds(&self) -> Vec<&SyntaxKind> {
        let mut kinds: Vec<_> = self.handlers.keys().collect();
        kinds.sort();
        kinds
    }

    /// Iterates over `(kind, handlers)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&SyntaxKind, &[HandlerRef])> {
        self.handlers.iter().map(|(k, v)| (k, v.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macros::types::{Expansion, FnMacro};

    fn decline(name: &str) -> HandlerRef {
        Arc::new(FnMacro::new(name, |_, _| Ok(Expansion::Unsupported)))
    }

    fn names(reg: &MacroRegistry, kind: &str) -> Vec<String> {
        reg.lookup(&kind.into())
            .iter()
            .map(|h| h.name().to_string())
            .collect()
    }

    #[test]
    fn later_registrations_take_priority() {
        let mut reg = MacroRegistry::new();
        reg.register_shared("k", decline("h1"));
        reg.register_shared("k", decline("h2"));
        reg.register_shared("k", decline("h3"));
        assert_eq!(names(&reg, "k"), vec!["h3", "h2", "h1"]);
    }

    #[test]
    fn lookup_of_unknown_kind_is_empty() {
        let reg = MacroRegistry::new();
        assert!(reg.lookup(&"nothing".into()).is_empty());
        assert!(reg.is_empty());
    }

    #[test]
    fn kinds_are_independent() {
        let mut reg = MacroRegistry::new();
        reg.register_shared("a", decline("x"));
        reg.register_shared("b", decline("y"));
        assert_eq!(names(&reg, "a"), vec!["x"]);
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.kinds(), vec![&SyntaxKind::new("a"), &SyntaxKind::new("b")]);
    }

    #[test]
    fn register_unique_rejects_duplicate_names() {
        let mut reg = MacroRegistry::new();
        reg.register_unique("k", decline("h")).unwrap();
        let err = reg.register_unique("k", decline("h")).unwrap_err();
        assert!(err.message().contains("already registered"));
        reg.register_unique("other", decline("h")).unwrap();
    }
}
