//!
//! This module defines the fundamental types of the macro system: the handler
//! capability, its result, and the trace record. It has no dependencies on the
//! registry or the expander, making it the foundation layer.
//!
//! ## Two failure channels
//!
//! A handler that does not recognise its input returns
//! `Ok(Expansion::Unsupported)`; the expander then tries the next handler.
//! A handler that recognises its input but finds it malformed returns
//! `Err(MacroError)`, which aborts the whole expansion. The two are never
//! interchangeable.
//!
//! ## Ownership and Borrowing
//!
//! - Handlers are shared as `Arc<dyn MacroHandler>` and must be `Send + Sync`
//!   so a registry can serve parallel expansions.
//! - Handlers receive the tree by reference and return a new tree; they never
//!   mutate their input.

use std::fmt;
use std::sync::Arc;

use crate::ast::{SyntaxKind, SyntaxTree};
use crate::macros::context::MacroContext;
use crate::macros::scope::MacroScope;
use crate::MacroError;

/// Maximum number of rewrites along one expansion chain.
pub const MAX_MACRO_RECURSION_DEPTH: usize = 128;

/// The non-error outcome of a handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Expansion {
    /// The handler does not apply to this input.
    Unsupported,
    /// The handler rewrote the input.
    Rewritten(SyntaxTree),
}

/// What a handler returns: a rewrite, a decline, or a fatal error.
pub type MatchResult = Result<Expansion, MacroError>;

/// A macro: a syntax-to-syntax rewrite for one node kind.
///
/// # Examples
///
/// ```rust
/// use hygiene::ast::SyntaxTree;
/// use hygiene::macros::{Expansion, MacroContext, MacroHandler, MatchResult};
///
/// struct Identity;
///
/// impl MacroHandler for Identity {
///     fn name(&self) -> &str {
///         "identity"
///     }
///     fn try_expand(&self, _tree: &SyntaxTree, _cx: &mut MacroContext<'_>) -> MatchResult {
///         Ok(Expansion::Unsupported)
///     }
/// }
/// ```
pub trait MacroHandler: Send + Sync {
    /// Name used in traces and error messages.
    fn name(&self) -> &str;

    /// Attempts to rewrite `tree`.
    ///
    /// Called inside a fresh macro scope with `tree` as the current reference.
    fn try_expand(&self, tree: &SyntaxTree, cx: &mut MacroContext<'_>) -> MatchResult;
}

impl fmt::Debug for dyn MacroHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacroHandler({})", self.name())
    }
}

/// Shared handle to a registered handler.
pub type HandlerRef = Arc<dyn MacroHandler>;

/// A handler backed by a closure.
///
/// # Examples
///
/// ```rust
/// use hygiene::ast::builder::atom;
/// use hygiene::macros::{Expansion, FnMacro};
/// let zero = FnMacro::new("zero", |_tree, _cx| Ok(Expansion::Rewritten(atom("0"))));
/// ```
pub struct FnMacro<F> {
    name: String,
    func: F,
}

impl<F> FnMacro<F>
where
    F: Fn(&SyntaxTree, &mut MacroContext<'_>) -> MatchResult + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> MacroHandler for FnMacro<F>
where
    F: Fn(&SyntaxTree, &mut MacroContext<'_>) -> MatchResult + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn try_expand(&self, tree: &SyntaxTree, cx: &mut MacroContext<'_>) -> MatchResult {
        (self.func)(tree, cx)
    }
}

/// A single rewrite, for traceability.
#[derive(Debug, Clone)]
pub struct ExpansionStep {
    /// The handler that rewrote the node.
    pub handler: String,
    /// The kind of the rewritten node.
    pub kind: SyntaxKind,
    /// The scope the handler ran in.
    pub scope: MacroScope,
    /// The node before the rewrite.
    pub input: SyntaxTree,
    /// The node after the rewrite.
    pub output: SyntaxTree,
}
