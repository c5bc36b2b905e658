//! # Hygienic Macro Expansion
//!
//! This module rewrites syntax trees by repeatedly applying registered macro
//! handlers until no handler applies anywhere.
//!
//! ## Core Principles
//!
//! - **Syntactic Only**: handlers map a [`SyntaxTree`](crate::ast::SyntaxTree)
//!   to a new tree. They have no access to anything but the tree and their
//!   [`MacroContext`].
//! - **Hygienic**: every handler call runs under a fresh [`MacroScope`].
//!   Identifiers a handler introduces through quotation carry that scope in
//!   their encoded name, so they never collide with user identifiers.
//! - **Inspectable**: the expander can record every rewrite as an
//!   [`ExpansionStep`].
//!
//! ## Layers
//!
//! | Module     | Responsibility                                   |
//! |------------|--------------------------------------------------|
//! | `scope`    | scope ids, allocation, the active scope stack    |
//! | `names`    | encoding scopes into identifier names            |
//! | `context`  | what a handler sees while it runs                |
//! | `quote`    | template matching and hygienic substitution      |
//! | `types`    | the handler trait and its result                 |
//! | `registry` | handlers by kind, in priority order              |
//! | `expander` | the expansion state machine                      |
//! | `rules`    | declarative pattern/template macros              |
//! | `loader`   | JSON rule sets and input trees                   |
//!
//! Example:
//! ```rust
//! use hygiene::ast::builder::{hole, ident, node};
//! use hygiene::macros::{Expander, MacroRegistry, Rule, RuleMacro, ScopeAllocator};
//!
//! let mut registry = MacroRegistry::new();
//! let konst = RuleMacro::new(
//!     "const",
//!     "const",
//!     vec![Rule::template(
//!         node("const", vec![hole("e")]),
//!         node("fun", vec![ident("x"), hole("e")]),
//!     )],
//! )
//! .unwrap();
//! registry.register("const", konst);
//!
//! let allocator = ScopeAllocator::new();
//! let input = node("const", vec![ident("x")]);
//! let out = Expander::new(&registry, &allocator, "Main").expand(&input).unwrap();
//! assert_eq!(out.to_string(), "(fun x._@.Main._hyg.1 x)");
//! ```

pub mod context;
pub mod expander;
pub mod loader;
pub mod names;
pub mod quote;
pub mod registry;
pub mod rules;
pub mod scope;
pub mod types;

pub use context::{DiagnosticContext, MacroContext};
pub use expander::{Expander, ExpansionState};
pub use names::{add_macro_scope, decode, encode, erase_macro_scopes, has_macro_scopes, ScopeSegment, ScopedName};
pub use quote::{match_template, Binding, Bindings};
pub use registry::MacroRegistry;
pub use rules::{Rule, RuleAction, RuleMacro};
pub use scope::{MacroScope, ScopeAllocator, ScopeStack};
pub use types::{
    Expansion, ExpansionStep, FnMacro, HandlerRef, MacroHandler, MatchResult,
    MAX_MACRO_RECURSION_DEPTH,
};
