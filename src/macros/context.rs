//! The context a macro handler runs in.
//!
//! [`MacroContext`] bundles the two dynamically scoped stacks an expansion
//! threads through handler calls (the active macro scopes and the reference
//! trees used for positions) together with the shared scope allocator and the
//! name of the module doing the expanding.
//!
//! Both stacks follow strict push/pop nesting: `with_fresh_scope` and
//! `with_ref` run a closure and restore the previous state when it returns,
//! whatever it returns.

use crate::ast::{Span, Syntax, SyntaxTree};
use crate::err_ctx;
use crate::macros::names::add_macro_scope;
use crate::macros::quote::{self, Bindings};
use crate::macros::scope::{MacroScope, ScopeAllocator, ScopeStack};
use crate::MacroError;

/// Tracks the current reference tree for positions.
#[derive(Debug, Default, Clone)]
pub struct DiagnosticContext {
    refs: Vec<SyntaxTree>,
}

impl DiagnosticContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The tree most recently pushed.
    pub fn current_ref(&self) -> Option<&SyntaxTree> {
        self.refs.last()
    }

    /// The span of the innermost reference that has one.
    ///
    /// Synthetic references (no span) fall through to the enclosing one, so a
    /// handler that points at a generated node still reports a real location.
    pub fn current_span(&self) -> Option<Span> {
        self.refs.iter().rev().find_map(|r| r.span)
    }

    pub fn depth(&self) -> usize {
        self.refs.len()
    }

    pub(crate) fn push(&mut self, tree: SyntaxTree) {
        self.refs.push(tree);
    }

    pub(crate) fn pop(&mut self) {
        self.refs.pop();
    }
}

/// Everything a handler may consult or extend while rewriting one node.
#[derive(Debug)]
pub struct MacroContext<'a> {
    allocator: &'a ScopeAllocator,
    main_module: &'a str,
    scopes: ScopeStack,
    diagnostics: DiagnosticContext,
}

impl<'a> MacroContext<'a> {
    pub fn new(allocator: &'a ScopeAllocator, main_module: &'a str) -> Self {
        Self {
            allocator,
            main_module,
            scopes: ScopeStack::new(),
            diagnostics: DiagnosticContext::new(),
        }
    }

    pub fn main_module(&self) -> &str {
        self.main_module
    }

    // --- Scopes ---

    pub fn scopes(&self) -> &ScopeStack {
        &self.scopes
    }

    /// Active scopes, outermost first.
    pub fn current_scopes(&self) -> &[MacroScope] {
        self.scopes.current_scopes()
    }

    pub fn current_scope(&self) -> Option<MacroScope> {
        self.scopes.current_scope()
    }

    /// Runs `body` with one newly allocated scope pushed on the stack.
    pub fn with_fresh_scope<T>(&mut self, body: impl FnOnce(&mut Self) -> T) -> T {
        let scope = self.allocator.allocate();
        self.scopes.push(scope);
        let result = body(self);
        self.scopes.pop(scope);
        result
    }

    // --- Reference positions ---

    pub fn diagnostics(&self) -> &DiagnosticContext {
        &self.diagnostics
    }

    pub fn current_ref(&self) -> Option<&SyntaxTree> {
        self.diagnostics.current_ref()
    }

    pub fn current_span(&self) -> Option<Span> {
        self.diagnostics.current_span()
    }

    /// Runs `body` with `tree` as the current reference.
    pub fn with_ref<T>(&mut self, tree: &SyntaxTree, body: impl FnOnce(&mut Self) -> T) -> T {
        self.diagnostics.push(tree.clone());
        let result = body(self);
        self.diagnostics.pop();
        result
    }

    /// A fatal macro error at the current reference position.
    pub fn error(&self, message: impl Into<String>) -> MacroError {
        err_ctx!(Expansion, span = self.current_span(), "{}", message.into())
    }

    /// A fatal macro error at `tree`'s position, falling back to the current
    /// reference when `tree` is synthetic.
    pub fn error_at(&self, tree: &SyntaxTree, message: impl Into<String>) -> MacroError {
        err_ctx!(
            Expansion,
            span = tree.span.or_else(|| self.current_span()),
            "{}",
            message.into()
        )
    }

    // --- Quotation ---

    /// Instantiates `template` with `bindings`; see [`quote::substitute`].
    pub fn quote(&self, template: &SyntaxTree, bindings: &Bindings) -> Result<SyntaxTree, MacroError> {
        quote::substitute(template, bindings, self)
    }

    /// A fresh hygienic identifier for `base` under the current scope.
    pub fn mk_ident(&self, base: &str) -> Result<SyntaxTree, MacroError> {
        let scope = self
            .current_scope()
            .ok_or_else(|| self.error(format!("cannot create hygienic `{}` outside a macro scope", base)))?;
        let name = add_macro_scope(base, self.main_module, scope)?;
        Ok(SyntaxTree::new(Syntax::Ident(name), self.current_span()))
    }
}
