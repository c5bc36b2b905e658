//!
//! Drives handlers over a syntax tree until every node is stuck.
//!
//! ## Expansion at a node
//!
//! A node starts `Pending`. One [`Expander::step`] looks up the handlers for
//! its kind and tries them in priority order, each inside a fresh macro scope
//! with the node as the current reference. The first rewrite wins; a decline
//! moves on to the next handler; an error ends everything. When no handler
//! applies the node is `Stuck`.
//!
//! [`Expander::expand`] repeats `step` on each replacement with a bounded
//! counter, then descends into the stuck node's children left to right. If
//! any child changed, the rebuilt node is stepped again, since its new
//! children may now match a handler. The counter is carried into children of
//! a rewritten node, so a macro that produces itself in a child position
//! still hits the limit.
//!
//! ## Sharing
//!
//! A subtree whose expansion changed nothing is returned as the original
//! `Arc`, so expanding an already expanded tree allocates nothing.

use std::sync::Arc;

use crate::ast::{Syntax, SyntaxTree};
use crate::macros::context::MacroContext;
use crate::macros::registry::MacroRegistry;
use crate::macros::scope::ScopeAllocator;
use crate::macros::types::{Expansion, ExpansionStep, MAX_MACRO_RECURSION_DEPTH};
use crate::{ErrorContext, MacroError};

/// The state of a single node under expansion.
#[derive(Debug)]
pub enum ExpansionState {
    /// Not yet tried.
    Pending(SyntaxTree),
    /// A handler produced this replacement; it is pending again.
    Rewritten(SyntaxTree),
    /// No handler applies. Terminal.
    Stuck(SyntaxTree),
    /// A handler failed. Terminal.
    Failed(MacroError),
}

impl ExpansionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExpansionState::Stuck(_) | ExpansionState::Failed(_))
    }
}

/// One expansion run: a registry, an allocator and the per-run stacks.
///
/// An `Expander` is cheap to build and owns its scope and reference stacks,
/// so each concurrently expanded tree gets its own.
#[derive(Debug)]
pub struct Expander<'a> {
    registry: &'a MacroRegistry,
    cx: MacroContext<'a>,
    max_depth: usize,
    trace: Option<Vec<ExpansionStep>>,
}

impl<'a> Expander<'a> {
    pub fn new(
        registry: &'a MacroRegistry,
        allocator: &'a ScopeAllocator,
        main_module: &'a str,
    ) -> Self {
        Self {
            registry,
            cx: MacroContext::new(allocator, main_module),
            max_depth: MAX_MACRO_RECURSION_DEPTH,
            trace: None,
        }
    }

    /// Sets the number of rewrites allowed along one chain.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Records every rewrite; see [`Expander::take_trace`].
    pub fn with_trace(mut self) -> Self {
        self.trace = Some(Vec::new());
        self
    }

    pub fn context(&self) -> &MacroContext<'a> {
        &self.cx
    }

    /// Steps recorded so far, oldest first. Empty unless tracing.
    pub fn take_trace(&mut self) -> Vec<ExpansionStep> {
        self.trace.as_mut().map(std::mem::take).unwrap_or_default()
    }

    /// Performs one transition from `Pending` (or `Rewritten`).
    ///
    /// Terminal states are returned unchanged.
    pub fn step(&mut self, state: ExpansionState) -> ExpansionState {
        let tree = match state {
            ExpansionState::Pending(tree) | ExpansionState::Rewritten(tree) => tree,
            terminal => return terminal,
        };
        let kind = tree.kind();
        let registry = self.registry;
        for handler in registry.lookup(&kind) {
            let outcome = self.cx.with_fresh_scope(|cx| {
                let scope = cx.current_scope();
                cx.with_ref(&tree, |cx| {
                    let result = handler.try_expand(&tree, cx);
                    (scope, result.map_err(|e| e.or_span(cx.current_span())))
                })
            });
            match outcome {
                (_, Ok(Expansion::Unsupported)) => {
                    tracing::trace!(kind = %kind, handler = handler.name(), "handler declined");
                }
                (scope, Ok(Expansion::Rewritten(output))) => {
                    tracing::debug!(
                        kind = %kind,
                        handler = handler.name(),
                        scope = ?scope,
                        "rewrote node"
                    );
                    if let (Some(trace), Some(scope)) = (self.trace.as_mut(), scope) {
                        trace.push(ExpansionStep {
                            handler: handler.name().to_string(),
                            kind: kind.clone(),
                            scope,
                            input: tree.clone(),
                            output: output.clone(),
                        });
                    }
                    return ExpansionState::Rewritten(output);
                }
                (_, Err(error)) => {
                    tracing::debug!(kind = %kind, handler = handler.name(), %error, "handler failed");
                    return ExpansionState::Failed(error);
                }
            }
        }
        ExpansionState::Stuck(tree)
    }

    /// Expands `tree` completely.
    ///
    /// The result is a fixed point: expanding it again changes nothing.
    /// Rewrite chains are bounded by the configured depth, but the walk over
    /// children recurses on the call stack, so a tree nested deeper than the
    /// stack allows will overflow. Trees read through the loader are capped
    /// by serde_json's nesting limit; trees built in code are not.
    ///
    /// # Errors
    /// Returns the first handler error, or `MacroError::RecursionLimit` when a
    /// chain of rewrites exceeds the configured depth.
    pub fn expand(&mut self, tree: &SyntaxTree) -> Result<SyntaxTree, MacroError> {
        self.expand_at(tree, 0)
    }

    fn expand_at(&mut self, tree: &SyntaxTree, mut depth: usize) -> Result<SyntaxTree, MacroError> {
        let mut current = tree.clone();
        loop {
            let stuck = self.reduce(current, tree, &mut depth)?;
            let expanded = self.expand_children(stuck.clone(), depth)?;
            if expanded.ptr_eq(&stuck) {
                return Ok(expanded);
            }
            // new children may let a handler match the parent
            current = expanded;
        }
    }

    /// Steps `tree` until it is stuck, counting rewrites into `depth`.
    fn reduce(
        &mut self,
        tree: SyntaxTree,
        origin: &SyntaxTree,
        depth: &mut usize,
    ) -> Result<SyntaxTree, MacroError> {
        let mut state = ExpansionState::Pending(tree);
        loop {
            state = self.step(state);
            match state {
                ExpansionState::Rewritten(ref output) => {
                    *depth += 1;
                    if *depth > self.max_depth {
                        tracing::warn!(limit = self.max_depth, kind = %origin.kind(), "recursion limit exceeded");
                        return Err(MacroError::RecursionLimit {
                            limit: self.max_depth,
                            kind: output.kind().to_string(),
                            ctx: ErrorContext::with_span(origin.span.or(self.cx.current_span())),
                        });
                    }
                }
                ExpansionState::Stuck(tree) => return Ok(tree),
                ExpansionState::Failed(error) => return Err(error),
                ExpansionState::Pending(_) => {}
            }
        }
    }

    fn expand_children(&mut self, tree: SyntaxTree, depth: usize) -> Result<SyntaxTree, MacroError> {
        let Syntax::Node(kind, children) = &*tree.value else {
            return Ok(tree);
        };
        let mut expanded: Option<Vec<SyntaxTree>> = None;
        for (i, child) in children.iter().enumerate() {
            let new_child = self.expand_at(child, depth)?;
            match expanded.as_mut() {
                Some(out) => out.push(new_child),
                None if new_child.ptr_eq(child) && new_child.span == child.span => {}
                None => {
                    let mut out = Vec::with_capacity(children.len());
                    out.extend(children[..i].iter().cloned());
                    out.push(new_child);
                    expanded = Some(out);
                }
            }
        }
        match expanded {
            Some(children) => Ok(SyntaxTree {
                value: Arc::new(Syntax::Node(kind.clone(), children)),
                span: tree.span,
            }),
            None => Ok(tree),
        }
    }
}
