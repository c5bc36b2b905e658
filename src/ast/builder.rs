//! # Syntax Builders
//!
//! Small constructors for syntax trees and quotation templates. Handlers and
//! tests use these instead of spelling out `WithSpan { value: Arc::new(..) }`.
//!
//! All builders produce synthetic trees (no span). Use [`spanned`] or
//! [`SyntaxTree::with_span`] to attach a position.

use crate::ast::{Category, Hole, Span, Syntax, SyntaxKind, SyntaxTree};

/// A token atom.
pub fn atom(text: impl Into<String>) -> SyntaxTree {
    SyntaxTree::synthetic(Syntax::Atom(text.into()))
}

/// An identifier.
pub fn ident(name: impl Into<String>) -> SyntaxTree {
    SyntaxTree::synthetic(Syntax::Ident(name.into()))
}

/// An interior node.
pub fn node(kind: impl Into<SyntaxKind>, children: Vec<SyntaxTree>) -> SyntaxTree {
    SyntaxTree::synthetic(Syntax::Node(kind.into(), children))
}

/// A single-subtree hole `$var:category`.
pub fn antiquot(var: impl Into<String>, category: Category) -> SyntaxTree {
    SyntaxTree::synthetic(Syntax::Antiquot(Hole {
        var: var.into(),
        category,
    }))
}

/// A sequence hole `$var:category*`.
pub fn splice(var: impl Into<String>, category: Category) -> SyntaxTree {
    SyntaxTree::synthetic(Syntax::Splice(Hole {
        var: var.into(),
        category,
    }))
}

/// Shorthand for `antiquot(var, Category::Any)`.
pub fn hole(var: impl Into<String>) -> SyntaxTree {
    antiquot(var, Category::Any)
}

/// Attaches a span to a tree.
pub fn spanned(tree: SyntaxTree, start: usize, end: usize) -> SyntaxTree {
    tree.with_span(Some(Span::new(start, end)))
}
