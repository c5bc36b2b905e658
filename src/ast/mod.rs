//! AST module for the hygiene expander
//!
//! This module provides the immutable, position-tagged syntax tree the
//! expander consumes and produces. Trees are produced by an external parser;
//! nothing here reads source text.
//!
//! **INVARIANT:** A `SyntaxTree` is never mutated in place. Rewrites build new
//! nodes and share unchanged children through `Arc`.

// ============================================================================
// IMPORTS
// ============================================================================

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::macros::names::{erase_macro_scopes, has_macro_scopes};

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// Represents a span in the source code.
///
/// Spans are byte offsets into the text the external parser read. Synthesized
/// nodes borrow the span of the reference tree in force when they were built.
///
/// # Examples
///
/// ```rust
/// use hygiene::ast::Span;
/// let span = Span { start: 0, end: 5 };
/// assert_eq!(span.len(), 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Wrapper for carrying optional source span information with any value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithSpan<T> {
    pub value: T,
    #[serde(default)]
    pub span: Option<Span>,
}

/// Canonical syntax tree with shared ownership for cheap rewriting.
pub type SyntaxTree = WithSpan<Arc<Syntax>>;

/// The kind of a syntax node, used as the macro registry key.
///
/// Leaves report the reserved kinds [`SyntaxKind::ATOM`] and
/// [`SyntaxKind::IDENT`], so handlers can be registered for them like any
/// other node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyntaxKind(Cow<'static, str>);

impl SyntaxKind {
    pub const ATOM: SyntaxKind = SyntaxKind(Cow::Borrowed("atom"));
    pub const IDENT: SyntaxKind = SyntaxKind(Cow::Borrowed("ident"));
    pub const ANTIQUOT: SyntaxKind = SyntaxKind(Cow::Borrowed("antiquot"));
    pub const SPLICE: SyntaxKind = SyntaxKind(Cow::Borrowed("splice"));

    pub fn new(name: impl Into<String>) -> Self {
        SyntaxKind(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SyntaxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SyntaxKind {
    fn from(name: &str) -> Self {
        SyntaxKind::new(name)
    }
}

/// The syntactic category a hole accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Any subtree.
    #[default]
    Any,
    /// An identifier.
    Ident,
    /// Any atom token.
    Atom,
    /// An atom whose text is an unsigned decimal numeral.
    Num,
    /// A node of exactly this kind.
    Kind(SyntaxKind),
}

impl Category {
    /// Returns true if `tree` belongs to this category.
    pub fn accepts(&self, tree: &SyntaxTree) -> bool {
        match (self, &*tree.value) {
            (Category::Any, _) => true,
            (Category::Ident, Syntax::Ident(_)) => true,
            (Category::Atom, Syntax::Atom(_)) => true,
            (Category::Num, Syntax::Atom(text)) => is_numeral(text),
            (Category::Kind(kind), Syntax::Node(node_kind, _)) => kind == node_kind,
            _ => false,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Any => f.write_str("any"),
            Category::Ident => f.write_str("ident"),
            Category::Atom => f.write_str("atom"),
            Category::Num => f.write_str("num"),
            Category::Kind(kind) => write!(f, "{}", kind),
        }
    }
}

/// An anti-quotation: a named pattern variable with an expected category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hole {
    pub var: String,
    #[serde(default)]
    pub category: Category,
}

/// The core syntax node.
///
/// # Examples
///
/// ```rust
/// use hygiene::ast::{Syntax, SyntaxKind};
/// let atom = Syntax::Atom("42".to_string());
/// assert_eq!(atom.kind(), SyntaxKind::ATOM);
/// assert_eq!(atom.pretty(), "42");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Syntax {
    /// A token: keyword, punctuation or literal.
    Atom(String),
    /// An identifier, plain or carrying encoded macro scopes.
    Ident(String),
    /// An interior node.
    Node(SyntaxKind, Vec<SyntaxTree>),
    /// Template hole matching exactly one subtree.
    Antiquot(Hole),
    /// Template hole matching a run of sibling subtrees.
    Splice(Hole),
}

// ============================================================================
// PUBLIC API IMPLEMENTATION
// ============================================================================

impl Syntax {
    /// Returns the registry key for this node.
    pub fn kind(&self) -> SyntaxKind {
        match self {
            Syntax::Atom(_) => SyntaxKind::ATOM,
            Syntax::Ident(_) => SyntaxKind::IDENT,
            Syntax::Node(kind, _) => kind.clone(),
            Syntax::Antiquot(_) => SyntaxKind::ANTIQUOT,
            Syntax::Splice(_) => SyntaxKind::SPLICE,
        }
    }

    /// Returns the children of a node, or an empty slice for leaves.
    pub fn children(&self) -> &[SyntaxTree] {
        match self {
            Syntax::Node(_, children) => children,
            _ => &[],
        }
    }

    /// Returns the identifier name if this is an identifier.
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Syntax::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// Returns the token text if this is an atom.
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Syntax::Atom(text) => Some(text),
            _ => None,
        }
    }

    /// True if this subtree contains any template hole.
    pub fn has_holes(&self) -> bool {
        match self {
            Syntax::Antiquot(_) | Syntax::Splice(_) => true,
            Syntax::Node(_, children) => children.iter().any(|c| c.value.has_holes()),
            _ => false,
        }
    }

    /// Pretty-prints the syntax as an s-expression, keeping encoded names.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hygiene::ast::builder::{atom, ident, node};
    /// let tree = node("not", vec![atom("!"), ident("foo")]);
    /// assert_eq!(tree.value.pretty(), "(not ! foo)");
    /// ```
    pub fn pretty(&self) -> String {
        self.render(false)
    }

    /// Pretty-prints the syntax with macro scopes erased from identifiers.
    pub fn pretty_erased(&self) -> String {
        self.render(true)
    }

    // ------------------------------------------------------------------------
    // Pretty-printing helpers
    // ------------------------------------------------------------------------

    fn render(&self, erase: bool) -> String {
        match self {
            Syntax::Atom(text) => text.clone(),
            // Hygienic names keep a dagger so erased output stays distinguishable.
            Syntax::Ident(name) if erase && has_macro_scopes(name) => {
                format!("{}✝", erase_macro_scopes(name))
            }
            Syntax::Ident(name) => name.clone(),
            Syntax::Node(kind, children) => Self::render_node(kind, children, erase),
            Syntax::Antiquot(hole) => format!("${}:{}", hole.var, hole.category),
            Syntax::Splice(hole) => format!("${}:{}*", hole.var, hole.category),
        }
    }

    fn render_node(kind: &SyntaxKind, children: &[SyntaxTree], erase: bool) -> String {
        let mut s = format!("({}", kind);
        for child in children {
            s.push(' ');
            s.push_str(&child.value.render(erase));
        }
        s.push(')');
        s
    }
}

impl SyntaxTree {
    pub fn new(syntax: Syntax, span: Option<Span>) -> Self {
        WithSpan {
            value: Arc::new(syntax),
            span,
        }
    }

    /// Wraps syntax without a position.
    pub fn synthetic(syntax: Syntax) -> Self {
        WithSpan {
            value: Arc::new(syntax),
            span: None,
        }
    }

    /// Wraps syntax with a position.
    pub fn spanned(syntax: Syntax, span: Span) -> Self {
        WithSpan {
            value: Arc::new(syntax),
            span: Some(span),
        }
    }

    pub fn kind(&self) -> SyntaxKind {
        self.value.kind()
    }

    /// Returns a copy of this tree carrying `span`, sharing the syntax.
    pub fn with_span(&self, span: Option<Span>) -> Self {
        WithSpan {
            value: Arc::clone(&self.value),
            span,
        }
    }

    /// Structural equality ignoring spans.
    pub fn struct_eq(&self, other: &SyntaxTree) -> bool {
        if Arc::ptr_eq(&self.value, &other.value) {
            return true;
        }
        match (&*self.value, &*other.value) {
            (Syntax::Node(k1, c1), Syntax::Node(k2, c2)) => {
                k1 == k2 && c1.len() == c2.len() && c1.iter().zip(c2).all(|(a, b)| a.struct_eq(b))
            }
            (a, b) => a == b,
        }
    }

    /// True if both trees share the same underlying syntax allocation.
    pub fn ptr_eq(&self, other: &SyntaxTree) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }

    /// Visits every identifier name in the tree, left to right.
    pub fn idents(&self) -> Vec<&str> {
        let mut out = Vec::new();
        collect_idents(self, &mut out);
        out
    }
}

impl fmt::Display for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value.pretty())
    }
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn collect_idents<'a>(tree: &'a SyntaxTree, out: &mut Vec<&'a str>) {
    match &*tree.value {
        Syntax::Ident(name) => out.push(name),
        Syntax::Node(_, children) => children.iter().for_each(|c| collect_idents(c, out)),
        _ => {}
    }
}

/// Returns true for non-empty strings of ASCII digits.
pub fn is_numeral(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

// ============================================================================
// MODULE EXPORTS
// ============================================================================

pub mod builder;
