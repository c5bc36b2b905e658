//! Quotation templates: matching and hygienic substitution.
//!
//! A template is an ordinary [`SyntaxTree`] that may contain holes:
//! `Antiquot` (one subtree) and `Splice` (a run of sibling subtrees, at most
//! one per child list). Matching a template against input produces
//! [`Bindings`]; substituting bindings back into a template produces new
//! syntax.
//!
//! Substitution is where hygiene happens. Identifiers written in the template
//! are stamped with the innermost active macro scope; identifiers that arrive
//! through bindings are inserted untouched. A template `fun x => $body` can
//! therefore never capture an `x` occurring in `body`.

use crate::ast::{Hole, Syntax, SyntaxTree};
use crate::err_ctx;
use crate::macros::context::MacroContext;
use crate::macros::names::{add_macro_scope, erase_macro_scopes};
use crate::macros::scope::MacroScope;
use crate::MacroError;

/// What a pattern variable is bound to.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    One(SyntaxTree),
    Many(Vec<SyntaxTree>),
}

impl Binding {
    pub fn as_one(&self) -> Option<&SyntaxTree> {
        match self {
            Binding::One(tree) => Some(tree),
            Binding::Many(_) => None,
        }
    }

    pub fn as_many(&self) -> Option<&[SyntaxTree]> {
        match self {
            Binding::Many(trees) => Some(trees),
            Binding::One(_) => None,
        }
    }

    fn struct_eq(&self, other: &Binding) -> bool {
        match (self, other) {
            (Binding::One(a), Binding::One(b)) => a.struct_eq(b),
            (Binding::Many(a), Binding::Many(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.struct_eq(y))
            }
            _ => false,
        }
    }
}

/// Pattern-variable environment produced by a successful match.
pub type Bindings = im::HashMap<String, Binding>;

/// Whether a hole binds one subtree or a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoleForm {
    Single,
    Sequence,
}

// =============================
// Matching
// =============================

/// Matches `input` against `template`.
///
/// Returns `None` when the shapes differ; a failed match is not an error, it
/// only means the next rule or handler should be tried.
///
/// # Examples
///
/// ```rust
/// use hygiene::ast::builder::{atom, hole, node};
/// use hygiene::macros::quote::match_template;
/// let pattern = node("pair", vec![hole("a"), atom(","), hole("b")]);
/// let input = node("pair", vec![atom("1"), atom(","), atom("2")]);
/// let bindings = match_template(&pattern, &input).unwrap();
/// assert_eq!(bindings["a"].as_one().unwrap().value.pretty(), "1");
/// ```
pub fn match_template(template: &SyntaxTree, input: &SyntaxTree) -> Option<Bindings> {
    match_into(template, input, Bindings::new())
}

fn match_into(template: &SyntaxTree, input: &SyntaxTree, bindings: Bindings) -> Option<Bindings> {
    match (&*template.value, &*input.value) {
        (Syntax::Antiquot(hole), _) => {
            if !hole.category.accepts(input) {
                return None;
            }
            bind(bindings, &hole.var, Binding::One(input.clone()))
        }
        // a splice only has meaning inside a child list
        (Syntax::Splice(_), _) => None,
        (Syntax::Atom(expected), Syntax::Atom(actual)) => (expected == actual).then_some(bindings),
        (Syntax::Ident(expected), Syntax::Ident(actual)) => {
            (erase_macro_scopes(expected) == erase_macro_scopes(actual)).then_some(bindings)
        }
        (Syntax::Node(kind, pattern_children), Syntax::Node(input_kind, input_children)) => {
            if kind != input_kind {
                return None;
            }
            match_children(pattern_children, input_children, bindings)
        }
        _ => None,
    }
}

fn match_children(
    patterns: &[SyntaxTree],
    inputs: &[SyntaxTree],
    bindings: Bindings,
) -> Option<Bindings> {
    let splice_at = patterns
        .iter()
        .position(|p| matches!(&*p.value, Syntax::Splice(_)));

    let Some(at) = splice_at else {
        if patterns.len() != inputs.len() {
            return None;
        }
        return match_pairs(patterns, inputs, bindings);
    };

    let suffix_len = patterns.len() - at - 1;
    if inputs.len() < at + suffix_len {
        return None;
    }
    let middle_end = inputs.len() - suffix_len;

    let bindings = match_pairs(&patterns[..at], &inputs[..at], bindings)?;
    let bindings = match_pairs(&patterns[at + 1..], &inputs[middle_end..], bindings)?;

    let Syntax::Splice(hole) = &*patterns[at].value else {
        return None;
    };
    let run = &inputs[at..middle_end];
    if !run.iter().all(|tree| hole.category.accepts(tree)) {
        return None;
    }
    bind(bindings, &hole.var, Binding::Many(run.to_vec()))
}

fn match_pairs(patterns: &[SyntaxTree], inputs: &[SyntaxTree], bindings: Bindings) -> Option<Bindings> {
    patterns
        .iter()
        .zip(inputs)
        .try_fold(bindings, |acc, (p, i)| match_into(p, i, acc))
}

// A variable used twice must bind structurally equal syntax both times.
fn bind(bindings: Bindings, var: &str, value: Binding) -> Option<Bindings> {
    match bindings.get(var) {
        Some(existing) if existing.struct_eq(&value) => Some(bindings),
        Some(_) => None,
        None => Some(bindings.update(var.to_string(), value)),
    }
}

// =============================
// Substitution
// =============================

/// Instantiates `template`, replacing holes with their bindings and stamping
/// template-introduced identifiers with the innermost scope of `cx`.
///
/// Template nodes without a span take the span of `cx`'s current reference.
pub fn substitute(
    template: &SyntaxTree,
    bindings: &Bindings,
    cx: &MacroContext<'_>,
) -> Result<SyntaxTree, MacroError> {
    let scope = cx.current_scope().ok_or_else(|| {
        err_ctx!(
            Template,
            span = cx.current_span(),
            "quotation instantiated outside of a macro scope"
        )
    })?;
    let subst = Substitution { bindings, cx, scope };
    subst.tree(template)
}

struct Substitution<'s, 'cx> {
    bindings: &'s Bindings,
    cx: &'s MacroContext<'cx>,
    scope: MacroScope,
}

impl Substitution<'_, '_> {
    fn tree(&self, template: &SyntaxTree) -> Result<SyntaxTree, MacroError> {
        let span = template.span.or_else(|| self.cx.current_span());
        match &*template.value {
            Syntax::Antiquot(hole) => self.single(hole, template),
            Syntax::Splice(hole) => Err(err_ctx!(
                Template,
                span = span,
                "splice `${}` used outside of a child list",
                hole.var
            )),
            Syntax::Ident(name) => {
                let hygienic = add_macro_scope(name, self.cx.main_module(), self.scope)
                    .map_err(|e| e.or_span(span))?;
                Ok(SyntaxTree::new(Syntax::Ident(hygienic), span))
            }
            Syntax::Atom(_) => Ok(template.with_span(span)),
            Syntax::Node(kind, children) => {
                let mut out = Vec::with_capacity(children.len());
                for child in children {
                    match &*child.value {
                        Syntax::Splice(hole) => out.extend(self.sequence(hole, child)?),
                        _ => out.push(self.tree(child)?),
                    }
                }
                Ok(SyntaxTree::new(Syntax::Node(kind.clone(), out), span))
            }
        }
    }

    fn single(&self, hole: &Hole, at: &SyntaxTree) -> Result<SyntaxTree, MacroError> {
        match self.lookup(hole, at)? {
            Binding::One(tree) => Ok(tree.clone()),
            Binding::Many(_) => Err(err_ctx!(
                Template,
                span = at.span.or_else(|| self.cx.current_span()),
                "sequence variable `${}` used where a single syntax tree is expected",
                hole.var
            )),
        }
    }

    fn sequence(&self, hole: &Hole, at: &SyntaxTree) -> Result<Vec<SyntaxTree>, MacroError> {
        match self.lookup(hole, at)? {
            Binding::Many(trees) => Ok(trees.clone()),
            Binding::One(_) => Err(err_ctx!(
                Template,
                span = at.span.or_else(|| self.cx.current_span()),
                "single variable `${}` used as a splice",
                hole.var
            )),
        }
    }

    fn lookup(&self, hole: &Hole, at: &SyntaxTree) -> Result<&Binding, MacroError> {
        self.bindings.get(&hole.var).ok_or_else(|| {
            err_ctx!(
                Template,
                span = at.span.or_else(|| self.cx.current_span()),
                "unbound pattern variable `${}`",
                hole.var
            )
        })
    }
}

// =============================
// Inspection
// =============================

/// Lists the holes of a template in left-to-right order.
pub fn holes(template: &SyntaxTree) -> Vec<(&Hole, HoleForm)> {
    let mut out = Vec::new();
    collect_holes(template, &mut out);
    out
}

fn collect_holes<'t>(tree: &'t SyntaxTree, out: &mut Vec<(&'t Hole, HoleForm)>) {
    match &*tree.value {
        Syntax::Antiquot(hole) => out.push((hole, HoleForm::Single)),
        Syntax::Splice(hole) => out.push((hole, HoleForm::Sequence)),
        Syntax::Node(_, children) => children.iter().for_each(|c| collect_holes(c, out)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::{antiquot, atom, hole, ident, node, spanned, splice};
    use crate::ast::{Category, Span};
    use crate::macros::scope::ScopeAllocator;

    #[test]
    fn atoms_match_literally() {
        let pattern = node("pair", vec![atom("true"), atom("true")]);
        assert!(match_template(&pattern, &node("pair", vec![atom("true"), atom("true")])).is_some());
        assert!(match_template(&pattern, &node("pair", vec![atom("true"), atom("false")])).is_none());
    }

    #[test]
    fn kind_and_arity_must_align() {
        let pattern = node("pair", vec![hole("a"), hole("b")]);
        assert!(match_template(&pattern, &node("list", vec![atom("1"), atom("2")])).is_none());
        assert!(match_template(&pattern, &node("pair", vec![atom("1")])).is_none());
    }

    #[test]
    fn category_mismatch_fails() {
        let pattern = node("neg", vec![antiquot("n", Category::Num)]);
        assert!(match_template(&pattern, &node("neg", vec![atom("12")])).is_some());
        assert!(match_template(&pattern, &node("neg", vec![ident("x")])).is_none());
    }

    #[test]
    fn repeated_variable_requires_equal_syntax() {
        let pattern = node("same", vec![hole("a"), hole("a")]);
        assert!(match_template(&pattern, &node("same", vec![ident("x"), ident("x")])).is_some());
        assert!(match_template(&pattern, &node("same", vec![ident("x"), ident("y")])).is_none());
    }

    #[test]
    fn pattern_identifiers_ignore_macro_scopes() {
        let pattern = node("call", vec![ident("f")]);
        let input = node("call", vec![ident("f._@.Main._hyg.4")]);
        assert!(match_template(&pattern, &input).is_some());
    }

    #[test]
    fn splice_binds_middle_run() {
        let pattern = node("call", vec![ident("f"), splice("args", Category::Any), atom(";")]);
        let input = node("call", vec![ident("f"), atom("1"), atom("2"), atom(";")]);
        let b = match_template(&pattern, &input).unwrap();
        assert_eq!(b["args"].as_many().unwrap().len(), 2);

        let empty = node("call", vec![ident("f"), atom(";")]);
        let b = match_template(&pattern, &empty).unwrap();
        assert!(b["args"].as_many().unwrap().is_empty());

        assert!(match_template(&pattern, &node("call", vec![ident("f")])).is_none());
    }

    #[test]
    fn substitution_stamps_only_template_identifiers() {
        let alloc = ScopeAllocator::new();
        let mut cx = MacroContext::new(&alloc, "Main");
        let template = node("fun", vec![atom("fun"), ident("x"), atom("=>"), hole("body")]);
        let bindings = Bindings::new().update("body".to_string(), Binding::One(ident("x")));
        let out = cx.with_fresh_scope(|cx| cx.quote(&template, &bindings)).unwrap();
        assert_eq!(out.idents(), vec!["x._@.Main._hyg.1", "x"]);
    }

    #[test]
    fn substitution_splices_sequences() {
        let alloc = ScopeAllocator::new();
        let mut cx = MacroContext::new(&alloc, "Main");
        let template = node("list", vec![splice("xs", Category::Any)]);
        let bindings = Bindings::new().update(
            "xs".to_string(),
            Binding::Many(vec![atom("1"), atom("2"), atom("3")]),
        );
        let out = cx.with_fresh_scope(|cx| cx.quote(&template, &bindings)).unwrap();
        assert_eq!(out.value.pretty(), "(list 1 2 3)");
    }

    #[test]
    fn synthesized_nodes_take_reference_span() {
        let alloc = ScopeAllocator::new();
        let mut cx = MacroContext::new(&alloc, "Main");
        let reference = spanned(atom("call"), 7, 12);
        let out = cx
            .with_ref(&reference, |cx| {
                cx.with_fresh_scope(|cx| cx.quote(&node("unit", vec![atom("()")]), &Bindings::new()))
            })
            .unwrap();
        assert_eq!(out.span, Some(Span::new(7, 12)));
        assert_eq!(out.value.children()[0].span, Some(Span::new(7, 12)));
    }

    #[test]
    fn substitution_errors() {
        let alloc = ScopeAllocator::new();
        let mut cx = MacroContext::new(&alloc, "Main");
        assert!(cx.quote(&atom("x"), &Bindings::new()).is_err());

        let unbound = cx.with_fresh_scope(|cx| cx.quote(&hole("missing"), &Bindings::new()));
        assert!(unbound.unwrap_err().message().contains("unbound"));

        let many = Bindings::new().update("xs".to_string(), Binding::Many(vec![]));
        assert!(cx.with_fresh_scope(|cx| cx.quote(&hole("xs"), &many)).is_err());
    }

    #[test]
    fn holes_are_listed_in_order() {
        let t = node("f", vec![hole("a"), node("g", vec![splice("b", Category::Ident)])]);
        let found: Vec<_> = holes(&t).into_iter().map(|(h, form)| (h.var.as_str(), form)).collect();
        assert_eq!(found, vec![("a", HoleForm::Single), ("b", HoleForm::Sequence)]);
    }
}
