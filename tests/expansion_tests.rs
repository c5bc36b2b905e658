use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hygiene::ast::builder::{atom, hole, ident, node, spanned};
use hygiene::ast::{Span, Syntax, SyntaxTree};
use hygiene::macros::names::{add_macro_scope, decode, encode, erase_macro_scopes, ScopeSegment};
use hygiene::macros::{
    Expansion, FnMacro, MacroContext, MacroHandler, MacroScope, Rule, RuleMacro, ScopeAllocator,
};
use hygiene::{ExpanderConfig, Session};
use pretty_assertions::assert_eq;

// =============================
// Fixtures
// =============================

fn lxor(a: SyntaxTree, b: SyntaxTree) -> SyntaxTree {
    node("lxor", vec![a, atom("LXOR"), b])
}

/// `$a LXOR $b => !$a && $b`
fn lxor_rule() -> RuleMacro {
    RuleMacro::new(
        "lxor",
        "lxor",
        vec![Rule::template(
            lxor(hole("a"), hole("b")),
            node("and", vec![node("not", vec![atom("!"), hole("a")]), atom("&&"), hole("b")]),
        )],
    )
    .unwrap()
}

/// `true LXOR true => true`, declining anything else.
fn lxor_true_true() -> impl MacroHandler {
    FnMacro::new("lxor-true-true", |tree: &SyntaxTree, _: &mut MacroContext<'_>| {
        let children = tree.value.children();
        let literal_true = |t: &SyntaxTree| t.value.as_atom() == Some("true");
        if children.len() == 3 && literal_true(&children[0]) && literal_true(&children[2]) {
            Ok(Expansion::Rewritten(atom("true")))
        } else {
            Ok(Expansion::Unsupported)
        }
    })
}

/// `const $e => fun x => $e`
fn const_rule() -> RuleMacro {
    RuleMacro::new(
        "const",
        "const",
        vec![Rule::template(
            node("const", vec![hole("e")]),
            node("fun", vec![ident("x"), atom("=>"), hole("e")]),
        )],
    )
    .unwrap()
}

fn lxor_session() -> Session {
    let mut session = Session::default();
    session.register("lxor", lxor_rule());
    session.register("lxor", lxor_true_true());
    session
}

// =============================
// End-to-end
// =============================

#[test]
fn literal_pair_uses_the_later_handler() {
    let out = lxor_session().expand(&lxor(atom("true"), atom("true"))).unwrap();
    assert_eq!(out.to_string(), "true");
}

#[test]
fn declined_input_falls_through_to_the_earlier_handler() {
    let out = lxor_session().expand(&lxor(ident("foo"), ident("foo"))).unwrap();
    assert_eq!(out.to_string(), "(and (not ! foo) && foo)");
}

#[test]
fn later_registration_is_tried_first() {
    let mut session = Session::default();
    session.register("k", FnMacro::new("h1", |_, _| Ok(Expansion::Rewritten(atom("h1")))));
    session.register("k", FnMacro::new("h2", |_, _| Ok(Expansion::Rewritten(atom("h2")))));
    let out = session.expand(&node("k", vec![])).unwrap();
    assert_eq!(out.to_string(), "h2");
}

// =============================
// Hygiene
// =============================

#[test]
fn template_binder_does_not_capture_user_identifier() {
    let mut session = Session::default();
    session.register("const", const_rule());
    // def x := 42; const x
    let program = node(
        "seq",
        vec![
            node("def", vec![ident("x"), atom(":="), atom("42")]),
            node("const", vec![ident("x")]),
        ],
    );
    let out = session.expand(&program).unwrap();
    let idents = out.idents();
    assert_eq!(idents, vec!["x", "x._@.Main._hyg.1", "x"]);

    let binder = decode(idents[1]).unwrap();
    assert_eq!(binder.base, "x");
    assert_eq!(binder.scopes, vec![MacroScope::new(1)]);
    assert!(decode(idents[2]).is_err());
    assert_eq!(out.value.pretty_erased(), "(seq (def x := 42) (fun x✝ => x))");
}

#[test]
fn separate_invocations_get_distinct_names() {
    let mut session = Session::default();
    session.register("const", const_rule());
    let program = node(
        "pair",
        vec![node("const", vec![atom("1")]), node("const", vec![atom("2")])],
    );
    let out = session.expand(&program).unwrap();
    let idents = out.idents();
    assert_eq!(idents.len(), 2);
    assert_ne!(idents[0], idents[1]);
    assert_eq!(erase_macro_scopes(idents[0]), erase_macro_scopes(idents[1]));
}

#[test]
fn nested_macros_keep_their_binders_apart() {
    let mut session = Session::default();
    session.register("const", const_rule());
    // twice $e => const (const $e)
    session.register(
        "twice",
        RuleMacro::new(
            "twice",
            "twice",
            vec![Rule::template(
                node("twice", vec![hole("e")]),
                node("const", vec![node("const", vec![hole("e")])]),
            )],
        )
        .unwrap(),
    );
    let out = session.expand(&node("twice", vec![ident("x")])).unwrap();
    let idents = out.idents();
    assert_eq!(idents.len(), 3);
    assert_ne!(idents[0], idents[1]);
    assert_eq!(idents[2], "x");
}

#[test]
fn mk_ident_introduces_a_fresh_name() {
    let mut session = Session::default();
    session.register(
        "tmp",
        FnMacro::new("tmp", |_: &SyntaxTree, cx: &mut MacroContext<'_>| {
            let t = cx.mk_ident("t")?;
            Ok(Expansion::Rewritten(node("let", vec![t.clone(), t])))
        }),
    );
    let out = session.expand(&node("tmp", vec![])).unwrap();
    assert_eq!(out.to_string(), "(let t._@.Main._hyg.1 t._@.Main._hyg.1)");
}

// =============================
// Names
// =============================

#[test]
fn encode_then_decode_recovers_every_part() {
    let imported = vec![ScopeSegment::new("Lib", vec![MacroScope::new(3), MacroScope::new(4)])];
    let scopes = vec![MacroScope::new(7), MacroScope::new(9)];
    let name = encode("foo.bar", "App", &imported, &scopes).unwrap();
    let decoded = decode(&name).unwrap();
    assert_eq!(decoded.base, "foo.bar");
    assert_eq!(decoded.imported, imported);
    assert_eq!(decoded.main_module, "App");
    assert_eq!(decoded.scopes, scopes);
}

#[test]
fn adding_a_scope_from_another_module_keeps_the_old_one() {
    let from_lib = add_macro_scope("x", "Lib", MacroScope::new(3)).unwrap();
    let in_app = add_macro_scope(&from_lib, "App", MacroScope::new(7)).unwrap();
    assert_eq!(in_app, "x._@.Lib.3.App._hyg.7");
    let again = add_macro_scope(&in_app, "App", MacroScope::new(9)).unwrap();
    assert_eq!(again, "x._@.Lib.3.App._hyg.7.9");
}

// =============================
// Expander behaviour
// =============================

#[test]
fn expanding_a_stuck_tree_returns_it_unchanged() {
    let session = lxor_session();
    let once = session.expand(&lxor(ident("a"), ident("b"))).unwrap();
    let allocated = session.allocator().allocated();
    let twice = session.expand(&once).unwrap();
    assert!(twice.ptr_eq(&once));
    assert_eq!(session.allocator().allocated(), allocated);
}

#[test]
fn error_position_follows_with_ref() {
    let mut session = Session::default();
    session.register(
        "check",
        FnMacro::new("check", |tree: &SyntaxTree, cx: &mut MacroContext<'_>| {
            let arg = tree.value.children()[1].clone();
            cx.with_ref(&arg, |cx| Err(cx.error("expected a number")))
        }),
    );
    let input = spanned(
        node("check", vec![spanned(atom("1"), 6, 7), spanned(ident("y"), 8, 9)]),
        0,
        10,
    );
    let err = session.expand(&input).unwrap_err();
    assert_eq!(err.span(), Some(Span::new(8, 9)));
}

#[test]
fn error_without_with_ref_points_at_the_invocation() {
    let mut session = Session::default();
    session.register(
        "check",
        FnMacro::new("check", |_: &SyntaxTree, cx: &mut MacroContext<'_>| Err(cx.error("no"))),
    );
    let input = node("wrap", vec![spanned(node("check", vec![]), 3, 12)]);
    let err = session.expand(&input).unwrap_err();
    assert_eq!(err.span(), Some(Span::new(3, 12)));
}

#[test]
fn handler_error_stops_the_search_for_that_node() {
    let fallback_called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&fallback_called);
    let mut session = Session::default();
    session.register(
        "k",
        FnMacro::new("fallback", move |_: &SyntaxTree, _: &mut MacroContext<'_>| {
            flag.store(true, Ordering::SeqCst);
            Ok(Expansion::Rewritten(atom("ok")))
        }),
    );
    session.register(
        "k",
        FnMacro::new("strict", |_: &SyntaxTree, cx: &mut MacroContext<'_>| {
            Err(cx.error("strict rejects this"))
        }),
    );
    let err = session.expand(&node("k", vec![])).unwrap_err();
    assert!(err.message().contains("strict rejects this"));
    assert!(!fallback_called.load(Ordering::SeqCst));
}

#[test]
fn runaway_expansion_is_a_recursion_error() {
    let mut session = Session::new(ExpanderConfig {
        max_depth: 10,
        ..ExpanderConfig::default()
    });
    session.register(
        "again",
        FnMacro::new("again", |tree: &SyntaxTree, _: &mut MacroContext<'_>| {
            Ok(Expansion::Rewritten(tree.clone()))
        }),
    );
    let err = session.expand(&node("again", vec![])).unwrap_err();
    assert!(err.is_recursion_limit());
    assert!(err.to_string().contains("(10)"));
}

#[test]
fn module_name_comes_from_the_config() {
    let mut session = Session::new(ExpanderConfig {
        main_module: "Demo".to_string(),
        ..ExpanderConfig::default()
    });
    session.register("const", const_rule());
    let out = session.expand(&node("const", vec![atom("0")])).unwrap();
    assert_eq!(out.idents(), vec!["x._@.Demo._hyg.1"]);
}

// =============================
// Concurrency
// =============================

#[test]
fn parallel_expansions_never_share_scopes() {
    let allocator = Arc::new(ScopeAllocator::new());
    let mut session = Session::with_allocator(ExpanderConfig::default(), Arc::clone(&allocator));
    session.register("const", const_rule());
    let trees: Vec<_> = (0..64).map(|i| node("const", vec![atom(i.to_string())])).collect();

    let results = session.expand_all(&trees);
    let mut seen = HashSet::new();
    for (i, result) in results.into_iter().enumerate() {
        let out = result.unwrap();
        let Syntax::Node(_, children) = &*out.value else {
            panic!("expected a node");
        };
        assert_eq!(children[2].value.as_atom(), Some(i.to_string().as_str()));
        assert!(seen.insert(children[0].value.as_ident().unwrap().to_string()));
    }
    assert_eq!(allocator.allocated(), 64);
}
