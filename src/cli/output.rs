//! Handles all user-facing output for the CLI.
//!
//! This module is responsible for pretty-printing, colorizing output and
//! rendering errors. By centralizing output logic here, we ensure a
//! consistent user experience across all commands.

use difference::{Changeset, Difference};
use miette::Report;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::ast::SyntaxTree;
use crate::macros::{ExpansionStep, ScopedName};
use crate::MacroError;

// ============================================================================
// CORE OUTPUT FUNCTIONS: User-facing CLI output utilities
// ============================================================================

/// Prints expanded trees, one per line.
pub fn print_trees(trees: &[SyntaxTree], erase: bool) {
    for tree in trees {
        println!("{}", render(tree, erase));
    }
}

/// Prints an expansion trace to the console with colored diffs.
///
/// The first step prints its input and output in full; later steps print a
/// diff against the previous output.
pub fn print_trace(trace: &[ExpansionStep], erase: bool) {
    let mut stdout = StandardStream::stdout(color_choice());
    let mut last = String::new();

    for (i, step) in trace.iter().enumerate() {
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true));
        println!("--- Step {}: {} on `{}` [scope {}] ---", i, step.handler, step.kind, step.scope);
        let _ = stdout.reset();

        let input = render(&step.input, erase);
        let output = render(&step.output, erase);
        if i == 0 {
            println!("{}", input);
            println!("=> {}", output);
        } else {
            let changeset = Changeset::new(&last, &output, " ");
            print_diff(&mut stdout, &changeset.diffs);
        }
        last = output;
        println!();
    }
}

/// Prints the parts of a decoded hygienic name.
pub fn print_scoped_name(name: &ScopedName) {
    let mut stdout = StandardStream::stdout(color_choice());
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
    println!("{}", name);
    let _ = stdout.reset();
    println!("base:   {}", name.base);
    for segment in &name.imported {
        println!("import: {} {}", segment.module, join(&segment.scopes));
    }
    println!("module: {} {}", name.main_module, join(&name.scopes));
}

/// Renders an error with miette to stderr.
pub fn print_error(error: MacroError) {
    let report = Report::new(error);
    eprintln!("{report:?}");
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn render(tree: &SyntaxTree, erase: bool) -> String {
    if erase {
        tree.value.pretty_erased()
    } else {
        tree.value.pretty()
    }
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(" ")
}

fn color_choice() -> ColorChoice {
    if atty::is(atty::Stream::Stdout) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

fn print_diff(stdout: &mut StandardStream, diffs: &[Difference]) {
    for diff in diffs {
        match diff {
            Difference::Same(ref x) => {
                let _ = stdout.reset();
                println!(" {}", x);
            }
            Difference::Add(ref x) => {
                let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
                println!("+{}", x);
            }
            Difference::Rem(ref x) => {
                let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
                println!("-{}", x);
            }
        }
    }
    let _ = stdout.reset();
}
