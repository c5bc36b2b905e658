//! The hygiene Command-Line Interface.
//!
//! This module is the main entry point for all CLI commands and orchestrates
//! the core library functions.

use std::{fs, path::Path, process, sync::Once};

use clap::Parser;

use crate::cli::args::{Command, ExpandArgs, HygieneArgs};
use crate::diagnostics::{to_error_source, SourceArc};
use crate::engine::{ExpanderConfig, Session};
use crate::macros::{loader, names, MacroHandler};
use crate::{ErrorContext, MacroError};

pub mod args;
pub mod output;

static TRACING_INIT: Once = Once::new();

/// Installs a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Does nothing when `RUST_LOG` is unset. Safe to call more than once.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}

/// The main entry point for the CLI.
pub fn run() {
    init_tracing();
    let args = HygieneArgs::parse();

    let result = match args.command {
        Command::Expand(args) => handle_expand(&args, false),
        Command::Trace(args) => handle_expand(&args, true),
        Command::Decode { name } => handle_decode(&name),
        Command::Check { rules } => handle_check(&rules),
    };

    if let Err(e) = result {
        output::print_error(e);
        process::exit(1);
    }
}

// ============================================================================
// COMMAND HANDLERS
// ============================================================================

/// Handles the `expand` and `trace` subcommands.
fn handle_expand(args: &ExpandArgs, trace: bool) -> Result<(), MacroError> {
    let mut session = Session::new(build_config(args)?);
    session.load_rules(&args.rules)?;
    let trees = loader::load_trees_from_file(&args.input)?;
    let source = args.source.as_deref().map(read_source).transpose()?;
    let attach = |e: MacroError| match &source {
        Some(src) => e.with_source(src.clone()),
        None => e,
    };

    if trace {
        for tree in &trees {
            let (expanded, steps) = session.expand_with_trace(tree).map_err(attach)?;
            output::print_trace(&steps, args.erase);
            output::print_trees(std::slice::from_ref(&expanded), args.erase);
        }
        return Ok(());
    }

    for result in session.expand_all(&trees) {
        let expanded = result.map_err(attach)?;
        output::print_trees(std::slice::from_ref(&expanded), args.erase);
    }
    Ok(())
}

/// Handles the `decode` subcommand.
fn handle_decode(name: &str) -> Result<(), MacroError> {
    let decoded = names::decode(name)?;
    output::print_scoped_name(&decoded);
    Ok(())
}

/// Handles the `check` subcommand.
fn handle_check<P: AsRef<Path>>(rules: &[P]) -> Result<(), MacroError> {
    let macros = loader::load_macros(rules)?;
    for rule_macro in &macros {
        println!(
            "{} ({}): {} rule(s)",
            rule_macro.name(),
            rule_macro.kind(),
            rule_macro.rules().len()
        );
    }
    println!("ok: {} macro(s)", macros.len());
    Ok(())
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn build_config(args: &ExpandArgs) -> Result<ExpanderConfig, MacroError> {
    let mut config = match &args.config {
        Some(path) => ExpanderConfig::from_file(path)?,
        None => ExpanderConfig::default(),
    };
    if let Some(module) = &args.module {
        config.main_module = module.clone();
    }
    if let Some(max_depth) = args.max_depth {
        config.max_depth = max_depth;
    }
    Ok(config)
}

fn read_source(path: &Path) -> Result<SourceArc, MacroError> {
    let text = fs::read_to_string(path).map_err(|e| MacroError::Load {
        message: format!("cannot read {}: {}", path.display(), e),
        ctx: ErrorContext::none(),
        source: Some(Box::new(e)),
    })?;
    Ok(to_error_source(path.display().to_string(), text))
}
