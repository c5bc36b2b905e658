//! Defines the command-line arguments and subcommands for the hygiene CLI.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "hygiene",
    version,
    about = "A hygienic syntax-macro expander."
)]
pub struct HygieneArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the fully expanded trees.
    Expand(ExpandArgs),
    /// Show a stepwise expansion trace with diffs.
    Trace(ExpandArgs),
    /// Show the scopes encoded in a hygienic name.
    Decode {
        /// The encoded identifier, e.g. `x._@.Main._hyg.3`.
        #[arg(required = true)]
        name: String,
    },
    /// Validate rule files without expanding anything.
    Check {
        /// Rule files or directories of `*.json` rule files.
        #[arg(required = true)]
        rules: Vec<PathBuf>,
    },
}

/// Options shared by `expand` and `trace`.
#[derive(Debug, Args)]
pub struct ExpandArgs {
    /// JSON file holding one tree or an array of trees.
    #[arg(required = true)]
    pub input: PathBuf,
    /// Rule file or directory; may be given several times.
    #[arg(short, long = "rules")]
    pub rules: Vec<PathBuf>,
    /// JSON file with expander settings.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Module that owns the scopes of this run.
    #[arg(long)]
    pub module: Option<String>,
    /// Rewrites allowed along one chain.
    #[arg(long)]
    pub max_depth: Option<usize>,
    /// Print hygienic names with their scopes erased.
    #[arg(long)]
    pub erase: bool,
    /// Source text the tree spans refer to, for error reports.
    #[arg(long)]
    pub source: Option<PathBuf>,
}
