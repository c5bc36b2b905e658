//!
//! Loads rule macros and input trees from JSON files, with validation and
//! duplicate checking.
//!
//! A rule-set file looks like:
//!
//! ```json
//! {"macros": [{"name": "swap", "kind": "swap", "rules": [
//!     {"pattern": <tree>, "template": <tree>},
//!     {"pattern": <tree>, "error": "message"}
//! ]}]}
//! ```
//!
//! Trees use the serde form of [`SyntaxTree`]. An input file holds either one
//! tree or an array of trees.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::ast::{Span, SyntaxKind, SyntaxTree};
use crate::diagnostics::to_error_source;
use crate::macros::registry::MacroRegistry;
use crate::macros::rules::{Rule, RuleMacro};
use crate::macros::types::MacroHandler;
use crate::{err_msg, ErrorContext, MacroError};

/// One macro as written in a rule-set file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroDef {
    pub name: String,
    pub kind: SyntaxKind,
    pub rules: Vec<Rule>,
}

/// The top-level shape of a rule-set file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MacroSet {
    #[serde(default)]
    pub macros: Vec<MacroDef>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TreeInput {
    Many(Vec<SyntaxTree>),
    One(SyntaxTree),
}

// =============================
// Public API for macro loading
// =============================

/// Parses and validates rule macros from JSON source.
///
/// `origin` names the source in error reports.
pub fn parse_macros_from_source(source: &str, origin: &str) -> Result<Vec<RuleMacro>, MacroError> {
    let set: MacroSet = serde_json::from_str(source).map_err(|e| json_error(origin, source, e))?;
    let mut names_seen = HashSet::new();
    let mut macros = Vec::with_capacity(set.macros.len());
    for def in set.macros {
        if !names_seen.insert(def.name.clone()) {
            return Err(err_msg!(Load, "duplicate macro name `{}` in {}", def.name, origin));
        }
        let rule_macro = RuleMacro::new(def.name, def.kind, def.rules)
            .map_err(|e| e.with_source(to_error_source(origin, source)))?;
        macros.push(rule_macro);
    }
    Ok(macros)
}

/// Loads rule macros from a file.
pub fn load_macros_from_file<P: AsRef<Path>>(path: P) -> Result<Vec<RuleMacro>, MacroError> {
    let path = path.as_ref();
    let source = read_source(path)?;
    parse_macros_from_source(&source, &path.display().to_string())
}

/// Loads rule macros from files and directories.
///
/// Directories are searched recursively for `*.json` files. Names must be
/// unique across everything loaded.
pub fn load_macros<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<RuleMacro>, MacroError> {
    let mut macros = Vec::new();
    let mut names_seen = HashSet::new();
    for root in paths {
        for file in discover_rule_files(root)? {
            for rule_macro in load_macros_from_file(&file)? {
                if !names_seen.insert(rule_macro.name().to_string()) {
                    return Err(err_msg!(
                        Load,
                        "duplicate macro name `{}` in {}",
                        rule_macro.name(),
                        file.display()
                    ));
                }
                macros.push(rule_macro);
            }
        }
    }
    tracing::debug!(count = macros.len(), "loaded rule macros");
    Ok(macros)
}

/// Registers every macro for its kind, in load order.
pub fn register_all(registry: &mut MacroRegistry, macros: Vec<RuleMacro>) {
    for rule_macro in macros {
        let kind = rule_macro.kind().clone();
        registry.register(kind, rule_macro);
    }
}

/// Lists the rule files under `root`, sorted for deterministic load order.
///
/// A plain file is returned as is, whatever its extension.
pub fn discover_rule_files<P: AsRef<Path>>(root: P) -> Result<Vec<PathBuf>, MacroError> {
    let root = root.as_ref();
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| err_msg!(Load, "failed to walk {}: {}", root.display(), e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        files.push(path.to_path_buf());
    }
    files.sort();
    Ok(files)
}

// =============================
// Trees
// =============================

/// Parses one tree or an array of trees.
pub fn parse_trees_from_source(source: &str, origin: &str) -> Result<Vec<SyntaxTree>, MacroError> {
    match serde_json::from_str(source).map_err(|e| json_error(origin, source, e))? {
        TreeInput::Many(trees) => Ok(trees),
        TreeInput::One(tree) => Ok(vec![tree]),
    }
}

pub fn load_trees_from_file<P: AsRef<Path>>(path: P) -> Result<Vec<SyntaxTree>, MacroError> {
    let path = path.as_ref();
    let source = read_source(path)?;
    parse_trees_from_source(&source, &path.display().to_string())
}

// =============================
// Internal helpers
// =============================

fn read_source(path: &Path) -> Result<String, MacroError> {
    fs::read_to_string(path).map_err(|e| MacroError::Load {
        message: format!("cannot read {}: {}", path.display(), e),
        ctx: ErrorContext::none(),
        source: Some(Box::new(e)),
    })
}

fn json_error(origin: &str, source: &str, error: serde_json::Error) -> MacroError {
    let offset = line_col_to_offset(source, error.line(), error.column());
    MacroError::Load {
        message: format!("invalid JSON in {}: {}", origin, error),
        ctx: ErrorContext::with_span(offset.map(|at| Span::new(at, at))),
        source: Some(Box::new(error)),
    }
    .with_source(to_error_source(origin, source))
}

// serde_json reports 1-based lines and columns; 0 means unknown.
fn line_col_to_offset(source: &str, line: usize, column: usize) -> Option<usize> {
    if line == 0 {
        return None;
    }
    let line_start: usize = source
        .split_inclusive('\n')
        .take(line - 1)
        .map(str::len)
        .sum();
    Some((line_start + column.saturating_sub(1)).min(source.len()))
}
