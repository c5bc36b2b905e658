//!
//! Declarative macros: an ordered list of pattern/template rules for one kind.
//!
//! A [`RuleMacro`] tries its rules in order. The first rule whose pattern
//! matches the input decides the outcome: a `Template` action is instantiated
//! hygienically with the match bindings, an `Error` action aborts expansion at
//! the input's position. If no rule matches, the macro declines so that
//! lower-priority handlers for the same kind get a chance.
//!
//! Rules are validated once, at construction, so a registered rule macro can
//! only fail at expansion time through an explicit `Error` action.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ast::{Syntax, SyntaxKind, SyntaxTree};
use crate::{err_ctx, err_msg};
use crate::macros::context::MacroContext;
use crate::macros::quote::{holes, match_template, HoleForm};
use crate::macros::types::{Expansion, MacroHandler, MatchResult};
use crate::MacroError;

/// What a rule does once its pattern matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    /// Instantiate this template.
    Template(SyntaxTree),
    /// Report this message as a fatal error.
    Error(String),
}

/// A single pattern/action pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub pattern: SyntaxTree,
    #[serde(flatten)]
    pub action: RuleAction,
}

impl Rule {
    pub fn template(pattern: SyntaxTree, template: SyntaxTree) -> Self {
        Self {
            pattern,
            action: RuleAction::Template(template),
        }
    }

    pub fn error(pattern: SyntaxTree, message: impl Into<String>) -> Self {
        Self {
            pattern,
            action: RuleAction::Error(message.into()),
        }
    }
}

/// A validated rule-based macro.
#[derive(Debug, Clone)]
pub struct RuleMacro {
    name: String,
    kind: SyntaxKind,
    rules: Vec<Rule>,
}

impl RuleMacro {
    /// Builds a rule macro, checking every rule.
    ///
    /// # Errors
    /// Returns `MacroError::Template` when
    /// - there are no rules,
    /// - a pattern is not a node of `kind`,
    /// - a template uses a variable the pattern does not bind, or uses it
    ///   with a different form (single vs. splice),
    /// - a pattern binds one variable with both forms,
    /// - a child list in a pattern or template holds more than one splice.
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<SyntaxKind>,
        rules: Vec<Rule>,
    ) -> Result<Self, MacroError> {
        let name = name.into();
        let kind = kind.into();
        if rules.is_empty() {
            return Err(err_msg!(Template, "macro `{}` has no rules", name));
        }
        for (index, rule) in rules.iter().enumerate() {
            check_rule(&name, &kind, index, rule)?;
        }
        Ok(Self { name, kind, rules })
    }

    pub fn kind(&self) -> &SyntaxKind {
        &self.kind
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

impl MacroHandler for RuleMacro {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_expand(&self, tree: &SyntaxTree, cx: &mut MacroContext<'_>) -> MatchResult {
        for rule in &self.rules {
            let Some(bindings) = match_template(&rule.pattern, tree) else {
                continue;
            };
            return match &rule.action {
                RuleAction::Template(template) => cx.quote(template, &bindings).map(Expansion::Rewritten),
                RuleAction::Error(message) => Err(cx.error(message.clone())),
            };
        }
        Ok(Expansion::Unsupported)
    }
}

fn check_rule(name: &str, kind: &SyntaxKind, index: usize, rule: &Rule) -> Result<(), MacroError> {
    let pattern_kind = rule.pattern.kind();
    if &pattern_kind != kind {
        return Err(err_ctx!(
            Template,
            span = rule.pattern.span,
            "rule {} of `{}` matches `{}` but the macro expands `{}`",
            index,
            name,
            pattern_kind,
            kind
        ));
    }

    check_splices(name, index, &rule.pattern)?;
    if let RuleAction::Template(template) = &rule.action {
        check_splices(name, index, template)?;
    }

    let mut bound: HashMap<&str, HoleForm> = HashMap::new();
    for (hole, form) in holes(&rule.pattern) {
        if let Some(previous) = bound.insert(hole.var.as_str(), form) {
            if previous != form {
                return Err(err_ctx!(
                    Template,
                    span = rule.pattern.span,
                    "rule {} of `{}` binds `${}` both as a single subtree and as a splice",
                    index,
                    name,
                    hole.var
                ));
            }
        }
    }

    let RuleAction::Template(template) = &rule.action else {
        return Ok(());
    };
    for (hole, form) in holes(template) {
        match bound.get(hole.var.as_str()) {
            None => {
                return Err(err_ctx!(
                    Template,
                    span = template.span,
                    "rule {} of `{}` uses `${}` which its pattern does not bind",
                    index,
                    name,
                    hole.var
                ))
            }
            Some(expected) if *expected != form => {
                return Err(err_ctx!(
                    Template,
                    span = template.span,
                    "rule {} of `{}` uses `${}` as a {} but its pattern binds a {}",
                    index,
                    name,
                    hole.var,
                    describe(form),
                    describe(*expected)
                ))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Rejects any child list with more than one splice.
fn check_splices(name: &str, index: usize, tree: &SyntaxTree) -> Result<(), MacroError> {
    let Syntax::Node(kind, children) = &*tree.value else {
        return Ok(());
    };
    let splices = children
        .iter()
        .filter(|c| matches!(&*c.value, Syntax::Splice(_)))
        .count();
    if splices > 1 {
        return Err(err_ctx!(
            Template,
            span = tree.span,
            "rule {} of `{}` has {} splices under `{}`; at most one is allowed",
            index,
            name,
            splices,
            kind
        ));
    }
    children.iter().try_for_each(|c| check_splices(name, index, c))
}

fn describe(form: HoleForm) -> &'static str {
    match form {
        HoleForm::Single => "single subtree",
        HoleForm::Sequence => "splice",
    }
}
