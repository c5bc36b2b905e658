use std::{fs, path::Path, sync::Arc};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    ast::{SyntaxKind, SyntaxTree},
    macros::{
        loader, Expander, ExpansionStep, HandlerRef, MacroHandler, MacroRegistry, ScopeAllocator,
        MAX_MACRO_RECURSION_DEPTH,
    },
    ErrorContext, MacroError,
};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Settings for a [`Session`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpanderConfig {
    /// Module that owns scopes allocated by this session.
    pub main_module: String,
    /// Rewrites allowed along one chain before giving up.
    pub max_depth: usize,
    /// Record every rewrite.
    pub trace: bool,
}

impl Default for ExpanderConfig {
    fn default() -> Self {
        Self {
            main_module: "Main".to_string(),
            max_depth: MAX_MACRO_RECURSION_DEPTH,
            trace: false,
        }
    }
}

impl ExpanderConfig {
    /// Reads a config from a JSON file; missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, MacroError> {
        let text = fs::read_to_string(path).map_err(|e| MacroError::Load {
            message: format!("cannot read config {}: {}", path.display(), e),
            ctx: ErrorContext::none(),
            source: Some(Box::new(e)),
        })?;
        serde_json::from_str(&text).map_err(|e| MacroError::Load {
            message: format!("invalid config {}: {}", path.display(), e),
            ctx: ErrorContext::none(),
            source: Some(Box::new(e)),
        })
    }
}

// ============================================================================
// SESSION - Registry, allocator and configuration for a run of expansions
// ============================================================================

/// Owns everything an expansion needs that outlives a single tree.
///
/// Each call to [`Session::expand`] builds a fresh [`Expander`], so scope and
/// reference stacks are never shared between trees. Only the allocator is
/// shared, which keeps scopes unique across every tree a session expands.
#[derive(Debug)]
pub struct Session {
    config: ExpanderConfig,
    registry: MacroRegistry,
    allocator: Arc<ScopeAllocator>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(ExpanderConfig::default())
    }
}

impl Session {
    /// A session with an empty registry and a fresh allocator.
    pub fn new(config: ExpanderConfig) -> Self {
        Self::with_allocator(config, Arc::new(ScopeAllocator::new()))
    }

    /// A session drawing scopes from a shared allocator.
    pub fn with_allocator(config: ExpanderConfig, allocator: Arc<ScopeAllocator>) -> Self {
        Self {
            config,
            registry: MacroRegistry::new(),
            allocator,
        }
    }

    pub fn config(&self) -> &ExpanderConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ExpanderConfig {
        &mut self.config
    }

    pub fn registry(&self) -> &MacroRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut MacroRegistry {
        &mut self.registry
    }

    pub fn allocator(&self) -> &Arc<ScopeAllocator> {
        &self.allocator
    }

    /// Registers a handler with the highest priority for `kind`.
    pub fn register<H>(&mut self, kind: impl Into<SyntaxKind>, handler: H)
    where
        H: MacroHandler + 'static,
    {
        self.registry.register(kind, handler);
    }

    pub fn register_shared(&mut self, kind: impl Into<SyntaxKind>, handler: HandlerRef) {
        self.registry.register_shared(kind, handler);
    }

    /// Loads rule files or directories and registers their macros in order.
    ///
    /// Returns the number of macros registered.
    pub fn load_rules<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<usize, MacroError> {
        let macros = loader::load_macros(paths)?;
        let count = macros.len();
        loader::register_all(&mut self.registry, macros);
        Ok(count)
    }

    /// An expander configured from this session.
    pub fn expander(&self) -> Expander<'_> {
        let expander = Expander::new(&self.registry, &self.allocator, &self.config.main_module)
            .with_max_depth(self.config.max_depth);
        if self.config.trace {
            expander.with_trace()
        } else {
            expander
        }
    }

    /// Expands one tree completely.
    pub fn expand(&self, tree: &SyntaxTree) -> Result<SyntaxTree, MacroError> {
        self.expander().expand(tree)
    }

    /// Expands one tree, also returning every rewrite performed.
    pub fn expand_with_trace(
        &self,
        tree: &SyntaxTree,
    ) -> Result<(SyntaxTree, Vec<ExpansionStep>), MacroError> {
        let mut expander = self.expander().with_trace();
        let expanded = expander.expand(tree)?;
        Ok((expanded, expander.take_trace()))
    }

    /// Expands independent trees in parallel, preserving order.
    pub fn expand_all(&self, trees: &[SyntaxTree]) -> Vec<Result<SyntaxTree, MacroError>> {
        tracing::debug!(count = trees.len(), "expanding trees in parallel");
        trees.par_iter().map(|tree| self.expand(tree)).collect()
    }
}
