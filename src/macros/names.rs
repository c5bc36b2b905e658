//! Hygienic name mangling.
//!
//! A hygienic identifier is a plain string so it can live in an ordinary
//! `Syntax::Ident`. Its encoded form is
//!
//! ```text
//! base ._@. (module . scopes)* main_module ._hyg. scopes
//! ```
//!
//! e.g. `x._@.Lib.3.App._hyg.7.9`: base `x`, introduced in `Lib` under scope 3,
//! then re-stamped while `App` expanded it under scopes 7 and 9. The rightmost
//! module is always the one performing the current expansion. Module names may
//! themselves be dotted (`Std.Data`); numeric components are scopes.
//!
//! ## Error Handling
//!
//! Invalid inputs to [`encode`] and non-hygienic inputs to [`decode`] are
//! reported as `MacroError::Name`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::err_msg;
use crate::macros::scope::MacroScope;
use crate::MacroError;

/// Separates the base name from the scope information.
pub const SEPARATOR: &str = "._@.";
/// Precedes the final (current module) scope list.
pub const SUFFIX_MARKER: &str = "._hyg.";

const MARKER_COMPONENT: &str = "_hyg";
const SEPARATOR_COMPONENT: &str = "_@";

/// Scopes recorded for a module other than the current one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeSegment {
    pub module: String,
    pub scopes: Vec<MacroScope>,
}

impl ScopeSegment {
    pub fn new(module: impl Into<String>, scopes: Vec<MacroScope>) -> Self {
        Self {
            module: module.into(),
            scopes,
        }
    }
}

/// The decoded view of a hygienic identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopedName {
    pub base: String,
    pub imported: Vec<ScopeSegment>,
    pub main_module: String,
    pub scopes: Vec<MacroScope>,
}

impl ScopedName {
    /// Encodes this view; see [`encode`].
    pub fn encode(&self) -> Result<String, MacroError> {
        encode(&self.base, &self.main_module, &self.imported, &self.scopes)
    }
}

impl fmt::Display for ScopedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)?;
        for seg in &self.imported {
            write!(f, " [{}: {}]", seg.module, join_scopes(&seg.scopes, ", "))?;
        }
        write!(f, " [{}: {}]", self.main_module, join_scopes(&self.scopes, ", "))
    }
}

// =============================
// Public API
// =============================

/// Encodes `base` with its provenance segments and the current module's scopes.
///
/// # Examples
///
/// ```rust
/// use hygiene::macros::names::{decode, encode, ScopeSegment};
/// use hygiene::macros::MacroScope;
/// let lib = ScopeSegment::new("Lib", vec![MacroScope::new(3)]);
/// let name = encode("x", "App", &[lib], &[MacroScope::new(7)]).unwrap();
/// assert_eq!(name, "x._@.Lib.3.App._hyg.7");
/// assert_eq!(decode(&name).unwrap().base, "x");
/// ```
pub fn encode(
    base: &str,
    main_module: &str,
    imported: &[ScopeSegment],
    scopes: &[MacroScope],
) -> Result<String, MacroError> {
    validate_base(base)?;
    validate_module(main_module)?;
    if scopes.is_empty() {
        return Err(err_msg!(
            Name,
            "cannot encode `{}` without at least one macro scope",
            base
        ));
    }

    let mut out = String::with_capacity(base.len() + main_module.len() + 16);
    out.push_str(base);
    out.push_str(SEPARATOR);
    for seg in imported {
        validate_module(&seg.module)?;
        if seg.scopes.is_empty() {
            return Err(err_msg!(
                Name,
                "imported segment for module `{}` has no scopes",
                seg.module
            ));
        }
        out.push_str(&seg.module);
        out.push('.');
        out.push_str(&join_scopes(&seg.scopes, "."));
        out.push('.');
    }
    out.push_str(main_module);
    out.push_str(SUFFIX_MARKER);
    out.push_str(&join_scopes(scopes, "."));
    Ok(out)
}

/// Returns true if `name` carries macro scopes.
///
/// Walks back over the trailing scope list and checks for the marker before
/// it, so the cost grows with the number of final scopes. The base name and
/// module path are never scanned.
pub fn has_macro_scopes(name: &str) -> bool {
    let bytes = name.as_bytes();
    // at least one scope digit must follow the marker
    if !bytes.last().is_some_and(u8::is_ascii_digit) {
        return false;
    }
    let mut end = bytes.len();
    while end > 0 && (bytes[end - 1].is_ascii_digit() || bytes[end - 1] == b'.') {
        end -= 1;
    }
    let marker = &SUFFIX_MARKER[..SUFFIX_MARKER.len() - 1];
    end < bytes.len() && name[..end].ends_with(marker) && bytes[end] == b'.'
}

/// Decodes a name produced by [`encode`].
pub fn decode(name: &str) -> Result<ScopedName, MacroError> {
    if !has_macro_scopes(name) {
        return Err(err_msg!(Name, "`{}` is not a hygienic name", name));
    }
    let (base, rest) = name
        .split_once(SEPARATOR)
        .ok_or_else(|| err_msg!(Name, "`{}` is missing the `{}` separator", name, SEPARATOR))?;
    let (path, final_scopes) = rest
        .rsplit_once(SUFFIX_MARKER)
        .ok_or_else(|| err_msg!(Name, "`{}` is missing the `{}` marker", name, SUFFIX_MARKER))?;

    let scopes = parse_scopes(final_scopes, name)?;
    let (imported, main_module) = parse_path(path, name)?;

    Ok(ScopedName {
        base: base.to_string(),
        imported,
        main_module,
        scopes,
    })
}

/// Adds `scope` to `name` on behalf of `main_module`.
///
/// If `name` already has scopes from `main_module`, the scope is appended.
/// Scopes from a different module are moved into an imported segment so the
/// two modules' numbering can never be confused.
pub fn add_macro_scope(
    name: &str,
    main_module: &str,
    scope: MacroScope,
) -> Result<String, MacroError> {
    if !has_macro_scopes(name) {
        return encode(name, main_module, &[], &[scope]);
    }
    let mut view = decode(name)?;
    if view.main_module == main_module {
        view.scopes.push(scope);
    } else {
        let previous = ScopeSegment {
            module: std::mem::replace(&mut view.main_module, main_module.to_string()),
            scopes: std::mem::replace(&mut view.scopes, vec![scope]),
        };
        view.imported.push(previous);
    }
    view.encode()
}

/// Returns the base name with all macro scopes removed.
pub fn erase_macro_scopes(name: &str) -> &str {
    if !has_macro_scopes(name) {
        return name;
    }
    match name.split_once(SEPARATOR) {
        Some((base, _)) => base,
        None => name,
    }
}

// =============================
// Internal helpers
// =============================

fn join_scopes(scopes: &[MacroScope], sep: &str) -> String {
    scopes
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

fn validate_base(base: &str) -> Result<(), MacroError> {
    if base.is_empty() {
        return Err(err_msg!(Name, "base name must not be empty"));
    }
    if base.contains(&SEPARATOR[..SEPARATOR.len() - 1])
        || base.contains(&SUFFIX_MARKER[..SUFFIX_MARKER.len() - 1])
    {
        return Err(err_msg!(
            Name,
            "base name `{}` contains a reserved hygiene delimiter",
            base
        ));
    }
    Ok(())
}

fn validate_module(module: &str) -> Result<(), MacroError> {
    if module.is_empty() {
        return Err(err_msg!(Name, "module name must not be empty"));
    }
    for component in module.split('.') {
        if component.is_empty()
            || is_scope_component(component)
            || component == MARKER_COMPONENT
            || component == SEPARATOR_COMPONENT
        {
            return Err(err_msg!(
                Name,
                "module name `{}` has invalid component `{}`",
                module,
                component
            ));
        }
    }
    Ok(())
}

fn parse_scopes(text: &str, name: &str) -> Result<Vec<MacroScope>, MacroError> {
    text.split('.')
        .map(|part| {
            if !is_scope_component(part) {
                return Err(err_msg!(Name, "`{}` has malformed scope `{}`", name, part));
            }
            part.parse::<u64>()
                .map(MacroScope::new)
                .map_err(|_| err_msg!(Name, "`{}` has out-of-range scope `{}`", name, part))
        })
        .collect()
}

fn is_scope_component(component: &str) -> bool {
    !component.is_empty() && component.bytes().all(|b| b.is_ascii_digit())
}

// Module components accumulate until a run of numeric components closes the
// segment; whatever remains at the end is the main module.
fn parse_path(path: &str, name: &str) -> Result<(Vec<ScopeSegment>, String), MacroError> {
    let mut imported = Vec::new();
    let mut module: Vec<&str> = Vec::new();
    let mut scopes: Vec<MacroScope> = Vec::new();

    for component in path.split('.') {
        if is_scope_component(component) {
            if module.is_empty() {
                return Err(err_msg!(Name, "`{}` has a scope without a module", name));
            }
            scopes.extend(parse_scopes(component, name)?);
            continue;
        }
        if !scopes.is_empty() {
            let segment_module = module.join(".");
            validate_module(&segment_module)?;
            imported.push(ScopeSegment {
                module: segment_module,
                scopes: std::mem::take(&mut scopes),
            });
            module.clear();
        }
        module.push(component);
    }

    if !scopes.is_empty() || module.is_empty() {
        return Err(err_msg!(Name, "`{}` has no main module", name));
    }
    let main_module = module.join(".");
    validate_module(&main_module)?;
    Ok((imported, main_module))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(n: u64) -> MacroScope {
        MacroScope::new(n)
    }

    #[test]
    fn encode_simple_name() {
        let name = encode("x", "Main", &[], &[s(1)]).unwrap();
        assert_eq!(name, "x._@.Main._hyg.1");
        assert!(has_macro_scopes(&name));
    }

    #[test]
    fn round_trips_dotted_bases_and_modules() {
        let imported = vec![
            ScopeSegment::new("Std.Data", vec![s(4), s(5)]),
            ScopeSegment::new("Lib", vec![s(2)]),
        ];
        let view = ScopedName {
            base: "List.map".to_string(),
            imported,
            main_module: "App.Main".to_string(),
            scopes: vec![s(10), s(11)],
        };
        let encoded = view.encode().unwrap();
        assert_eq!(encoded, "List.map._@.Std.Data.4.5.Lib.2.App.Main._hyg.10.11");
        assert_eq!(decode(&encoded).unwrap(), view);
    }

    #[test]
    fn plain_names_have_no_scopes() {
        for name in ["x", "v.1", "a._hyg", "foo.bar", ""] {
            assert!(!has_macro_scopes(name), "{name}");
            assert!(decode(name).is_err());
        }
    }

    #[test]
    fn marker_check_looks_only_at_the_tail() {
        let long = format!("{}._@.Main._hyg.1.2.3", "y".repeat(10_000));
        assert!(has_macro_scopes(&long));
        assert!(!has_macro_scopes("x._@.Main._hyg.1.y"));
        assert!(!has_macro_scopes("x._@.Main._hyg."));
    }

    #[test]
    fn add_scope_appends_within_same_module() {
        let once = add_macro_scope("x", "Main", s(1)).unwrap();
        let twice = add_macro_scope(&once, "Main", s(2)).unwrap();
        assert_eq!(twice, "x._@.Main._hyg.1.2");
    }

    #[test]
    fn add_scope_across_modules_moves_old_scopes_to_imported() {
        let lib = add_macro_scope("x", "Lib", s(3)).unwrap();
        let app = add_macro_scope(&lib, "App", s(9)).unwrap();
        assert_eq!(app, "x._@.Lib.3.App._hyg.9");
        let view = decode(&app).unwrap();
        assert_eq!(view.imported, vec![ScopeSegment::new("Lib", vec![s(3)])]);
        assert_eq!(view.main_module, "App");
        assert_eq!(view.scopes, vec![s(9)]);
    }

    #[test]
    fn erase_returns_base() {
        assert_eq!(erase_macro_scopes("x._@.Main._hyg.1"), "x");
        assert_eq!(erase_macro_scopes("x"), "x");
    }

    #[test]
    fn rejects_invalid_inputs() {
        assert!(encode("", "Main", &[], &[s(1)]).is_err());
        assert!(encode("x", "", &[], &[s(1)]).is_err());
        assert!(encode("x", "Main", &[], &[]).is_err());
        assert!(encode("x", "A.12", &[], &[s(1)]).is_err());
        assert!(encode("x._@.y", "Main", &[], &[s(1)]).is_err());
        assert!(encode("x", "Main", &[ScopeSegment::new("Lib", vec![])], &[s(1)]).is_err());
    }

    #[test]
    fn display_lists_segments() {
        let view = decode("x._@.Lib.3.App._hyg.7.9").unwrap();
        assert_eq!(view.to_string(), "x [Lib: 3] [App: 7, 9]");
    }
}
