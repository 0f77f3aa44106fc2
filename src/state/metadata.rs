//! Parameter metadata and handler classification.
//!
//! Metadata names a parameter and the handler attached to it. The batch
//! pass in [`ParameterContainer`](crate::ParameterContainer) uses the
//! handler identity to run a handler shared by several parameters only
//! once, so handler names are classified by [`morph`] into a stable
//! grouping key instead of relying on closure identity.
//!
//! Classification rules:
//! - no name, a blank name or [`NO_HANDLER`] keeps the metadata unchanged
//! - `this.`/`self.` receivers are stripped (`self.on_changed` → `on_changed`)
//! - a closure whose body is a plain zero-argument call groups with the
//!   method it calls (`|| self.on_changed()` → `on_changed`)
//! - any other inline closure gets a key unique to its parameter

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::ParameterError;

/// Handler name meaning "no handler attached".
pub const NO_HANDLER: &str = "_";

const INLINE_SUFFIX: &str = ".<inline>";

/// Immutable descriptor of one tracked parameter.
///
/// Two metadata values are equal when their parameter names match
/// (case-sensitive). Use [`same_handler`](Self::same_handler) to compare
/// handler identity.
#[derive(Clone)]
pub struct ParameterMetadata {
    parameter_name: String,
    handler_name: Option<String>,
    handler_key: Option<String>,
}

impl ParameterMetadata {
    pub fn new(parameter_name: impl Into<String>, handler_name: Option<String>) -> Self {
        Self {
            parameter_name: parameter_name.into(),
            handler_name,
            handler_key: None,
        }
    }

    pub fn parameter_name(&self) -> &str {
        &self.parameter_name
    }

    pub fn handler_name(&self) -> Option<&str> {
        self.handler_name.as_deref()
    }

    /// Canonical handler key, present only after [`morph`].
    pub fn handler_key(&self) -> Option<&str> {
        self.handler_key.as_deref()
    }

    /// Whether a real (non-sentinel) handler name is attached.
    pub fn has_handler(&self) -> bool {
        !is_unnamed(self.handler_name.as_deref())
    }

    /// Whether [`morph`] has classified this metadata.
    pub fn is_morphed(&self) -> bool {
        self.handler_key.is_some()
    }

    /// Key used to de-duplicate shared handlers in a batch pass.
    ///
    /// `None` means the parameter never shares its handler invocation.
    pub fn handler_group(&self) -> Option<&str> {
        self.handler_key.as_deref()
    }

    pub fn same_handler(&self, other: &ParameterMetadata) -> bool {
        self.handler_name == other.handler_name && self.handler_key == other.handler_key
    }
}

impl PartialEq for ParameterMetadata {
    fn eq(&self, other: &Self) -> bool {
        self.parameter_name == other.parameter_name
    }
}

impl Eq for ParameterMetadata {}

impl Hash for ParameterMetadata {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parameter_name.hash(state);
    }
}

impl fmt::Debug for ParameterMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterMetadata")
            .field("parameter_name", &self.parameter_name)
            .field("handler_name", &self.handler_name)
            .field("handler_key", &self.handler_key)
            .finish()
    }
}

// =============================================================================
// Morph
// =============================================================================

/// Classify the handler attached to `metadata`.
///
/// Returns the metadata unchanged when it carries no real handler or was
/// already classified, otherwise a new value with a canonical
/// [`handler_key`](ParameterMetadata::handler_key). Applying it twice gives
/// the same result as applying it once.
pub fn morph(metadata: Option<&ParameterMetadata>) -> Result<ParameterMetadata, ParameterError> {
    let metadata = metadata.ok_or(ParameterError::MissingMetadata)?;

    if metadata.is_morphed() || !metadata.has_handler() {
        return Ok(metadata.clone());
    }

    let name = metadata.handler_name.as_deref().unwrap_or_default();
    Ok(ParameterMetadata {
        parameter_name: metadata.parameter_name.clone(),
        handler_name: metadata.handler_name.clone(),
        handler_key: Some(canonical_handler(&metadata.parameter_name, name)),
    })
}

fn is_unnamed(name: Option<&str>) -> bool {
    match name.map(str::trim) {
        None => true,
        Some(name) => name.is_empty() || name == NO_HANDLER,
    }
}

fn canonical_handler(parameter_name: &str, handler_name: &str) -> String {
    let name = handler_name.trim();

    match closure_body(name) {
        Some(body) => match called_method(body) {
            Some(method) => method.to_string(),
            None => format!("{parameter_name}{INLINE_SUFFIX}"),
        },
        None => strip_receiver(name).to_string(),
    }
}

/// Body of a closure or lambda expression, if `expr` is one.
fn closure_body(expr: &str) -> Option<&str> {
    if let Some((_, body)) = expr.split_once("=>") {
        return Some(body.trim());
    }

    let expr = expr.strip_prefix("move ").unwrap_or(expr).trim_start();
    let rest = expr.strip_prefix('|')?;
    let (_, body) = rest.split_once('|')?;
    Some(body.trim())
}

/// `on_changed` for bodies like `self.on_changed()` or `{ await OnChanged(); }`.
fn called_method(body: &str) -> Option<&str> {
    let body = body.strip_prefix("async ").unwrap_or(body).trim_start();
    let body = body.strip_prefix("move ").unwrap_or(body).trim_start();
    let body = body
        .strip_prefix('{')
        .and_then(|b| b.strip_suffix('}'))
        .unwrap_or(body)
        .trim()
        .trim_end_matches(';')
        .trim();
    let body = body.strip_prefix("await ").unwrap_or(body).trim();
    let body = body.strip_suffix(".await").unwrap_or(body);
    let call = body.strip_suffix("()")?;
    let method = strip_receiver(call);
    is_identifier(method).then_some(method)
}

fn strip_receiver(name: &str) -> &str {
    name.strip_prefix("this.")
        .or_else(|| name.strip_prefix("self."))
        .unwrap_or(name)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(handler: Option<&str>) -> ParameterMetadata {
        ParameterMetadata::new("Value", handler.map(str::to_string))
    }

    #[test]
    fn test_morph_requires_metadata() {
        assert!(matches!(morph(None), Err(ParameterError::MissingMetadata)));
    }

    #[test]
    fn test_morph_leaves_unnamed_unchanged() {
        for handler in [None, Some(""), Some("   "), Some(NO_HANDLER)] {
            let original = meta(handler);
            let morphed = morph(Some(&original)).unwrap();
            assert!(morphed.same_handler(&original));
            assert!(!morphed.is_morphed());
            assert_eq!(morphed.handler_group(), None);
        }
    }

    #[test]
    fn test_morph_named_handler() {
        let original = meta(Some("self.on_value_changed"));
        let morphed = morph(Some(&original)).unwrap();
        assert!(!morphed.same_handler(&original));
        assert_eq!(morphed.handler_key(), Some("on_value_changed"));
        assert_eq!(morphed.handler_name(), Some("self.on_value_changed"));
    }

    #[test]
    fn test_morph_call_closures_group_with_method() {
        let cases = [
            "|| self.on_changed()",
            "move |_| self.on_changed()",
            "() => OnChanged()",
            "async () => await this.OnChanged()",
            "|_| { self.on_changed(); }",
            "|| async { self.on_changed().await }",
        ];
        let expected = [
            "on_changed",
            "on_changed",
            "OnChanged",
            "OnChanged",
            "on_changed",
            "on_changed",
        ];
        for (case, key) in cases.iter().zip(expected) {
            let morphed = morph(Some(&meta(Some(case)))).unwrap();
            assert_eq!(morphed.handler_key(), Some(key), "case {case}");
        }
    }

    #[test]
    fn test_morph_inline_closure_is_unique_per_parameter() {
        let a = ParameterMetadata::new("Open", Some("|c| log.push(c.new)".into()));
        let b = ParameterMetadata::new("Checked", Some("|c| log.push(c.new)".into()));
        let a = morph(Some(&a)).unwrap();
        let b = morph(Some(&b)).unwrap();
        assert_eq!(a.handler_key(), Some("Open.<inline>"));
        assert_ne!(a.handler_group(), b.handler_group());
    }

    #[test]
    fn test_morph_is_idempotent() {
        let cases = [
            None,
            Some(NO_HANDLER),
            Some("on_changed"),
            Some("this.OnChanged"),
            Some("|| self.on_changed()"),
            Some("|c| println!(\"{c:?}\")"),
        ];
        for case in cases {
            let once = morph(Some(&meta(case))).unwrap();
            let twice = morph(Some(&once)).unwrap();
            assert_eq!(once, twice);
            assert!(once.same_handler(&twice), "case {case:?}");
        }
    }

    #[test]
    fn test_equality_by_parameter_name() {
        let a = ParameterMetadata::new("Value", None);
        let b = ParameterMetadata::new("Value", Some("on_changed".into()));
        let c = ParameterMetadata::new("value", None);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
