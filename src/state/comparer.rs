//! Value comparers used for change detection.
//!
//! A parameter only notifies when its comparer says the incoming value
//! differs from the last committed one. The default is structural
//! equality (`PartialEq`); custom comparers cover floats, collections
//! compared by content, or values compared by a key.
//!
//! # Example
//!
//! ```ignore
//! use spark_params::Comparer;
//!
//! let close_enough = Comparer::<f64>::epsilon(0.01);
//! assert!(close_enough.equals(&1.0, &1.005).unwrap());
//!
//! let by_len = Comparer::by_key(|s: &String| s.len());
//! assert!(by_len.equals(&"ab".to_string(), &"cd".to_string()).unwrap());
//! ```

use std::fmt;
use std::rc::Rc;

use crate::error::{BoxError, ParameterError};

type EqFn<T> = Rc<dyn Fn(&T, &T) -> bool>;
type TryEqFn<T> = Rc<dyn Fn(&T, &T) -> Result<bool, BoxError>>;

enum ComparerKind<T> {
    Structural,
    Custom(EqFn<T>),
    Fallible(TryEqFn<T>),
}

/// Equality policy for one parameter type.
pub struct Comparer<T> {
    kind: ComparerKind<T>,
}

impl<T> Clone for Comparer<T> {
    fn clone(&self) -> Self {
        let kind = match &self.kind {
            ComparerKind::Structural => ComparerKind::Structural,
            ComparerKind::Custom(f) => ComparerKind::Custom(f.clone()),
            ComparerKind::Fallible(f) => ComparerKind::Fallible(f.clone()),
        };
        Self { kind }
    }
}

impl<T> fmt::Debug for Comparer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ComparerKind::Structural => "Structural",
            ComparerKind::Custom(_) => "Custom",
            ComparerKind::Fallible(_) => "Fallible",
        };
        f.debug_struct("Comparer").field("kind", &kind).finish()
    }
}

impl<T: PartialEq> Default for Comparer<T> {
    fn default() -> Self {
        Self::structural()
    }
}

impl<T> Comparer<T> {
    /// Compare with `PartialEq`.
    pub fn structural() -> Self
    where
        T: PartialEq,
    {
        Self { kind: ComparerKind::Structural }
    }

    /// Compare with a custom equality function.
    ///
    /// The function must be deterministic and reflexive.
    pub fn new(eq: impl Fn(&T, &T) -> bool + 'static) -> Self {
        Self { kind: ComparerKind::Custom(Rc::new(eq)) }
    }

    /// Compare with a function that may fail.
    ///
    /// A failure aborts the `set_value` call before anything is mutated.
    pub fn fallible(eq: impl Fn(&T, &T) -> Result<bool, BoxError> + 'static) -> Self {
        Self { kind: ComparerKind::Fallible(Rc::new(eq)) }
    }

    /// Compare two values by a derived key.
    pub fn by_key<K: PartialEq>(key: impl Fn(&T) -> K + 'static) -> Self {
        Self::new(move |a, b| key(a) == key(b))
    }

    /// Whether this is the default `PartialEq` comparer.
    pub fn is_structural(&self) -> bool {
        matches!(self.kind, ComparerKind::Structural)
    }
}

impl<T: PartialEq> Comparer<T> {
    /// Compare `a` and `b`, attributing failures to `parameter`.
    pub fn equals_for(&self, parameter: &str, a: &T, b: &T) -> Result<bool, ParameterError> {
        match &self.kind {
            ComparerKind::Structural => Ok(a == b),
            ComparerKind::Custom(eq) => Ok(eq(a, b)),
            ComparerKind::Fallible(eq) => eq(a, b).map_err(|source| ParameterError::Comparer {
                parameter: parameter.to_string(),
                source,
            }),
        }
    }

    /// Compare `a` and `b`.
    pub fn equals(&self, a: &T, b: &T) -> Result<bool, ParameterError> {
        self.equals_for("", a, b)
    }
}

impl Comparer<f64> {
    /// Treat floats within `epsilon` of each other as equal.
    pub fn epsilon(epsilon: f64) -> Self {
        Self::new(move |a, b| a == b || (a - b).abs() <= epsilon)
    }
}

impl Comparer<f32> {
    /// Treat floats within `epsilon` of each other as equal.
    pub fn epsilon(epsilon: f32) -> Self {
        Self::new(move |a, b| a == b || (a - b).abs() <= epsilon)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_is_default() {
        let cmp: Comparer<i32> = Comparer::default();
        assert!(cmp.is_structural());
        assert!(cmp.equals(&3, &3).unwrap());
        assert!(!cmp.equals(&3, &4).unwrap());
    }

    #[test]
    fn test_epsilon() {
        let cmp = Comparer::<f64>::epsilon(0.01);
        assert!(cmp.equals(&1.0, &1.005).unwrap());
        assert!(!cmp.equals(&1.0, &1.02).unwrap());
        assert!(cmp.equals(&f64::INFINITY, &f64::INFINITY).unwrap());
    }

    #[test]
    fn test_by_key_compares_content() {
        let cmp = Comparer::by_key(|v: &Vec<u8>| v.iter().map(|b| *b as u32).sum::<u32>());
        assert!(cmp.equals(&vec![1, 2], &vec![2, 1]).unwrap());
        assert!(!cmp.equals(&vec![1, 2], &vec![2, 2]).unwrap());
    }

    #[test]
    fn test_fallible_error_names_parameter() {
        let cmp: Comparer<i32> = Comparer::fallible(|_, _| Err("not comparable".into()));
        let err = cmp.equals_for("Value", &1, &2).unwrap_err();
        assert_eq!(err.parameter(), Some("Value"));
        assert!(matches!(err, ParameterError::Comparer { .. }));
    }

    #[test]
    fn test_clone_shares_function() {
        let cmp = Comparer::new(|a: &String, b: &String| a.eq_ignore_ascii_case(b));
        let copy = cmp.clone();
        assert!(copy.equals(&"ABC".into(), &"abc".into()).unwrap());
        assert!(!copy.is_structural());
    }
}
