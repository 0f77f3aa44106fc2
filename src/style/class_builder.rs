//! Class Builder - conditional CSS class lists for components.
//!
//! # Example
//!
//! ```rust
//! use spark_params::ClassBuilder;
//!
//! let disabled = true;
//! let class = ClassBuilder::new("mud-button")
//!     .add_class_if("mud-disabled", disabled)
//!     .add_class_if("mud-ripple", !disabled)
//!     .add_class_from_attributes(Some("  my-extra  "))
//!     .build();
//!
//! assert_eq!(class, "mud-button mud-disabled my-extra");
//! ```

use std::fmt;

/// Accumulates class names and joins them with single spaces.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassBuilder {
    classes: Vec<String>,
}

impl ClassBuilder {
    /// Start with a base class.
    pub fn new(base: impl Into<String>) -> Self {
        Self::empty().add_class(base)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Add a class. Blank names are ignored.
    pub fn add_class(mut self, class: impl Into<String>) -> Self {
        let class = class.into();
        let trimmed = class.trim();
        if !trimmed.is_empty() {
            self.classes.push(trimmed.to_string());
        }
        self
    }

    pub fn add_class_if(self, class: impl Into<String>, when: bool) -> Self {
        if when { self.add_class(class) } else { self }
    }

    /// Add a class computed only when `when` holds.
    pub fn add_class_with(self, class: impl FnOnce() -> String, when: bool) -> Self {
        if when { self.add_class(class()) } else { self }
    }

    /// Add user-supplied classes (the `class` attribute).
    pub fn add_class_from_attributes(self, class: Option<&str>) -> Self {
        match class {
            Some(class) => class
                .split_whitespace()
                .fold(self, |builder, c| builder.add_class(c)),
            None => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn build(&self) -> String {
        self.classes.join(" ")
    }
}

impl fmt::Display for ClassBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build())
    }
}

// =============================================================================
// Tests
// =============================================================================
