//! Primitives - Building blocks shared by every tracked parameter.
//!
//! - [`ValueSource`] - Static value, signal, or getter for a live parameter
//! - [`EventCallback`] - Owner notification (two-way binding)
//! - [`ChangeHandler`] - Component-local change reaction

mod types;

pub use types::*;
