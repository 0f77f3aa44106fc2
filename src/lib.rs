//! # spark-params
//!
//! Parameter change coordination for reactive UI components.
//!
//! Built on [spark-signals](https://github.com/RLabs-Inc/spark-signals) for reactive value sources.
//!
//! ## Architecture
//!
//! A component owns a [`ParameterContainer`]. At construction it registers
//! each externally supplied input through a [`RegistrationScope`], getting a
//! [`ParameterState`] handle back. From then on there are two ways a value
//! changes:
//!
//! ```text
//! component ── set_value ──▶ ParameterState ── handler + event callback ──▶ owner
//! owner ── new props ──▶ on_parameters_set ── handler only (shared handlers once)
//! ```
//!
//! Every notification compares against the last committed value, so an
//! unchanged value never fires, and a failed notification leaves the value
//! uncommitted so the next attempt notifies again.
//!
//! ## Modules
//!
//! - [`error`] - Configuration and notification errors
//! - [`primitives`] - Value sources, event callbacks, change handlers
//! - [`state`] - Parameter state, registration, containers, dispatchers
//! - [`style`] - Class-name composition

pub mod error;
pub mod primitives;
pub mod state;
pub mod style;

// Re-export commonly used items
pub use error::{BoxError, ParameterError};

pub use primitives::{CallbackFuture, ChangeHandler, EventCallback, ParameterChange, ValueSource};

pub use state::{
    // Parameters
    ChangeTiming, NotifyPhase, ParameterState, SetOutcome,
    // Comparison and metadata
    Comparer, ParameterMetadata, morph, NO_HANDLER,
    // Registration
    ParameterBuilder, ParameterContainer, ParameterHost, RegistrationScope,
    // Dispatch
    DebounceDispatcher, ThrottleDispatcher,
};

pub use style::ClassBuilder;

// Re-export spark-signals for sources owned by the caller
pub use spark_signals::{signal, Signal};
