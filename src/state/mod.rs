//! State Module - Parameter tracking and change notification
//!
//! This module contains the systems a component uses to track its inputs:
//!
//! - **Comparer** - Equality policy deciding what counts as a change
//! - **Metadata** - Parameter/handler names and handler classification (`morph`)
//! - **Parameter** - Per-parameter state machine with ordered notification
//! - **Scope** - Registration of parameters at construction time
//! - **Container** - A component's parameter set and host-driven change pass
//! - **Dispatch** - Debounce and throttle for async actions

mod comparer;
mod container;
mod dispatch;
mod metadata;
mod parameter;
mod scope;

pub use comparer::*;
pub use container::*;
pub use dispatch::*;
pub use metadata::*;
pub use parameter::{ChangeTiming, NotifyPhase, ParameterState, SetOutcome};
pub use scope::*;

// =============================================================================
// Tests
// =============================================================================
