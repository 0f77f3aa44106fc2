//! Registration Scope - wiring parameters at component construction.
//!
//! A component registers each tracked parameter through a short-lived
//! scope. Builders may be configured in any order; nothing is attached
//! until the scope is disposed, at which point every registration is
//! validated, its metadata classified, and its `ParameterState` attached to
//! the container.
//!
//! # Example
//!
//! ```ignore
//! let container = ParameterContainer::new();
//! let scope = container.create_register_scope();
//!
//! let open: ParameterState<bool> = scope
//!     .register_parameter("Open")
//!     .with_parameter(move || props.borrow().open)
//!     .with_event_callback(move || props.borrow().open_changed.clone())
//!     .with_change_handler(|change| println!("open: {}", change.new_value))
//!     .into();
//!
//! scope.dispose()?; // `open` is usable from here on
//! ```

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use tracing::{debug, error};

use super::comparer::Comparer;
use super::container::ParameterContainer;
use super::metadata::{ParameterMetadata, morph};
use super::parameter::{CallbackAccessor, ParameterConfig, ParameterState};
use crate::error::{BoxError, ParameterError};
use crate::primitives::{ChangeHandler, EventCallback, ParameterChange, ValueSource};

// =============================================================================
// Draft registration
// =============================================================================

struct Draft<T: Clone + PartialEq + 'static> {
    source: Option<ValueSource<T>>,
    comparer: Option<Comparer<T>>,
    event_callback: Option<CallbackAccessor<T>>,
    change_handler: Option<ChangeHandler<T>>,
    handler_name: Option<String>,
}

impl<T: Clone + PartialEq + 'static> Default for Draft<T> {
    fn default() -> Self {
        Self {
            source: None,
            comparer: None,
            event_callback: None,
            change_handler: None,
            handler_name: None,
        }
    }
}

/// Type-erased registration held by the scope until disposal.
trait PendingRegistration {
    fn finalize(self: Box<Self>, container: &ParameterContainer) -> Result<(), ParameterError>;
}

struct DraftRegistration<T: Clone + PartialEq + 'static> {
    draft: Rc<RefCell<Draft<T>>>,
    state: ParameterState<T>,
}

impl<T: Clone + PartialEq + 'static> PendingRegistration for DraftRegistration<T> {
    fn finalize(self: Box<Self>, container: &ParameterContainer) -> Result<(), ParameterError> {
        let name = self.state.name().to_string();
        let draft = std::mem::take(&mut *self.draft.borrow_mut());

        let source = draft
            .source
            .ok_or_else(|| ParameterError::MissingValueAccessor(name.clone()))?;
        if container.contains(&name) {
            return Err(ParameterError::DuplicateParameter(name));
        }
        let metadata = morph(Some(&ParameterMetadata::new(name.as_str(), draft.handler_name)))?;

        self.state.attach(ParameterConfig {
            metadata,
            source,
            comparer: draft.comparer.unwrap_or_default(),
            event_callback: draft.event_callback,
            change_handler: draft.change_handler,
        })?;
        container.attach_entry(Rc::new(self.state))
    }
}

// =============================================================================
// Parameter Builder
// =============================================================================

/// Configures one parameter registration.
///
/// Convert into the [`ParameterState`] handle with [`state`](Self::state)
/// or `.into()`.
pub struct ParameterBuilder<T: Clone + PartialEq + 'static> {
    draft: Rc<RefCell<Draft<T>>>,
    state: ParameterState<T>,
}

impl<T: Clone + PartialEq + 'static> ParameterBuilder<T> {
    /// Read the live value through a getter. Required unless
    /// [`with_source`](Self::with_source) is used.
    pub fn with_parameter(self, getter: impl Fn() -> T + 'static) -> Self {
        self.draft.borrow_mut().source = Some(ValueSource::getter(getter));
        self
    }

    /// Read the live value from a static value, signal, or getter.
    pub fn with_source(self, source: impl Into<ValueSource<T>>) -> Self {
        self.draft.borrow_mut().source = Some(source.into());
        self
    }

    /// Owner notification, read fresh on every change.
    pub fn with_event_callback(self, accessor: impl Fn() -> EventCallback<T> + 'static) -> Self {
        self.draft.borrow_mut().event_callback = Some(Rc::new(accessor));
        self
    }

    pub fn with_change_handler(self, handler: impl Fn(&ParameterChange<T>) + 'static) -> Self {
        self.draft.borrow_mut().change_handler = Some(ChangeHandler::new(handler));
        self
    }

    pub fn with_async_change_handler<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(ParameterChange<T>) -> Fut + 'static,
        Fut: Future<Output = Result<(), BoxError>> + 'static,
    {
        self.draft.borrow_mut().change_handler = Some(ChangeHandler::new_async(handler));
        self
    }

    /// Change handler plus the name used to group it with other parameters
    /// sharing the same handler.
    pub fn with_named_change_handler(
        self,
        name: impl Into<String>,
        handler: impl Fn(&ParameterChange<T>) + 'static,
    ) -> Self {
        self.with_handler_name(name).with_change_handler(handler)
    }

    /// Name the handler for grouping; see [`morph`](crate::morph).
    pub fn with_handler_name(self, name: impl Into<String>) -> Self {
        self.draft.borrow_mut().handler_name = Some(name.into());
        self
    }

    pub fn with_comparer(self, comparer: Comparer<T>) -> Self {
        self.draft.borrow_mut().comparer = Some(comparer);
        self
    }

    /// The handle this registration attaches on disposal.
    pub fn state(&self) -> ParameterState<T> {
        self.state.clone()
    }
}

impl<T: Clone + PartialEq + 'static> From<ParameterBuilder<T>> for ParameterState<T> {
    fn from(builder: ParameterBuilder<T>) -> Self {
        builder.state
    }
}

// =============================================================================
// Registration Scope
// =============================================================================

/// Transient builder for a container's parameters.
///
/// Registrations are finalized by [`dispose`](Self::dispose), or when the
/// scope is dropped, so they are attached on every exit path.
///
/// # Panics
///
/// Dropping an undisposed scope whose registrations are invalid panics
/// with the configuration error, unless the thread is already unwinding.
/// Call [`dispose`](Self::dispose) to get the error as a `Result` instead.
pub struct RegistrationScope<'a> {
    container: &'a ParameterContainer,
    pending: RefCell<Vec<Box<dyn PendingRegistration>>>,
    disposed: bool,
}

impl<'a> RegistrationScope<'a> {
    pub(crate) fn new(container: &'a ParameterContainer) -> Self {
        Self {
            container,
            pending: RefCell::new(Vec::new()),
            disposed: false,
        }
    }

    /// Start registering parameter `name`.
    pub fn register_parameter<T: Clone + PartialEq + 'static>(
        &self,
        name: impl Into<String>,
    ) -> ParameterBuilder<T> {
        let draft = Rc::new(RefCell::new(Draft::default()));
        let state = ParameterState::detached(name);

        self.pending.borrow_mut().push(Box::new(DraftRegistration {
            draft: draft.clone(),
            state: state.clone(),
        }));

        ParameterBuilder { draft, state }
    }

    /// Number of registrations waiting for disposal.
    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Attach every registration, reporting the first failure.
    ///
    /// All registrations are attempted even when one fails.
    pub fn dispose(mut self) -> Result<(), ParameterError> {
        self.finish()
    }

    fn finish(&mut self) -> Result<(), ParameterError> {
        self.disposed = true;
        let pending = std::mem::take(&mut *self.pending.borrow_mut());
        let count = pending.len();

        let mut first_error = None;
        for registration in pending {
            if let Err(err) = registration.finalize(self.container) {
                error!(error = %err, "parameter registration failed");
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => {
                debug!(count, "registration scope disposed");
                Ok(())
            }
        }
    }
}

impl Drop for RegistrationScope<'_> {
    fn drop(&mut self) {
        if self.disposed {
            return;
        }
        if let Err(err) = self.finish() {
            if !std::thread::panicking() {
                panic!("invalid parameter registration: {err}");
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::parameter::ChangeTiming;
    use futures::executor::block_on;
    use std::cell::Cell;

    #[test]
    fn test_handle_attaches_on_dispose() {
        let container = ParameterContainer::new();
        let scope = container.create_register_scope();

        let value: ParameterState<i32> = scope.register_parameter("Value").with_parameter(|| 3).into();
        assert_eq!(scope.pending_count(), 1);
        assert!(matches!(value.value(), Err(ParameterError::NotAttached(_))));

        scope.dispose().unwrap();
        assert_eq!(value.value().unwrap(), 3);
        assert_eq!(value.last_value().unwrap(), 3);
        assert!(container.contains("Value"));
    }

    #[test]
    fn test_missing_accessor_fails_at_dispose() {
        let container = ParameterContainer::new();
        let scope = container.create_register_scope();

        let _ok: ParameterState<i32> = scope.register_parameter("A").with_parameter(|| 1).into();
        let _bad: ParameterState<i32> = scope
            .register_parameter("B")
            .with_change_handler(|_| {})
            .into();

        let err = scope.dispose().unwrap_err();
        assert!(matches!(err, ParameterError::MissingValueAccessor(ref name) if name == "B"));
        // The valid registration is still attached
        assert!(container.contains("A"));
        assert!(!container.contains("B"));
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let container = ParameterContainer::new();
        let scope = container.create_register_scope();
        let _a: ParameterState<i32> = scope.register_parameter("Value").with_parameter(|| 1).into();
        let _b: ParameterState<u8> = scope.register_parameter("Value").with_parameter(|| 2).into();

        let err = scope.dispose().unwrap_err();
        assert!(matches!(err, ParameterError::DuplicateParameter(ref name) if name == "Value"));
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn test_drop_finalizes_registrations() {
        let container = ParameterContainer::new();
        let state: ParameterState<String>;
        {
            let scope = container.create_register_scope();
            state = scope
                .register_parameter("Text")
                .with_source("hello".to_string())
                .into();
        }
        assert_eq!(state.value().unwrap(), "hello");
    }

    #[test]
    #[should_panic(expected = "invalid parameter registration")]
    fn test_drop_panics_on_invalid_registration() {
        let container = ParameterContainer::new();
        let scope = container.create_register_scope();
        let _state: ParameterState<i32> = scope.register_parameter("Value").into();
        drop(scope);
    }

    #[test]
    fn test_builder_configuration_reaches_state() {
        let container = ParameterContainer::new();
        let fired = Rc::new(Cell::new(0));
        let f = fired.clone();

        let scope = container.create_register_scope();
        let builder = scope
            .register_parameter::<f64>("Opacity")
            .with_parameter(|| 0.5)
            .with_comparer(Comparer::<f64>::epsilon(0.1))
            .with_event_callback(|| EventCallback::from_fn(|_: f64| {}))
            .with_named_change_handler("self.on_opacity_changed", move |_| f.set(f.get() + 1));
        let state = builder.state();
        scope.dispose().unwrap();

        assert!(state.has_event_callback());
        assert!(state.has_change_handler());
        assert_eq!(state.metadata().unwrap().handler_key(), Some("on_opacity_changed"));

        // Within epsilon: no change
        block_on(state.set_value(0.55, ChangeTiming::Immediate)).unwrap();
        assert_eq!(fired.get(), 0);
        block_on(state.set_value(0.9, ChangeTiming::Immediate)).unwrap();
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_async_change_handler_registration() {
        let container = ParameterContainer::new();
        let seen = Rc::new(Cell::new(0u32));
        let s = seen.clone();

        let scope = container.create_register_scope();
        let state: ParameterState<u32> = scope
            .register_parameter("Count")
            .with_parameter(|| 0)
            .with_async_change_handler(move |change| {
                let s = s.clone();
                async move {
                    s.set(change.new_value);
                    Ok::<(), BoxError>(())
                }
            })
            .into();
        scope.dispose().unwrap();

        block_on(state.set_value(4, ChangeTiming::AfterEventCallback)).unwrap();
        assert_eq!(seen.get(), 4);
    }
}
