//! Primitive types - value sources and callbacks.
//!
//! These types define how a component reads its live parameter values and
//! how parameter changes flow out of it:
//!
//! - [`ValueSource`] - where the host's current value comes from
//! - [`EventCallback`] - awaitable sink notifying the owner of a new value
//! - [`ChangeHandler`] - local reaction to a detected change
//! - [`ParameterChange`] - the old/new pair handed to a change handler

use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::future::{self, FutureExt, LocalBoxFuture};
use spark_signals::Signal;

use crate::error::BoxError;

/// Future returned by event callbacks and async change handlers.
pub type CallbackFuture = LocalBoxFuture<'static, Result<(), BoxError>>;

// =============================================================================
// Value Source
// =============================================================================

/// Where a parameter reads the owner's current value.
///
/// The container reads it once at registration and again on every
/// [`on_parameters_set`](crate::ParameterContainer::on_parameters_set) pass;
/// nothing is cached here, so a `Signal` or `Getter` always reports what the
/// owner holds right now.
#[derive(Clone)]
pub enum ValueSource<T: Clone + PartialEq + 'static> {
    /// Fixed for the parameter's lifetime.
    Static(T),
    /// Owner-held signal; `set` on it is seen by the next pass.
    Signal(Signal<T>),
    /// Closure over the owner's props.
    Getter(Rc<dyn Fn() -> T>),
}

impl<T: Clone + PartialEq + 'static> ValueSource<T> {
    /// The owner's value at this moment.
    pub fn current(&self) -> T {
        match self {
            ValueSource::Static(value) => value.clone(),
            ValueSource::Signal(signal) => signal.get(),
            ValueSource::Getter(read) => read(),
        }
    }

    pub fn getter(read: impl Fn() -> T + 'static) -> Self {
        ValueSource::Getter(Rc::new(read))
    }
}

impl<T: Clone + PartialEq + Default + 'static> Default for ValueSource<T> {
    fn default() -> Self {
        ValueSource::Static(T::default())
    }
}

impl<T: Clone + PartialEq + 'static> From<T> for ValueSource<T> {
    fn from(value: T) -> Self {
        ValueSource::Static(value)
    }
}

impl<T: Clone + PartialEq + 'static> From<Signal<T>> for ValueSource<T> {
    fn from(signal: Signal<T>) -> Self {
        ValueSource::Signal(signal)
    }
}

impl<T: Clone + PartialEq + 'static> fmt::Debug for ValueSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            ValueSource::Static(_) => "Static",
            ValueSource::Signal(_) => "Signal",
            ValueSource::Getter(_) => "Getter",
        };
        f.debug_tuple("ValueSource").field(&kind).finish()
    }
}

// =============================================================================
// Event Callback
// =============================================================================

/// Awaitable notification sink for a parameter's owner.
///
/// This is the "ValueChanged" half of a two-way binding: the component calls
/// it with the new value and the owner decides what to do with it. An empty
/// callback (no delegate) completes immediately.
pub struct EventCallback<T> {
    delegate: Option<Rc<dyn Fn(T) -> CallbackFuture>>,
}

impl<T> Clone for EventCallback<T> {
    fn clone(&self) -> Self {
        Self { delegate: self.delegate.clone() }
    }
}

impl<T> Default for EventCallback<T> {
    fn default() -> Self {
        Self { delegate: None }
    }
}

impl<T: 'static> fmt::Debug for EventCallback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventCallback")
            .field("has_delegate", &self.has_delegate())
            .finish()
    }
}

impl<T: 'static> EventCallback<T> {
    /// Callback from an async closure.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(T) -> Fut + 'static,
        Fut: Future<Output = Result<(), BoxError>> + 'static,
    {
        Self { delegate: Some(Rc::new(move |value| f(value).boxed_local())) }
    }

    /// Callback from a plain closure that cannot fail.
    pub fn from_fn(f: impl Fn(T) + 'static) -> Self {
        Self::new(move |value| {
            f(value);
            future::ready(Ok(()))
        })
    }

    /// Callback with no delegate.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_delegate(&self) -> bool {
        self.delegate.is_some()
    }

    /// Notify the owner. Completes immediately when there is no delegate.
    pub fn invoke(&self, value: T) -> CallbackFuture {
        match &self.delegate {
            Some(delegate) => delegate(value),
            None => future::ready(Ok(())).boxed_local(),
        }
    }
}

// =============================================================================
// Change Handler
// =============================================================================

/// A detected transition of one parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterChange<T> {
    pub parameter_name: String,
    pub old_value: T,
    pub new_value: T,
}

/// Local reaction to a parameter change.
pub enum ChangeHandler<T> {
    /// Runs to completion inline.
    Sync(Rc<dyn Fn(&ParameterChange<T>)>),
    /// Awaited before the notification continues.
    Async(Rc<dyn Fn(ParameterChange<T>) -> CallbackFuture>),
}

impl<T> Clone for ChangeHandler<T> {
    fn clone(&self) -> Self {
        match self {
            ChangeHandler::Sync(f) => ChangeHandler::Sync(f.clone()),
            ChangeHandler::Async(f) => ChangeHandler::Async(f.clone()),
        }
    }
}

impl<T> fmt::Debug for ChangeHandler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeHandler::Sync(_) => f.write_str("ChangeHandler::Sync"),
            ChangeHandler::Async(_) => f.write_str("ChangeHandler::Async"),
        }
    }
}

impl<T: 'static> ChangeHandler<T> {
    pub fn new(f: impl Fn(&ParameterChange<T>) + 'static) -> Self {
        ChangeHandler::Sync(Rc::new(f))
    }

    pub fn new_async<F, Fut>(f: F) -> Self
    where
        F: Fn(ParameterChange<T>) -> Fut + 'static,
        Fut: Future<Output = Result<(), BoxError>> + 'static,
    {
        ChangeHandler::Async(Rc::new(move |change| f(change).boxed_local()))
    }

    /// Run the handler. Sync handlers have already run when this returns.
    pub fn invoke(&self, change: ParameterChange<T>) -> CallbackFuture {
        match self {
            ChangeHandler::Sync(f) => {
                f(&change);
                future::ready(Ok(())).boxed_local()
            }
            ChangeHandler::Async(f) => f(change),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use spark_signals::signal;
    use std::cell::{Cell, RefCell};

    #[test]
    fn test_value_source_static() {
        let source: ValueSource<i32> = 5.into();
        assert_eq!(source.current(), 5);
        assert_eq!(ValueSource::<String>::default().current(), "");
    }

    #[test]
    fn test_value_source_signal_tracks_updates() {
        let value = signal(1u8);
        let source = ValueSource::from(value.clone());
        assert_eq!(source.current(), 1);

        value.set(7);
        assert_eq!(source.current(), 7);
    }

    #[test]
    fn test_value_source_getter() {
        let counter = Rc::new(Cell::new(0));
        let c = counter.clone();
        let source = ValueSource::getter(move || {
            c.set(c.get() + 1);
            c.get()
        });
        assert_eq!(source.current(), 1);
        assert_eq!(source.current(), 2);
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn test_empty_callback_completes() {
        let callback: EventCallback<bool> = EventCallback::empty();
        assert!(!callback.has_delegate());
        assert!(block_on(callback.invoke(true)).is_ok());
    }

    #[test]
    fn test_callback_receives_value() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let callback = EventCallback::from_fn(move |v: &'static str| s.borrow_mut().push(v));

        assert!(callback.has_delegate());
        block_on(callback.invoke("a")).unwrap();
        block_on(callback.clone().invoke("b")).unwrap();
        assert_eq!(*seen.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn test_callback_error_surfaces() {
        let callback = EventCallback::new(|_: u32| async { Err::<(), BoxError>("rejected".into()) });
        let err = block_on(callback.invoke(1)).unwrap_err();
        assert_eq!(err.to_string(), "rejected");
    }

    #[test]
    fn test_sync_handler_runs_before_future_is_polled() {
        let fired = Rc::new(Cell::new(false));
        let f = fired.clone();
        let handler = ChangeHandler::new(move |_: &ParameterChange<i32>| f.set(true));

        let pending = handler.invoke(ParameterChange {
            parameter_name: "Value".into(),
            old_value: 0,
            new_value: 1,
        });
        assert!(fired.get());
        assert!(block_on(pending).is_ok());
    }

    #[test]
    fn test_async_handler_receives_change() {
        let seen = Rc::new(RefCell::new(None));
        let s = seen.clone();
        let handler = ChangeHandler::new_async(move |change: ParameterChange<i32>| {
            let s = s.clone();
            async move {
                *s.borrow_mut() = Some((change.old_value, change.new_value));
                Ok::<(), BoxError>(())
            }
        });

        block_on(handler.invoke(ParameterChange {
            parameter_name: "Value".into(),
            old_value: 3,
            new_value: 4,
        }))
        .unwrap();
        assert_eq!(*seen.borrow(), Some((3, 4)));
    }
}
