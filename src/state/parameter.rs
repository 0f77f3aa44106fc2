//! Parameter State - change detection and notification for one parameter.
//!
//! A `ParameterState` mirrors one externally supplied input of a component.
//! It remembers the last committed value, decides through its comparer
//! whether an incoming value is a real change, and runs the notification
//! protocol:
//!
//! ```text
//! Idle ──set_value──▶ Detecting ──not equal──▶ Notifying ──commit──▶ Idle
//!                         │
//!                         └──equal──▶ Idle (no callbacks)
//! ```
//!
//! [`ChangeTiming`] decides whether the local change handler runs before
//! the owner's event callback is awaited or after it completes.
//!
//! Notifications for the same parameter never overlap. A `set_value` that
//! arrives while one is in flight (typically from inside the event callback)
//! is queued and processed, in order, once the in-flight one has committed.
//!
//! # Example
//!
//! ```ignore
//! let state: ParameterState<bool> = scope
//!     .register_parameter("Value")
//!     .with_parameter(move || props.borrow().value)
//!     .with_event_callback(move || props.borrow().value_changed.clone())
//!     .with_change_handler(|change| println!("{} -> {}", change.old_value, change.new_value))
//!     .into();
//! scope.dispose()?;
//!
//! state.set_value(true, ChangeTiming::Immediate).await?;
//! ```

use std::any::Any;
use std::cell::{Cell, OnceCell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};
use tracing::{debug, trace, warn};

use super::comparer::Comparer;
use super::metadata::ParameterMetadata;
use crate::error::ParameterError;
use crate::primitives::{ChangeHandler, EventCallback, ParameterChange, ValueSource};

// =============================================================================
// Types
// =============================================================================

/// Order of the local change handler relative to the owner's event callback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ChangeTiming {
    /// Run the change handler, then await the event callback.
    #[default]
    Immediate,
    /// Await the event callback, then run the change handler.
    AfterEventCallback,
}

/// Notification phase of a parameter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NotifyPhase {
    #[default]
    Idle,
    Detecting,
    Notifying,
}

/// Result of a `set_value` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetOutcome {
    /// The comparer found no change; nothing fired.
    Unchanged,
    /// At least one change was notified and committed.
    Changed,
    /// Another notification was in flight; the value was queued behind it.
    Queued,
}

pub(crate) type CallbackAccessor<T> = Rc<dyn Fn() -> EventCallback<T>>;

/// Everything a registration supplies, validated at scope disposal.
pub(crate) struct ParameterConfig<T: Clone + PartialEq + 'static> {
    pub(crate) metadata: ParameterMetadata,
    pub(crate) source: ValueSource<T>,
    pub(crate) comparer: Comparer<T>,
    pub(crate) event_callback: Option<CallbackAccessor<T>>,
    pub(crate) change_handler: Option<ChangeHandler<T>>,
}

enum Step<T> {
    /// Component-originated change: full protocol with event callback.
    Set { value: T, timing: ChangeTiming },
    /// Host-originated change that arrived mid-notification: handler only.
    Host { value: T },
    /// Host change already detected and stored in `value`.
    Staged { run_handler: bool },
}

struct ParameterCore<T: Clone + PartialEq + 'static> {
    config: ParameterConfig<T>,
    value: RefCell<T>,
    last_value: RefCell<T>,
    phase: Cell<NotifyPhase>,
    staged: Cell<bool>,
    pending: RefCell<VecDeque<Step<T>>>,
}

struct ParameterSlot<T: Clone + PartialEq + 'static> {
    name: String,
    core: OnceCell<ParameterCore<T>>,
}

/// Handle to one tracked parameter.
///
/// Cloning the handle shares the same state. The handle is created when the
/// parameter is registered and becomes usable once its
/// [`RegistrationScope`](crate::RegistrationScope) is disposed; before that
/// every accessor fails with [`ParameterError::NotAttached`].
pub struct ParameterState<T: Clone + PartialEq + 'static> {
    slot: Rc<ParameterSlot<T>>,
}

impl<T: Clone + PartialEq + 'static> Clone for ParameterState<T> {
    fn clone(&self) -> Self {
        Self { slot: self.slot.clone() }
    }
}

impl<T: Clone + PartialEq + fmt::Debug + 'static> fmt::Debug for ParameterState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ParameterState");
        s.field("name", &self.slot.name);
        match self.slot.core.get() {
            Some(core) => s
                .field("value", &*core.value.borrow())
                .field("last_value", &*core.last_value.borrow())
                .field("phase", &core.phase.get()),
            None => s.field("attached", &false),
        };
        s.finish()
    }
}

// =============================================================================
// Public API
// =============================================================================

impl<T: Clone + PartialEq + 'static> ParameterState<T> {
    pub(crate) fn detached(name: impl Into<String>) -> Self {
        Self {
            slot: Rc::new(ParameterSlot {
                name: name.into(),
                core: OnceCell::new(),
            }),
        }
    }

    /// Install the validated configuration and seed both values from the source.
    pub(crate) fn attach(&self, config: ParameterConfig<T>) -> Result<(), ParameterError> {
        let initial = config.source.current();
        let core = ParameterCore {
            config,
            value: RefCell::new(initial.clone()),
            last_value: RefCell::new(initial),
            phase: Cell::new(NotifyPhase::Idle),
            staged: Cell::new(false),
            pending: RefCell::new(VecDeque::new()),
        };
        self.slot
            .core
            .set(core)
            .map_err(|_| ParameterError::DuplicateParameter(self.slot.name.clone()))
    }

    pub fn name(&self) -> &str {
        &self.slot.name
    }

    pub fn is_attached(&self) -> bool {
        self.slot.core.get().is_some()
    }

    /// Current value (the most recent one supplied, committed or not).
    pub fn value(&self) -> Result<T, ParameterError> {
        Ok(self.core()?.value.borrow().clone())
    }

    /// Value at the most recent completed notification.
    pub fn last_value(&self) -> Result<T, ParameterError> {
        Ok(self.core()?.last_value.borrow().clone())
    }

    pub fn metadata(&self) -> Result<ParameterMetadata, ParameterError> {
        Ok(self.core()?.config.metadata.clone())
    }

    pub fn phase(&self) -> NotifyPhase {
        self.slot
            .core
            .get()
            .map(|core| core.phase.get())
            .unwrap_or_default()
    }

    /// Whether the owner supplied an event callback with a delegate.
    pub fn has_event_callback(&self) -> bool {
        self.slot
            .core
            .get()
            .map(|core| core.event_callback().has_delegate())
            .unwrap_or(false)
    }

    pub fn has_change_handler(&self) -> bool {
        self.slot
            .core
            .get()
            .is_some_and(|core| core.config.change_handler.is_some())
    }

    /// Whether `value` moved ahead of `last_value` without committing,
    /// which happens when a notification failed.
    pub fn has_uncommitted_change(&self) -> Result<bool, ParameterError> {
        let core = self.core()?;
        let value = core.value.borrow().clone();
        let last = core.last_value.borrow().clone();
        Ok(!core.config.comparer.equals_for(self.name(), &last, &value)?)
    }

    /// Supply a new value and notify if it differs from the last committed one.
    ///
    /// Returns [`SetOutcome::Queued`] without waiting when a notification for
    /// this parameter is already in flight; the queued value is processed by
    /// the in-flight call after it commits, and any failure is reported there.
    pub async fn set_value(&self, value: T, timing: ChangeTiming) -> Result<SetOutcome, ParameterError> {
        let core = self.core()?;
        if core.phase.get() != NotifyPhase::Idle {
            debug!(parameter = %self.name(), ?timing, "notification in flight, queueing value");
            core.pending.borrow_mut().push_back(Step::Set { value, timing });
            return Ok(SetOutcome::Queued);
        }
        let (_, outcome) = self.run_exclusive(core, Step::Set { value, timing }).await?;
        Ok(outcome)
    }

    // =========================================================================
    // Host-driven changes
    // =========================================================================

    /// Read the host's live value and stage it when it differs from
    /// `last_value`. Returns whether a change was staged.
    ///
    /// While a notification is in flight the value is queued behind it
    /// instead, and `false` is returned.
    pub(crate) fn detect_host_change(&self) -> Result<bool, ParameterError> {
        let core = self.core()?;
        let incoming = core.config.source.current();

        if core.phase.get() != NotifyPhase::Idle {
            debug!(parameter = %self.name(), "host value arrived mid-notification, queueing");
            core.pending.borrow_mut().push_back(Step::Host { value: incoming });
            return Ok(false);
        }

        let unchanged = {
            let last = core.last_value.borrow();
            core.config.comparer.equals_for(self.name(), &last, &incoming)?
        };
        if unchanged {
            return Ok(false);
        }

        *core.value.borrow_mut() = incoming;
        core.staged.set(true);
        Ok(true)
    }

    /// Commit a change staged by [`detect_host_change`](Self::detect_host_change),
    /// running the change handler when `run_handler` is set.
    ///
    /// Returns whether the handler ran. A staged value that a `set_value`
    /// superseded in the meantime is not committed again.
    pub(crate) async fn commit_host_change(&self, run_handler: bool) -> Result<bool, ParameterError> {
        let core = self.core()?;
        if !core.staged.replace(false) {
            trace!(parameter = %self.name(), "no staged host change to commit");
            return Ok(false);
        }
        let (first, _) = self.run_exclusive(core, Step::Staged { run_handler }).await?;
        Ok(run_handler && first == SetOutcome::Changed)
    }

    /// Drop a staged host change, rolling `value` back to `last_value`.
    pub(crate) fn discard_host_change(&self) {
        if let Some(core) = self.slot.core.get() {
            if core.staged.replace(false) {
                let last = core.last_value.borrow().clone();
                *core.value.borrow_mut() = last;
            }
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn core(&self) -> Result<&ParameterCore<T>, ParameterError> {
        self.slot
            .core
            .get()
            .ok_or_else(|| ParameterError::NotAttached(self.slot.name.clone()))
    }

    /// Process `first`, then everything queued behind it, as one exclusive run.
    ///
    /// Returns the outcome of `first` and of the whole run.
    async fn run_exclusive(
        &self,
        core: &ParameterCore<T>,
        first: Step<T>,
    ) -> Result<(SetOutcome, SetOutcome), ParameterError> {
        let _guard = NotifyGuard { core, name: self.name() };

        let first = core.process(self.name(), first).await?;
        let mut outcome = first;
        while let Some(next) = core.pop_pending() {
            if core.process(self.name(), next).await? == SetOutcome::Changed {
                outcome = SetOutcome::Changed;
            }
        }
        Ok((first, outcome))
    }
}

impl ParameterState<bool> {
    /// Flip the value and notify.
    pub async fn toggle(&self, timing: ChangeTiming) -> Result<SetOutcome, ParameterError> {
        let current = self.value()?;
        self.set_value(!current, timing).await
    }
}

// =============================================================================
// Notification Protocol
// =============================================================================

impl<T: Clone + PartialEq + 'static> ParameterCore<T> {
    fn event_callback(&self) -> EventCallback<T> {
        self.config
            .event_callback
            .as_ref()
            .map(|accessor| accessor())
            .unwrap_or_default()
    }

    fn pop_pending(&self) -> Option<Step<T>> {
        self.pending.borrow_mut().pop_front()
    }

    async fn process(&self, name: &str, step: Step<T>) -> Result<SetOutcome, ParameterError> {
        match step {
            Step::Set { value, timing } => self.notify(name, value, Some(timing)).await,
            Step::Host { value } => self.notify(name, value, None).await,
            Step::Staged { run_handler } => {
                self.phase.set(NotifyPhase::Detecting);
                let change = ParameterChange {
                    parameter_name: name.to_string(),
                    old_value: self.last_value.borrow().clone(),
                    new_value: self.value.borrow().clone(),
                };
                if self.config.comparer.equals_for(name, &change.old_value, &change.new_value)? {
                    trace!(parameter = %name, "staged host value already committed");
                    return Ok(SetOutcome::Unchanged);
                }
                self.phase.set(NotifyPhase::Notifying);
                let new_value = change.new_value.clone();
                if run_handler {
                    self.run_handler(name, change).await?;
                }
                *self.last_value.borrow_mut() = new_value;
                debug!(parameter = %name, run_handler, "host change committed");
                Ok(SetOutcome::Changed)
            }
        }
    }

    /// Compare, store, notify, commit. `timing == None` is a host change:
    /// the owner already knows the value, so only the handler runs.
    async fn notify(&self, name: &str, new_value: T, timing: Option<ChangeTiming>) -> Result<SetOutcome, ParameterError> {
        self.phase.set(NotifyPhase::Detecting);

        let unchanged = {
            let last = self.last_value.borrow();
            self.config.comparer.equals_for(name, &last, &new_value)?
        };
        if unchanged {
            trace!(parameter = %name, "value unchanged, nothing to notify");
            return Ok(SetOutcome::Unchanged);
        }

        // Supersedes any host value still waiting for its commit
        self.staged.set(false);
        let old_value = self.last_value.borrow().clone();
        *self.value.borrow_mut() = new_value.clone();
        self.phase.set(NotifyPhase::Notifying);

        let change = ParameterChange {
            parameter_name: name.to_string(),
            old_value,
            new_value: new_value.clone(),
        };

        match timing {
            Some(ChangeTiming::Immediate) => {
                self.run_handler(name, change).await?;
                self.run_callback(name, new_value.clone()).await?;
            }
            Some(ChangeTiming::AfterEventCallback) => {
                self.run_callback(name, new_value.clone()).await?;
                self.run_handler(name, change).await?;
            }
            None => self.run_handler(name, change).await?,
        }

        *self.last_value.borrow_mut() = new_value;
        debug!(parameter = %name, ?timing, "parameter change committed");
        Ok(SetOutcome::Changed)
    }

    async fn run_handler(&self, name: &str, change: ParameterChange<T>) -> Result<(), ParameterError> {
        let Some(handler) = self.config.change_handler.clone() else {
            return Ok(());
        };
        handler.invoke(change).await.map_err(|source| {
            warn!(parameter = %name, error = %source, "change handler failed");
            ParameterError::ChangeHandler {
                parameter: name.to_string(),
                source,
            }
        })
    }

    async fn run_callback(&self, name: &str, value: T) -> Result<(), ParameterError> {
        let callback = self.event_callback();
        if !callback.has_delegate() {
            return Ok(());
        }
        callback.invoke(value).await.map_err(|source| {
            warn!(parameter = %name, error = %source, "event callback failed");
            ParameterError::EventCallback {
                parameter: name.to_string(),
                source,
            }
        })
    }
}

/// Returns the parameter to `Idle` when a run ends, however it ends.
///
/// Values still queued at that point belong to a failed or cancelled run
/// and are discarded.
struct NotifyGuard<'a, T: Clone + PartialEq + 'static> {
    core: &'a ParameterCore<T>,
    name: &'a str,
}

impl<T: Clone + PartialEq + 'static> Drop for NotifyGuard<'_, T> {
    fn drop(&mut self) {
        self.core.phase.set(NotifyPhase::Idle);
        let dropped = {
            let mut pending = self.core.pending.borrow_mut();
            let dropped = pending.len();
            pending.clear();
            dropped
        };
        if dropped > 0 {
            warn!(parameter = %self.name, dropped, "discarding queued values after failed notification");
        }
    }
}

// =============================================================================
// Type-erased entry (for ParameterContainer)
// =============================================================================

/// Object-safe view of a `ParameterState<T>` for the container's batch pass.
pub(crate) trait ParameterEntry {
    fn name(&self) -> &str;
    fn handler_group(&self) -> Option<String>;
    fn has_change_handler(&self) -> bool;
    fn detect_host_change(&self) -> Result<bool, ParameterError>;
    fn commit_host_change(&self, run_handler: bool) -> LocalBoxFuture<'_, Result<bool, ParameterError>>;
    fn discard_host_change(&self);
    fn as_any(&self) -> &dyn Any;
}

impl<T: Clone + PartialEq + 'static> ParameterEntry for ParameterState<T> {
    fn name(&self) -> &str {
        ParameterState::name(self)
    }

    fn handler_group(&self) -> Option<String> {
        self.slot
            .core
            .get()
            .and_then(|core| core.config.metadata.handler_group().map(str::to_string))
    }

    fn has_change_handler(&self) -> bool {
        ParameterState::has_change_handler(self)
    }

    fn detect_host_change(&self) -> Result<bool, ParameterError> {
        ParameterState::detect_host_change(self)
    }

    fn commit_host_change(&self, run_handler: bool) -> LocalBoxFuture<'_, Result<bool, ParameterError>> {
        ParameterState::commit_host_change(self, run_handler).boxed_local()
    }

    fn discard_host_change(&self) {
        ParameterState::discard_host_change(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Tests
// =============================================================================
