//! Parameter Container - the set of parameters a component tracks.
//!
//! Each component owns one container. Registration scopes attach
//! parameters to it, and the host calls
//! [`on_parameters_set`](ParameterContainer::on_parameters_set) after its
//! owner supplies a fresh set of parameter values. That pass detects which
//! parameters really changed and runs their change handlers, invoking a
//! handler shared by several changed parameters only once.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use tracing::debug;

use super::parameter::{ParameterEntry, ParameterState};
use super::scope::RegistrationScope;
use crate::error::ParameterError;

/// Ordered set of attached parameters, owned by one component.
#[derive(Default)]
pub struct ParameterContainer {
    entries: RefCell<Vec<Rc<dyn ParameterEntry>>>,
}

impl ParameterContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a registration scope for this container.
    pub fn create_register_scope(&self) -> RegistrationScope<'_> {
        RegistrationScope::new(self)
    }

    /// Run `register` inside a scope and dispose it.
    pub fn register<R>(&self, register: impl FnOnce(&RegistrationScope<'_>) -> R) -> Result<R, ParameterError> {
        let scope = self.create_register_scope();
        let result = register(&scope);
        scope.dispose()?;
        Ok(result)
    }

    pub(crate) fn attach_entry(&self, entry: Rc<dyn ParameterEntry>) -> Result<(), ParameterError> {
        if self.contains(entry.name()) {
            return Err(ParameterError::DuplicateParameter(entry.name().to_string()));
        }
        debug!(parameter = %entry.name(), "parameter attached");
        self.entries.borrow_mut().push(entry);
        Ok(())
    }

    /// Typed handle to parameter `name`, if it is attached with type `T`.
    pub fn get<T: Clone + PartialEq + 'static>(&self, name: &str) -> Option<ParameterState<T>> {
        self.entries
            .borrow()
            .iter()
            .find(|entry| entry.name() == name)
            .and_then(|entry| entry.as_any().downcast_ref::<ParameterState<T>>().cloned())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.borrow().iter().any(|entry| entry.name() == name)
    }

    /// Parameter names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .map(|entry| entry.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Pick up the host's current parameter values.
    ///
    /// Every parameter whose live value differs from its last committed
    /// value is committed, and its change handler runs, in registration
    /// order. Parameters whose handlers share a
    /// [`handler_group`](crate::ParameterMetadata::handler_group) run that
    /// handler once, for the first of them that changed. Event callbacks
    /// never fire here: the owner already knows the values it supplied.
    ///
    /// A staged value that the component overwrote through `set_value`
    /// before its turn is skipped; the next pass picks the host value up
    /// again if it still differs.
    ///
    /// Returns the number of change handlers invoked.
    pub async fn on_parameters_set(&self) -> Result<usize, ParameterError> {
        let entries: Vec<_> = self.entries.borrow().clone();

        let mut changed = Vec::new();
        for entry in &entries {
            match entry.detect_host_change() {
                Ok(true) => changed.push(entry.clone()),
                Ok(false) => {}
                Err(err) => {
                    discard_staged(&changed);
                    return Err(err);
                }
            }
        }

        let mut seen_groups = HashSet::new();
        let mut invoked = 0;
        for (i, entry) in changed.iter().enumerate() {
            let group = entry.handler_group();
            let run_handler = entry.has_change_handler()
                && group.as_ref().is_none_or(|group| !seen_groups.contains(group));

            match entry.commit_host_change(run_handler).await {
                Ok(true) => {
                    invoked += 1;
                    seen_groups.extend(group);
                }
                Ok(false) => {}
                Err(err) => {
                    discard_staged(&changed[i + 1..]);
                    return Err(err);
                }
            }
        }

        debug!(changed = changed.len(), invoked, "parameters set");
        Ok(invoked)
    }
}

fn discard_staged(entries: &[Rc<dyn ParameterEntry>]) {
    for entry in entries {
        entry.discard_host_change();
    }
}

/// A component that tracks its parameters through a [`ParameterContainer`].
pub trait ParameterHost {
    fn parameters(&self) -> &ParameterContainer;

    fn create_register_scope(&self) -> RegistrationScope<'_> {
        self.parameters().create_register_scope()
    }
}

// =============================================================================
// Tests
// =============================================================================
