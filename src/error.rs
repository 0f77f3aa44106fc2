//! Error types for parameter registration and change notification.
//!
//! Every failure is local to one parameter. Configuration mistakes
//! (missing accessor, duplicate name, missing metadata) are reported
//! eagerly; failures raised by user code (comparers, event callbacks,
//! change handlers) are wrapped with the parameter name and returned to
//! whoever called `set_value` or `on_parameters_set`.

use thiserror::Error;

/// Boxed error returned by user-supplied callbacks and comparers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("parameter metadata is required")]
    MissingMetadata,

    #[error("parameter '{0}' was registered without a value accessor")]
    MissingValueAccessor(String),

    #[error("parameter '{0}' is registered more than once")]
    DuplicateParameter(String),

    #[error("parameter '{0}' is not attached yet (dispose its registration scope first)")]
    NotAttached(String),

    #[error("comparer for parameter '{parameter}' failed: {source}")]
    Comparer {
        parameter: String,
        #[source]
        source: BoxError,
    },

    #[error("event callback for parameter '{parameter}' failed: {source}")]
    EventCallback {
        parameter: String,
        #[source]
        source: BoxError,
    },

    #[error("change handler for parameter '{parameter}' failed: {source}")]
    ChangeHandler {
        parameter: String,
        #[source]
        source: BoxError,
    },
}

impl ParameterError {
    /// Name of the parameter the error belongs to, if any.
    pub fn parameter(&self) -> Option<&str> {
        match self {
            ParameterError::MissingMetadata => None,
            ParameterError::MissingValueAccessor(name)
            | ParameterError::DuplicateParameter(name)
            | ParameterError::NotAttached(name) => Some(name),
            ParameterError::Comparer { parameter, .. }
            | ParameterError::EventCallback { parameter, .. }
            | ParameterError::ChangeHandler { parameter, .. } => Some(parameter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_parameter_name_lookup() {
        assert_eq!(ParameterError::MissingMetadata.parameter(), None);
        assert_eq!(
            ParameterError::MissingValueAccessor("Value".into()).parameter(),
            Some("Value")
        );
        let err = ParameterError::EventCallback {
            parameter: "Checked".into(),
            source: "owner went away".into(),
        };
        assert_eq!(err.parameter(), Some("Checked"));
    }

    #[test]
    fn test_source_is_preserved() {
        let err = ParameterError::ChangeHandler {
            parameter: "Open".into(),
            source: "boom".into(),
        };
        assert_eq!(err.to_string(), "change handler for parameter 'Open' failed: boom");
        assert_eq!(err.source().map(|s| s.to_string()), Some("boom".to_string()));
    }
}
