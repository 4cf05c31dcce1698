//! Unified error type.

use thiserror::Error as ThisError;

/// The error type returned by keel's fallible operations.
///
/// Registration failures surface at startup from the registry calls.
/// Everything raised while a request is being dispatched is contained by
/// the pipeline and turned into a `500` whose body is this type's
/// `Display` text.
#[derive(Debug, ThisError)]
pub enum Error {
    // ── Registration ──────────────────────────────────────────────────────────
    #[error("The controller {0} is already registered.")]
    DuplicateController(String),

    #[error("The action '{controller}.{action}' was already registered.")]
    DuplicateAction { controller: String, action: String },

    #[error("The controller {0} is not registered.")]
    ControllerNotFound(String),

    #[error("The action '{controller}.{action}' is not registered.")]
    ActionNotFound { controller: String, action: String },

    #[error("Can't create an action url without an action type.")]
    MissingActionType,

    // ── Resolution ────────────────────────────────────────────────────────────
    #[error("The controller '{controller}' could not be instantiated: {reason}")]
    ControllerInstantiation { controller: String, reason: String },

    #[error("The method or action '{action}' does not exist in '{controller}'.")]
    ActionMethodNotFound { controller: String, action: String },

    #[error("No provider registered for type '{0}'.")]
    DependencyNotRegistered(&'static str),

    #[error("The http context can't be changed.")]
    ContextAlreadyBound,

    // ── Binding ───────────────────────────────────────────────────────────────
    #[error(
        "The parameter '{name}' is of type '{type_name}'. Only Number, String, Date or Boolean are allowed for route or query string parameters."
    )]
    UnsupportedParameterType { name: String, type_name: String },

    #[error("Argument #{index} is not a {expected}.")]
    ArgumentMismatch { index: usize, expected: &'static str },

    #[error("The request body is not valid JSON: {0}")]
    InvalidBody(serde_json::Error),

    // ── Execution ─────────────────────────────────────────────────────────────
    /// A failure raised by application code: an action or a filter hook.
    #[error("{0}")]
    Action(String),

    /// An action or filter hook panicked; carries the panic message.
    #[error("{0}")]
    Panic(String),

    // ── Infrastructure ────────────────────────────────────────────────────────
    #[error("failed to serialise the action result: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("configuration: {0}")]
    Config(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a business-logic failure carrying `message` as the
    /// response body.
    pub fn action(message: impl Into<String>) -> Self {
        Self::Action(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_error_displays_bare_message() {
        assert_eq!(Error::action("This is an error").to_string(), "This is an error");
    }

    #[test]
    fn unsupported_parameter_names_parameter_and_type() {
        let err = Error::UnsupportedParameterType {
            name: "param".into(),
            type_name: "Object".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'param'"));
        assert!(msg.contains("'Object'"));
    }
}
