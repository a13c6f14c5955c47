//! Registry-specific error types.

use crate::scene::SceneError;
use thiserror::Error;

/// Errors raised while registering an operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistrationError {
    #[error("An operation named '{0}' is already registered")]
    DuplicateName(String),

    #[error("Invalid signature for operation '{name}': {reason}")]
    Signature { name: String, reason: String },
}

/// Errors raised by an operation while it runs.
#[derive(Error, Debug)]
pub enum OperationError {
    #[error("Missing argument '{0}'")]
    MissingArgument(String),

    #[error("Argument '{name}' is not a {expected}")]
    ArgumentType { name: String, expected: String },

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Scene(#[from] SceneError),
}

pub type RegistrationResult<T> = std::result::Result<T, RegistrationError>;
