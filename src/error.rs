//! Error handling for the pipeline creator
//!
//! Each subsystem owns a focused error enum (registration, validation,
//! generation, scene). [`CreatorError`] wraps them so callers that drive the
//! whole flow, like [`create_pipeline`](crate::codegen::create_pipeline), can
//! use a single `?`-friendly [`Result`] alias.

use crate::codegen::GenerationError;
use crate::graph::ValidationError;
use crate::registry::RegistrationError;
use crate::scene::SceneError;
use thiserror::Error;

/// Main error type for pipeline creator operations
#[derive(Error, Debug)]
pub enum CreatorError {
    /// An operation could not be registered
    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    /// A pipeline graph failed validation
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Source text could not be generated or written
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    /// A managed-resource operation failed
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    /// Errors related to Rhai script compilation or execution
    #[error("Script error: {0}")]
    Script(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<CreatorError>,
    },
}

impl CreatorError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        CreatorError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a script error from a Rhai error
    pub fn from_rhai_error(err: Box<rhai::EvalAltResult>) -> Self {
        CreatorError::Script(err.to_string())
    }

    /// Create a script error from a Rhai compile error
    pub fn from_parse_error(err: rhai::ParseError) -> Self {
        CreatorError::Script(format!("Compilation error: {}", err))
    }

    /// The innermost error, skipping any context layers
    pub fn root(&self) -> &CreatorError {
        match self {
            CreatorError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type alias for pipeline creator operations
pub type Result<T> = std::result::Result<T, CreatorError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, Box<rhai::EvalAltResult>> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| CreatorError::from_rhai_error(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| CreatorError::from_rhai_error(e).with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, rhai::ParseError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| CreatorError::from_parse_error(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| CreatorError::from_parse_error(e).with_context(f()))
    }
}
