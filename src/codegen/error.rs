//! Code generation error types.

use crate::graph::NodeKey;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("'{0}' is not a valid identifier")]
    InvalidIdentifier(String),

    #[error("'{0}' clashes with a name the generated code uses for itself")]
    ReservedName(String),

    #[error("Step {step} expects positions 0..n on its inputs/outputs, found {found:?}")]
    InvalidPositions {
        step: usize,
        found: Vec<Option<usize>>,
    },

    #[error("A pipeline needs at least an input and an output step, found {0} step(s)")]
    TooFewSteps(usize),

    #[error("Node {0} has neither a fixed value nor a producer")]
    MissingProducer(NodeKey),

    #[error("Operation '{0}' is not registered")]
    UnknownOperation(String),

    #[error("Refusing to overwrite existing pipeline unit {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Icon file not found: {}", .0.display())]
    MissingIcon(PathBuf),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type GenerationResult<T> = std::result::Result<T, GenerationError>;
