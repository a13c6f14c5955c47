//! Validation error types.
//!
//! Every variant names the node key or edge at fault so a caller can point
//! at the exact slot that needs fixing.

use super::NodeKey;
use crate::types::{DataType, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Pipeline graph has no nodes")]
    EmptyGraph,

    #[error("Node {node} is at an input/output step and must not name an operation")]
    StepNaming { node: NodeKey },

    #[error("Node {node} names an operation that is not registered")]
    UnknownOperation { node: NodeKey },

    #[error("Node {node} has datatype {found} but its operation declares {expected}")]
    TypeMismatch {
        node: NodeKey,
        expected: DataType,
        found: DataType,
    },

    #[error("Node {node} names a return field the operation does not produce")]
    UnknownSlot { node: NodeKey },

    #[error("Input/output node {node} has no datatype")]
    MissingDatatype { node: NodeKey },

    #[error("Step {step} mixes operations '{first}' and '{other}'")]
    MixedStep {
        step: usize,
        first: String,
        other: String,
    },

    #[error("Step {step} ('{operation}') has parameter slots {found:?} but the operation declares {expected:?}")]
    IncompleteStep {
        step: usize,
        operation: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Fixed value {value} on node {node} does not match datatype {expected}")]
    FixedValueType {
        node: NodeKey,
        value: Value,
        expected: DataType,
    },

    #[error("Steps must be contiguous from 0, found steps {found:?}")]
    SkippedStep { found: Vec<usize> },

    #[error("Edge {from} -> {to} does not go forward in step order")]
    BackwardEdge { from: NodeKey, to: NodeKey },

    #[error("Node {node} needs exactly one inbound connection, found {found}")]
    MissingConnection { node: NodeKey, found: usize },

    #[error("Edge {from} -> {to} connects {from_type} to {to_type}")]
    EdgeTypeMismatch {
        from: NodeKey,
        to: NodeKey,
        from_type: DataType,
        to_type: DataType,
    },
}

impl ValidationError {
    /// The node keys a UI should highlight for this error.
    pub fn offending_nodes(&self) -> Vec<&NodeKey> {
        match self {
            ValidationError::StepNaming { node }
            | ValidationError::UnknownOperation { node }
            | ValidationError::TypeMismatch { node, .. }
            | ValidationError::UnknownSlot { node }
            | ValidationError::MissingDatatype { node }
            | ValidationError::FixedValueType { node, .. }
            | ValidationError::MissingConnection { node, .. } => vec![node],
            ValidationError::BackwardEdge { from, to } | ValidationError::EdgeTypeMismatch { from, to, .. } => {
                vec![from, to]
            }
            ValidationError::EmptyGraph
            | ValidationError::MixedStep { .. }
            | ValidationError::IncompleteStep { .. }
            | ValidationError::SkippedStep { .. } => Vec::new(),
        }
    }

    /// Whether this is one of the type-compatibility failures.
    pub fn is_type_mismatch(&self) -> bool {
        matches!(
            self,
            ValidationError::TypeMismatch { .. }
                | ValidationError::FixedValueType { .. }
                | ValidationError::EdgeTypeMismatch { .. }
        )
    }
}

pub type ValidationResult<T> = std::result::Result<T, ValidationError>;
