//! Pipeline graph validation.
//!
//! Checks run in a fixed order and the first failure is returned:
//!
//! 1. The graph has nodes.
//! 2. Input/output steps name no operation; interior steps name registered ones.
//! 3. Interior datatypes are derived from the registry (caller-supplied ones must agree).
//! 4. Every interior step uses one operation and wires exactly its parameters.
//! 5. Fixed values conform to their slot's datatype.
//! 6. Step indices are contiguous from 0.
//! 7. Every edge goes strictly forward in step order.
//! 8. Every wired slot has exactly one producer.
//! 9. Every edge connects compatible datatypes.
//!
//! Datatypes must be in place before any type-based check, and the structural
//! checks come before anything that looks operations up in the registry.

use super::util::{group_nodes_by_step, num_steps};
use super::{NodeKey, PipelineGraph, ValidatedPipeline, ValidationError, ValidationResult, RETURN_SLOT};
use crate::registry::Registry;
use crate::types::DataType;
use std::collections::BTreeSet;

/// Validate `graph` against `registry`
///
/// The caller's graph is left untouched; the returned [`ValidatedPipeline`]
/// holds a copy with every interior datatype filled in.
pub fn validate_pipeline(graph: &PipelineGraph, registry: &Registry) -> ValidationResult<ValidatedPipeline> {
    let mut graph = graph.clone();

    check_not_empty(&graph)?;
    check_step_naming(&graph, registry)?;
    fill_in_datatypes(&mut graph, registry)?;
    check_steps_complete(&graph, registry)?;
    check_fixed_values(&graph)?;
    check_no_skipped_steps(&graph)?;
    check_no_backward_edges(&graph)?;
    check_single_producer(&graph)?;
    check_edge_types(&graph)?;

    tracing::debug!(
        "Validated pipeline with {} nodes, {} edges and {} steps",
        graph.len(),
        graph.edges().len(),
        num_steps(&graph)
    );
    Ok(ValidatedPipeline::new(graph))
}

fn check_not_empty(graph: &PipelineGraph) -> ValidationResult<()> {
    tracing::trace!("Checking the graph is not empty");
    if graph.is_empty() {
        return Err(ValidationError::EmptyGraph);
    }
    Ok(())
}

fn check_step_naming(graph: &PipelineGraph, registry: &Registry) -> ValidationResult<()> {
    tracing::trace!("Checking step operation names");
    let last_step = num_steps(graph).saturating_sub(1);
    for key in graph.keys() {
        let at_boundary = key.step == 0 || key.step == last_step;
        match &key.operation {
            Some(_) if at_boundary => return Err(ValidationError::StepNaming { node: key.clone() }),
            None if !at_boundary => return Err(ValidationError::UnknownOperation { node: key.clone() }),
            Some(operation) if !registry.is_registered(operation) => {
                return Err(ValidationError::UnknownOperation { node: key.clone() })
            }
            _ => {}
        }
    }
    Ok(())
}

/// Derive the registry datatype of an interior node
///
/// `Ok(None)` for a parameter slot the operation does not declare; the
/// completeness check reports those.
fn registry_datatype(key: &NodeKey, registry: &Registry) -> ValidationResult<Option<DataType>> {
    let Some(info) = key.operation.as_deref().and_then(|op| registry.get(op)) else {
        return Err(ValidationError::UnknownOperation { node: key.clone() });
    };

    if key.slot == RETURN_SLOT {
        return Ok(Some(info.return_type().unannotated().clone()));
    }
    if key.is_return() {
        return key
            .return_field()
            .and_then(|field| info.return_type().field_path(field))
            .map(|datatype| Some(datatype.unannotated().clone()))
            .ok_or_else(|| ValidationError::UnknownSlot { node: key.clone() });
    }
    Ok(info.parameter(&key.slot).map(|datatype| datatype.unannotated().clone()))
}

fn fill_in_datatypes(graph: &mut PipelineGraph, registry: &Registry) -> ValidationResult<()> {
    tracing::trace!("Filling in datatypes from the registry");
    for (key, attrs) in graph.nodes_mut() {
        if key.is_boundary() {
            continue;
        }
        let Some(expected) = registry_datatype(key, registry)? else {
            continue;
        };
        if let Some(found) = &attrs.datatype {
            if *found.unannotated() != expected {
                return Err(ValidationError::TypeMismatch {
                    node: key.clone(),
                    expected,
                    found: found.clone(),
                });
            }
        }
        attrs.datatype = Some(expected);
    }

    if let Some((key, _)) = graph
        .nodes()
        .find(|(key, attrs)| key.is_boundary() && attrs.datatype.is_none())
    {
        return Err(ValidationError::MissingDatatype { node: key.clone() });
    }
    Ok(())
}

fn check_steps_complete(graph: &PipelineGraph, registry: &Registry) -> ValidationResult<()> {
    tracing::trace!("Checking every step is complete");
    for group in group_nodes_by_step(graph) {
        let first = &group[0];
        if let Some(other) = group.iter().find(|key| key.operation != first.operation) {
            return Err(ValidationError::MixedStep {
                step: first.step,
                first: first.operation.clone().unwrap_or_else(|| "None".to_string()),
                other: other.operation.clone().unwrap_or_else(|| "None".to_string()),
            });
        }

        let Some(operation) = &first.operation else {
            continue;
        };
        let Some(info) = registry.get(operation) else {
            return Err(ValidationError::UnknownOperation { node: first.clone() });
        };

        let mut found: Vec<String> = group
            .iter()
            .filter(|key| !key.is_return())
            .map(|key| key.slot.clone())
            .collect();
        found.sort();
        let mut expected: Vec<String> = info.parameters().iter().map(|(name, _)| name.clone()).collect();
        expected.sort();

        if found != expected {
            return Err(ValidationError::IncompleteStep {
                step: first.step,
                operation: operation.clone(),
                expected,
                found,
            });
        }
    }
    Ok(())
}

fn check_fixed_values(graph: &PipelineGraph) -> ValidationResult<()> {
    tracing::trace!("Checking fixed values");
    for (key, attrs) in graph.nodes() {
        let (Some(value), Some(datatype)) = (&attrs.fixed_value, &attrs.datatype) else {
            continue;
        };
        if !value.conforms_to(datatype) {
            return Err(ValidationError::FixedValueType {
                node: key.clone(),
                value: value.clone(),
                expected: datatype.clone(),
            });
        }
    }
    Ok(())
}

fn check_no_skipped_steps(graph: &PipelineGraph) -> ValidationResult<()> {
    tracing::trace!("Checking for skipped steps");
    let steps: BTreeSet<usize> = graph.keys().map(|key| key.step).collect();
    if steps.iter().enumerate().any(|(i, step)| i != *step) {
        return Err(ValidationError::SkippedStep {
            found: steps.into_iter().collect(),
        });
    }
    Ok(())
}

fn check_no_backward_edges(graph: &PipelineGraph) -> ValidationResult<()> {
    tracing::trace!("Checking edge direction");
    for (from, to) in graph.edges() {
        if from.step >= to.step {
            return Err(ValidationError::BackwardEdge {
                from: from.clone(),
                to: to.clone(),
            });
        }
    }
    Ok(())
}

fn check_single_producer(graph: &PipelineGraph) -> ValidationResult<()> {
    tracing::trace!("Checking every wired slot has one producer");
    for (key, attrs) in graph.nodes() {
        if key.step == 0 || key.is_return() || attrs.fixed_value.is_some() {
            continue;
        }
        let found = graph.in_degree(key);
        if found != 1 {
            return Err(ValidationError::MissingConnection {
                node: key.clone(),
                found,
            });
        }
    }
    Ok(())
}

fn check_edge_types(graph: &PipelineGraph) -> ValidationResult<()> {
    tracing::trace!("Checking edge datatypes");
    for (from, to) in graph.edges() {
        let (Some(from_type), Some(to_type)) = (graph.datatype(from), graph.datatype(to)) else {
            // Every node has a datatype once fill-in and completeness pass
            continue;
        };
        if !to_type.accepts(from_type) {
            return Err(ValidationError::EdgeTypeMismatch {
                from: from.clone(),
                to: to.clone(),
                from_type: from_type.clone(),
                to_type: to_type.clone(),
            });
        }
    }
    Ok(())
}
