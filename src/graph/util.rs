//! Step-oriented views of a pipeline graph.

use super::{NodeKey, PipelineGraph, RETURN_SLOT};
use crate::codegen::GenerationError;

/// Node keys grouped by step, in ascending step order.
pub fn group_nodes_by_step(graph: &PipelineGraph) -> Vec<Vec<NodeKey>> {
    let mut groups: Vec<Vec<NodeKey>> = Vec::new();
    for key in graph.keys() {
        match groups.last_mut() {
            Some(group) if group[0].step == key.step => group.push(key.clone()),
            _ => groups.push(vec![key.clone()]),
        }
    }
    groups
}

/// Highest step index plus one, or 0 for an empty graph.
pub fn num_steps(graph: &PipelineGraph) -> usize {
    graph.keys().map(|key| key.step + 1).max().unwrap_or(0)
}

/// `"return"` or `"return.<field>"`.
pub fn is_return_slot(slot: &str) -> bool {
    slot == RETURN_SLOT
        || slot
            .strip_prefix(RETURN_SLOT)
            .is_some_and(|rest| rest.starts_with('.'))
}

/// Split one step's nodes into `(parameters, returns)`.
pub fn split_parameters_from_returns(step: &[NodeKey]) -> (Vec<NodeKey>, Vec<NodeKey>) {
    step.iter().cloned().partition(|key| !is_return_slot(&key.slot))
}

/// `(parameters, returns)` of one step; negative indices count from the end.
///
/// When the first parameter carries a `position`, parameters are sorted by
/// position and the positions must be exactly `0..n`.
pub fn get_step(graph: &PipelineGraph, index: isize) -> Result<(Vec<NodeKey>, Vec<NodeKey>), GenerationError> {
    let step = if index < 0 {
        let resolved = num_steps(graph) as isize + index;
        if resolved < 0 {
            return Ok((Vec::new(), Vec::new()));
        }
        resolved as usize
    } else {
        index as usize
    };

    let nodes: Vec<NodeKey> = graph.keys().filter(|key| key.step == step).cloned().collect();
    let (mut params, returns) = split_parameters_from_returns(&nodes);

    let position = |key: &NodeKey| graph.node(key).and_then(|attrs| attrs.position);
    if params.first().and_then(position).is_some() {
        params.sort_by_key(|key| position(key).unwrap_or(usize::MAX));
        let found: Vec<Option<usize>> = params.iter().map(position).collect();
        if found.iter().enumerate().any(|(i, p)| *p != Some(i)) {
            return Err(GenerationError::InvalidPositions { step, found });
        }
    }

    Ok((params, returns))
}
