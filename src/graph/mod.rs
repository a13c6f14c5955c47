//! Pipeline graph model
//!
//! A [`PipelineGraph`] is the snapshot a UI produces for one user-composed
//! pipeline: nodes keyed by `(step, operation, slot)` and edges carrying data
//! from a producing slot to a consuming slot. It is built transiently, handed
//! to [`validate_pipeline`], and the resulting [`ValidatedPipeline`] is what
//! the code generators consume.
//!
//! # Layout
//!
//! ```text
//! step 0          step 1..N-2                     step N-1
//! (inputs)  -->   (op params) (op return[.f])  --> (outputs)
//! ```
//!
//! - Step 0 nodes are the overall inputs; their `position` fixes argument order.
//! - Interior steps hold one operation's parameter and return slots.
//! - Last-step nodes are the overall outputs; `position` fixes their order.

mod error;
mod key;
pub mod util;
mod validation;

pub use error::{ValidationError, ValidationResult};
pub use key::{NodeKey, RETURN_SLOT};
pub use validation::validate_pipeline;

use crate::types::{DataType, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Attributes carried by a graph node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeAttrs {
    /// Required on inputs/outputs, derived from the registry for interior nodes
    pub datatype: Option<DataType>,
    /// Literal used instead of an inbound connection
    pub fixed_value: Option<Value>,
    /// Argument/result order of overall inputs and outputs
    pub position: Option<usize>,
}

impl NodeAttrs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn typed(mut self, datatype: DataType) -> Self {
        self.datatype = Some(datatype);
        self
    }

    pub fn fixed(mut self, value: impl Into<Value>) -> Self {
        self.fixed_value = Some(value.into());
        self
    }

    pub fn at_position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }
}

/// Nodes and edges of one user-composed pipeline
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineGraph {
    nodes: BTreeMap<NodeKey, NodeAttrs>,
    edges: Vec<(NodeKey, NodeKey)>,
}

impl PipelineGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, replacing the attributes of an existing one
    pub fn add_node(&mut self, key: NodeKey, attrs: NodeAttrs) -> &mut NodeAttrs {
        match self.nodes.entry(key) {
            std::collections::btree_map::Entry::Occupied(mut entry) => {
                entry.insert(attrs);
                entry.into_mut()
            }
            std::collections::btree_map::Entry::Vacant(entry) => entry.insert(attrs),
        }
    }

    /// Add an overall input at argument `position`
    pub fn add_input(&mut self, name: &str, datatype: DataType, position: usize) -> NodeKey {
        let key = NodeKey::input(name);
        self.add_node(key.clone(), NodeAttrs::new().typed(datatype).at_position(position));
        key
    }

    /// Add an overall output at result `position` of step `last_step`
    pub fn add_output(&mut self, last_step: usize, name: &str, datatype: DataType, position: usize) -> NodeKey {
        let key = NodeKey::output(last_step, name);
        self.add_node(key.clone(), NodeAttrs::new().typed(datatype).at_position(position));
        key
    }

    /// Add a parameter slot whose value will come from an edge
    pub fn add_parameter(&mut self, step: usize, operation: &str, slot: &str) -> NodeKey {
        let key = NodeKey::parameter(step, operation, slot);
        self.add_node(key.clone(), NodeAttrs::new());
        key
    }

    /// Add a parameter slot bound to a literal
    pub fn add_fixed(&mut self, step: usize, operation: &str, slot: &str, value: impl Into<Value>) -> NodeKey {
        let key = NodeKey::parameter(step, operation, slot);
        self.add_node(key.clone(), NodeAttrs::new().fixed(value));
        key
    }

    /// Add the return slot of the operation at `step`
    pub fn add_return(&mut self, step: usize, operation: &str) -> NodeKey {
        let key = NodeKey::ret(step, operation);
        self.add_node(key.clone(), NodeAttrs::new());
        key
    }

    /// Add a `return.<field>` slot of a composite return
    pub fn add_return_field(&mut self, step: usize, operation: &str, field: &str) -> NodeKey {
        let key = NodeKey::ret_field(step, operation, field);
        self.add_node(key.clone(), NodeAttrs::new());
        key
    }

    /// Connect two slots; missing endpoints are inserted with empty attributes
    pub fn add_edge(&mut self, from: NodeKey, to: NodeKey) {
        self.nodes.entry(from.clone()).or_default();
        self.nodes.entry(to.clone()).or_default();
        if !self.edges.iter().any(|(f, t)| *f == from && *t == to) {
            self.edges.push((from, to));
        }
    }

    /// Disconnect two slots, returning whether the edge existed
    pub fn remove_edge(&mut self, from: &NodeKey, to: &NodeKey) -> bool {
        let before = self.edges.len();
        self.edges.retain(|(f, t)| f != from || t != to);
        self.edges.len() != before
    }

    pub fn node(&self, key: &NodeKey) -> Option<&NodeAttrs> {
        self.nodes.get(key)
    }

    pub fn node_mut(&mut self, key: &NodeKey) -> Option<&mut NodeAttrs> {
        self.nodes.get_mut(key)
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// The datatype of a node, if it has one
    pub fn datatype(&self, key: &NodeKey) -> Option<&DataType> {
        self.nodes.get(key).and_then(|attrs| attrs.datatype.as_ref())
    }

    /// All nodes in key order (step, operation, slot)
    pub fn nodes(&self) -> impl Iterator<Item = (&NodeKey, &NodeAttrs)> {
        self.nodes.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &NodeKey> {
        self.nodes.keys()
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = (&NodeKey, &mut NodeAttrs)> {
        self.nodes.iter_mut()
    }

    pub fn edges(&self) -> &[(NodeKey, NodeKey)] {
        &self.edges
    }

    /// Edges ending at `key`
    pub fn in_edges<'a>(&'a self, key: &'a NodeKey) -> impl Iterator<Item = &'a (NodeKey, NodeKey)> + 'a {
        self.edges.iter().filter(move |(_, to)| to == key)
    }

    pub fn in_degree(&self, key: &NodeKey) -> usize {
        self.in_edges(key).count()
    }

    /// The single producer of `key`, if exactly one edge ends there
    pub fn producer(&self, key: &NodeKey) -> Option<&NodeKey> {
        let mut producers = self.edges.iter().filter(|(_, to)| to == key).map(|(from, _)| from);
        match (producers.next(), producers.next()) {
            (Some(from), None) => Some(from),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Readable multi-line dump of nodes (per step) and edges
    pub fn describe(&self) -> String {
        let mut out = String::from("Nodes:\n");
        for step in util::group_nodes_by_step(self) {
            let (params, returns) = util::split_parameters_from_returns(&step);
            for key in params.iter().chain(returns.iter()) {
                let attrs = &self.nodes[key];
                out.push_str(&format!("  {}", key));
                if let Some(datatype) = &attrs.datatype {
                    out.push_str(&format!(" datatype={}", datatype));
                }
                if let Some(value) = &attrs.fixed_value {
                    out.push_str(&format!(" fixed_value={}", value));
                }
                if let Some(position) = attrs.position {
                    out.push_str(&format!(" position={}", position));
                }
                out.push('\n');
            }
        }
        out.push_str("Edges:\n");
        for (from, to) in &self.edges {
            out.push_str(&format!("  {} -> {}\n", from, to));
        }
        out
    }
}

impl fmt::Display for PipelineGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// A graph that passed every validation check, with interior datatypes filled in
///
/// Only [`validate_pipeline`] creates one.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPipeline {
    graph: PipelineGraph,
}

impl ValidatedPipeline {
    pub(crate) fn new(graph: PipelineGraph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &PipelineGraph {
        &self.graph
    }

    pub fn into_graph(self) -> PipelineGraph {
        self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_edge_inserts_endpoints_once() {
        let mut graph = PipelineGraph::new();
        let from = NodeKey::input("n");
        let to = NodeKey::parameter(1, "double", "x");
        graph.add_edge(from.clone(), to.clone());
        graph.add_edge(from.clone(), to.clone());

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.edges().len(), 1);
        assert_eq!(graph.in_degree(&to), 1);
        assert_eq!(graph.producer(&to), Some(&from));
        assert_eq!(graph.node(&to), Some(&NodeAttrs::default()));
    }

    #[test]
    fn test_add_edge_keeps_existing_attrs() {
        let mut graph = PipelineGraph::new();
        let input = graph.add_input("n", DataType::Int, 0);
        graph.add_edge(input.clone(), NodeKey::parameter(1, "double", "x"));
        assert_eq!(graph.datatype(&input), Some(&DataType::Int));
    }

    #[test]
    fn test_producer_requires_single_edge() {
        let mut graph = PipelineGraph::new();
        let to = NodeKey::parameter(2, "add", "a");
        graph.add_edge(NodeKey::input("a"), to.clone());
        graph.add_edge(NodeKey::input("b"), to.clone());
        assert_eq!(graph.producer(&to), None);
        assert_eq!(graph.producer(&NodeKey::input("a")), None);
    }

    #[test]
    fn test_producer_outlives_lookup_key() {
        let mut graph = PipelineGraph::new();
        let input = graph.add_input("n", DataType::Int, 0);
        graph.add_edge(input.clone(), NodeKey::parameter(1, "double", "x"));

        let producer = graph.producer(&NodeKey::parameter(1, "double", "x"));
        assert_eq!(producer, Some(&input));
    }

    #[test]
    fn test_describe() {
        let mut graph = PipelineGraph::new();
        let input = graph.add_input("n", DataType::Int, 0);
        let x = graph.add_fixed(1, "double", "x", 3i64);
        graph.add_edge(input, x);

        let text = graph.to_string();
        assert!(text.contains("(0, None, n) datatype=int position=0"));
        assert!(text.contains("(1, double, x) fixed_value=3"));
        assert!(text.contains("(0, None, n) -> (1, double, x)"));
    }
}
