//! Integration tests for pipeline validation

mod common;

use common::builders::{doubler_graph, model, smoothing_graph, test_registry, GraphBuilder};
use pipeline_creator::graph::ValidationError;
use pipeline_creator::{validate_pipeline, DataType, NodeKey, PipelineGraph, Value};
use proptest::prelude::*;

/// `n: int -> double -> double -> ... -> out: int`, with an unused `k: int`
fn double_chain(steps: usize) -> PipelineGraph {
    let mut builder = GraphBuilder::new().input("n", DataType::Int).input("k", DataType::Int);
    for step in 1..=steps {
        builder = builder.step("double");
        let from = if step == 1 {
            NodeKey::input("n")
        } else {
            builder.ret(step - 1)
        };
        builder = builder.wire(from, step, "x");
    }
    let ret = builder.ret(steps);
    builder.output("out", DataType::Int, ret).build()
}

fn primitive() -> impl Strategy<Value = DataType> {
    prop_oneof![
        Just(DataType::Int),
        Just(DataType::Float),
        Just(DataType::Str),
        Just(DataType::Bool),
    ]
}

fn literal_for(datatype: &DataType) -> Value {
    match datatype {
        DataType::Int => Value::Int(2),
        DataType::Float => Value::Float(2.5),
        DataType::Str => Value::Str("two".to_string()),
        _ => Value::Bool(true),
    }
}

#[test]
fn test_scenario_doubler_validates() {
    let validated = validate_pipeline(&doubler_graph(), &test_registry()).unwrap();
    let graph = validated.graph();

    assert_eq!(graph.datatype(&NodeKey::parameter(1, "double", "x")), Some(&DataType::Int));
    assert_eq!(graph.datatype(&NodeKey::ret(1, "double")), Some(&DataType::Int));
}

#[test]
fn test_fixed_float_parameter_needs_no_edge() {
    let builder = GraphBuilder::new()
        .input("x", DataType::Float)
        .step("add")
        .wire(NodeKey::input("x"), 1, "a")
        .fixed(1, "b", 1.0)
        .step("add");
    let first = builder.ret(1);
    let builder = builder.wire(first, 2, "a").fixed(2, "b", 3.5);
    let ret = builder.ret(2);
    let graph = builder.output("out", DataType::Float, ret).build();

    let validated = validate_pipeline(&graph, &test_registry()).unwrap();
    let fixed = validated.graph().node(&NodeKey::parameter(2, "add", "b")).unwrap();
    assert_eq!(fixed.fixed_value, Some(Value::Float(3.5)));
    assert_eq!(fixed.datatype, Some(DataType::Float));
}

#[test]
fn test_two_operations_on_one_step() {
    let mut graph = doubler_graph();
    let mesh = graph.add_parameter(1, "Decimate", "mesh");
    graph.add_edge(NodeKey::input("n"), mesh);

    let err = validate_pipeline(&graph, &test_registry()).unwrap_err();
    match err {
        ValidationError::MixedStep { step, .. } => assert_eq!(step, 1),
        other => panic!("expected MixedStep, got {:?}", other),
    }
}

#[test]
fn test_empty_graph() {
    assert_eq!(
        validate_pipeline(&PipelineGraph::new(), &test_registry()).unwrap_err(),
        ValidationError::EmptyGraph
    );
}

#[test]
fn test_unregistered_operation() {
    let builder = GraphBuilder::new()
        .input("n", DataType::Int)
        .step("triple")
        .wire(NodeKey::input("n"), 1, "x");
    let ret = builder.ret(1);
    let graph = builder.output("out", DataType::Int, ret).build();

    let err = validate_pipeline(&graph, &test_registry()).unwrap_err();
    assert!(matches!(err, ValidationError::UnknownOperation { .. }), "{:?}", err);
}

#[test]
fn test_skipped_step() {
    let mut graph = PipelineGraph::new();
    let n = graph.add_input("n", DataType::Int, 0);
    let x = graph.add_parameter(2, "double", "x");
    let ret = graph.add_return(2, "double");
    let out = graph.add_output(3, "out", DataType::Int, 0);
    graph.add_edge(n, x);
    graph.add_edge(ret, out);

    let err = validate_pipeline(&graph, &test_registry()).unwrap_err();
    assert_eq!(err, ValidationError::SkippedStep { found: vec![0, 2, 3] });
}

#[test]
fn test_node_type_mismatch_on_edge() {
    let builder = GraphBuilder::new()
        .input("n", DataType::Int)
        .step("Smooth Model")
        .wire(NodeKey::input("n"), 1, "mesh");
    let ret = builder.ret(1);
    let graph = builder.output("out", model(), ret).build();

    let err = validate_pipeline(&graph, &test_registry()).unwrap_err();
    assert!(err.is_type_mismatch(), "{:?}", err);
    assert_eq!(
        err.offending_nodes(),
        vec![&NodeKey::input("n"), &NodeKey::parameter(1, "Smooth Model", "mesh")]
    );
}

#[test]
fn test_progress_parameter_is_not_a_slot() {
    // Smooth Model declares a progress callback; the graph only wires `mesh`
    assert!(validate_pipeline(&smoothing_graph(), &test_registry()).is_ok());
}

#[test]
fn test_pack_return_fields() {
    let mut builder = GraphBuilder::new()
        .input("m", model())
        .step("Split")
        .wire(NodeKey::input("m"), 1, "mesh");
    let left = builder.ret_field(1, "left");
    let count = builder.ret_field(1, "count");
    let graph = builder
        .output("left", model(), left)
        .output("count", DataType::Int, count)
        .build();

    let validated = validate_pipeline(&graph, &test_registry()).unwrap();
    assert_eq!(
        validated.graph().datatype(&NodeKey::ret_field(1, "Split", "count")),
        Some(&DataType::Int)
    );

    let mut builder = GraphBuilder::new()
        .input("m", model())
        .step("Split")
        .wire(NodeKey::input("m"), 1, "mesh");
    let middle = builder.ret_field(1, "middle");
    let graph = builder.output("middle", model(), middle).build();
    let err = validate_pipeline(&graph, &test_registry()).unwrap_err();
    assert!(matches!(err, ValidationError::UnknownSlot { .. }), "{:?}", err);
}

proptest! {
    #[test]
    fn prop_valid_chains_visit_producers_first(steps in 1usize..6) {
        let validated = validate_pipeline(&double_chain(steps), &test_registry()).unwrap();
        let graph = validated.graph();

        for (from, to) in graph.edges() {
            prop_assert!(from.step < to.step, "{} -> {}", from, to);
        }
        for key in graph.keys() {
            if let Some(producer) = graph.producer(key) {
                prop_assert!(producer.step < key.step);
            }
        }
    }

    #[test]
    fn prop_edges_must_go_forward(steps in 1usize..6, from in 1usize..6, to in 1usize..6) {
        prop_assume!(from <= steps && to <= steps && from >= to);
        let mut graph = double_chain(steps);
        graph.add_edge(NodeKey::ret(from, "double"), NodeKey::parameter(to, "double", "x"));

        let err = validate_pipeline(&graph, &test_registry()).unwrap_err();
        let is_backward_edge = matches!(err, ValidationError::BackwardEdge { .. });
        prop_assert!(is_backward_edge, "{:?}", err);
    }

    #[test]
    fn prop_slots_need_exactly_one_producer(steps in 1usize..6, step in 1usize..6, extra in any::<bool>()) {
        prop_assume!(step <= steps);
        let mut graph = double_chain(steps);
        let slot = NodeKey::parameter(step, "double", "x");
        let expected = if extra {
            graph.add_edge(NodeKey::input("k"), slot.clone());
            2
        } else {
            let producer = graph.producer(&slot).unwrap().clone();
            graph.remove_edge(&producer, &slot);
            0
        };

        let err = validate_pipeline(&graph, &test_registry()).unwrap_err();
        prop_assert_eq!(err, ValidationError::MissingConnection { node: slot, found: expected });
    }

    #[test]
    fn prop_only_int_widens_to_float(source in primitive(), destination in primitive()) {
        let mut graph = PipelineGraph::new();
        let input = graph.add_input("a", source.clone(), 0);
        let output = graph.add_output(1, "b", destination.clone(), 0);
        graph.add_edge(input, output);

        let accepted = validate_pipeline(&graph, &test_registry()).is_ok();
        let expected = source == destination || (source == DataType::Int && destination == DataType::Float);
        prop_assert_eq!(accepted, expected, "{} -> {}", source, destination);
    }

    #[test]
    fn prop_fixed_values_widen_like_edges(source in primitive()) {
        let builder = GraphBuilder::new()
            .input("x", DataType::Float)
            .step("add")
            .wire(NodeKey::input("x"), 1, "a")
            .fixed(1, "b", literal_for(&source));
        let ret = builder.ret(1);
        let graph = builder.output("out", DataType::Float, ret).build();

        let result = validate_pipeline(&graph, &test_registry());
        if source == DataType::Int || source == DataType::Float {
            prop_assert!(result.is_ok(), "{:?}", result.err());
        } else {
            let is_fixed_value_error = matches!(result, Err(ValidationError::FixedValueType { .. }));
            prop_assert!(is_fixed_value_error, "{:?}", result.err());
        }
    }

    #[test]
    fn prop_steps_wire_exactly_their_parameters(wire_a in any::<bool>(), wire_b in any::<bool>(), extra in any::<bool>()) {
        let mut builder = GraphBuilder::new().input("x", DataType::Float).step("add");
        if wire_a {
            builder = builder.wire(NodeKey::input("x"), 1, "a");
        }
        if wire_b {
            builder = builder.fixed(1, "b", 1.5);
        }
        if extra {
            builder = builder.fixed(1, "c", 1.5);
        }
        let ret = builder.ret(1);
        let graph = builder.output("out", DataType::Float, ret).build();

        let result = validate_pipeline(&graph, &test_registry());
        if wire_a && wire_b && !extra {
            prop_assert!(result.is_ok(), "{:?}", result.err());
        } else {
            let is_incomplete = matches!(result, Err(ValidationError::IncompleteStep { step: 1, .. }));
            prop_assert!(is_incomplete, "{:?}", result.err());
        }
    }
}
