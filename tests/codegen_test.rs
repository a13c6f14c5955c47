//! Integration tests for type/value rendering and unit assembly

mod common;

use common::builders::{doubler_graph, smoothing_graph, test_registry, GraphBuilder};
use pipeline_creator::codegen::util::{type_as_code, value_as_code};
use pipeline_creator::{generate_source, validate_pipeline, DataType, GeneratorConfig, NodeKey, PipelineHost, Value};
use proptest::prelude::*;

fn plain_type() -> impl Strategy<Value = DataType> {
    let leaf = prop_oneof![
        Just(DataType::Int),
        Just(DataType::Float),
        Just(DataType::Str),
        Just(DataType::Bool),
    ];
    leaf.prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            inner.clone().prop_map(DataType::list),
            (inner.clone(), inner.clone()).prop_map(|(key, value)| DataType::dict(key, value)),
            prop::collection::vec(inner, 0..3).prop_map(DataType::tuple),
        ]
    })
}

fn plain_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        any::<i64>().prop_map(Value::Int),
        (-1.0e6f64..1.0e6).prop_map(Value::Float),
        "[a-z \"\\\\]{0,8}".prop_map(Value::Str),
        any::<bool>().prop_map(Value::Bool),
    ];
    leaf.prop_recursive(2, 8, 3, |inner| prop::collection::vec(inner, 0..3).prop_map(Value::List))
}

proptest! {
    #[test]
    fn prop_rendering_is_idempotent(datatype in plain_type(), value in plain_value()) {
        prop_assert_eq!(type_as_code(&datatype).unwrap(), type_as_code(&datatype).unwrap());
        prop_assert_eq!(value_as_code(&value).unwrap(), value_as_code(&value).unwrap());
    }

    #[test]
    fn prop_type_code_evaluates_back(datatype in plain_type()) {
        let host = PipelineHost::default();
        let code = type_as_code(&datatype).unwrap();
        prop_assert_eq!(host.eval_type(&code).unwrap(), datatype, "{}", code);
    }

    #[test]
    fn prop_value_code_evaluates_back(value in plain_value()) {
        let host = PipelineHost::default();
        let code = value_as_code(&value).unwrap();
        prop_assert_eq!(host.eval_value(&code).unwrap(), value, "{}", code);
    }
}

#[test]
fn test_source_layout() {
    let registry = test_registry();
    let pipeline = validate_pipeline(&doubler_graph(), &registry).unwrap();
    let source = generate_source("Doubler", &pipeline, &registry, &GeneratorConfig::default(), None).unwrap();

    assert!(source.starts_with("// Doubler.rhai\n// Generated by PipelineCreator."));
    let module = source.find("// DoublerModule").unwrap();
    let inputs = source.find("// DoublerInputs").unwrap();
    let logic = source.find("// DoublerLogic").unwrap();
    let widget = source.find("// DoublerWidget").unwrap();
    assert!(module < inputs && inputs < logic && logic < widget);

    // imports come once, before any code
    let first_function = source.find("fn ").unwrap();
    for line in source.lines().filter(|line| line.starts_with("import ")) {
        assert_eq!(source.matches(line).count(), 1, "{}", line);
        assert!(source.find(line).unwrap() < first_function);
    }
    assert!(source.ends_with("}\n"));
}

#[test]
fn test_generation_is_deterministic() {
    let registry = test_registry();
    let config = GeneratorConfig::default();
    let pipeline = validate_pipeline(&smoothing_graph(), &registry).unwrap();

    let first = generate_source("Smoother", &pipeline, &registry, &config, None).unwrap();
    let second = generate_source("Smoother", &pipeline, &registry, &config, None).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_generated_sources_compile() {
    let registry = test_registry();
    let host = PipelineHost::with_classes(test_registry(), &[common::builders::volume_class()]);
    let config = GeneratorConfig::default();

    let mut split = GraphBuilder::new()
        .input("m", common::builders::model())
        .step("Split")
        .wire(NodeKey::input("m"), 1, "mesh");
    let left = split.ret_field(1, "left");
    let count = split.ret_field(1, "count");
    let split = split
        .output("left", common::builders::model(), left)
        .output("count", DataType::Int, count)
        .build();

    for (name, graph) in [("Doubler", doubler_graph()), ("Smoother", smoothing_graph()), ("Splitter", split)] {
        let pipeline = validate_pipeline(&graph, &registry).unwrap();
        let source = generate_source(name, &pipeline, &registry, &config, None).unwrap();
        host.validate(&source)
            .unwrap_or_else(|e| panic!("{} does not compile: {}\n{}", name, e, source));
    }
}

#[test]
fn test_indent_width_follows_config() {
    let registry = test_registry();
    let pipeline = validate_pipeline(&doubler_graph(), &registry).unwrap();
    let config = GeneratorConfig {
        indent_width: 2,
        ..GeneratorConfig::default()
    };

    let source = generate_source("Doubler", &pipeline, &registry, &config, None).unwrap();
    assert!(source.contains("\n  run(n, progress::noop(), true)\n"), "{}", source);
}

#[test]
fn test_module_info_round_trips_through_host() {
    let (_host, doubler) = common::load_generated("Doubler", &doubler_graph());
    let info = doubler.module_info().unwrap();

    assert_eq!(info.title, "Doubler");
    assert!(info.dependencies.contains(&"MathTools".to_string()));
    assert!(info.dependencies.contains(&"PipelineCreator".to_string()));
    assert_eq!(info.icon, None);
    assert_eq!(doubler.run_arities(), vec![1, 2, 3]);
}
