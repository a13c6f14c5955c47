//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use pipeline_creator::{generate_source, validate_pipeline, GeneratorConfig, LoadedPipeline, PipelineGraph, PipelineHost};

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Validate, generate and load `graph` as unit `name` in a host over the test registry
pub fn load_generated(name: &str, graph: &PipelineGraph) -> (PipelineHost, LoadedPipeline) {
    let registry = builders::test_registry();
    let pipeline = validate_pipeline(graph, &registry).expect("graph should validate");
    let source = generate_source(name, &pipeline, &registry, &GeneratorConfig::default(), None)
        .expect("source should generate");

    let host = PipelineHost::with_classes(registry, &[builders::model_class(), builders::volume_class()]);
    let loaded = host
        .load(name, &source)
        .unwrap_or_else(|e| panic!("generated source should compile: {}\n{}", e, source));
    (host, loaded)
}
