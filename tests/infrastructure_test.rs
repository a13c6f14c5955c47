//! Test to verify test infrastructure works correctly

mod common;

use common::builders::{add_model, model_class, smoothing_graph, test_registry, vertices, volume_class};
use pipeline_creator::{NodeClass, NodeKey, Scene};

#[test]
fn test_infrastructure_setup() {
    // Test that builders work
    let registry = test_registry();
    assert_eq!(registry.len(), 8);
    assert_eq!(registry.node_classes(), vec![model_class(), NodeClass::base()]);

    let graph = smoothing_graph();
    assert!(graph.contains(&NodeKey::parameter(2, "Decimate", "ratio")));
    assert_eq!(graph.edges().len(), 3);

    let scene = Scene::new();
    let model = add_model(&scene, "Input", 12);
    assert_eq!(model.id(), "ModelNode1");
    assert_eq!(vertices(&scene, &model), 12);
    assert_eq!(volume_class().parent().unwrap().name(), "ModelNode");
}

#[test]
fn test_float_comparison() {
    common::assert_float_eq(1.0, 1.0000001, 0.001);
}

#[test]
#[should_panic]
fn test_float_comparison_fails() {
    common::assert_float_eq(1.0, 2.0, 0.001);
}
