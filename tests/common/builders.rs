//! Test registry, scene helpers and graph builders

use pipeline_creator::registry::{OperationCall, OperationError};
use pipeline_creator::{DataType, NodeClass, NodeHandle, NodeKey, PackType, PipelineGraph, Registry, Scene, Signature};
use rhai::{Dynamic, Map};

pub fn model_class() -> NodeClass {
    NodeClass::new("ModelNode")
}

/// A subclass of `ModelNode`; its content cannot be copied into a plain model
pub fn volume_class() -> NodeClass {
    NodeClass::derived("VolumeNode", &model_class())
}

pub fn model() -> DataType {
    DataType::node(model_class())
}

/// Add a model with `vertices` to the scene
pub fn add_model(scene: &Scene, name: &str, vertices: i64) -> NodeHandle {
    let handle = scene.add_node(&model_class(), name);
    let mut content = Map::new();
    content.insert("vertices".into(), Dynamic::from_int(vertices));
    scene.set_content(handle.id(), content).unwrap();
    handle
}

pub fn vertices(scene: &Scene, node: &NodeHandle) -> i64 {
    scene.content(node.id()).unwrap()["vertices"].as_int().unwrap()
}

fn derived_model(call: &OperationCall, class: &NodeClass, name: &str, vertices: i64) -> NodeHandle {
    let handle = call.scene().add_node(class, name);
    let mut content = Map::new();
    content.insert("vertices".into(), Dynamic::from_int(vertices));
    // fresh node, cannot be missing
    call.scene().set_content(handle.id(), content).unwrap();
    handle
}

fn input_vertices(call: &OperationCall, name: &str) -> Result<i64, OperationError> {
    let mesh = call.node(name)?;
    let content = call.scene().content(mesh.id())?;
    content
        .get("vertices")
        .and_then(|v| v.as_int().ok())
        .ok_or_else(|| OperationError::Failed(format!("{} has no vertices", mesh.id())))
}

fn parts() -> PackType {
    PackType::new("Parts")
        .with_field("left", model())
        .with_field("right", model())
        .with_field("count", DataType::Int)
}

/// Registry used by the integration tests
///
/// - `double(x: int) -> int`
/// - `add(a: float, b: float) -> float`
/// - `Smooth Model(mesh, progress_callback) -> model`, reports half-way progress
/// - `Decimate(mesh, ratio: float) -> model`
/// - `Label(mesh) -> model`, referencing `mesh` under the `source` role
/// - `Split(mesh) -> Parts { left, right, count }`
/// - `Break(mesh) -> model`, always fails
/// - `To Volume(mesh) -> model`, returns a `VolumeNode`
pub fn test_registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register(
            "double",
            |call| Ok(Dynamic::from_int(call.int("x")? * 2)),
            Signature::new().param("x", DataType::Int).returns(DataType::Int),
            &["MathTools"],
            &["Math"],
        )
        .unwrap();
    registry
        .register(
            "add",
            |call| Ok(Dynamic::from_float(call.float("a")? + call.float("b")?)),
            Signature::new()
                .param("a", DataType::Float)
                .param("b", DataType::Float)
                .returns(DataType::Float),
            &["MathTools"],
            &["Math"],
        )
        .unwrap();
    registry
        .register(
            "Smooth Model",
            |call| {
                let vertices = input_vertices(call, "mesh")?;
                let progress = call.progress();
                progress.report_progress("smoothing", 0.5, 0, 1);
                let smoothed = derived_model(call, &model_class(), "Smoothed", vertices);
                progress.report_progress("smoothing", 1.0, 0, 1);
                Ok(Dynamic::from(smoothed))
            },
            Signature::new()
                .param("mesh", model())
                .param("progress_callback", DataType::Progress)
                .returns(model()),
            &["MeshTools"],
            &["Mesh"],
        )
        .unwrap();
    registry
        .register(
            "Decimate",
            |call| {
                let vertices = input_vertices(call, "mesh")?;
                let ratio = call.float("ratio")?;
                let decimated = derived_model(call, &model_class(), "Decimated", (vertices as f64 * ratio) as i64);
                Ok(Dynamic::from(decimated))
            },
            Signature::new()
                .param("mesh", model())
                .param("ratio", DataType::Float)
                .returns(model()),
            &["MeshTools"],
            &["Mesh"],
        )
        .unwrap();
    registry
        .register(
            "Label",
            |call| {
                let mesh = call.node("mesh")?;
                let vertices = input_vertices(call, "mesh")?;
                let label = derived_model(call, &model_class(), "Label", vertices);
                call.scene().add_reference(label.id(), "source", mesh.id())?;
                Ok(Dynamic::from(label))
            },
            Signature::new().param("mesh", model()).returns(model()),
            &[],
            &["Mesh"],
        )
        .unwrap();
    registry
        .register(
            "Split",
            |call| {
                let vertices = input_vertices(call, "mesh")?;
                let left = derived_model(call, &model_class(), "Left", vertices / 2);
                let right = derived_model(call, &model_class(), "Right", vertices - vertices / 2);
                let mut parts = Map::new();
                parts.insert("left".into(), Dynamic::from(left));
                parts.insert("right".into(), Dynamic::from(right));
                parts.insert("count".into(), Dynamic::from_int(2));
                Ok(Dynamic::from_map(parts))
            },
            Signature::new().param("mesh", model()).returns(DataType::pack(parts())),
            &[],
            &["Mesh"],
        )
        .unwrap();
    registry
        .register(
            "Break",
            |call| {
                call.node("mesh")?;
                Err(OperationError::Failed("mesh is broken".to_string()))
            },
            Signature::new().param("mesh", model()).returns(model()),
            &[],
            &["Mesh"],
        )
        .unwrap();
    registry
        .register(
            "To Volume",
            |call| {
                let vertices = input_vertices(call, "mesh")?;
                Ok(Dynamic::from(derived_model(call, &volume_class(), "Volume", vertices)))
            },
            Signature::new().param("mesh", model()).returns(model()),
            &[],
            &["Mesh"],
        )
        .unwrap();
    registry
}

/// Builds pipelines one step at a time
///
/// Steps are numbered from 1 in the order they are added; `build` places the
/// outputs on the step after the last operation.
pub struct GraphBuilder {
    graph: PipelineGraph,
    steps: Vec<String>,
    inputs: usize,
    outputs: Vec<(String, DataType, NodeKey)>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            graph: PipelineGraph::new(),
            steps: Vec::new(),
            inputs: 0,
            outputs: Vec::new(),
        }
    }

    pub fn input(mut self, name: &str, datatype: DataType) -> Self {
        self.graph.add_input(name, datatype, self.inputs);
        self.inputs += 1;
        self
    }

    /// Add a step running `operation`
    pub fn step(mut self, operation: &str) -> Self {
        let step = self.steps.len() + 1;
        self.steps.push(operation.to_string());
        self.graph.add_return(step, operation);
        self
    }

    /// Wire parameter `slot` of `step` from `from`
    pub fn wire(mut self, from: NodeKey, step: usize, slot: &str) -> Self {
        let to = self.graph.add_parameter(step, &self.steps[step - 1], slot);
        self.graph.add_edge(from, to);
        self
    }

    /// Bind parameter `slot` of `step` to a literal
    pub fn fixed(mut self, step: usize, slot: &str, value: impl Into<pipeline_creator::Value>) -> Self {
        let operation = self.steps[step - 1].clone();
        self.graph.add_fixed(step, &operation, slot, value);
        self
    }

    /// Add an overall output fed by `from`
    pub fn output(mut self, name: &str, datatype: DataType, from: NodeKey) -> Self {
        self.outputs.push((name.to_string(), datatype, from));
        self
    }

    /// The return slot of `step`
    pub fn ret(&self, step: usize) -> NodeKey {
        NodeKey::ret(step, &self.steps[step - 1])
    }

    /// A `return.<field>` slot of `step`
    pub fn ret_field(&mut self, step: usize, field: &str) -> NodeKey {
        let operation = self.steps[step - 1].clone();
        self.graph.add_return_field(step, &operation, field)
    }

    pub fn build(mut self) -> PipelineGraph {
        let last = self.steps.len() + 1;
        for (position, (name, datatype, from)) in self.outputs.into_iter().enumerate() {
            let to = self.graph.add_output(last, &name, datatype, position);
            self.graph.add_edge(from, to);
        }
        self.graph
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `n: int -> double -> out: int`
pub fn doubler_graph() -> PipelineGraph {
    let builder = GraphBuilder::new()
        .input("n", DataType::Int)
        .step("double")
        .wire(NodeKey::input("n"), 1, "x");
    let ret = builder.ret(1);
    builder.output("out", DataType::Int, ret).build()
}

/// `m: model -> Smooth Model -> Decimate(ratio = 0.5) -> out: model`
pub fn smoothing_graph() -> PipelineGraph {
    let builder = GraphBuilder::new()
        .input("m", model())
        .step("Smooth Model")
        .wire(NodeKey::input("m"), 1, "mesh")
        .step("Decimate");
    let smoothed = builder.ret(1);
    let builder = builder.wire(smoothed, 2, "mesh").fixed(2, "ratio", 0.5);
    let ret = builder.ret(2);
    builder.output("out", model(), ret).build()
}

/// `m: model -> <first> -> <second> -> out: model`
pub fn two_step_graph(first: &str, second: &str) -> PipelineGraph {
    let builder = GraphBuilder::new()
        .input("m", model())
        .step(first)
        .wire(NodeKey::input("m"), 1, "mesh")
        .step(second);
    let ret = builder.ret(1);
    let builder = builder.wire(ret, 2, "mesh");
    let ret = builder.ret(2);
    builder.output("out", model(), ret).build()
}
