//! Generation of the widget driver.
//!
//! The driver is what a host calls from its UI: `setup()` creates an empty
//! parameter node and `on_run(parameter_node)` feeds its inputs to `run`,
//! then copies the results back into the node's outputs.

use super::error::GenerationResult;
use super::logic::managed_paths;
use super::util::{field_access, import_line, CodePiece};
use crate::config::GeneratorConfig;
use crate::graph::util::get_step;
use crate::graph::{NodeKey, PipelineGraph, ValidatedPipeline};
use crate::scripting::namespace;
use crate::types::DataType;

fn node_fields(datatype: &DataType) -> Vec<Vec<String>> {
    let mut paths = Vec::new();
    managed_paths(datatype, Vec::new(), &mut paths);
    paths
}

/// Emit the copies for one output and collect the node sources they read
fn copy_output(target: &str, source: &str, datatype: &DataType, copies: &mut Vec<String>, nodes: &mut Vec<(String, String)>) {
    match datatype.unannotated() {
        DataType::Node(_) => {
            copies.push(format!("{target} = _copy_node_output({source}, {target});"));
            nodes.push((source.to_string(), target.to_string()));
        }
        DataType::Pack(pack) if !node_fields(datatype).is_empty() => {
            for (field, field_type) in pack.fields() {
                copy_output(
                    &field_access(target, field),
                    &field_access(source, field),
                    field_type,
                    copies,
                    nodes,
                );
            }
        }
        _ => copies.push(format!("{target} = {source};")),
    }
}

fn copy_helpers(tab: &str) -> String {
    let scene = namespace::SCENE;
    format!(
        "fn _copy_node_output(src, dest) {{\n\
         {tab}if type_of(src) == \"()\" {{\n\
         {tab}{tab}return dest;\n\
         {tab}}}\n\
         {tab}if type_of(dest) == \"()\" {{\n\
         {tab}{tab}return src;\n\
         {tab}}}\n\
         {tab}if !{scene}::same_node(src, dest) {{\n\
         {tab}{tab}{scene}::copy_node(src, dest);\n\
         {tab}}}\n\
         {tab}dest\n\
         }}\n\n\
         fn _holds_node(nodes, node) {{\n\
         {tab}for n in nodes {{\n\
         {tab}{tab}if type_of(n) == \"Node\" && {scene}::same_node(n, node) {{\n\
         {tab}{tab}{tab}return true;\n\
         {tab}{tab}}}\n\
         {tab}}}\n\
         {tab}false\n\
         }}\n\n\
         fn _release_nodes(sources, keep) {{\n\
         {tab}let released = [];\n\
         {tab}for src in sources {{\n\
         {tab}{tab}if type_of(src) != \"Node\" || _holds_node(keep, src) || _holds_node(released, src) {{\n\
         {tab}{tab}{tab}continue;\n\
         {tab}{tab}}}\n\
         {tab}{tab}{scene}::remove_node(src);\n\
         {tab}{tab}released.push(src);\n\
         {tab}}}\n\
         }}"
    )
}

fn keep_list(inputs: &[NodeKey], graph: &PipelineGraph) -> Vec<String> {
    let mut keep = Vec::new();
    for key in inputs {
        let Some(datatype) = graph.datatype(key) else {
            continue;
        };
        for path in node_fields(datatype) {
            let access = path
                .iter()
                .fold(field_access("inputs", &key.slot), |target, field| field_access(&target, field));
            keep.push(access);
        }
    }
    keep
}

/// Build the widget piece for pipeline `name`
pub fn create_widget(name: &str, pipeline: &ValidatedPipeline, config: &GeneratorConfig) -> GenerationResult<CodePiece> {
    let graph = pipeline.graph();
    let tab = config.tab();
    let run = &config.run_function_name;
    let (inputs, _) = get_step(graph, 0)?;
    let (outputs, _) = get_step(graph, -1)?;

    let arguments: Vec<String> = inputs
        .iter()
        .map(|key| field_access("inputs", &key.slot))
        .chain(std::iter::once("progress_callback".to_string()))
        .collect();

    let mut copies = Vec::new();
    let mut nodes = Vec::new();
    for key in &outputs {
        let source = if outputs.len() == 1 {
            "output_value".to_string()
        } else {
            field_access("output_value", &key.slot)
        };
        let datatype = graph.datatype(key).unwrap_or(&DataType::Unit);
        copy_output(&field_access("outputs", &key.slot), &source, datatype, &mut copies, &mut nodes);
    }

    let mut body = vec![
        "let inputs = parameter_node.inputs;".to_string(),
        "let outputs = parameter_node.outputs;".to_string(),
        format!("let _keep = [{}];", keep_list(&inputs, graph).join(", ")),
        format!("let output_value = {}({});", run, arguments.join(", ")),
    ];
    if nodes.is_empty() {
        body.extend(copies);
    } else {
        // Every destination is filled before any source node is released,
        // so outputs sharing one source all see it.
        let (sources, targets): (Vec<String>, Vec<String>) = nodes.into_iter().unzip();
        body.push(format!("let _sources = [{}];", sources.join(", ")));
        body.push("try {".to_string());
        body.extend(copies.iter().map(|line| format!("{tab}{line}")));
        body.push("} catch (err) {".to_string());
        body.push(format!("{tab}_release_nodes(_sources, _keep);"));
        body.push(format!("{tab}throw err;"));
        body.push("}".to_string());
        body.push(format!("_keep += [{}];", targets.join(", ")));
        body.push("_release_nodes(_sources, _keep);".to_string());
    }
    body.push("parameter_node.outputs = outputs;".to_string());
    body.push("parameter_node".to_string());
    let body: Vec<String> = body.iter().map(|line| format!("{tab}{line}")).collect();

    let code = format!(
        "//\n// {name}Widget\n//\n\n\
         {helper}\n\n\
         fn setup() {{\n\
         {tab}{types}::instantiate({name}ParameterNode())\n\
         }}\n\n\
         fn on_run(parameter_node) {{\n\
         {tab}on_run(parameter_node, {progress}::noop())\n\
         }}\n\n\
         fn on_run(parameter_node, progress_callback) {{\n\
         {body}\n\
         }}\n",
        helper = copy_helpers(&tab),
        types = namespace::TYPES,
        progress = namespace::PROGRESS,
        body = body.join("\n"),
    );

    let imports = [import_line(namespace::PROGRESS), import_line(namespace::SCENE)].join("\n");
    Ok(CodePiece::new(imports, code))
}
