//! Generation of the parameter-node declarations.
//!
//! A generated unit declares three packs: `<Name>Inputs` and `<Name>Outputs`
//! (one field per overall input/output, in position order) and
//! `<Name>ParameterNode` bundling the two. The host turns the latter into a
//! default-filled value with `types::instantiate`.

use super::error::GenerationResult;
use super::util::{
    annotated_as_code, cleanup_imports, import_code_for_types, indent, string_literal, type_as_code, CodePiece,
};
use crate::config::GeneratorConfig;
use crate::graph::util::get_step;
use crate::graph::{NodeKey, PipelineGraph, ValidatedPipeline};
use crate::scripting::namespace;
use crate::types::DataType;

fn pack_function(name: &str, fields: &[String], tab: &str) -> String {
    let body = if fields.is_empty() {
        format!("{}::pack({}, [])", namespace::TYPES, string_literal(name))
    } else {
        format!(
            "{}::pack({}, [\n{}\n])",
            namespace::TYPES,
            string_literal(name),
            indent(&fields.join(",\n"), tab)
        )
    };
    format!("fn {}() {{\n{}\n}}", name, indent(&body, tab))
}

fn pack_fields(keys: &[NodeKey], graph: &PipelineGraph) -> GenerationResult<Vec<String>> {
    keys.iter()
        .map(|key| {
            let code = match graph.datatype(key).unwrap_or(&DataType::Unit) {
                DataType::Annotated(inner, annotations) => annotated_as_code(inner, annotations)?,
                other => type_as_code(other)?,
            };
            Ok(format!("[{}, {}]", string_literal(&key.slot), code))
        })
        .collect()
}

/// Build the parameter-node piece for pipeline `name`
pub fn create_parameter_node(
    name: &str,
    pipeline: &ValidatedPipeline,
    config: &GeneratorConfig,
) -> GenerationResult<CodePiece> {
    let graph = pipeline.graph();
    let tab = config.tab();
    let (inputs, _) = get_step(graph, 0)?;
    let (outputs, _) = get_step(graph, -1)?;

    let inputs_name = format!("{}Inputs", name);
    let outputs_name = format!("{}Outputs", name);
    let node_name = format!("{}ParameterNode", name);

    let bundle = vec![
        format!("[\"inputs\", {}()]", inputs_name),
        format!("[\"outputs\", {}()]", outputs_name),
    ];

    let code = format!(
        "//\n// {inputs_name}\n//\n\n{}\n\n\
         //\n// {outputs_name}\n//\n\n{}\n\n\
         //\n// {node_name}\n//\n\n{}\n",
        pack_function(&inputs_name, &pack_fields(&inputs, graph)?, &tab),
        pack_function(&outputs_name, &pack_fields(&outputs, graph)?, &tab),
        pack_function(&node_name, &bundle, &tab),
    );

    let imports = cleanup_imports(&import_code_for_types(inputs.iter().chain(outputs.iter()), graph));
    Ok(CodePiece::new(imports, code))
}
