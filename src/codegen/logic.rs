//! Generation of the pipeline's `run` function.
//!
//! The generated function executes every interior step in order, binding each
//! step's result to `step_<i>_<operation>_return`. Managed resources produced
//! along the way are removed afterwards unless they are returned, are overall
//! inputs, or are referenced by something returned. Cleanup runs whether or
//! not a step failed; a failure is rethrown once cleanup is done.

use super::error::{GenerationError, GenerationResult};
use super::util::{
    cleanup_imports, field_access, import_code_for_value, import_line, indent, is_identifier, map_key,
    sanitize_identifier, string_literal, value_as_code, CodePiece,
};
use crate::config::GeneratorConfig;
use crate::graph::util::{get_step, group_nodes_by_step};
use crate::graph::{NodeKey, PipelineGraph, ValidatedPipeline, RETURN_SLOT};
use crate::registry::Registry;
use crate::scripting::namespace;
use crate::types::DataType;

/// Names the generated code uses for its own variables and parameters
pub const RESERVED_NAMES: &[&str] = &[
    "progress_callback",
    "delete_intermediate_nodes",
    "_failed",
    "_failure",
    "_retained",
    "inputs",
    "outputs",
    "output_value",
    "parameter_node",
];

/// Prefixes of the per-step variables, each followed by `<step>_`
const STEP_PREFIXES: &[&str] = &["step_", "function_"];

/// Whether `name` falls in the namespace of generated locals and helpers:
/// a leading underscore, or `step_<n>_..` / `function_<n>_..`
fn is_generated_name(name: &str) -> bool {
    if name.starts_with('_') || RESERVED_NAMES.contains(&name) {
        return true;
    }
    STEP_PREFIXES.iter().any(|prefix| {
        name.strip_prefix(prefix).is_some_and(|rest| {
            let digits = rest.chars().take_while(char::is_ascii_digit).count();
            digits > 0 && rest[digits..].starts_with('_')
        })
    })
}

/// Reject names that cannot be used as a generated variable or map key
pub fn check_variable_name(name: &str) -> GenerationResult<()> {
    if !is_identifier(name) {
        return Err(GenerationError::InvalidIdentifier(name.to_string()));
    }
    if is_generated_name(name) {
        return Err(GenerationError::ReservedName(name.to_string()));
    }
    Ok(())
}

/// A variable, optionally followed by a pack field path
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Access {
    base: String,
    path: Vec<String>,
}

impl Access {
    fn variable(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            path: Vec::new(),
        }
    }

    fn render(&self) -> String {
        self.path
            .iter()
            .fold(self.base.clone(), |target, field| field_access(&target, field))
    }

    /// Like [`render`](Self::render) but yields `()` when the container is missing
    fn guarded(&self) -> String {
        if self.path.is_empty() {
            return self.base.clone();
        }
        let path: Vec<String> = self.path.iter().map(|field| string_literal(field)).collect();
        format!("_member({}, [{}])", self.base, path.join(", "))
    }

    /// One of the two is the other or lives inside it
    fn overlaps(&self, other: &Access) -> bool {
        self.base == other.base && (self.path.starts_with(&other.path) || other.path.starts_with(&self.path))
    }
}

/// Where a consuming slot gets its value from
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Binding {
    Literal(String),
    Access(Access),
}

impl Binding {
    fn render(&self) -> String {
        match self {
            Binding::Literal(code) => code.clone(),
            Binding::Access(access) => access.render(),
        }
    }
}

/// Variable holding the result of the operation at `step`
pub fn return_variable(step: usize, operation: &str) -> String {
    format!("step_{}_{}_{}", step, sanitize_identifier(operation), RETURN_SLOT)
}

fn function_variable(step: usize, operation: &str) -> String {
    format!("function_{}_{}", step, sanitize_identifier(operation))
}

/// Field paths of every node-typed part of `datatype`
pub(super) fn managed_paths(datatype: &DataType, prefix: Vec<String>, out: &mut Vec<Vec<String>>) {
    match datatype.unannotated() {
        DataType::Node(_) => out.push(prefix),
        DataType::Pack(pack) => {
            for (field, field_type) in pack.fields() {
                let mut path = prefix.clone();
                path.push(field.clone());
                managed_paths(field_type, path, out);
            }
        }
        _ => {}
    }
}

fn contains_node(datatype: &DataType) -> bool {
    let mut found = false;
    datatype.walk(&mut |t| found |= matches!(t, DataType::Node(_)));
    found
}

/// Generates the logic piece: helpers, the `run` overloads and, for several
/// outputs, the outputs constructor
pub struct LogicGenerator<'a> {
    name: &'a str,
    graph: &'a PipelineGraph,
    registry: &'a Registry,
    tab: String,
    run_name: &'a str,
}

impl<'a> LogicGenerator<'a> {
    pub fn new(
        name: &'a str,
        pipeline: &'a ValidatedPipeline,
        registry: &'a Registry,
        config: &'a GeneratorConfig,
    ) -> Self {
        Self {
            name,
            graph: pipeline.graph(),
            registry,
            tab: config.tab(),
            run_name: &config.run_function_name,
        }
    }

    fn outputs_constructor(&self) -> String {
        format!("{}Outputs", self.name)
    }

    /// The value feeding `key`: its fixed value or its producer's variable
    pub(crate) fn input_binding(&self, key: &NodeKey) -> GenerationResult<Binding> {
        if let Some(value) = self.graph.node(key).and_then(|attrs| attrs.fixed_value.as_ref()) {
            return Ok(Binding::Literal(value_as_code(value)?));
        }
        let producer = self
            .graph
            .producer(key)
            .ok_or_else(|| GenerationError::MissingProducer(key.clone()))?;

        match &producer.operation {
            None => Ok(Binding::Access(Access::variable(producer.slot.clone()))),
            Some(operation) if producer.is_return() => Ok(Binding::Access(Access {
                base: return_variable(producer.step, operation),
                path: producer
                    .return_field()
                    .map(|field| field.split('.').map(str::to_string).collect())
                    .unwrap_or_default(),
            })),
            // A parameter slot forwards whatever feeds it
            Some(_) => self.input_binding(producer),
        }
    }

    fn step_code(&self, step: &[NodeKey], pieces: usize) -> GenerationResult<String> {
        let first = &step[0];
        let operation = first
            .operation
            .as_deref()
            .ok_or_else(|| GenerationError::UnknownOperation("None".to_string()))?;
        let info = self
            .registry
            .get(operation)
            .ok_or_else(|| GenerationError::UnknownOperation(operation.to_string()))?;

        let mut arguments = Vec::new();
        for (parameter, _) in info.parameters() {
            let key = NodeKey::parameter(first.step, operation, parameter.clone());
            let binding = self.input_binding(&key)?;
            arguments.push(format!("{}: {}", map_key(parameter), binding.render()));
        }
        if let Some(progress) = info.progress_parameter() {
            arguments.push(format!(
                "{}: progress_callback.get_sub_callback({}, {})",
                map_key(progress),
                first.step - 1,
                pieces
            ));
        }

        let call_arguments = if arguments.is_empty() {
            "#{}".to_string()
        } else {
            format!("#{{\n{}\n}}", indent(&arguments.join(",\n"), &self.tab))
        };
        let function = function_variable(first.step, operation);

        Ok(format!(
            "// step {step} - {operation}\n\
             progress_callback.report_progress({name}, 0.0, {piece}, {pieces});\n\
             let {function} = {operations}::get({name});\n\
             {result} = {function}.invoke({call_arguments});",
            step = first.step,
            operation = operation,
            name = string_literal(operation),
            piece = first.step - 1,
            pieces = pieces,
            function = function,
            operations = namespace::OPERATIONS,
            result = return_variable(first.step, operation),
            call_arguments = call_arguments,
        ))
    }

    /// Every managed resource a step may produce, from its declared return type
    fn managed_resources(&self, steps: &[Vec<NodeKey>]) -> GenerationResult<Vec<Access>> {
        let mut managed = Vec::new();
        for step in steps {
            let first = &step[0];
            let Some(operation) = first.operation.as_deref() else {
                continue;
            };
            let info = self
                .registry
                .get(operation)
                .ok_or_else(|| GenerationError::UnknownOperation(operation.to_string()))?;
            let mut paths = Vec::new();
            managed_paths(info.return_type(), Vec::new(), &mut paths);
            managed.extend(paths.into_iter().map(|path| Access {
                base: return_variable(first.step, operation),
                path,
            }));
        }
        Ok(managed)
    }

    fn cleanup_code(&self, managed: &[Access], returned: &[Binding], inputs: &[NodeKey]) -> String {
        let returned_accesses: Vec<&Access> = returned
            .iter()
            .filter_map(|binding| match binding {
                Binding::Access(access) => Some(access),
                Binding::Literal(_) => None,
            })
            .collect();

        let removable: Vec<&Access> = managed
            .iter()
            .filter(|m| !returned_accesses.iter().any(|r| r.overlaps(m)))
            .collect();
        if removable.is_empty() {
            return "// no intermediate nodes to remove".to_string();
        }

        let mut retained: Vec<String> = returned_accesses.iter().map(|access| access.guarded()).collect();
        for input in inputs {
            if self.graph.datatype(input).is_some_and(contains_node) && !retained.contains(&input.slot) {
                retained.push(input.slot.clone());
            }
        }

        let mut code = format!("let _retained = [{}];", retained.join(", "));
        for access in removable {
            let target = access.guarded();
            code.push_str(&format!(
                "\nif !_node_referenced_by({target}, _retained) {{\n{tab}{scene}::remove_node({target});\n}}",
                target = target,
                tab = self.tab,
                scene = namespace::SCENE,
            ));
        }
        code
    }

    fn helpers(&self) -> String {
        let tab = &self.tab;
        let scene = namespace::SCENE;
        let member = format!(
            "fn _member(value, path) {{\n\
             {tab}for key in path {{\n\
             {tab}{tab}if type_of(value) != \"map\" {{\n\
             {tab}{tab}{tab}return ();\n\
             {tab}{tab}}}\n\
             {tab}{tab}value = value[key];\n\
             {tab}}}\n\
             {tab}value\n\
             }}"
        );
        let referenced = format!(
            "fn _node_referenced_by(node, candidates) {{\n\
             {tab}if type_of(node) == \"()\" {{\n\
             {tab}{tab}return false;\n\
             {tab}}}\n\
             {tab}for option in candidates {{\n\
             {tab}{tab}let kind = type_of(option);\n\
             {tab}{tab}if kind == \"map\" {{\n\
             {tab}{tab}{tab}if _node_referenced_by(node, option.values()) {{\n\
             {tab}{tab}{tab}{tab}return true;\n\
             {tab}{tab}{tab}}}\n\
             {tab}{tab}}} else if kind == \"array\" {{\n\
             {tab}{tab}{tab}if _node_referenced_by(node, option) {{\n\
             {tab}{tab}{tab}{tab}return true;\n\
             {tab}{tab}{tab}}}\n\
             {tab}{tab}}} else if kind == \"Node\" {{\n\
             {tab}{tab}{tab}if {scene}::same_node(option, node) {{\n\
             {tab}{tab}{tab}{tab}return true;\n\
             {tab}{tab}{tab}}}\n\
             {tab}{tab}{tab}for role in {scene}::reference_roles(option) {{\n\
             {tab}{tab}{tab}{tab}if {scene}::has_reference(option, role, node) {{\n\
             {tab}{tab}{tab}{tab}{tab}return true;\n\
             {tab}{tab}{tab}{tab}}}\n\
             {tab}{tab}{tab}}}\n\
             {tab}{tab}}}\n\
             {tab}}}\n\
             {tab}false\n\
             }}"
        );
        format!("{}\n\n{}", member, referenced)
    }

    /// Build the logic piece
    pub fn generate(&self) -> GenerationResult<CodePiece> {
        let groups = group_nodes_by_step(self.graph);
        if groups.len() < 2 {
            return Err(GenerationError::TooFewSteps(groups.len()));
        }
        let interior = &groups[1..groups.len() - 1];
        let pieces = interior.len().max(1);

        let (inputs, _) = get_step(self.graph, 0)?;
        let (outputs, _) = get_step(self.graph, -1)?;
        for key in groups[0].iter().chain(groups[groups.len() - 1].iter()) {
            check_variable_name(&key.slot)?;
        }
        let input_names: Vec<&str> = inputs.iter().map(|key| key.slot.as_str()).collect();

        let mut imports = vec![
            import_line(namespace::PROGRESS),
            import_line(namespace::SCENE),
        ];
        if !interior.is_empty() {
            imports.push(import_line(namespace::OPERATIONS));
        }
        for (_, attrs) in self.graph.nodes() {
            if let Some(value) = &attrs.fixed_value {
                imports.push(import_code_for_value(value));
            }
        }

        let body = interior
            .iter()
            .map(|step| self.step_code(step, pieces))
            .collect::<GenerationResult<Vec<_>>>()?;
        let body = if body.is_empty() {
            "();".to_string()
        } else {
            body.join("\n\n")
        };

        let returned = outputs
            .iter()
            .map(|key| self.input_binding(key))
            .collect::<GenerationResult<Vec<_>>>()?;
        let managed = self.managed_resources(interior)?;
        let cleanup = self.cleanup_code(&managed, &returned, &inputs);

        let return_statement = if returned.len() == 1 {
            returned[0].render()
        } else {
            let args: Vec<String> = returned.iter().map(Binding::render).collect();
            format!("{}({})", self.outputs_constructor(), args.join(", "))
        };

        let declarations: Vec<String> = interior
            .iter()
            .filter_map(|step| {
                step[0]
                    .operation
                    .as_deref()
                    .map(|operation| format!("let {} = ();", return_variable(step[0].step, operation)))
            })
            .collect();

        let signature = self.signature_comment(&inputs, &outputs);
        let tab = &self.tab;
        let run = self.run_name;
        let joined_inputs = input_names.join(", ");
        let leading = if input_names.is_empty() {
            String::new()
        } else {
            format!("{}, ", joined_inputs)
        };

        let mut full_body = format!("progress_callback.report_progress(\"\", 0.0, 0, {});\n", pieces);
        full_body.push_str("// declared up front so cleanup can see them if a step fails\n");
        for declaration in &declarations {
            full_body.push_str(declaration);
            full_body.push('\n');
        }
        full_body.push_str("let _failed = false;\nlet _failure = ();\n\n");
        full_body.push_str(&format!(
            "try {{\n{}\n}} catch (err) {{\n{tab}_failed = true;\n{tab}_failure = err;\n}}\n\n",
            indent(&body, tab)
        ));
        full_body.push_str(&format!(
            "if delete_intermediate_nodes {{\n{}\n}}\n\n",
            indent(&cleanup, tab)
        ));
        full_body.push_str(&format!("if _failed {{\n{tab}throw _failure;\n}}\n\n"));
        full_body.push_str(&format!(
            "progress_callback.report_progress(\"\", 0.0, {pieces}, {pieces});\n\n{}",
            return_statement
        ));

        let mut code = format!("//\n// {}Logic\n//\n\n{}\n\n", self.name, self.helpers());
        if returned.len() > 1 {
            let names: Vec<&str> = outputs.iter().map(|key| key.slot.as_str()).collect();
            let fields: Vec<String> = names.iter().map(|name| format!("{}: {}", name, name)).collect();
            code.push_str(&format!(
                "fn {}({}) {{\n{tab}#{{ {} }}\n}}\n\n",
                self.outputs_constructor(),
                names.join(", "),
                fields.join(", ")
            ));
        }
        code.push_str(&format!(
            "{signature}\n\
             fn {run}({joined_inputs}) {{\n\
             {tab}{run}({leading}{progress}::noop(), true)\n\
             }}\n\n\
             fn {run}({leading}progress_callback) {{\n\
             {tab}{run}({leading}progress_callback, true)\n\
             }}\n\n\
             fn {run}({leading}progress_callback, delete_intermediate_nodes) {{\n\
             {body}\n\
             }}\n",
            progress = namespace::PROGRESS,
            body = indent(&full_body, tab),
        ));

        tracing::debug!(
            "Generated logic for '{}' with {} step(s) and {} managed resource(s)",
            self.name,
            interior.len(),
            managed.len()
        );
        Ok(CodePiece::new(cleanup_imports(&imports.join("\n")), code))
    }

    fn signature_comment(&self, inputs: &[NodeKey], outputs: &[NodeKey]) -> String {
        let params: Vec<String> = inputs
            .iter()
            .map(|key| match self.graph.datatype(key) {
                Some(datatype) => format!("{}: {}", key.slot, datatype),
                None => key.slot.clone(),
            })
            .collect();
        let returns = match outputs {
            [single] => self
                .graph
                .datatype(single)
                .map(ToString::to_string)
                .unwrap_or_else(|| "()".to_string()),
            _ => self.outputs_constructor(),
        };
        format!("// {}({}) -> {}", self.run_name, params.join(", "), returns)
    }
}

/// Convenience wrapper around [`LogicGenerator`]
pub fn create_logic(
    name: &str,
    pipeline: &ValidatedPipeline,
    registry: &Registry,
    config: &GeneratorConfig,
) -> GenerationResult<CodePiece> {
    LogicGenerator::new(name, pipeline, registry, config).generate()
}
