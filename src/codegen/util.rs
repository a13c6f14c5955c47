//! Rendering types and values as Rhai source text.
//!
//! Every renderer returns text that evaluates, inside a pipeline host, to the
//! same [`DataType`] or [`Value`] it was given. Types and values with no
//! readable spelling (non-identifier node classes, opaque types, tuples and
//! dicts) fall back to an embedded JSON blob decoded by the `blob` module.
//! That blob format is private to this crate and the host.

use super::error::GenerationResult;
use crate::graph::{NodeKey, PipelineGraph};
use crate::scripting::namespace;
use crate::types::{Annotation, DataType, Value};
use std::collections::BTreeSet;

/// Imports plus code; callers merge the imports and concatenate the code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodePiece {
    pub imports: String,
    pub code: String,
}

impl CodePiece {
    pub fn new(imports: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            imports: imports.into(),
            code: code.into(),
        }
    }
}

/// Words that cannot be used as Rhai variable or function names.
pub const RHAI_KEYWORDS: &[&str] = &[
    "true", "false", "let", "const", "if", "else", "switch", "do", "while", "until", "loop", "for", "in", "break",
    "continue", "return", "throw", "try", "catch", "import", "export", "as", "private", "fn", "this", "global",
    "Fn", "call", "curry", "type_of", "print", "debug", "eval", "is_def_var", "is_def_fn", "is_shared", "var",
    "static", "shared", "sync", "go", "async", "await", "yield", "default", "case", "public", "protected", "new",
    "use", "with", "module", "package", "super", "thread", "spawn", "goto", "exit", "match", "macro", "include",
    "void", "null", "nil",
];

pub fn is_keyword(name: &str) -> bool {
    RHAI_KEYWORDS.contains(&name)
}

/// ASCII identifier with at least one letter or digit, not a keyword
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && name.chars().any(|c| c.is_ascii_alphanumeric())
        && !is_keyword(name)
}

/// Replace every non-word character with `_` and prefix a leading digit with `_`
pub fn sanitize_identifier(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// A double-quoted Rhai string literal
pub fn string_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// A key usable inside an object map literal `#{ .. }`
pub fn map_key(name: &str) -> String {
    if is_identifier(name) {
        name.to_string()
    } else {
        string_literal(name)
    }
}

/// `target.field`, or `target["field"]` when the field is not an identifier
pub fn field_access(target: &str, field: &str) -> String {
    if is_identifier(field) {
        format!("{}.{}", target, field)
    } else {
        format!("{}[{}]", target, string_literal(field))
    }
}

/// Indent every non-empty line
pub fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{}{}", prefix, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The import statement for a host module
pub fn import_line(module: &str) -> String {
    format!("import {} as {};", string_literal(module), module)
}

fn blob_type(datatype: &DataType) -> GenerationResult<String> {
    let json = serde_json::to_string(datatype)?;
    Ok(format!("{}::type_from_json({})", namespace::BLOB, string_literal(&json)))
}

fn blob_value(value: &Value) -> GenerationResult<String> {
    let json = serde_json::to_string(value)?;
    Ok(format!("{}::value_from_json({})", namespace::BLOB, string_literal(&json)))
}

/// Render a type as a Rhai expression evaluating to that type
pub fn type_as_code(datatype: &DataType) -> GenerationResult<String> {
    let types = namespace::TYPES;
    Ok(match datatype {
        DataType::Unit => format!("{}::unit", types),
        DataType::Int => format!("{}::int", types),
        DataType::Float => format!("{}::float", types),
        DataType::Str => format!("{}::str", types),
        DataType::Bool => format!("{}::bool", types),
        DataType::Progress => format!("{}::progress", types),
        DataType::List(item) => format!("{}::list({})", types, type_as_code(item)?),
        DataType::Dict(key, value) => {
            format!("{}::dict({}, {})", types, type_as_code(key)?, type_as_code(value)?)
        }
        DataType::Tuple(items) => {
            let items = items.iter().map(type_as_code).collect::<GenerationResult<Vec<_>>>()?;
            format!("{}::tuple([{}])", types, items.join(", "))
        }
        DataType::Node(class) if is_identifier(class.name()) => {
            format!("{}::{}", namespace::SCENE, class.name())
        }
        DataType::Pack(pack) => {
            let fields = pack
                .fields()
                .iter()
                .map(|(name, datatype)| Ok(format!("[{}, {}]", string_literal(name), type_as_code(datatype)?)))
                .collect::<GenerationResult<Vec<_>>>()?;
            format!("{}::pack({}, [{}])", types, string_literal(pack.name()), fields.join(", "))
        }
        DataType::Annotated(inner, annotations) => annotated_as_code(inner, annotations)?,
        DataType::Node(_) | DataType::Opaque(_) => blob_type(datatype)?,
    })
}

/// Render a type together with its annotations, keeping annotation order
pub fn annotated_as_code(datatype: &DataType, annotations: &[Annotation]) -> GenerationResult<String> {
    if annotations.is_empty() {
        return type_as_code(datatype);
    }
    let rendered = annotations
        .iter()
        .map(|annotation| {
            let args = annotation
                .arguments()
                .iter()
                .map(value_as_code)
                .collect::<GenerationResult<Vec<_>>>()?;
            Ok(format!(
                "{}::{}({})",
                namespace::ANNOTATIONS,
                annotation.constructor(),
                args.join(", ")
            ))
        })
        .collect::<GenerationResult<Vec<_>>>()?;
    Ok(format!(
        "{}::annotated({}, [{}])",
        namespace::TYPES,
        type_as_code(datatype)?,
        rendered.join(", ")
    ))
}

/// Render a literal as a Rhai expression evaluating to that value
pub fn value_as_code(value: &Value) -> GenerationResult<String> {
    Ok(match value {
        Value::Int(i64::MIN) => "(-9223372036854775807 - 1)".to_string(),
        Value::Int(v) => v.to_string(),
        Value::Float(v) => float_literal(*v),
        Value::Str(v) => string_literal(v),
        Value::Bool(v) => v.to_string(),
        Value::List(items) => {
            let items = items.iter().map(value_as_code).collect::<GenerationResult<Vec<_>>>()?;
            format!("[{}]", items.join(", "))
        }
        Value::Tuple(_) | Value::Dict(_) => blob_value(value)?,
    })
}

fn float_literal(v: f64) -> String {
    if v.is_nan() {
        return "parse_float(\"NaN\")".to_string();
    }
    if v.is_infinite() {
        let text = if v > 0.0 { "inf" } else { "-inf" };
        return format!("parse_float(\"{}\")", text);
    }
    let text = format!("{:?}", v);
    match text.find('e') {
        Some(exp) if !text[..exp].contains('.') => format!("{}.0{}", &text[..exp], &text[exp..]),
        _ => text,
    }
}

fn collect_type_modules(datatype: &DataType, modules: &mut BTreeSet<&'static str>) {
    datatype.walk(&mut |t| match t {
        DataType::Node(class) if is_identifier(class.name()) => {
            modules.insert(namespace::SCENE);
        }
        DataType::Node(_) | DataType::Opaque(_) => {
            modules.insert(namespace::BLOB);
        }
        DataType::Annotated(_, annotations) => {
            modules.insert(namespace::ANNOTATIONS);
            for value in annotations.iter().flat_map(Annotation::arguments) {
                collect_value_modules(&value, modules);
            }
        }
        _ => {
            modules.insert(namespace::TYPES);
        }
    });
}

fn collect_value_modules(value: &Value, modules: &mut BTreeSet<&'static str>) {
    match value {
        Value::Tuple(_) | Value::Dict(_) => {
            modules.insert(namespace::BLOB);
        }
        Value::List(items) => items.iter().for_each(|item| collect_value_modules(item, modules)),
        _ => {}
    }
}

fn import_lines(modules: BTreeSet<&'static str>) -> String {
    modules.into_iter().map(import_line).collect::<Vec<_>>().join("\n")
}

/// Import lines needed to evaluate [`type_as_code`] of `datatype`
pub fn import_code_for_type(datatype: &DataType) -> String {
    let mut modules = BTreeSet::new();
    collect_type_modules(datatype, &mut modules);
    import_lines(modules)
}

/// Import lines for the datatypes of several graph nodes
pub fn import_code_for_types<'a>(keys: impl IntoIterator<Item = &'a NodeKey>, graph: &PipelineGraph) -> String {
    let mut modules = BTreeSet::new();
    for key in keys {
        if let Some(datatype) = graph.datatype(key) {
            collect_type_modules(datatype, &mut modules);
        }
    }
    import_lines(modules)
}

/// Import lines needed to evaluate [`value_as_code`] of `value`
pub fn import_code_for_value(value: &Value) -> String {
    let mut modules = BTreeSet::new();
    collect_value_modules(value, &mut modules);
    import_lines(modules)
}

/// Deduplicate and sort import lines, dropping the implicit `types` module
pub fn cleanup_imports(imports: &str) -> String {
    let implicit = import_line(namespace::TYPES);
    let unique: BTreeSet<&str> = imports
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && *line != implicit)
        .collect();
    unique.into_iter().collect::<Vec<_>>().join("\n")
}
