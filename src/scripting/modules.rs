//! Builders for the host modules generated units import

use super::engine::OperationHandle;
use crate::progress::ProgressCallback;
use crate::registry::Registry;
use crate::scene::{NodeHandle, Scene};
use crate::types::{Annotation, DataType, NodeClass, PackType, Value};
use rhai::{Array, Dynamic, EvalAltResult, ImmutableString, Map, Module, Position};
use std::sync::Arc;

pub(super) type ScriptResult<T> = Result<T, Box<EvalAltResult>>;

pub(super) fn runtime_error(message: impl Into<String>) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorRuntime(message.into().into(), Position::NONE))
}

fn cast_type(value: Dynamic, context: &str) -> ScriptResult<DataType> {
    let type_name = value.type_name();
    value
        .try_cast::<DataType>()
        .ok_or_else(|| runtime_error(format!("{}: expected a type, found {}", context, type_name)))
}

fn plain_value(value: &Dynamic, context: &str) -> ScriptResult<Value> {
    Value::from_dynamic(value)
        .ok_or_else(|| runtime_error(format!("{}: {} is not a plain value", context, value.type_name())))
}

fn pack_field(entry: Dynamic) -> ScriptResult<(String, DataType)> {
    let pair = entry
        .try_cast::<Array>()
        .filter(|pair| pair.len() == 2)
        .ok_or_else(|| runtime_error("pack fields are written as [name, type]"))?;
    let mut pair = pair.into_iter();
    let name = pair
        .next()
        .and_then(|name| name.into_string().ok())
        .ok_or_else(|| runtime_error("pack field names must be strings"))?;
    let datatype = match pair.next() {
        Some(datatype) => cast_type(datatype, &name)?,
        None => return Err(runtime_error("pack field is missing its type")),
    };
    Ok((name, datatype))
}

/// The value a fresh parameter node holds for `datatype`
pub(super) fn default_dynamic(datatype: &DataType) -> Dynamic {
    if let Some(value) = datatype.default_value() {
        return value.to_dynamic();
    }
    match datatype.unannotated() {
        DataType::Int => Dynamic::from_int(0),
        DataType::Float => Dynamic::from_float(0.0),
        DataType::Str => Dynamic::from(String::new()),
        DataType::Bool => Dynamic::from_bool(false),
        DataType::List(_) => Dynamic::from_array(Array::new()),
        DataType::Dict(_, _) => Dynamic::from_map(Map::new()),
        DataType::Tuple(items) => Dynamic::from_array(items.iter().map(default_dynamic).collect()),
        DataType::Pack(pack) => Dynamic::from_map(instantiate(pack)),
        DataType::Unit | DataType::Node(_) | DataType::Progress | DataType::Opaque(_) | DataType::Annotated(..) => {
            Dynamic::UNIT
        }
    }
}

/// A map holding the default value of every pack field
pub(super) fn instantiate(pack: &PackType) -> Map {
    pack.fields()
        .iter()
        .map(|(name, datatype)| (name.as_str().into(), default_dynamic(datatype)))
        .collect()
}

pub(super) fn types_module() -> Module {
    let mut module = Module::new();
    module.set_var("unit", DataType::Unit);
    module.set_var("int", DataType::Int);
    module.set_var("float", DataType::Float);
    module.set_var("str", DataType::Str);
    module.set_var("bool", DataType::Bool);
    module.set_var("progress", DataType::Progress);

    module.set_native_fn("list", |item: Dynamic| -> ScriptResult<DataType> {
        Ok(DataType::list(cast_type(item, "list")?))
    });
    module.set_native_fn("dict", |key: Dynamic, value: Dynamic| -> ScriptResult<DataType> {
        Ok(DataType::dict(cast_type(key, "dict")?, cast_type(value, "dict")?))
    });
    module.set_native_fn("tuple", |items: Array| -> ScriptResult<DataType> {
        let items = items
            .into_iter()
            .map(|item| cast_type(item, "tuple"))
            .collect::<ScriptResult<Vec<_>>>()?;
        Ok(DataType::Tuple(items))
    });
    module.set_native_fn("pack", |name: ImmutableString, fields: Array| -> ScriptResult<DataType> {
        let mut pack = PackType::new(name.as_str());
        for entry in fields {
            let (field, datatype) = pack_field(entry)?;
            pack = pack.with_field(field, datatype);
        }
        Ok(DataType::pack(pack))
    });
    module.set_native_fn("annotated", |inner: Dynamic, annotations: Array| -> ScriptResult<DataType> {
        let annotations = annotations
            .into_iter()
            .map(|annotation| {
                let type_name = annotation.type_name();
                annotation
                    .try_cast::<Annotation>()
                    .ok_or_else(|| runtime_error(format!("annotated: expected an annotation, found {}", type_name)))
            })
            .collect::<ScriptResult<Vec<_>>>()?;
        Ok(DataType::annotated(cast_type(inner, "annotated")?, annotations))
    });
    module.set_native_fn("instantiate", |pack: Dynamic| -> ScriptResult<Map> {
        let datatype = cast_type(pack, "instantiate")?;
        match datatype.as_pack() {
            Some(pack) => Ok(instantiate(pack)),
            None => Err(runtime_error(format!("instantiate: {} is not a pack", datatype))),
        }
    });
    module
}

pub(super) fn annotations_module() -> Module {
    let mut module = Module::new();
    module.set_native_fn("minimum", |value: Dynamic| -> ScriptResult<Annotation> {
        Ok(Annotation::Minimum(plain_value(&value, "minimum")?))
    });
    module.set_native_fn("maximum", |value: Dynamic| -> ScriptResult<Annotation> {
        Ok(Annotation::Maximum(plain_value(&value, "maximum")?))
    });
    module.set_native_fn("default_value", |value: Dynamic| -> ScriptResult<Annotation> {
        Ok(Annotation::Default(plain_value(&value, "default_value")?))
    });
    module.set_native_fn("decimals", |decimals: i64| -> ScriptResult<Annotation> {
        Ok(Annotation::Decimals(decimals))
    });
    module.set_native_fn("single_step", |value: Dynamic| -> ScriptResult<Annotation> {
        Ok(Annotation::SingleStep(plain_value(&value, "single_step")?))
    });
    module.set_native_fn("within_range", |low: Dynamic, high: Dynamic| -> ScriptResult<Annotation> {
        Ok(Annotation::WithinRange(
            plain_value(&low, "within_range")?,
            plain_value(&high, "within_range")?,
        ))
    });
    module
}

fn as_node(value: &Dynamic) -> Option<NodeHandle> {
    value.clone().try_cast::<NodeHandle>()
}

pub(super) fn scene_module(scene: &Scene, classes: &[NodeClass]) -> Module {
    let mut module = Module::new();
    for class in classes {
        module.set_var(class.name(), DataType::node(class.clone()));
    }

    // `()` is what an unset slot or a failed step leaves behind
    let s = scene.clone();
    module.set_native_fn("remove_node", move |node: Dynamic| -> ScriptResult<bool> {
        if node.is_unit() {
            return Ok(false);
        }
        let handle = as_node(&node)
            .ok_or_else(|| runtime_error(format!("remove_node: expected a node, found {}", node.type_name())))?;
        Ok(s.remove_node(handle.id()))
    });

    let s = scene.clone();
    module.set_native_fn("contains", move |node: Dynamic| -> ScriptResult<bool> {
        Ok(as_node(&node).is_some_and(|handle| s.contains(handle.id())))
    });

    module.set_native_fn("same_node", |a: Dynamic, b: Dynamic| -> ScriptResult<bool> {
        Ok(match (as_node(&a), as_node(&b)) {
            (Some(a), Some(b)) => a.id() == b.id(),
            _ => false,
        })
    });

    let s = scene.clone();
    module.set_native_fn("reference_roles", move |node: NodeHandle| -> ScriptResult<Array> {
        Ok(s.reference_roles(node.id())
            .unwrap_or_default()
            .into_iter()
            .map(Dynamic::from)
            .collect())
    });

    let s = scene.clone();
    module.set_native_fn(
        "has_reference",
        move |holder: NodeHandle, role: ImmutableString, target: Dynamic| -> ScriptResult<bool> {
            Ok(as_node(&target).is_some_and(|target| s.has_reference(holder.id(), role.as_str(), target.id())))
        },
    );

    let s = scene.clone();
    module.set_native_fn("copy_node", move |src: NodeHandle, dest: NodeHandle| -> ScriptResult<()> {
        s.copy_content(src.id(), dest.id())
            .map_err(|e| runtime_error(e.to_string()))
    });
    module
}

pub(super) fn operations_module(registry: Arc<Registry>, scene: &Scene) -> Module {
    let mut module = Module::new();
    let scene = scene.clone();
    module.set_native_fn("get", move |name: ImmutableString| -> ScriptResult<OperationHandle> {
        let info = registry
            .get(name.as_str())
            .ok_or_else(|| runtime_error(format!("Operation '{}' is not registered", name)))?;
        Ok(OperationHandle::new(info.clone(), scene.clone()))
    });
    module
}

pub(super) fn progress_module() -> Module {
    let mut module = Module::new();
    module.set_native_fn("noop", || -> ScriptResult<ProgressCallback> { Ok(ProgressCallback::noop()) });
    module
}

pub(super) fn blob_module() -> Module {
    let mut module = Module::new();
    module.set_native_fn("type_from_json", |text: ImmutableString| -> ScriptResult<DataType> {
        serde_json::from_str::<DataType>(text.as_str()).map_err(|e| runtime_error(format!("type_from_json: {}", e)))
    });
    module.set_native_fn("value_from_json", |text: ImmutableString| -> ScriptResult<Dynamic> {
        serde_json::from_str::<Value>(text.as_str())
            .map(|value| value.to_dynamic())
            .map_err(|e| runtime_error(format!("value_from_json: {}", e)))
    });
    module
}
