//! Data types that flow through a pipeline graph
//!
//! Every parameter slot, return slot and overall pipeline input/output carries a
//! [`DataType`]. The validator compares them, the code generator renders them as
//! Rhai expressions, and the pipeline host evaluates those expressions back into
//! [`DataType`] values when a generated unit declares its parameter packs.
//!
//! # Main Types
//!
//! - [`DataType`] - The type of a slot (primitives, containers, node classes, packs)
//! - [`NodeClass`] - A managed-resource class together with its ancestry
//! - [`PackType`] - A named, ordered bundle of fields (a "parameter pack")
//! - [`Annotation`] - UI/constraint metadata attached to a type
//! - [`Value`] - A literal that can be bound to a slot instead of a connection
//!
//! # Subtyping
//!
//! Only node classes form a hierarchy. A `ModelNode` is accepted wherever a
//! `DisplayableNode` or the root `Node` is expected. Every other type is only
//! compatible with itself, apart from the `int` to `float` widening handled by
//! [`DataType::accepts`].

mod annotation;
mod value;

pub use annotation::Annotation;
pub use value::Value;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the root class every managed resource derives from
pub const BASE_NODE_CLASS: &str = "Node";

/// A managed-resource class, e.g. `ModelNode`
///
/// The ancestry is stored nearest-first so subtype checks never need a class
/// table lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeClass {
    name: String,
    ancestors: Vec<String>,
}

impl NodeClass {
    /// The root node class
    pub fn base() -> Self {
        Self {
            name: BASE_NODE_CLASS.to_string(),
            ancestors: Vec::new(),
        }
    }

    /// A class deriving directly from the root node class
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        if name == BASE_NODE_CLASS {
            return Self::base();
        }
        Self::derived(name, &Self::base())
    }

    /// A class deriving from `parent`
    pub fn derived(name: impl Into<String>, parent: &NodeClass) -> Self {
        let mut ancestors = Vec::with_capacity(parent.ancestors.len() + 1);
        ancestors.push(parent.name.clone());
        ancestors.extend(parent.ancestors.iter().cloned());
        Self {
            name: name.into(),
            ancestors,
        }
    }

    /// The bare class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ancestor class names, nearest first
    pub fn ancestors(&self) -> &[String] {
        &self.ancestors
    }

    /// The direct parent class, `None` for the root
    pub fn parent(&self) -> Option<NodeClass> {
        let (name, rest) = self.ancestors.split_first()?;
        Some(Self {
            name: name.clone(),
            ancestors: rest.to_vec(),
        })
    }

    /// Whether this class is `other` or derives from it
    pub fn is_subclass_of(&self, other: &NodeClass) -> bool {
        self.name == other.name || self.ancestors.iter().any(|a| *a == other.name)
    }
}

impl fmt::Display for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A named bundle of fields, used for composite returns and parameter nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackType {
    name: String,
    fields: Vec<(String, DataType)>,
}

impl PackType {
    /// Create an empty pack
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Builder-style field addition
    pub fn with_field(mut self, name: impl Into<String>, datatype: DataType) -> Self {
        self.fields.push((name.into(), datatype));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[(String, DataType)] {
        &self.fields
    }

    /// Look up a single field
    pub fn field(&self, name: &str) -> Option<&DataType> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, datatype)| datatype)
    }
}

/// The type of a slot in a pipeline graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataType {
    /// "Nothing"; never a valid return type for an operation
    Unit,
    Int,
    Float,
    Str,
    Bool,
    List(Box<DataType>),
    Dict(Box<DataType>, Box<DataType>),
    Tuple(Vec<DataType>),
    /// A managed resource living in the scene
    Node(NodeClass),
    /// A composite value with named fields
    Pack(PackType),
    /// A type carrying constraint/UI metadata
    Annotated(Box<DataType>, Vec<Annotation>),
    /// The progress-reporting capability an operation may accept
    Progress,
    /// An externally defined type known only by name
    Opaque(String),
}

impl DataType {
    pub fn list(item: DataType) -> Self {
        DataType::List(Box::new(item))
    }

    pub fn dict(key: DataType, value: DataType) -> Self {
        DataType::Dict(Box::new(key), Box::new(value))
    }

    pub fn tuple(items: impl IntoIterator<Item = DataType>) -> Self {
        DataType::Tuple(items.into_iter().collect())
    }

    pub fn node(class: NodeClass) -> Self {
        DataType::Node(class)
    }

    pub fn pack(pack: PackType) -> Self {
        DataType::Pack(pack)
    }

    pub fn annotated(inner: DataType, annotations: impl IntoIterator<Item = Annotation>) -> Self {
        DataType::Annotated(Box::new(inner), annotations.into_iter().collect())
    }

    /// Strip any annotation layers
    pub fn unannotated(&self) -> &DataType {
        match self {
            DataType::Annotated(inner, _) => inner.unannotated(),
            other => other,
        }
    }

    /// Annotations of the outermost layer (empty when not annotated)
    pub fn annotations(&self) -> &[Annotation] {
        match self {
            DataType::Annotated(_, annotations) => annotations,
            _ => &[],
        }
    }

    /// The default value declared through a [`Annotation::Default`], if any
    pub fn default_value(&self) -> Option<&Value> {
        let mut current = self;
        while let DataType::Annotated(inner, annotations) = current {
            if let Some(value) = annotations.iter().find_map(|a| match a {
                Annotation::Default(value) => Some(value),
                _ => None,
            }) {
                return Some(value);
            }
            current = inner;
        }
        None
    }

    /// Whether values of this type need explicit lifecycle management
    pub fn is_managed_resource(&self) -> bool {
        matches!(self.unannotated(), DataType::Node(_))
    }

    pub fn node_class(&self) -> Option<&NodeClass> {
        match self.unannotated() {
            DataType::Node(class) => Some(class),
            _ => None,
        }
    }

    pub fn as_pack(&self) -> Option<&PackType> {
        match self.unannotated() {
            DataType::Pack(pack) => Some(pack),
            _ => None,
        }
    }

    /// Resolve a dotted field path (`"mesh"` or `"parts.mesh"`) through packs
    pub fn field_path(&self, path: &str) -> Option<&DataType> {
        path.split('.').try_fold(self, |current, segment| {
            current.as_pack().and_then(|pack| pack.field(segment))
        })
    }

    /// Identical to `other`, or a node class deriving from it
    pub fn is_subtype_of(&self, other: &DataType) -> bool {
        match (self.unannotated(), other.unannotated()) {
            (DataType::Node(child), DataType::Node(parent)) => child.is_subclass_of(parent),
            (lhs, rhs) => lhs == rhs,
        }
    }

    /// Whether a slot of this type can be fed from a `source` slot
    pub fn accepts(&self, source: &DataType) -> bool {
        matches!(
            (source.unannotated(), self.unannotated()),
            (DataType::Int, DataType::Float)
        ) || source.is_subtype_of(self)
    }

    /// Visit this type and every type nested inside it
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a DataType)) {
        visit(self);
        match self {
            DataType::List(item) => item.walk(visit),
            DataType::Dict(key, value) => {
                key.walk(visit);
                value.walk(visit);
            }
            DataType::Tuple(items) => items.iter().for_each(|item| item.walk(visit)),
            DataType::Pack(pack) => pack.fields.iter().for_each(|(_, t)| t.walk(visit)),
            DataType::Annotated(inner, _) => inner.walk(visit),
            _ => {}
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Unit => write!(f, "()"),
            DataType::Int => write!(f, "int"),
            DataType::Float => write!(f, "float"),
            DataType::Str => write!(f, "str"),
            DataType::Bool => write!(f, "bool"),
            DataType::List(item) => write!(f, "list[{}]", item),
            DataType::Dict(key, value) => write!(f, "dict[{}, {}]", key, value),
            DataType::Tuple(items) => {
                write!(f, "tuple[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            DataType::Node(class) => write!(f, "{}", class),
            DataType::Pack(pack) => write!(f, "{}", pack.name),
            DataType::Annotated(inner, annotations) => {
                write!(f, "Annotated[{}", inner)?;
                for annotation in annotations {
                    write!(f, ", {}", annotation)?;
                }
                write!(f, "]")
            }
            DataType::Progress => write!(f, "ProgressCallback"),
            DataType::Opaque(name) => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn displayable() -> NodeClass {
        NodeClass::new("DisplayableNode")
    }

    #[test]
    fn test_node_class_ancestry() {
        let model = NodeClass::derived("ModelNode", &displayable());
        assert_eq!(model.ancestors(), ["DisplayableNode", "Node"]);
        assert!(model.is_subclass_of(&displayable()));
        assert!(model.is_subclass_of(&NodeClass::base()));
        assert!(!displayable().is_subclass_of(&model));
        assert_eq!(NodeClass::new("Node"), NodeClass::base());
        assert_eq!(model.parent(), Some(displayable()));
        assert_eq!(NodeClass::base().parent(), None);
    }

    #[test]
    fn test_accepts_int_widening_only() {
        assert!(DataType::Float.accepts(&DataType::Int));
        assert!(!DataType::Int.accepts(&DataType::Float));
        assert!(!DataType::Str.accepts(&DataType::Bool));
        assert!(DataType::Int.accepts(&DataType::annotated(
            DataType::Int,
            [Annotation::Minimum(Value::Int(0))]
        )));
    }

    #[test]
    fn test_node_subtyping() {
        let model = DataType::node(NodeClass::derived("ModelNode", &displayable()));
        let display = DataType::node(displayable());
        assert!(display.accepts(&model));
        assert!(!model.accepts(&display));
    }

    #[test]
    fn test_field_path_through_nested_packs() {
        let inner = PackType::new("Inner").with_field("mesh", DataType::node(NodeClass::new("ModelNode")));
        let outer = DataType::pack(
            PackType::new("Outer")
                .with_field("count", DataType::Int)
                .with_field("parts", DataType::pack(inner)),
        );
        assert_eq!(outer.field_path("count"), Some(&DataType::Int));
        assert!(outer.field_path("parts.mesh").is_some_and(DataType::is_managed_resource));
        assert_eq!(outer.field_path("missing"), None);
        assert_eq!(DataType::Int.field_path("anything"), None);
    }

    #[test]
    fn test_default_value_lookup() {
        let datatype = DataType::annotated(
            DataType::Int,
            [Annotation::Minimum(Value::Int(0)), Annotation::Default(Value::Int(7))],
        );
        assert_eq!(datatype.default_value(), Some(&Value::Int(7)));
        assert_eq!(DataType::Int.default_value(), None);
    }

    #[test]
    fn test_display() {
        let datatype = DataType::list(DataType::dict(
            DataType::tuple([DataType::Str, DataType::Int]),
            DataType::list(DataType::Bool),
        ));
        assert_eq!(datatype.to_string(), "list[dict[tuple[str, int], list[bool]]]");
        assert_eq!(
            DataType::annotated(DataType::Int, [Annotation::WithinRange(Value::Int(10), Value::Int(15))])
                .to_string(),
            "Annotated[int, WithinRange(10, 15)]"
        );
    }

    #[test]
    fn test_walk_visits_nested_types() {
        let datatype = DataType::dict(DataType::Str, DataType::list(DataType::node(NodeClass::base())));
        let mut seen = Vec::new();
        datatype.walk(&mut |t| seen.push(t.clone()));
        assert_eq!(seen.len(), 4);
        assert!(seen.iter().any(DataType::is_managed_resource));
    }
}
