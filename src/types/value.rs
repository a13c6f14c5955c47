//! Literal values bound to parameter slots

use super::DataType;
use rhai::{Array, Dynamic, Map};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A literal that can stand in for a connection on a parameter slot
///
/// Only plain data is representable; host expressions are never accepted as
/// fixed values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Dict(Vec<(Value, Value)>),
}

impl Value {
    /// Whether this literal may be bound to a slot of `datatype`
    ///
    /// An integer literal satisfies a `float` slot.
    pub fn conforms_to(&self, datatype: &DataType) -> bool {
        match (self, datatype.unannotated()) {
            (Value::Int(_), DataType::Int | DataType::Float) => true,
            (Value::Float(_), DataType::Float) => true,
            (Value::Str(_), DataType::Str) => true,
            (Value::Bool(_), DataType::Bool) => true,
            (Value::List(items), DataType::List(item)) => items.iter().all(|v| v.conforms_to(item)),
            (Value::Tuple(items), DataType::Tuple(types)) => {
                items.len() == types.len() && items.iter().zip(types).all(|(v, t)| v.conforms_to(t))
            }
            (Value::Dict(pairs), DataType::Dict(key, value)) => pairs
                .iter()
                .all(|(k, v)| k.conforms_to(key) && v.conforms_to(value)),
            _ => false,
        }
    }

    /// Short name of the literal's runtime type, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bool(_) => "bool",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
        }
    }

    /// Convert into a script value
    ///
    /// Tuples become arrays. Dictionary keys are stringified because script
    /// maps only have string keys.
    pub fn to_dynamic(&self) -> Dynamic {
        match self {
            Value::Int(v) => Dynamic::from_int(*v),
            Value::Float(v) => Dynamic::from_float(*v),
            Value::Str(v) => Dynamic::from(v.clone()),
            Value::Bool(v) => Dynamic::from_bool(*v),
            Value::List(items) | Value::Tuple(items) => {
                Dynamic::from_array(items.iter().map(Value::to_dynamic).collect())
            }
            Value::Dict(pairs) => {
                let mut map = Map::new();
                for (key, value) in pairs {
                    let key = match key {
                        Value::Str(s) => s.clone(),
                        other => other.to_string(),
                    };
                    map.insert(key.into(), value.to_dynamic());
                }
                Dynamic::from_map(map)
            }
        }
    }

    /// Convert back from a script value, if it holds plain data
    ///
    /// Arrays come back as lists and maps as string-keyed dicts. A tuple or a
    /// dict with non-string keys therefore does not survive a trip through
    /// [`to_dynamic`](Self::to_dynamic): `{1: true}` returns as `{"1": true}`.
    pub fn from_dynamic(value: &Dynamic) -> Option<Value> {
        if let Ok(v) = value.as_int() {
            return Some(Value::Int(v));
        }
        if let Ok(v) = value.as_float() {
            return Some(Value::Float(v));
        }
        if let Ok(v) = value.as_bool() {
            return Some(Value::Bool(v));
        }
        if value.is_string() {
            return value.clone().into_string().ok().map(Value::Str);
        }
        if value.is_array() {
            let items = value.clone().try_cast::<Array>()?;
            return items
                .iter()
                .map(Value::from_dynamic)
                .collect::<Option<Vec<_>>>()
                .map(Value::List);
        }
        if value.is_map() {
            let map = value.clone().try_cast::<Map>()?;
            return map
                .iter()
                .map(|(k, v)| Value::from_dynamic(v).map(|v| (Value::Str(k.to_string()), v)))
                .collect::<Option<Vec<_>>>()
                .map(Value::Dict);
        }
        None
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{:?}", v),
            Value::Str(v) => write!(f, "{:?}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::List(items) => {
                write!(f, "[")?;
                write_items(f, items)?;
                write!(f, "]")
            }
            Value::Tuple(items) => {
                write!(f, "(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Value::Dict(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_satisfies_float() {
        assert!(Value::Int(3).conforms_to(&DataType::Float));
        assert!(!Value::Float(3.5).conforms_to(&DataType::Int));
        assert!(Value::Float(3.5).conforms_to(&DataType::Float));
    }

    #[test]
    fn test_container_conformance() {
        let list = Value::from(vec![1i64, 2, 3]);
        assert!(list.conforms_to(&DataType::list(DataType::Int)));
        assert!(list.conforms_to(&DataType::list(DataType::Float)));
        assert!(!list.conforms_to(&DataType::list(DataType::Str)));

        let tuple = Value::Tuple(vec![Value::from("a"), Value::Int(1)]);
        assert!(tuple.conforms_to(&DataType::tuple([DataType::Str, DataType::Int])));
        assert!(!tuple.conforms_to(&DataType::tuple([DataType::Str])));

        let dict = Value::Dict(vec![(Value::from("k"), Value::Bool(true))]);
        assert!(dict.conforms_to(&DataType::dict(DataType::Str, DataType::Bool)));
        assert!(!dict.conforms_to(&DataType::dict(DataType::Int, DataType::Bool)));
    }

    #[test]
    fn test_dynamic_conversion() {
        let value = Value::List(vec![Value::Int(1), Value::Float(2.5), Value::from("x"), Value::Bool(false)]);
        let dynamic = value.to_dynamic();
        assert_eq!(Value::from_dynamic(&dynamic), Some(value));
        assert_eq!(Value::from_dynamic(&Dynamic::UNIT), None);
    }

    #[test]
    fn test_dict_keys_come_back_as_strings() {
        let dict = Value::Dict(vec![(Value::Int(1), Value::Bool(true))]);
        let back = Value::from_dynamic(&dict.to_dynamic()).unwrap();
        assert_eq!(back, Value::Dict(vec![(Value::from("1"), Value::Bool(true))]));
        assert!(!back.conforms_to(&DataType::dict(DataType::Int, DataType::Bool)));

        let tuple = Value::Tuple(vec![Value::Int(1), Value::from("a")]);
        assert_eq!(
            Value::from_dynamic(&tuple.to_dynamic()),
            Some(Value::List(vec![Value::Int(1), Value::from("a")]))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Float(1.0).to_string(), "1.0");
        assert_eq!(Value::from("a\"b").to_string(), "\"a\\\"b\"");
        assert_eq!(Value::Tuple(vec![Value::Int(1)]).to_string(), "(1,)");
    }
}
