//! Constraint and UI metadata attached to a [`DataType`](super::DataType)

use super::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Annotation {
    Minimum(Value),
    Maximum(Value),
    Default(Value),
    Decimals(i64),
    SingleStep(Value),
    WithinRange(Value, Value),
}

impl Annotation {
    /// Name of the constructor function in the `annotations` script module
    pub fn constructor(&self) -> &'static str {
        match self {
            Annotation::Minimum(_) => "minimum",
            Annotation::Maximum(_) => "maximum",
            Annotation::Default(_) => "default_value",
            Annotation::Decimals(_) => "decimals",
            Annotation::SingleStep(_) => "single_step",
            Annotation::WithinRange(..) => "within_range",
        }
    }

    /// Constructor arguments, in call order
    pub fn arguments(&self) -> Vec<Value> {
        match self {
            Annotation::Minimum(v)
            | Annotation::Maximum(v)
            | Annotation::Default(v)
            | Annotation::SingleStep(v) => vec![v.clone()],
            Annotation::Decimals(places) => vec![Value::Int(*places)],
            Annotation::WithinRange(low, high) => vec![low.clone(), high.clone()],
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Annotation::Minimum(_) => "Minimum",
            Annotation::Maximum(_) => "Maximum",
            Annotation::Default(_) => "Default",
            Annotation::Decimals(_) => "Decimals",
            Annotation::SingleStep(_) => "SingleStep",
            Annotation::WithinRange(..) => "WithinRange",
        }
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.label())?;
        for (i, arg) in self.arguments().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructor_representation() {
        let range = Annotation::WithinRange(Value::Int(0), Value::Float(1.5));
        assert_eq!(range.constructor(), "within_range");
        assert_eq!(range.arguments(), vec![Value::Int(0), Value::Float(1.5)]);
        assert_eq!(range.to_string(), "WithinRange(0, 1.5)");
        assert_eq!(Annotation::Decimals(2).to_string(), "Decimals(2)");
    }
}
