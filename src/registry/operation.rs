//! Operation records, signatures and the call context handed to native code

use super::error::OperationError;
use crate::progress::ProgressCallback;
use crate::scene::{NodeHandle, Scene};
use crate::types::{DataType, Value};
use rhai::{Dynamic, Map};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Native implementation of an operation
pub type OperationFn = Arc<dyn Fn(&mut OperationCall) -> Result<Dynamic, OperationError> + Send + Sync>;

/// A declared parameter; `None` means the parameter carries no type
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub datatype: Option<DataType>,
}

/// Declared parameter and return types of an operation
///
/// This is what registration inspects to reject malformed operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    parameters: Vec<Parameter>,
    returns: Option<DataType>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a typed parameter
    pub fn param(mut self, name: impl Into<String>, datatype: DataType) -> Self {
        self.parameters.push(Parameter {
            name: name.into(),
            datatype: Some(datatype),
        });
        self
    }

    /// Add a parameter without a declared type
    pub fn unannotated_param(mut self, name: impl Into<String>) -> Self {
        self.parameters.push(Parameter {
            name: name.into(),
            datatype: None,
        });
        self
    }

    /// Declare the return type
    pub fn returns(mut self, datatype: DataType) -> Self {
        self.returns = Some(datatype);
        self
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn return_type(&self) -> Option<&DataType> {
        self.returns.as_ref()
    }
}

/// Immutable record of a registered operation
#[derive(Clone)]
pub struct OperationInfo {
    pub(super) name: String,
    pub(super) function: OperationFn,
    pub(super) parameters: Vec<(String, DataType)>,
    pub(super) return_type: DataType,
    pub(super) progress_parameter: Option<String>,
    pub(super) dependencies: BTreeSet<String>,
    pub(super) categories: BTreeSet<String>,
}

impl OperationInfo {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameters exposed for graph composition, in declaration order
    ///
    /// The progress parameter is not among them.
    pub fn parameters(&self) -> &[(String, DataType)] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&DataType> {
        self.parameters
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, datatype)| datatype)
    }

    pub fn return_type(&self) -> &DataType {
        &self.return_type
    }

    /// Name of the parameter that receives a progress callback, if any
    pub fn progress_parameter(&self) -> Option<&str> {
        self.progress_parameter.as_deref()
    }

    pub fn dependencies(&self) -> &BTreeSet<String> {
        &self.dependencies
    }

    pub fn categories(&self) -> &BTreeSet<String> {
        &self.categories
    }

    /// Run the operation with named arguments
    ///
    /// The progress callback, if any, is taken from the argument named by
    /// [`progress_parameter`](Self::progress_parameter).
    pub fn call(&self, mut args: Map, scene: &Scene) -> Result<Dynamic, OperationError> {
        for (name, _) in &self.parameters {
            if !args.contains_key(name.as_str()) {
                return Err(OperationError::MissingArgument(name.clone()));
            }
        }

        let progress = self
            .progress_parameter
            .as_deref()
            .and_then(|name| args.remove(name))
            .and_then(|value| value.try_cast::<ProgressCallback>());

        let mut call = OperationCall {
            operation: self.name.clone(),
            args,
            progress,
            scene: scene.clone(),
        };
        tracing::trace!("Calling operation '{}'", self.name);
        (self.function)(&mut call)
    }
}

impl fmt::Debug for OperationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationInfo")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("return_type", &self.return_type)
            .field("progress_parameter", &self.progress_parameter)
            .field("dependencies", &self.dependencies)
            .field("categories", &self.categories)
            .finish()
    }
}

/// Arguments and context for one invocation of an operation
pub struct OperationCall {
    operation: String,
    args: Map,
    progress: Option<ProgressCallback>,
    scene: Scene,
}

impl OperationCall {
    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// The progress callback passed by the caller, or a no-op one
    pub fn progress(&self) -> ProgressCallback {
        self.progress.clone().unwrap_or_default()
    }

    pub fn arg(&self, name: &str) -> Result<&Dynamic, OperationError> {
        self.args
            .get(name)
            .ok_or_else(|| OperationError::MissingArgument(name.to_string()))
    }

    /// Fetch and downcast an argument of a registered custom type
    pub fn get<T: Clone + Send + Sync + 'static>(&self, name: &str, expected: &str) -> Result<T, OperationError> {
        self.arg(name)?
            .clone()
            .try_cast::<T>()
            .ok_or_else(|| type_error(name, expected))
    }

    pub fn int(&self, name: &str) -> Result<i64, OperationError> {
        self.arg(name)?.as_int().map_err(|_| type_error(name, "int"))
    }

    /// A float argument; integers are widened
    pub fn float(&self, name: &str) -> Result<f64, OperationError> {
        let value = self.arg(name)?;
        value
            .as_float()
            .or_else(|_| value.as_int().map(|v| v as f64))
            .map_err(|_| type_error(name, "float"))
    }

    pub fn string(&self, name: &str) -> Result<String, OperationError> {
        self.arg(name)?
            .clone()
            .into_string()
            .map_err(|_| type_error(name, "str"))
    }

    pub fn bool(&self, name: &str) -> Result<bool, OperationError> {
        self.arg(name)?.as_bool().map_err(|_| type_error(name, "bool"))
    }

    pub fn node(&self, name: &str) -> Result<NodeHandle, OperationError> {
        self.get::<NodeHandle>(name, "node")
    }

    /// A plain-data argument (numbers, strings, lists, maps)
    pub fn value(&self, name: &str) -> Result<Value, OperationError> {
        Value::from_dynamic(self.arg(name)?).ok_or_else(|| type_error(name, "value"))
    }
}

fn type_error(name: &str, expected: &str) -> OperationError {
    OperationError::ArgumentType {
        name: name.to_string(),
        expected: expected.to_string(),
    }
}

impl fmt::Debug for OperationCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationCall")
            .field("operation", &self.operation)
            .field("args", &self.args.keys().collect::<Vec<_>>())
            .field("has_progress", &self.progress.is_some())
            .finish()
    }
}
