//! Registry of operations that can appear as pipeline steps
//!
//! Every operation is registered once, during an explicit initialization
//! phase, with a [`Signature`] describing its typed parameters and return.
//! Registration rejects malformed signatures up front so that validation and
//! code generation can rely on every registered operation being fully typed.
//!
//! ```ignore
//! let mut registry = Registry::new();
//! registry.register(
//!     "double",
//!     |call| Ok(Dynamic::from_int(call.int("x")? * 2)),
//!     Signature::new().param("x", DataType::Int).returns(DataType::Int),
//!     &[],
//!     &["Math"],
//! )?;
//! ```

mod error;
mod operation;

pub use error::{OperationError, RegistrationError, RegistrationResult};
pub use operation::{OperationCall, OperationFn, OperationInfo, Parameter, Signature};

use crate::types::{DataType, NodeClass};
use rhai::Dynamic;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Something that contributes operations to a [`Registry`]
///
/// Hosts collect every provider and hand them to
/// [`Registry::register_all`] once all of them are available.
pub trait OperationProvider {
    fn register(&self, registry: &mut Registry) -> RegistrationResult<()>;
}

/// Fully checked parts of a [`Signature`]
struct CheckedSignature {
    parameters: Vec<(String, DataType)>,
    return_type: DataType,
    progress_parameter: Option<String>,
}

/// Check a signature the way registration does
///
/// Fails if the return type is missing or `()`, if any parameter has no type,
/// if a parameter name repeats, or if more than one parameter takes progress.
pub fn validate_signature(name: &str, signature: &Signature) -> RegistrationResult<()> {
    check_signature(name, signature).map(|_| ())
}

fn check_signature(name: &str, signature: &Signature) -> RegistrationResult<CheckedSignature> {
    let reject = |reason: String| RegistrationError::Signature {
        name: name.to_string(),
        reason,
    };

    let return_type = signature
        .return_type()
        .ok_or_else(|| reject("return type is not annotated".to_string()))?;
    if *return_type.unannotated() == DataType::Unit {
        return Err(reject("return type must not be ()".to_string()));
    }

    let mut parameters: Vec<(String, DataType)> = Vec::new();
    let mut progress_parameter = None;
    for param in signature.parameters() {
        let datatype = param
            .datatype
            .as_ref()
            .ok_or_else(|| reject(format!("parameter '{}' is not annotated", param.name)))?;

        if parameters.iter().any(|(p, _)| *p == param.name) || progress_parameter.as_ref() == Some(&param.name) {
            return Err(reject(format!("parameter '{}' is declared twice", param.name)));
        }

        if *datatype.unannotated() == DataType::Progress {
            if let Some(existing) = &progress_parameter {
                return Err(reject(format!(
                    "parameters '{}' and '{}' both take a progress callback",
                    existing, param.name
                )));
            }
            progress_parameter = Some(param.name.clone());
        } else {
            parameters.push((param.name.clone(), datatype.clone()));
        }
    }

    Ok(CheckedSignature {
        parameters,
        return_type: return_type.clone(),
        progress_parameter,
    })
}

/// Operations available to pipelines, keyed by unique name
#[derive(Debug, Clone, Default)]
pub struct Registry {
    operations: BTreeMap<String, OperationInfo>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        function: F,
        signature: Signature,
        dependencies: &[&str],
        categories: &[&str],
    ) -> RegistrationResult<()>
    where
        F: Fn(&mut OperationCall) -> Result<Dynamic, OperationError> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.operations.contains_key(&name) {
            return Err(RegistrationError::DuplicateName(name));
        }
        let checked = check_signature(&name, &signature)?;

        tracing::debug!(
            "Registered operation '{}' ({} parameters, progress: {})",
            name,
            checked.parameters.len(),
            checked.progress_parameter.is_some()
        );

        self.operations.insert(
            name.clone(),
            OperationInfo {
                name,
                function: Arc::new(function),
                parameters: checked.parameters,
                return_type: checked.return_type,
                progress_parameter: checked.progress_parameter,
                dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
                categories: categories.iter().map(|c| c.to_string()).collect(),
            },
        );
        Ok(())
    }

    /// Let every provider register its operations
    ///
    /// Stops at the first failure.
    pub fn register_all(&mut self, providers: &[&dyn OperationProvider]) -> RegistrationResult<()> {
        for provider in providers {
            provider.register(self)?;
        }
        tracing::info!("Registry initialized with {} operations", self.len());
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&OperationInfo> {
        self.operations.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperationInfo> {
        self.operations.values()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Every distinct unannotated parameter and return type
    pub fn pipelined_types(&self) -> Vec<DataType> {
        let mut types: Vec<DataType> = Vec::new();
        for info in self.iter() {
            let candidates = info
                .parameters()
                .iter()
                .map(|(_, datatype)| datatype)
                .chain(std::iter::once(info.return_type()));
            for datatype in candidates {
                let datatype = datatype.unannotated();
                if !types.contains(datatype) {
                    types.push(datatype.clone());
                }
            }
        }
        types
    }

    /// Every node class mentioned by a registered operation, ancestors included
    pub fn node_classes(&self) -> Vec<NodeClass> {
        let mut classes: Vec<NodeClass> = Vec::new();
        let mut add = |class: &NodeClass| {
            let mut current = Some(class.clone());
            while let Some(class) = current {
                current = class.parent();
                if !classes.contains(&class) {
                    classes.push(class);
                }
            }
        };
        for info in self.iter() {
            for (_, datatype) in info.parameters() {
                datatype.walk(&mut |t| {
                    if let DataType::Node(class) = t {
                        add(class);
                    }
                });
            }
            info.return_type().walk(&mut |t| {
                if let DataType::Node(class) = t {
                    add(class);
                }
            });
        }
        classes
    }
}
