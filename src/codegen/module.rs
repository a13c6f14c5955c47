//! Generation of the module metadata block.

use super::error::GenerationResult;
use super::util::{string_literal, value_as_code, CodePiece};
use crate::config::GeneratorConfig;
use crate::graph::ValidatedPipeline;
use crate::registry::Registry;
use crate::types::Value;
use std::collections::BTreeSet;
use std::path::Path;

/// Metadata a host shows for a loaded pipeline unit
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleMetadata {
    pub title: String,
    pub categories: Vec<String>,
    pub dependencies: Vec<String>,
    pub contributors: Vec<String>,
    pub help_text: String,
    pub acknowledgement_text: String,
    /// Icon path relative to the unit's directory
    pub icon: Option<String>,
}

/// Sorted union of every step's dependencies plus the generator itself
pub fn module_dependencies(pipeline: &ValidatedPipeline, registry: &Registry, config: &GeneratorConfig) -> Vec<String> {
    let mut dependencies: BTreeSet<String> = pipeline
        .graph()
        .keys()
        .filter_map(|key| key.operation.as_deref())
        .filter_map(|operation| registry.get(operation))
        .flat_map(|info| info.dependencies().iter().cloned())
        .collect();
    dependencies.insert(config.generator_name.clone());
    dependencies.into_iter().collect()
}

/// Where `create_pipeline` puts the icon of unit `name`
pub fn icon_relative_path(name: &str, config: &GeneratorConfig) -> String {
    // generated code always uses forward slashes
    let mut parts: Vec<String> = config
        .icon_subdirectory
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.push(format!("{}.png", name));
    parts.join("/")
}

impl ModuleMetadata {
    pub fn new(
        name: &str,
        pipeline: &ValidatedPipeline,
        registry: &Registry,
        config: &GeneratorConfig,
        icon: Option<&Path>,
    ) -> Self {
        Self {
            title: name.to_string(),
            categories: config.categories.clone(),
            dependencies: module_dependencies(pipeline, registry, config),
            contributors: config.contributors.clone(),
            help_text: config.help_text.clone(),
            acknowledgement_text: config.acknowledgement_text.clone(),
            icon: icon.map(|_| icon_relative_path(name, config)),
        }
    }

    fn string_list(items: &[String]) -> GenerationResult<String> {
        value_as_code(&Value::List(items.iter().map(|s| Value::from(s.as_str())).collect()))
    }

    /// The `module_info()` function returning this metadata as a map
    pub fn to_code(&self, tab: &str) -> GenerationResult<String> {
        let icon = match &self.icon {
            Some(path) => string_literal(path),
            None => "()".to_string(),
        };
        let fields = [
            ("title", string_literal(&self.title)),
            ("categories", Self::string_list(&self.categories)?),
            ("dependencies", Self::string_list(&self.dependencies)?),
            ("contributors", Self::string_list(&self.contributors)?),
            ("help_text", string_literal(&self.help_text)),
            ("acknowledgement_text", string_literal(&self.acknowledgement_text)),
            ("icon", icon),
        ];
        let body = fields
            .iter()
            .map(|(key, value)| format!("{tab}{tab}{key}: {value}"))
            .collect::<Vec<_>>()
            .join(",\n");
        Ok(format!("fn module_info() {{\n{tab}#{{\n{body}\n{tab}}}\n}}"))
    }
}

/// Build the module piece for pipeline `name`
pub fn create_module(
    name: &str,
    pipeline: &ValidatedPipeline,
    registry: &Registry,
    config: &GeneratorConfig,
    icon: Option<&Path>,
) -> GenerationResult<CodePiece> {
    let metadata = ModuleMetadata::new(name, pipeline, registry, config, icon);
    let code = format!("//\n// {}Module\n//\n\n{}\n", name, metadata.to_code(&config.tab())?);
    Ok(CodePiece::new(String::new(), code))
}
