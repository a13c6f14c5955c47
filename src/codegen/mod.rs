//! Source generation for pipeline units
//!
//! A unit is assembled from four pieces, each with its own imports:
//!
//! - the module metadata (`module_info()`)
//! - the parameter node packs (`<Name>Inputs`, `<Name>Outputs`, `<Name>ParameterNode`)
//! - the logic (`run` and its helpers)
//! - the widget driver (`setup`, `on_run`)
//!
//! [`generate_source`] merges them in memory; [`create_pipeline`] validates,
//! generates and writes the unit (and its icon) to disk.

mod error;
pub mod logic;
pub mod module;
pub mod parameter_node;
pub mod util;
pub mod widget;

pub use error::{GenerationError, GenerationResult};
pub use logic::{create_logic, LogicGenerator};
pub use module::{create_module, module_dependencies, ModuleMetadata};
pub use parameter_node::create_parameter_node;
pub use util::CodePiece;
pub use widget::create_widget;

use crate::config::GeneratorConfig;
use crate::error::{CreatorError, Result};
use crate::graph::{validate_pipeline, PipelineGraph, ValidatedPipeline};
use crate::registry::Registry;
use std::path::{Path, PathBuf};
use util::{cleanup_imports, is_identifier};

fn io_error(err: std::io::Error, context: String) -> CreatorError {
    CreatorError::from(GenerationError::Io(err)).with_context(context)
}

/// Paths written by [`create_pipeline`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPipeline {
    pub source_path: PathBuf,
    pub icon_path: Option<PathBuf>,
}

/// Render the complete source of unit `name`
///
/// The output depends only on the arguments; generating twice gives the same
/// text.
pub fn generate_source(
    name: &str,
    pipeline: &ValidatedPipeline,
    registry: &Registry,
    config: &GeneratorConfig,
    icon: Option<&Path>,
) -> GenerationResult<String> {
    if !is_identifier(name) {
        return Err(GenerationError::InvalidIdentifier(name.to_string()));
    }

    let pieces = [
        create_module(name, pipeline, registry, config, icon)?,
        create_parameter_node(name, pipeline, config)?,
        create_logic(name, pipeline, registry, config)?,
        create_widget(name, pipeline, config)?,
    ];

    let imports = cleanup_imports(
        &pieces
            .iter()
            .map(|piece| piece.imports.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
    );
    let code = pieces
        .iter()
        .map(|piece| piece.code.trim_end())
        .collect::<Vec<_>>()
        .join("\n\n");

    tracing::debug!("Generated {} bytes of source for '{}'", code.len(), name);
    Ok(format!(
        "// {name}.{ext}\n// Generated by {generator}. Edit the pipeline, not this file.\n\n{imports}\n\n{code}\n",
        ext = config.file_extension,
        generator = config.generator_name,
    ))
}

/// Validate `graph`, generate unit `name` and write it into `output_directory`
///
/// Nothing is written unless validation and generation succeed. An existing
/// unit of the same name is never overwritten.
pub fn create_pipeline(
    name: &str,
    output_directory: impl AsRef<Path>,
    graph: &PipelineGraph,
    registry: &Registry,
    icon: Option<&Path>,
    config: &GeneratorConfig,
) -> Result<CreatedPipeline> {
    let output_directory = output_directory.as_ref();
    if !is_identifier(name) {
        return Err(GenerationError::InvalidIdentifier(name.to_string()).into());
    }

    let pipeline = validate_pipeline(graph, registry)?;
    let source = generate_source(name, &pipeline, registry, config, icon)?;

    if let Some(icon) = icon {
        if !icon.is_file() {
            return Err(GenerationError::MissingIcon(icon.to_path_buf()).into());
        }
    }

    let source_path = output_directory.join(format!("{}.{}", name, config.file_extension));
    if source_path.exists() {
        return Err(GenerationError::AlreadyExists(source_path).into());
    }

    std::fs::create_dir_all(output_directory)
        .map_err(|e| io_error(e, format!("Failed to create {:?}", output_directory)))?;
    std::fs::write(&source_path, source).map_err(|e| io_error(e, format!("Failed to write {:?}", source_path)))?;

    let icon_path = match icon {
        Some(icon) => {
            let icon_directory = output_directory.join(&config.icon_subdirectory);
            let icon_path = icon_directory.join(format!("{}.png", name));
            std::fs::create_dir_all(&icon_directory)
                .and_then(|_| std::fs::copy(icon, &icon_path))
                .map_err(|e| io_error(e, format!("Failed to copy icon {:?}", icon)))?;
            Some(icon_path)
        }
        None => None,
    };

    tracing::info!("Created pipeline '{}' at {:?}", name, source_path);
    Ok(CreatedPipeline { source_path, icon_path })
}
