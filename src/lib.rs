//! # Pipeline Creator
//!
//! Turns a typed pipeline graph into a runnable Rhai unit. Users compose
//! registered operations into numbered steps; the crate checks the composition
//! and generates a unit whose `run` function executes the steps in order,
//! reports progress and removes intermediate managed resources.
//!
//! ## Architecture
//!
//! - **Registry**: typed operations, registered once during initialization
//! - **Graph**: the `(step, operation, slot)` node graph and its validator
//! - **Codegen**: renders types and values as Rhai code and assembles units
//! - **Scripting**: a Rhai host that loads generated units and runs them
//! - **Scene**: the live-resource registry generated code cleans up
//!
//! ## Configuration
//!
//! Generator settings live in the platform config directory under
//! `dev.pipeline-creator`:
//!
//! - **Linux**: `~/.config/dev.pipeline-creator/generator.toml`
//! - **macOS**: `~/Library/Application Support/dev.pipeline-creator/generator.toml`
//! - **Windows**: `%APPDATA%\dev.pipeline-creator\generator.toml`
//!
//! ## Example
//!
//! ```ignore
//! use pipeline_creator::{
//!     codegen::create_pipeline, config::GeneratorConfig, graph::PipelineGraph,
//!     registry::{Registry, Signature}, scripting::PipelineHost, types::DataType,
//! };
//! use rhai::Dynamic;
//!
//! let mut registry = Registry::new();
//! registry.register(
//!     "double",
//!     |call| Ok(Dynamic::from_int(call.int("x")? * 2)),
//!     Signature::new().param("x", DataType::Int).returns(DataType::Int),
//!     &[],
//!     &[],
//! )?;
//!
//! let mut graph = PipelineGraph::new();
//! let n = graph.add_input("n", DataType::Int, 0);
//! let x = graph.add_parameter(1, "double", "x");
//! let ret = graph.add_return(1, "double");
//! let out = graph.add_output(2, "out", DataType::Int, 0);
//! graph.add_edge(n, x);
//! graph.add_edge(ret, out);
//!
//! let created = create_pipeline("Doubler", "out", &graph, &registry, None, &GeneratorConfig::default())?;
//!
//! let host = PipelineHost::new(registry);
//! let doubler = host.load_file(&created.source_path)?;
//! assert_eq!(doubler.run(vec![Dynamic::from_int(5)])?.as_int()?, 10);
//! ```

pub mod codegen;
pub mod config;
pub mod error;
pub mod graph;
pub mod progress;
pub mod registry;
pub mod scene;
pub mod scripting;
pub mod types;

// Re-export commonly used types
pub use codegen::{create_pipeline, generate_source, CreatedPipeline};
pub use config::GeneratorConfig;
pub use error::{CreatorError, Result};
pub use graph::{validate_pipeline, NodeKey, PipelineGraph, ValidatedPipeline};
pub use progress::{ProgressCallback, ProgressReport};
pub use registry::{OperationProvider, Registry, Signature};
pub use scene::{NodeHandle, Scene};
pub use scripting::{LoadedPipeline, PipelineHost};
pub use types::{Annotation, DataType, NodeClass, PackType, Value};
