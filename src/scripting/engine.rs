//! Rhai engine setup and the pipeline host
//!
//! [`PipelineHost`] owns one engine configured with safety limits, the custom
//! types generated units pass around (`DataType`, `Annotation`, `Node`,
//! `ProgressCallback`, `OperationHandle`) and the host modules. Modules are
//! registered twice: as static modules, so any script function can reach
//! `scene::..` without an import in scope, and through a static module
//! resolver, so `import "scene" as scene;` resolves.

use super::modules::{
    annotations_module, blob_module, operations_module, progress_module, runtime_error, scene_module, types_module,
    ScriptResult,
};
use super::{namespace, LoadedPipeline, PipelineCache, SharedPipelineCache};
use crate::config::DEFAULT_RUN_FUNCTION;
use crate::error::{CreatorError, Result, ResultExt};
use crate::progress::ProgressCallback;
use crate::registry::{OperationInfo, Registry};
use crate::scene::{NodeHandle, Scene};
use crate::types::{Annotation, DataType, NodeClass, Value};
use rhai::module_resolvers::StaticModuleResolver;
use rhai::{Dynamic, Engine, ImmutableString, Map, Module};
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Script-side handle to a registered operation
#[derive(Clone)]
pub struct OperationHandle {
    info: OperationInfo,
    scene: Scene,
}

impl OperationHandle {
    pub(super) fn new(info: OperationInfo, scene: Scene) -> Self {
        Self { info, scene }
    }

    pub fn name(&self) -> &str {
        self.info.name()
    }

    /// Call the operation with named arguments
    pub fn invoke(&self, args: Map) -> ScriptResult<Dynamic> {
        self.info
            .call(args, &self.scene)
            .map_err(|e| runtime_error(format!("{}: {}", self.info.name(), e)))
    }
}

impl std::fmt::Debug for OperationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationHandle")
            .field("name", &self.info.name())
            .finish()
    }
}

/// Embeds a Rhai engine that can load and run generated pipeline units
pub struct PipelineHost {
    engine: Arc<Engine>,
    registry: Arc<Registry>,
    scene: Scene,
    cache: SharedPipelineCache,
    run_function: String,
}

impl PipelineHost {
    /// Create a host for the operations in `registry`
    pub fn new(registry: Registry) -> Self {
        Self::with_classes(registry, &[])
    }

    /// Create a host that also knows node classes no operation mentions
    pub fn with_classes(registry: Registry, extra_classes: &[NodeClass]) -> Self {
        let registry = Arc::new(registry);
        let scene = Scene::new();

        let mut classes = registry.node_classes();
        for class in extra_classes {
            let mut current = Some(class.clone());
            while let Some(class) = current {
                current = class.parent();
                if !classes.contains(&class) {
                    classes.push(class);
                }
            }
        }

        let mut engine = Engine::new();
        Self::configure_engine(&mut engine, registry.clone(), &scene, &classes);
        tracing::debug!(
            "Pipeline host ready with {} operations and {} node classes",
            registry.len(),
            classes.len()
        );

        Self {
            engine: Arc::new(engine),
            registry,
            scene,
            cache: Arc::new(RwLock::new(PipelineCache::new())),
            run_function: DEFAULT_RUN_FUNCTION.to_string(),
        }
    }

    /// Use a run function name other than `run`, matching the generator config
    pub fn set_run_function(&mut self, name: impl Into<String>) {
        self.run_function = name.into();
    }

    /// Configure the Rhai engine with custom types, host modules and safety limits
    fn configure_engine(engine: &mut Engine, registry: Arc<Registry>, scene: &Scene, classes: &[NodeClass]) {
        // Set safety limits
        engine.set_max_expr_depths(64, 64);
        engine.set_max_call_levels(64);
        engine.set_max_operations(1_000_000);
        engine.set_max_string_size(1_000_000);
        engine.set_max_array_size(100_000);
        engine.set_max_map_size(10_000);

        // Custom types
        engine.register_type_with_name::<DataType>("DataType");
        engine.register_type_with_name::<Annotation>("Annotation");
        engine.register_type_with_name::<NodeHandle>("Node");
        engine.register_type_with_name::<ProgressCallback>("ProgressCallback");
        engine.register_type_with_name::<OperationHandle>("OperationHandle");

        engine.register_fn("to_string", |datatype: &mut DataType| datatype.to_string());
        engine.register_fn("to_debug", |datatype: &mut DataType| datatype.to_string());
        engine.register_fn("==", |a: DataType, b: DataType| a == b);
        engine.register_fn("to_string", |annotation: &mut Annotation| annotation.to_string());
        engine.register_fn("to_string", |node: &mut NodeHandle| node.to_string());
        engine.register_fn("to_debug", |node: &mut NodeHandle| node.to_string());
        engine.register_get("id", |node: &mut NodeHandle| node.id().to_string());
        engine.register_get("class_name", |node: &mut NodeHandle| node.class().name().to_string());

        // Operation handles
        engine.register_fn("invoke", |handle: &mut OperationHandle, args: Map| handle.invoke(args));
        engine.register_get("name", |handle: &mut OperationHandle| handle.name().to_string());

        // Progress callbacks
        engine.register_fn(
            "report_progress",
            |callback: &mut ProgressCallback, name: ImmutableString, fraction: f64, piece: i64, pieces: i64| {
                callback.report_progress(name.as_str(), fraction, piece, pieces);
            },
        );
        engine.register_fn(
            "report_progress",
            |callback: &mut ProgressCallback, name: ImmutableString, fraction: i64, piece: i64, pieces: i64| {
                callback.report_progress(name.as_str(), fraction as f64, piece, pieces);
            },
        );
        engine.register_fn(
            "get_sub_callback",
            |callback: &mut ProgressCallback, piece: i64, pieces: i64| callback.sub_callback(piece, pieces),
        );

        // Host modules
        let modules: [(&str, Module); 6] = [
            (namespace::TYPES, types_module()),
            (namespace::ANNOTATIONS, annotations_module()),
            (namespace::SCENE, scene_module(scene, classes)),
            (namespace::OPERATIONS, operations_module(registry, scene)),
            (namespace::PROGRESS, progress_module()),
            (namespace::BLOB, blob_module()),
        ];
        let mut resolver = StaticModuleResolver::new();
        for (name, mut module) in modules {
            module.build_index();
            resolver.insert(name, module.clone());
            engine.register_static_module(name, Arc::new(module));
        }
        engine.set_module_resolver(resolver);
    }

    /// Compile a unit and cache it under `name`
    ///
    /// Loading the same name with unchanged source returns the cached unit.
    pub fn load(&self, name: &str, source: &str) -> Result<LoadedPipeline> {
        if let Some(loaded) = self
            .cache
            .read()
            .map_err(|e| CreatorError::Script(format!("Failed to acquire cache lock: {}", e)))?
            .get(name, source)
        {
            return Ok(loaded);
        }

        let ast = self
            .engine
            .compile(source)
            .with_context(|| format!("Failed to compile pipeline '{}'", name))?;
        let loaded = LoadedPipeline {
            name: name.to_string(),
            source: source.to_string(),
            ast,
            engine: self.engine.clone(),
            run_function: self.run_function.clone(),
        };

        self.cache
            .write()
            .map_err(|e| CreatorError::Script(format!("Failed to acquire cache lock: {}", e)))?
            .insert(loaded.clone());
        tracing::info!("Loaded pipeline '{}'", name);
        Ok(loaded)
    }

    /// Load a unit from disk, named after the file stem
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<LoadedPipeline> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(CreatorError::from)
            .with_context(|| format!("Failed to read {:?}", path))?;
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| CreatorError::Script(format!("Cannot derive a pipeline name from {:?}", path)))?;
        self.load(name, &source)
    }

    /// Check that `source` compiles without caching it
    pub fn validate(&self, source: &str) -> Result<()> {
        self.engine
            .compile(source)
            .map(|_| ())
            .map_err(CreatorError::from_parse_error)
    }

    /// Evaluate an expression that yields a type, e.g. generated type code
    pub fn eval_type(&self, code: &str) -> Result<DataType> {
        let value = self
            .engine
            .eval::<Dynamic>(code)
            .with_context(|| format!("Failed to evaluate type code `{}`", code))?;
        let type_name = value.type_name();
        value
            .try_cast::<DataType>()
            .ok_or_else(|| CreatorError::Script(format!("`{}` evaluated to {}, not a type", code, type_name)))
    }

    /// Evaluate an expression that yields plain data, e.g. generated value code
    pub fn eval_value(&self, code: &str) -> Result<Value> {
        let value = self
            .engine
            .eval::<Dynamic>(code)
            .with_context(|| format!("Failed to evaluate value code `{}`", code))?;
        Value::from_dynamic(&value)
            .ok_or_else(|| CreatorError::Script(format!("`{}` evaluated to {}, not plain data", code, value.type_name())))
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// The live-resource registry shared with every operation call
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Names of the cached units
    pub fn loaded(&self) -> Vec<String> {
        self.cache.read().map(|cache| cache.names()).unwrap_or_default()
    }

    /// Drop a unit from the cache so the next load recompiles it
    pub fn unload(&self, name: &str) {
        if let Ok(mut cache) = self.cache.write() {
            cache.invalidate(name);
        }
    }
}

impl Default for PipelineHost {
    fn default() -> Self {
        Self::new(Registry::new())
    }
}
