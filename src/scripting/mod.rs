//! Rhai host for generated pipeline units
//!
//! Generated units are Rhai scripts. [`PipelineHost`] embeds a Rhai engine,
//! exposes the host modules those scripts rely on and loads units without a
//! process restart.
//!
//! ## Host Modules
//!
//! - `types` - type values (`types::int`, `types::list(T)`, `types::pack(..)`)
//!   and `types::instantiate(pack)`; always available, never imported
//! - `annotations` - `minimum`, `maximum`, `default_value`, `decimals`,
//!   `single_step`, `within_range`
//! - `scene` - one constant per node class plus `remove_node`, `contains`,
//!   `same_node`, `reference_roles`, `has_reference`, `copy_node`
//! - `operations` - `operations::get(name)` returns a handle whose
//!   `invoke(#{ .. })` calls the registered operation
//! - `progress` - `progress::noop()`; callbacks have `report_progress` and
//!   `get_sub_callback` methods
//! - `blob` - `type_from_json` and `value_from_json` for values without a
//!   readable spelling
//!
//! ## Example Unit
//!
//! ```rhai
//! import "operations" as operations;
//! import "progress" as progress;
//!
//! fn run(n) {
//!     run(n, progress::noop())
//! }
//!
//! fn run(n, progress_callback) {
//!     progress_callback.report_progress("double", 0.0, 0, 1);
//!     let result = operations::get("double").invoke(#{ x: n });
//!     progress_callback.report_progress("", 0.0, 1, 1);
//!     result
//! }
//! ```

mod engine;
mod modules;

pub use engine::{OperationHandle, PipelineHost};

use crate::codegen::ModuleMetadata;
use crate::error::{CreatorError, Result, ResultExt};
use crate::progress::ProgressCallback;
use rhai::{Array, Dynamic, Engine, Map, Scope, AST};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Names of the host modules, as used in generated `import` lines
pub mod namespace {
    pub const TYPES: &str = "types";
    pub const ANNOTATIONS: &str = "annotations";
    pub const SCENE: &str = "scene";
    pub const OPERATIONS: &str = "operations";
    pub const PROGRESS: &str = "progress";
    pub const BLOB: &str = "blob";

    /// Every host module, in registration order
    pub const ALL: &[&str] = &[TYPES, ANNOTATIONS, SCENE, OPERATIONS, PROGRESS, BLOB];
}

/// A compiled pipeline unit bound to the host that loaded it
#[derive(Clone)]
pub struct LoadedPipeline {
    name: String,
    source: String,
    ast: AST,
    engine: Arc<Engine>,
    run_function: String,
}

impl LoadedPipeline {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn has_function(&self, name: &str, arity: usize) -> bool {
        self.ast
            .iter_functions()
            .any(|f| f.name == name && f.params.len() == arity)
    }

    /// Arities of the unit's run function, ascending
    pub fn run_arities(&self) -> Vec<usize> {
        let mut arities: Vec<usize> = self
            .ast
            .iter_functions()
            .filter(|f| f.name == self.run_function)
            .map(|f| f.params.len())
            .collect();
        arities.sort_unstable();
        arities.dedup();
        arities
    }

    /// Call any script function of the unit
    pub fn call(&self, function: &str, args: Vec<Dynamic>) -> Result<Dynamic> {
        let mut scope = Scope::new();
        self.engine
            .call_fn::<Dynamic>(&mut scope, &self.ast, function, args)
            .with_context(|| format!("Failed to call {}::{}", self.name, function))
    }

    /// `run(inputs..)`
    pub fn run(&self, inputs: Vec<Dynamic>) -> Result<Dynamic> {
        self.call(&self.run_function, inputs)
    }

    /// `run(inputs.., progress_callback)`
    pub fn run_with_progress(&self, mut inputs: Vec<Dynamic>, progress: ProgressCallback) -> Result<Dynamic> {
        inputs.push(Dynamic::from(progress));
        self.call(&self.run_function, inputs)
    }

    /// `run(inputs.., progress_callback, delete_intermediate_nodes)`
    pub fn run_with_options(
        &self,
        mut inputs: Vec<Dynamic>,
        progress: ProgressCallback,
        delete_intermediate_nodes: bool,
    ) -> Result<Dynamic> {
        inputs.push(Dynamic::from(progress));
        inputs.push(Dynamic::from_bool(delete_intermediate_nodes));
        self.call(&self.run_function, inputs)
    }

    /// A fresh parameter node with default inputs and empty outputs
    pub fn setup(&self) -> Result<Map> {
        let node = self.call("setup", Vec::new())?;
        expect_map(node, "setup")
    }

    /// Run the widget driver on `parameter_node` and return the updated node
    pub fn on_run(&self, parameter_node: Map) -> Result<Map> {
        let node = self.call("on_run", vec![Dynamic::from_map(parameter_node)])?;
        expect_map(node, "on_run")
    }

    pub fn on_run_with_progress(&self, parameter_node: Map, progress: ProgressCallback) -> Result<Map> {
        let node = self.call(
            "on_run",
            vec![Dynamic::from_map(parameter_node), Dynamic::from(progress)],
        )?;
        expect_map(node, "on_run")
    }

    pub fn module_info(&self) -> Result<ModuleMetadata> {
        let info = self.call("module_info", Vec::new())?;
        let map = expect_map(info, "module_info")?;
        parse_module_info(&map).with_context(|| format!("Invalid module info in '{}'", self.name))
    }
}

impl std::fmt::Debug for LoadedPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedPipeline")
            .field("name", &self.name)
            .field("run_function", &self.run_function)
            .field("source_len", &self.source.len())
            .finish()
    }
}

fn expect_map(value: Dynamic, function: &str) -> Result<Map> {
    let type_name = value.type_name();
    value
        .try_cast::<Map>()
        .ok_or_else(|| CreatorError::Script(format!("{}() returned {}, expected a map", function, type_name)))
}

fn string_field(map: &Map, key: &str) -> Result<String> {
    map.get(key)
        .and_then(|value| value.clone().into_string().ok())
        .ok_or_else(|| CreatorError::Script(format!("missing string field '{}'", key)))
}

fn string_list_field(map: &Map, key: &str) -> Result<Vec<String>> {
    let items = map
        .get(key)
        .and_then(|value| value.clone().try_cast::<Array>())
        .ok_or_else(|| CreatorError::Script(format!("missing list field '{}'", key)))?;
    items
        .into_iter()
        .map(|item| {
            item.into_string()
                .map_err(|found| CreatorError::Script(format!("'{}' holds a {}, expected strings", key, found)))
        })
        .collect()
}

/// Read the map returned by a unit's `module_info()`
pub fn parse_module_info(map: &Map) -> Result<ModuleMetadata> {
    let icon = match map.get("icon") {
        Some(value) if value.is_unit() => None,
        Some(_) => Some(string_field(map, "icon")?),
        None => None,
    };
    Ok(ModuleMetadata {
        title: string_field(map, "title")?,
        categories: string_list_field(map, "categories")?,
        dependencies: string_list_field(map, "dependencies")?,
        contributors: string_list_field(map, "contributors")?,
        help_text: string_field(map, "help_text")?,
        acknowledgement_text: string_field(map, "acknowledgement_text")?,
        icon,
    })
}

/// Compiled units by name
///
/// Loading a unit under a name that is already cached replaces the entry
/// when the source changed, which is how units are reloaded in place.
#[derive(Default)]
pub struct PipelineCache {
    cache: HashMap<String, LoadedPipeline>,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    /// The cached unit when its source is unchanged
    pub fn get(&self, name: &str, source: &str) -> Option<LoadedPipeline> {
        self.cache
            .get(name)
            .filter(|loaded| loaded.source == source)
            .cloned()
    }

    pub fn insert(&mut self, loaded: LoadedPipeline) {
        self.cache.insert(loaded.name.clone(), loaded);
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.cache.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Remove a specific unit from the cache
    pub fn invalidate(&mut self, name: &str) {
        self.cache.remove(name);
    }
}

/// Thread-safe pipeline cache wrapper
pub type SharedPipelineCache = Arc<RwLock<PipelineCache>>;

#[cfg(test)]
mod tests {
    use super::*;

    fn info_map() -> Map {
        let mut map = Map::new();
        map.insert("title".into(), "Demo".into());
        map.insert("categories".into(), Dynamic::from_array(vec!["PipelineModules".into()]));
        map.insert("dependencies".into(), Dynamic::from_array(vec!["PipelineCreator".into()]));
        map.insert("contributors".into(), Dynamic::from_array(Vec::new()));
        map.insert("help_text".into(), "help".into());
        map.insert("acknowledgement_text".into(), "thanks".into());
        map.insert("icon".into(), Dynamic::UNIT);
        map
    }

    #[test]
    fn test_parse_module_info() {
        let metadata = parse_module_info(&info_map()).unwrap();
        assert_eq!(metadata.title, "Demo");
        assert_eq!(metadata.dependencies, vec!["PipelineCreator"]);
        assert!(metadata.contributors.is_empty());
        assert_eq!(metadata.icon, None);
    }

    #[test]
    fn test_parse_module_info_rejects_bad_lists() {
        let mut map = info_map();
        map.insert("categories".into(), Dynamic::from_array(vec![Dynamic::from_int(1)]));
        assert!(parse_module_info(&map).is_err());

        map.remove("categories");
        assert!(parse_module_info(&map).is_err());
    }

    #[test]
    fn test_namespaces_are_distinct() {
        let mut names = namespace::ALL.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), namespace::ALL.len());
    }
}
