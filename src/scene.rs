//! Live registry of managed resources ("nodes")
//!
//! Operations create nodes in a [`Scene`] and generated pipelines remove the
//! intermediate ones again. Nodes can reference each other under a role name
//! (`display`, `storage`, or anything an operation chooses), and those
//! references decide which intermediates are safe to remove.
//!
//! The scene is shared between the host and every operation call, so it is an
//! `Arc<RwLock<..>>` internally and cheap to clone.

use crate::types::NodeClass;
use rhai::Map;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// Reference role for display properties, preserved by [`Scene::copy_content`]
pub const DISPLAY_ROLE: &str = "display";
/// Reference role for storage properties, preserved by [`Scene::copy_content`]
pub const STORAGE_ROLE: &str = "storage";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    #[error("Node not found in scene: {0}")]
    NodeNotFound(String),

    #[error("Cannot copy a {src} into a {dest}")]
    ClassMismatch { src: String, dest: String },
}

/// Script-visible handle to a node
///
/// Handles stay valid after the node is removed; scene lookups through a
/// stale handle fail with [`SceneError::NodeNotFound`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    id: String,
    class: NodeClass,
}

impl NodeHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn class(&self) -> &NodeClass {
        &self.class
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.class, self.id)
    }
}

struct NodeRecord {
    class: NodeClass,
    name: String,
    content: Map,
    references: BTreeMap<String, Vec<String>>,
}

#[derive(Default)]
struct SceneState {
    nodes: BTreeMap<String, NodeRecord>,
    counters: HashMap<String, u64>,
}

impl SceneState {
    fn record(&self, id: &str) -> Result<&NodeRecord, SceneError> {
        self.nodes
            .get(id)
            .ok_or_else(|| SceneError::NodeNotFound(id.to_string()))
    }

    fn record_mut(&mut self, id: &str) -> Result<&mut NodeRecord, SceneError> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| SceneError::NodeNotFound(id.to_string()))
    }
}

/// Shared store of live nodes
#[derive(Clone, Default)]
pub struct Scene {
    inner: Arc<RwLock<SceneState>>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, SceneState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SceneState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a node; ids are the class name plus a per-class counter
    pub fn add_node(&self, class: &NodeClass, name: impl Into<String>) -> NodeHandle {
        let mut state = self.write();
        let counter = state.counters.entry(class.name().to_string()).or_insert(0);
        *counter += 1;
        let id = format!("{}{}", class.name(), counter);

        state.nodes.insert(
            id.clone(),
            NodeRecord {
                class: class.clone(),
                name: name.into(),
                content: Map::new(),
                references: BTreeMap::new(),
            },
        );
        tracing::trace!("Added node {}", id);

        NodeHandle {
            id,
            class: class.clone(),
        }
    }

    /// Remove a node and every reference pointing at it
    ///
    /// Returns `false` if the node was not present.
    pub fn remove_node(&self, id: &str) -> bool {
        let mut state = self.write();
        if state.nodes.remove(id).is_none() {
            return false;
        }
        for record in state.nodes.values_mut() {
            for targets in record.references.values_mut() {
                targets.retain(|target| target != id);
            }
            record.references.retain(|_, targets| !targets.is_empty());
        }
        tracing::trace!("Removed node {}", id);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().nodes.is_empty()
    }

    pub fn node_ids(&self) -> Vec<String> {
        self.read().nodes.keys().cloned().collect()
    }

    /// Handle for an existing node
    pub fn handle(&self, id: &str) -> Result<NodeHandle, SceneError> {
        let state = self.read();
        let record = state.record(id)?;
        Ok(NodeHandle {
            id: id.to_string(),
            class: record.class.clone(),
        })
    }

    pub fn name(&self, id: &str) -> Result<String, SceneError> {
        Ok(self.read().record(id)?.name.clone())
    }

    pub fn set_name(&self, id: &str, name: impl Into<String>) -> Result<(), SceneError> {
        self.write().record_mut(id)?.name = name.into();
        Ok(())
    }

    pub fn content(&self, id: &str) -> Result<Map, SceneError> {
        Ok(self.read().record(id)?.content.clone())
    }

    pub fn set_content(&self, id: &str, content: Map) -> Result<(), SceneError> {
        self.write().record_mut(id)?.content = content;
        Ok(())
    }

    /// Make `holder` reference `target` under `role`
    pub fn add_reference(&self, holder: &str, role: &str, target: &str) -> Result<(), SceneError> {
        let mut state = self.write();
        state.record(target)?;
        let targets = state
            .record_mut(holder)?
            .references
            .entry(role.to_string())
            .or_default();
        if !targets.iter().any(|t| t == target) {
            targets.push(target.to_string());
        }
        Ok(())
    }

    pub fn reference_roles(&self, holder: &str) -> Result<Vec<String>, SceneError> {
        Ok(self.read().record(holder)?.references.keys().cloned().collect())
    }

    pub fn references(&self, holder: &str, role: &str) -> Result<Vec<String>, SceneError> {
        Ok(self
            .read()
            .record(holder)?
            .references
            .get(role)
            .cloned()
            .unwrap_or_default())
    }

    /// Whether `holder` references `target` under `role`
    pub fn has_reference(&self, holder: &str, role: &str, target: &str) -> bool {
        self.read()
            .nodes
            .get(holder)
            .and_then(|record| record.references.get(role))
            .is_some_and(|targets| targets.iter().any(|t| t == target))
    }

    /// Copy `src` into `dest`, keeping `dest`'s name and display/storage references
    pub fn copy_content(&self, src: &str, dest: &str) -> Result<(), SceneError> {
        let mut state = self.write();
        let source = state.record(src)?;
        let dest_class = state.record(dest)?.class.clone();
        if source.class.name() != dest_class.name() {
            return Err(SceneError::ClassMismatch {
                src: source.class.name().to_string(),
                dest: dest_class.name().to_string(),
            });
        }

        let content = source.content.clone();
        let mut references: BTreeMap<String, Vec<String>> = source
            .references
            .iter()
            .filter(|(role, _)| !is_preserved_role(role))
            .map(|(role, targets)| (role.clone(), targets.clone()))
            .collect();

        let record = state.record_mut(dest)?;
        for (role, targets) in record.references.iter().filter(|(role, _)| is_preserved_role(role)) {
            references.insert(role.clone(), targets.clone());
        }
        record.content = content;
        record.references = references;
        Ok(())
    }
}

fn is_preserved_role(role: &str) -> bool {
    role == DISPLAY_ROLE || role == STORAGE_ROLE
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene").field("nodes", &self.node_ids()).finish()
    }
}
