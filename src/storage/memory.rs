//! In-memory graph store.
//!
//! This is the reference implementation of `GraphStore`.
//! It uses simple HashMaps protected by RwLock.
//!
//! ## Limitations
//!
//! - **No transactions**: writes are applied immediately.
//! - **Per-collection locks**: only get-or-create and merge are atomic;
//!   they serialize on the unique index mutex. Everything else is
//!   last-writer-wins per element.
//! - **No property indexes**: `nodes_by_property()` scans the label index.
//!
//! Use this store for:
//! - Testing the mapping engine end to end
//! - Embedding the mapper in applications that don't need persistence

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};

use crate::model::*;
use crate::{Error, Result};
use super::GraphStore;

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory property graph storage.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

/// (index, key, canonical value)
type UniqueKey = (String, String, String);

struct MemoryInner {
    nodes: RwLock<HashMap<NodeId, Node>>,
    relationships: RwLock<HashMap<RelId, Relationship>>,
    /// node_id → list of relationship IDs
    adjacency: RwLock<HashMap<NodeId, Vec<RelId>>>,
    /// label → set of node IDs (poor man's label index)
    label_index: RwLock<HashMap<String, Vec<NodeId>>>,
    /// Serializes every get-or-create and merge.
    unique_index: Mutex<HashMap<UniqueKey, ElementId>>,
    next_node_id: AtomicU64,
    next_rel_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                nodes: RwLock::new(HashMap::new()),
                relationships: RwLock::new(HashMap::new()),
                adjacency: RwLock::new(HashMap::new()),
                label_index: RwLock::new(HashMap::new()),
                unique_index: Mutex::new(HashMap::new()),
                next_node_id: AtomicU64::new(1),
                next_rel_id: AtomicU64::new(1),
            }),
        }
    }

    fn insert_node(&self, labels: &[&str], props: PropertyMap) -> Node {
        let id = NodeId(self.inner.next_node_id.fetch_add(1, Ordering::Relaxed));
        let mut node = Node::new(id);
        node.properties = props;
        for label in labels {
            if !node.has_label(label) {
                node.labels.push((*label).to_string());
            }
        }

        {
            let mut idx = self.inner.label_index.write();
            for label in &node.labels {
                idx.entry(label.clone()).or_default().push(id);
            }
        }

        self.inner.nodes.write().insert(id, node.clone());
        self.inner.adjacency.write().insert(id, Vec::new());
        node
    }

    fn insert_relationship(
        &self,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<Relationship> {
        // Verify both nodes exist
        {
            let nodes = self.inner.nodes.read();
            if !nodes.contains_key(&src) {
                return Err(Error::NotFound(format!("Source node {src}")));
            }
            if !nodes.contains_key(&dst) {
                return Err(Error::NotFound(format!("Target node {dst}")));
            }
        }

        let id = RelId(self.inner.next_rel_id.fetch_add(1, Ordering::Relaxed));
        let mut rel = Relationship::new(id, src, dst, rel_type);
        rel.properties = props;

        self.inner.relationships.write().insert(id, rel.clone());

        // Update adjacency for both endpoints
        let mut adj = self.inner.adjacency.write();
        adj.entry(src).or_default().push(id);
        if src != dst {
            adj.entry(dst).or_default().push(id);
        }

        Ok(rel)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// GraphStore impl
// ============================================================================

impl GraphStore for MemoryStore {
    // ========================================================================
    // Lookup
    // ========================================================================

    fn get_node(&self, id: NodeId) -> Result<Option<Node>> {
        Ok(self.inner.nodes.read().get(&id).cloned())
    }

    fn get_relationship(&self, id: RelId) -> Result<Option<Relationship>> {
        Ok(self.inner.relationships.read().get(&id).cloned())
    }

    fn nodes_by_property(&self, label: &str, key: &str, value: &Value) -> Result<Vec<Node>> {
        // Brute force scan (memory store doesn't have real property indexes)
        let idx = self.inner.label_index.read();
        let nodes = self.inner.nodes.read();

        let ids = idx.get(label).cloned().unwrap_or_default();
        Ok(ids.iter()
            .filter_map(|id| nodes.get(id))
            .filter(|n| n.get(key) == Some(value))
            .cloned()
            .collect())
    }

    // ========================================================================
    // Creation
    // ========================================================================

    fn create_node(&self, labels: &[&str], props: PropertyMap) -> Result<Node> {
        Ok(self.insert_node(labels, props))
    }

    fn create_relationship(
        &self,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<Relationship> {
        self.insert_relationship(src, dst, rel_type, props)
    }

    fn get_or_create_node(
        &self,
        index: &str,
        key: &str,
        value: &Value,
        labels: &[&str],
    ) -> Result<Node> {
        if value.is_null() {
            return Err(Error::ConstraintViolation(format!(
                "unique index {index}.{key} cannot hold a null value"
            )));
        }
        let mut unique = self.inner.unique_index.lock();
        let ukey = (index.to_string(), key.to_string(), value.canonical_key());

        match unique.get(&ukey) {
            Some(ElementId::Node(id)) => {
                if let Some(node) = self.inner.nodes.read().get(id) {
                    return Ok(node.clone());
                }
            }
            Some(ElementId::Relationship(_)) => {
                return Err(Error::ConstraintViolation(format!(
                    "unique index {index}.{key} holds a relationship, not a node"
                )));
            }
            None => {}
        }

        let mut props = PropertyMap::new();
        props.insert(key.to_string(), value.clone());
        let node = self.insert_node(labels, props);
        unique.insert(ukey, ElementId::Node(node.id));
        Ok(node)
    }

    fn get_or_create_relationship(
        &self,
        index: &str,
        key: &str,
        value: &Value,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
    ) -> Result<Relationship> {
        if value.is_null() {
            return Err(Error::ConstraintViolation(format!(
                "unique index {index}.{key} cannot hold a null value"
            )));
        }
        let mut unique = self.inner.unique_index.lock();
        let ukey = (index.to_string(), key.to_string(), value.canonical_key());

        match unique.get(&ukey) {
            Some(ElementId::Relationship(id)) => {
                if let Some(rel) = self.inner.relationships.read().get(id) {
                    return Ok(rel.clone());
                }
            }
            Some(ElementId::Node(_)) => {
                return Err(Error::ConstraintViolation(format!(
                    "unique index {index}.{key} holds a node, not a relationship"
                )));
            }
            None => {}
        }

        let mut props = PropertyMap::new();
        props.insert(key.to_string(), value.clone());
        let rel = self.insert_relationship(src, dst, rel_type, props)?;
        unique.insert(ukey, ElementId::Relationship(rel.id));
        Ok(rel)
    }

    fn set_unique_property(
        &self,
        index: &str,
        key: &str,
        old: &Value,
        new: Value,
        id: ElementId,
    ) -> Result<()> {
        if new.is_null() {
            return Err(Error::ConstraintViolation(format!(
                "unique index {index}.{key} cannot hold a null value"
            )));
        }
        let mut unique = self.inner.unique_index.lock();
        let new_key = (index.to_string(), key.to_string(), new.canonical_key());

        if let Some(owner) = unique.get(&new_key) {
            if *owner != id {
                return Err(Error::ConstraintViolation(format!(
                    "unique index {index}.{key} already maps {new} to {owner}"
                )));
            }
        }

        self.set_element_property(id, key, new)?;
        let old_key = (index.to_string(), key.to_string(), old.canonical_key());
        if old_key != new_key && unique.get(&old_key) == Some(&id) {
            unique.remove(&old_key);
        }
        unique.insert(new_key, id);
        Ok(())
    }

    fn merge_relationship(
        &self,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
    ) -> Result<Relationship> {
        let _guard = self.inner.unique_index.lock();
        let existing = self
            .relationships_of(src, Some(rel_type), Direction::Outgoing)?
            .into_iter()
            .find(|r| r.dst == dst);
        match existing {
            Some(rel) => Ok(rel),
            None => self.insert_relationship(src, dst, rel_type, PropertyMap::new()),
        }
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    fn set_node_property(&self, id: NodeId, key: &str, val: Value) -> Result<()> {
        let mut nodes = self.inner.nodes.write();
        let node = nodes.get_mut(&id).ok_or_else(|| Error::NotFound(format!("Node {id}")))?;
        if val.is_null() {
            node.properties.remove(key);
        } else {
            node.properties.insert(key.to_string(), val);
        }
        Ok(())
    }

    fn remove_node_property(&self, id: NodeId, key: &str) -> Result<()> {
        let mut nodes = self.inner.nodes.write();
        let node = nodes.get_mut(&id).ok_or_else(|| Error::NotFound(format!("Node {id}")))?;
        node.properties.remove(key);
        Ok(())
    }

    fn add_label(&self, id: NodeId, label: &str) -> Result<()> {
        let mut nodes = self.inner.nodes.write();
        let node = nodes.get_mut(&id).ok_or_else(|| Error::NotFound(format!("Node {id}")))?;
        if !node.has_label(label) {
            node.labels.push(label.to_string());
            drop(nodes);
            self.inner.label_index.write().entry(label.to_string()).or_default().push(id);
        }
        Ok(())
    }

    fn set_relationship_property(&self, id: RelId, key: &str, val: Value) -> Result<()> {
        let mut rels = self.inner.relationships.write();
        let rel = rels.get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("Relationship {id}")))?;
        if val.is_null() {
            rel.properties.remove(key);
        } else {
            rel.properties.insert(key.to_string(), val);
        }
        Ok(())
    }

    fn remove_relationship_property(&self, id: RelId, key: &str) -> Result<()> {
        let mut rels = self.inner.relationships.write();
        let rel = rels.get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("Relationship {id}")))?;
        rel.properties.remove(key);
        Ok(())
    }

    fn delete_relationship(&self, id: RelId) -> Result<bool> {
        let removed = self.inner.relationships.write().remove(&id);
        if let Some(rel) = &removed {
            let mut adj = self.inner.adjacency.write();
            if let Some(rels) = adj.get_mut(&rel.src) {
                rels.retain(|rid| *rid != id);
            }
            if rel.src != rel.dst {
                if let Some(rels) = adj.get_mut(&rel.dst) {
                    rels.retain(|rid| *rid != id);
                }
            }
        }
        Ok(removed.is_some())
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    fn relationships_of(
        &self,
        node: NodeId,
        rel_type: Option<&str>,
        dir: Direction,
    ) -> Result<Vec<Relationship>> {
        let adj = self.inner.adjacency.read();
        let rels = self.inner.relationships.read();

        let rel_ids = adj.get(&node).cloned().unwrap_or_default();
        let mut result = Vec::new();

        for rid in rel_ids {
            if let Some(rel) = rels.get(&rid) {
                let matches_type = rel_type.map_or(true, |t| rel.rel_type == t);
                if dir.matches(rel, node) && matches_type {
                    result.push(rel.clone());
                }
            }
        }

        Ok(result)
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    fn node_count(&self) -> Result<u64> {
        Ok(self.inner.nodes.read().len() as u64)
    }

    fn relationship_count(&self) -> Result<u64> {
        Ok(self.inner.relationships.read().len() as u64)
    }
}

// ============================================================================
// Tests
// ============================================================================
