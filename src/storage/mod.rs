//! # Graph Store Trait
//!
//! This is THE contract between the mapping engine and any graph store.
//! Every store operation the mapper needs is defined here, nothing more:
//! query languages, transports and transactions live outside this crate.
//!
//! Calls are synchronous from the engine's point of view. An async driver
//! is wrapped by the integration layer (e.g. with a blocking bridge)
//! before it is handed to a [`crate::Mapper`].
//!
//! ## Implementations
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryStore` | `memory` | In-memory for testing/embedding |

pub mod memory;

use crate::model::*;
use crate::Result;

pub use memory::MemoryStore;

// ============================================================================
// GraphStore Trait
// ============================================================================

/// The store contract consumed by the mapper.
///
/// Implementations must make `get_or_create_node` and
/// `get_or_create_relationship` atomic with respect to each other for the
/// same `(index, key, value)`: exactly one element is created, every
/// concurrent caller receives it.
pub trait GraphStore: Send + Sync + 'static {
    // ========================================================================
    // Lookup
    // ========================================================================

    /// Get a node by ID. Returns None if not found.
    fn get_node(&self, id: NodeId) -> Result<Option<Node>>;

    /// Get a relationship by ID. Returns None if not found.
    fn get_relationship(&self, id: RelId) -> Result<Option<Relationship>>;

    /// Load whichever element an id names.
    fn get_element(&self, id: ElementId) -> Result<Option<GraphElement>> {
        Ok(match id {
            ElementId::Node(id) => self.get_node(id)?.map(GraphElement::Node),
            ElementId::Relationship(id) => self.get_relationship(id)?.map(GraphElement::Relationship),
        })
    }

    /// Find nodes by label + property value.
    fn nodes_by_property(&self, label: &str, key: &str, value: &Value) -> Result<Vec<Node>>;

    // ========================================================================
    // Creation
    // ========================================================================

    /// Create a node with the given labels and properties.
    fn create_node(&self, labels: &[&str], props: PropertyMap) -> Result<Node>;

    /// Create a relationship between two existing nodes.
    fn create_relationship(
        &self,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<Relationship>;

    /// Return the node registered under `(index, key, value)`, creating it
    /// (with `key = value` set and the given labels) if none exists. Atomic.
    fn get_or_create_node(
        &self,
        index: &str,
        key: &str,
        value: &Value,
        labels: &[&str],
    ) -> Result<Node>;

    /// Return the relationship registered under `(index, key, value)`,
    /// creating `src -[rel_type]-> dst` (with `key = value` set) if none
    /// exists. Atomic.
    fn get_or_create_relationship(
        &self,
        index: &str,
        key: &str,
        value: &Value,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
    ) -> Result<Relationship>;

    /// Change the unique value `key` of element `id` from `old` to `new`,
    /// moving its `(index, key, value)` entry along. Atomic with the
    /// get-or-create operations.
    ///
    /// Fails with `ConstraintViolation` when `new` is null or another
    /// element already holds it; nothing changes in that case.
    fn set_unique_property(
        &self,
        index: &str,
        key: &str,
        old: &Value,
        new: Value,
        id: ElementId,
    ) -> Result<()>;

    /// Create `src -[rel_type]-> dst` unless one already exists.
    ///
    /// Default: look for an existing outgoing relationship, else create.
    /// Not atomic; stores with a native MERGE should override this.
    fn merge_relationship(
        &self,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
    ) -> Result<Relationship> {
        let existing = self
            .relationships_of(src, Some(rel_type), Direction::Outgoing)?
            .into_iter()
            .find(|r| r.dst == dst);
        match existing {
            Some(rel) => Ok(rel),
            None => self.create_relationship(src, dst, rel_type, PropertyMap::new()),
        }
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Set a property on a node (upsert).
    fn set_node_property(&self, id: NodeId, key: &str, val: Value) -> Result<()>;

    /// Remove a property from a node.
    fn remove_node_property(&self, id: NodeId, key: &str) -> Result<()>;

    /// Add a label to a node. Adding a label twice is a no-op.
    fn add_label(&self, id: NodeId, label: &str) -> Result<()>;

    /// Set a property on a relationship (upsert).
    fn set_relationship_property(&self, id: RelId, key: &str, val: Value) -> Result<()>;

    /// Remove a property from a relationship.
    fn remove_relationship_property(&self, id: RelId, key: &str) -> Result<()>;

    /// Set a property on either kind of element.
    fn set_element_property(&self, id: ElementId, key: &str, val: Value) -> Result<()> {
        match id {
            ElementId::Node(id) => self.set_node_property(id, key, val),
            ElementId::Relationship(id) => self.set_relationship_property(id, key, val),
        }
    }

    /// Remove a property from either kind of element.
    fn remove_element_property(&self, id: ElementId, key: &str) -> Result<()> {
        match id {
            ElementId::Node(id) => self.remove_node_property(id, key),
            ElementId::Relationship(id) => self.remove_relationship_property(id, key),
        }
    }

    /// Delete a relationship. Returns true if it existed.
    fn delete_relationship(&self, id: RelId) -> Result<bool>;

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Relationships of a node, optionally filtered by type, in the given
    /// direction (`Undirected` = both).
    fn relationships_of(
        &self,
        node: NodeId,
        rel_type: Option<&str>,
        dir: Direction,
    ) -> Result<Vec<Relationship>>;

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Total number of nodes.
    fn node_count(&self) -> Result<u64>;

    /// Total number of relationships.
    fn relationship_count(&self) -> Result<u64>;
}
