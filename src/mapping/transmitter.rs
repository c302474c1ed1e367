//! Field/property copying between a domain object and its stored element.
//!
//! Scalars are copied in both directions. Associations are only gathered:
//! `copy_from` returns the connected raw elements and `copy_to` returns the
//! loaded targets, and the converter does the recursive work.

use tracing::warn;

use crate::model::{Direction, GraphElement, NodeId, Relationship, Value};
use crate::storage::GraphStore;
use crate::{Error, Result};
use super::descriptor::{Cardinality, EntityDescriptor, EntityKind, IdStrategy, PropertyDescriptor};
use super::object::{Association, EntityRef, FieldValue};
use super::policy::MappingPolicy;

/// Connected elements read for one association.
#[derive(Debug, Clone)]
pub struct RawAssociation {
    /// Index into the owner's `properties`.
    pub property: usize,
    pub elements: Vec<GraphElement>,
    /// Policy the targets are converted under.
    pub policy: MappingPolicy,
}

/// Loaded association targets waiting to be written.
#[derive(Debug, Clone)]
pub struct PendingAssociation {
    pub property: usize,
    pub targets: Vec<EntityRef>,
    pub policy: MappingPolicy,
}

// ============================================================================
// Graph -> object
// ============================================================================

/// Copy `element` into `object`. Returns the associations that were read.
pub fn copy_from<S: GraphStore>(
    store: &S,
    element: &GraphElement,
    object: &EntityRef,
    descriptor: &EntityDescriptor,
    policy: MappingPolicy,
) -> Result<Vec<RawAssociation>> {
    let mut raw = Vec::new();

    for (index, prop) in descriptor.properties.iter().enumerate() {
        if !prop.should_fetch(policy) {
            continue;
        }

        if prop.is_identity && descriptor.id_strategy == IdStrategy::Internal {
            prop.set_value(object, Value::Int(element.element_id().raw() as i64), policy)?;
        } else if prop.is_type_name {
            if let GraphElement::Relationship(rel) = element {
                prop.set_value(object, Value::String(rel.rel_type.clone()), policy)?;
            }
        } else if prop.is_association() {
            let elements = connected(store, element, prop)?;
            prop.set(object, FieldValue::Association(Association::Raw(elements.clone())), policy)?;
            raw.push(RawAssociation { property: index, elements, policy: prop.nested_policy(policy) });
        } else {
            let value = element.property(&prop.storage_key).cloned().unwrap_or_else(|| prop.default.clone());
            prop.set_value(object, value, policy)?;
        }
    }
    Ok(raw)
}

/// Elements on the far side of an association.
fn connected<S: GraphStore>(
    store: &S,
    element: &GraphElement,
    prop: &PropertyDescriptor,
) -> Result<Vec<GraphElement>> {
    let Some(rel_desc) = &prop.relationship else {
        return Ok(Vec::new());
    };

    let mut elements = match element {
        GraphElement::Relationship(rel) => {
            let id = if prop.is_start_node { rel.src } else { rel.dst };
            let node = store
                .get_node(id)?
                .ok_or_else(|| Error::NotFound(format!("endpoint node {id} of relationship {}", rel.id)))?;
            vec![GraphElement::Node(node)]
        }
        GraphElement::Node(node) => {
            let rels = store.relationships_of(node.id, Some(&rel_desc.type_name), rel_desc.direction)?;
            match rel_desc.target_kind {
                EntityKind::RelationshipEntity => rels.into_iter().map(GraphElement::Relationship).collect(),
                EntityKind::NodeEntity => {
                    let mut nodes = Vec::with_capacity(rels.len());
                    for rel in rels {
                        let Some(other) = far_end(&rel, node.id, rel_desc.direction) else { continue };
                        if let Some(target) = store.get_node(other)? {
                            nodes.push(GraphElement::Node(target));
                        }
                    }
                    nodes
                }
            }
        }
    };

    if rel_desc.cardinality == Cardinality::Single && elements.len() > 1 {
        warn!(
            entity = %prop.owner,
            property = %prop.name,
            found = elements.len(),
            "single-valued association has several relationships, keeping the first"
        );
        elements.truncate(1);
    }
    Ok(elements)
}

fn far_end(rel: &Relationship, from: NodeId, direction: Direction) -> Option<NodeId> {
    match direction {
        Direction::Outgoing => Some(rel.dst),
        Direction::Incoming => Some(rel.src),
        Direction::Undirected => rel.other_node(from),
    }
}

// ============================================================================
// Object -> graph
// ============================================================================

/// Copy the scalars of `object` onto `element`. Returns the loaded
/// associations to write.
pub fn copy_to<S: GraphStore>(
    store: &S,
    element: &GraphElement,
    object: &EntityRef,
    descriptor: &EntityDescriptor,
    policy: MappingPolicy,
) -> Result<Vec<PendingAssociation>> {
    let id = element.element_id();

    let next_version = match descriptor.version() {
        Some(version) => {
            let expected = version.get_value(object, policy)?;
            let stored = element.property(&version.storage_key).cloned().unwrap_or(Value::Null);
            if !expected.is_null() && !stored.is_null() && expected != stored {
                return Err(Error::ConcurrentModification {
                    entity: descriptor.name.clone(),
                    expected: expected.to_string(),
                    actual: stored.to_string(),
                });
            }
            Some((version, Value::Int(stored.as_int().unwrap_or(0) + 1)))
        }
        None => None,
    };

    if let Some(unique) = descriptor.unique() {
        rekey_unique(store, element, object, descriptor, unique, policy)?;
    }

    if let Some((version, next)) = next_version {
        store.set_element_property(id, &version.storage_key, next.clone())?;
        version.set_value(object, next, policy)?;
    }

    let mut pending = Vec::new();
    for (index, prop) in descriptor.properties.iter().enumerate() {
        if prop.is_transient || prop.is_version || prop.is_unique || prop.is_type_name || prop.is_endpoint() {
            continue;
        }
        if prop.is_identity && descriptor.id_strategy == IdStrategy::Internal {
            continue;
        }

        if prop.is_association() {
            let targets = match prop.get(object, policy)? {
                FieldValue::Association(Association::Loaded(targets)) => targets,
                FieldValue::Scalar(Value::Null) => Vec::new(),
                _ => continue,
            };
            pending.push(PendingAssociation { property: index, targets, policy: prop.nested_policy(policy) });
        } else {
            match prop.get_value(object, policy)? {
                Value::Null => store.remove_element_property(id, &prop.storage_key)?,
                value => store.set_element_property(id, &prop.storage_key, value)?,
            }
        }
    }
    Ok(pending)
}

/// Write the unique value of `object` onto `element`, moving the unique
/// index entry when it changed.
fn rekey_unique<S: GraphStore>(
    store: &S,
    element: &GraphElement,
    object: &EntityRef,
    descriptor: &EntityDescriptor,
    unique: &PropertyDescriptor,
    policy: MappingPolicy,
) -> Result<()> {
    let value = unique.get_value(object, policy)?;
    if value.is_null() {
        return Err(Error::MissingUniqueValue {
            entity: descriptor.name.clone(),
            property: unique.name.clone(),
        });
    }
    let stored = element.property(&unique.storage_key).cloned().unwrap_or(Value::Null);
    if stored == value {
        return Ok(());
    }
    let index = unique.index_name.as_deref().unwrap_or(&descriptor.alias);
    store.set_unique_property(index, &unique.storage_key, &stored, value, element.element_id())
}
