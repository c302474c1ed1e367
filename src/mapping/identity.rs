//! # Identity Resolver
//!
//! Connects domain objects to stored elements: finds the element an
//! object is already linked to, or creates one. Uniqueness constraints
//! go through the store's atomic get-or-create; a concurrent duplicate
//! resolves to whichever element the store says won.
//!
//! Creation order for an unlinked object:
//!
//! 1. unique property set: get-or-create keyed on it (null is an error)
//! 2. assigned or external id: get-or-create keyed on the id
//! 3. node entity: new node carrying the storage labels
//! 4. relationship entity: new relationship between the resolved endpoints

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::model::{Direction, ElementId, GraphElement, NodeId, PropertyMap, RelId, Relationship, Value};
use crate::storage::GraphStore;
use crate::{Error, Result};
use super::descriptor::{EntityDescriptor, EntityKind, IdStrategy, PropertyDescriptor};
use super::discriminator::TypeResolver;
use super::object::{AccessError, Association, EntityRef};
use super::policy::MappingPolicy;
use super::registry::MetamodelRegistry;

// ============================================================================
// Id generation
// ============================================================================

/// Source of ids for [`IdStrategy::External`] types.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self, descriptor: &EntityDescriptor) -> Value;
}

/// Process-wide increasing integers.
#[derive(Debug)]
pub struct SequenceIdGenerator {
    next: AtomicI64,
}

impl SequenceIdGenerator {
    pub fn starting_at(first: i64) -> Self {
        Self { next: AtomicI64::new(first) }
    }
}

impl Default for SequenceIdGenerator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl IdGenerator for SequenceIdGenerator {
    fn next_id(&self, _descriptor: &EntityDescriptor) -> Value {
        Value::Int(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

// ============================================================================
// Relationship results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipStatus {
    New,
    Existing,
    Deleted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipResult {
    pub relationship: Relationship,
    pub status: RelationshipStatus,
}

// ============================================================================
// IdentityResolver
// ============================================================================

pub struct IdentityResolver<'a, S: GraphStore> {
    store: &'a S,
    registry: &'a MetamodelRegistry,
    types: &'a TypeResolver,
    ids: &'a Arc<dyn IdGenerator>,
}

impl<'a, S: GraphStore> IdentityResolver<'a, S> {
    pub fn new(
        store: &'a S,
        registry: &'a MetamodelRegistry,
        types: &'a TypeResolver,
        ids: &'a Arc<dyn IdGenerator>,
    ) -> Self {
        Self { store, registry, types, ids }
    }

    pub fn descriptor_of(&self, object: &EntityRef) -> Result<Arc<EntityDescriptor>> {
        self.registry.describe(&object.entity_name())
    }

    /// Id of the element `object` is linked to, without creating anything.
    pub fn element_id(&self, object: &EntityRef) -> Result<Option<ElementId>> {
        let descriptor = self.descriptor_of(object)?;
        self.linked_id(object, &descriptor)
    }

    fn linked_id(&self, object: &EntityRef, descriptor: &EntityDescriptor) -> Result<Option<ElementId>> {
        let Some(id_prop) = descriptor.id() else {
            return Ok(None);
        };
        let value = id_prop.get_value(object, MappingPolicy::DEFAULT)?;
        if value.is_null() {
            return Ok(None);
        }
        match descriptor.id_strategy {
            IdStrategy::Internal => {
                let raw = value.as_int().filter(|raw| *raw >= 0).ok_or_else(|| Error::PropertyAccess {
                    entity: descriptor.name.clone(),
                    property: id_prop.name.clone(),
                    source: AccessError::WrongShape {
                        expected: "non-negative INTEGER",
                        got: value.to_string(),
                    },
                })? as u64;
                Ok(Some(match descriptor.kind {
                    EntityKind::NodeEntity => ElementId::Node(NodeId(raw)),
                    EntityKind::RelationshipEntity => ElementId::Relationship(RelId(raw)),
                }))
            }
            IdStrategy::External | IdStrategy::Assigned => {
                let label = id_prop.index_name.as_deref().unwrap_or(&descriptor.alias);
                let found = self.store.nodes_by_property(label, &id_prop.storage_key, &value)?;
                Ok(found.first().map(|node| ElementId::Node(node.id)))
            }
        }
    }

    /// Element already linked to `object`, if any.
    pub fn resolve(&self, object: &EntityRef) -> Result<Option<GraphElement>> {
        let descriptor = self.descriptor_of(object)?;
        self.resolve_with(object, &descriptor)
    }

    fn resolve_with(&self, object: &EntityRef, descriptor: &EntityDescriptor) -> Result<Option<GraphElement>> {
        let Some(id) = self.linked_id(object, descriptor)? else {
            return Ok(None);
        };
        match self.store.get_element(id)? {
            Some(element) => Ok(Some(element)),
            None if descriptor.id_strategy == IdStrategy::Internal => Err(Error::NotFound(format!(
                "{} is linked to {id}, which no longer exists",
                descriptor.name
            ))),
            None => Ok(None),
        }
    }

    /// Linked element of `object`, creating and linking one if needed.
    ///
    /// `rel_type_hint` names the relationship type for relationship
    /// entities reached through an association.
    pub fn resolve_or_create(&self, object: &EntityRef, rel_type_hint: Option<&str>) -> Result<GraphElement> {
        let descriptor = self.descriptor_of(object)?;
        if let Some(element) = self.resolve_with(object, &descriptor)? {
            return Ok(element);
        }

        let created = match descriptor.kind {
            EntityKind::NodeEntity => self.create_node(object, &descriptor)?,
            EntityKind::RelationshipEntity => self.create_relationship(object, &descriptor, rel_type_hint)?,
        };
        let id = created.element_id();
        self.types.write(self.store, id, &descriptor)?;
        self.link(object, &descriptor, &created)?;
        debug!(entity = %descriptor.name, element = %id, "resolved new element");

        self.store.get_element(id)?.ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Key a get-or-create uses: the unique property, else a non-internal id.
    fn identity_key<'d>(
        &self,
        object: &EntityRef,
        descriptor: &'d EntityDescriptor,
    ) -> Result<Option<(&'d PropertyDescriptor, Value)>> {
        if let (IdStrategy::External, Some(id_prop)) = (descriptor.id_strategy, descriptor.id()) {
            if id_prop.get_value(object, MappingPolicy::DEFAULT)?.is_null() {
                id_prop.set_value(object, self.ids.next_id(descriptor), MappingPolicy::DEFAULT)?;
            }
        }
        if let Some(unique) = descriptor.unique() {
            let value = unique.get_value(object, MappingPolicy::DEFAULT)?;
            if value.is_null() {
                return Err(Error::MissingUniqueValue {
                    entity: descriptor.name.clone(),
                    property: unique.name.clone(),
                });
            }
            return Ok(Some((unique, value)));
        }

        let Some(id_prop) = descriptor.id() else {
            return Ok(None);
        };
        match descriptor.id_strategy {
            IdStrategy::Internal => Ok(None),
            IdStrategy::Assigned | IdStrategy::External => {
                let value = id_prop.get_value(object, MappingPolicy::DEFAULT)?;
                if value.is_null() {
                    return Err(Error::MissingUniqueValue {
                        entity: descriptor.name.clone(),
                        property: id_prop.name.clone(),
                    });
                }
                Ok(Some((id_prop, value)))
            }
        }
    }

    fn create_node(&self, object: &EntityRef, descriptor: &EntityDescriptor) -> Result<GraphElement> {
        let labels: Vec<&str> = descriptor.storage_labels.iter().map(String::as_str).collect();
        let node = match self.identity_key(object, descriptor)? {
            Some((prop, value)) => {
                let index = prop.index_name.as_deref().unwrap_or(&descriptor.alias);
                self.store.get_or_create_node(index, &prop.storage_key, &value, &labels)?
            }
            None => self.store.create_node(&labels, PropertyMap::new())?,
        };
        Ok(GraphElement::Node(node))
    }

    fn create_relationship(
        &self,
        object: &EntityRef,
        descriptor: &EntityDescriptor,
        rel_type_hint: Option<&str>,
    ) -> Result<GraphElement> {
        let (Some(start), Some(end)) = (descriptor.start_property(), descriptor.end_property()) else {
            return Err(Error::Configuration {
                entity: descriptor.name.clone(),
                message: "relationship entity has no endpoints".into(),
            });
        };
        let src = self.endpoint(object, descriptor, start)?;
        let dst = self.endpoint(object, descriptor, end)?;
        let rel_type = self.relationship_type(object, descriptor, rel_type_hint)?;

        let relationship = match self.identity_key(object, descriptor)? {
            Some((prop, value)) => {
                let index = prop.index_name.as_deref().unwrap_or(&descriptor.alias);
                self.store.get_or_create_relationship(index, &prop.storage_key, &value, src, dst, &rel_type)?
            }
            None => self.store.create_relationship(src, dst, &rel_type, PropertyMap::new())?,
        };
        Ok(GraphElement::Relationship(relationship))
    }

    fn endpoint(
        &self,
        object: &EntityRef,
        descriptor: &EntityDescriptor,
        prop: &PropertyDescriptor,
    ) -> Result<NodeId> {
        let illegal = |message: String| Error::IllegalRelationshipEndpoints { entity: descriptor.name.clone(), message };
        let association =
            Association::try_from(prop.get(object, MappingPolicy::DEFAULT)?).map_err(|source| Error::PropertyAccess {
                entity: descriptor.name.clone(),
                property: prop.name.clone(),
                source,
            })?;
        let target = association
            .single()
            .cloned()
            .ok_or_else(|| illegal(format!("{} node '{}' is not set", endpoint_role(prop), prop.name)))?;
        match self.resolve_or_create(&target, None)? {
            GraphElement::Node(node) => Ok(node.id),
            GraphElement::Relationship(_) => {
                Err(illegal(format!("{} node '{}' resolved to a relationship", endpoint_role(prop), prop.name)))
            }
        }
    }

    /// Explicit type-name value, else the hint, else the static type.
    fn relationship_type(
        &self,
        object: &EntityRef,
        descriptor: &EntityDescriptor,
        rel_type_hint: Option<&str>,
    ) -> Result<String> {
        if let Some(prop) = descriptor.type_name_property() {
            if let Value::String(name) = prop.get_value(object, MappingPolicy::DEFAULT)? {
                if !name.is_empty() {
                    return Ok(name);
                }
            }
        }
        rel_type_hint
            .map(str::to_string)
            .or_else(|| descriptor.relationship_type.clone())
            .ok_or_else(|| Error::Configuration {
                entity: descriptor.name.clone(),
                message: "relationship type is not declared and no type name was supplied".into(),
            })
    }

    /// Write the persistent state of `element` into `object`.
    pub fn link(&self, object: &EntityRef, descriptor: &EntityDescriptor, element: &GraphElement) -> Result<()> {
        if descriptor.id_strategy != IdStrategy::Internal {
            return Ok(());
        }
        match descriptor.id() {
            Some(id_prop) => id_prop.set_value(object, Value::Int(element.element_id().raw() as i64), MappingPolicy::DEFAULT),
            None => Ok(()),
        }
    }

    /// Whether `object` has never been written. `None` when that cannot be
    /// told: an assigned or external id without a version property.
    pub fn is_new(&self, object: &EntityRef) -> Result<Option<bool>> {
        let descriptor = self.descriptor_of(object)?;
        let Some(id_prop) = descriptor.id() else {
            return Ok(Some(true));
        };
        if id_prop.get_value(object, MappingPolicy::DEFAULT)?.is_null() {
            return Ok(Some(true));
        }
        if descriptor.id_strategy == IdStrategy::Internal {
            return Ok(Some(false));
        }
        match descriptor.version() {
            Some(version) => Ok(Some(version.get_value(object, MappingPolicy::DEFAULT)?.is_null())),
            None => {
                warn!(
                    entity = %descriptor.name,
                    strategy = ?descriptor.id_strategy,
                    "cannot tell whether an object with a non-internal id is new without a version property"
                );
                Ok(None)
            }
        }
    }

    /// Both objects are the same instance or are linked to the same element.
    pub fn same_entity(&self, a: &EntityRef, b: &EntityRef) -> Result<bool> {
        if EntityRef::ptr_eq(a, b) {
            return Ok(true);
        }
        match (self.element_id(a)?, self.element_id(b)?) {
            (Some(x), Some(y)) => Ok(x == y),
            _ => Ok(false),
        }
    }

    // ========================================================================
    // Ad-hoc relationships between node entities
    // ========================================================================

    fn node_of(&self, object: &EntityRef) -> Result<NodeId> {
        match self.resolve_or_create(object, None)? {
            GraphElement::Node(node) => Ok(node.id),
            GraphElement::Relationship(rel) => Err(Error::IllegalRelationshipEndpoints {
                entity: object.entity_name(),
                message: format!("relationship {} cannot be a relationship endpoint", rel.id),
            }),
        }
    }

    fn linked_node(&self, object: &EntityRef) -> Result<Option<NodeId>> {
        Ok(match self.element_id(object)? {
            Some(ElementId::Node(id)) => Some(id),
            _ => None,
        })
    }

    /// `source -[rel_type]-> target`, reusing an existing one.
    pub fn relate_to(&self, source: &EntityRef, target: &EntityRef, rel_type: &str) -> Result<RelationshipResult> {
        self.create_relationship_between(source, target, rel_type, false)
    }

    pub fn create_relationship_between(
        &self,
        source: &EntityRef,
        target: &EntityRef,
        rel_type: &str,
        allow_duplicates: bool,
    ) -> Result<RelationshipResult> {
        let src = self.node_of(source)?;
        let dst = self.node_of(target)?;
        if allow_duplicates {
            let relationship = self.store.create_relationship(src, dst, rel_type, PropertyMap::new())?;
            return Ok(RelationshipResult { relationship, status: RelationshipStatus::New });
        }
        let existing = self
            .store
            .relationships_of(src, Some(rel_type), Direction::Outgoing)?
            .into_iter()
            .find(|r| r.dst == dst);
        let (relationship, status) = match existing {
            Some(relationship) => (relationship, RelationshipStatus::Existing),
            None => (self.store.merge_relationship(src, dst, rel_type)?, RelationshipStatus::New),
        };
        Ok(RelationshipResult { relationship, status })
    }

    /// Every `source -[rel_type]-> target`.
    pub fn relationships_between(
        &self,
        source: &EntityRef,
        target: &EntityRef,
        rel_type: &str,
    ) -> Result<Vec<Relationship>> {
        let (Some(src), Some(dst)) = (self.linked_node(source)?, self.linked_node(target)?) else {
            return Ok(Vec::new());
        };
        Ok(self
            .store
            .relationships_of(src, Some(rel_type), Direction::Outgoing)?
            .into_iter()
            .filter(|r| r.dst == dst)
            .collect())
    }

    pub fn get_relationship_between(
        &self,
        source: &EntityRef,
        target: &EntityRef,
        rel_type: &str,
    ) -> Result<Option<Relationship>> {
        Ok(self.relationships_between(source, target, rel_type)?.into_iter().next())
    }

    /// Delete `source -[rel_type]-> target` if present.
    pub fn remove_relationship_to(
        &self,
        source: &EntityRef,
        target: &EntityRef,
        rel_type: &str,
    ) -> Result<Option<RelationshipResult>> {
        let Some(relationship) = self.get_relationship_between(source, target, rel_type)? else {
            return Ok(None);
        };
        self.store.delete_relationship(relationship.id)?;
        Ok(Some(RelationshipResult { relationship, status: RelationshipStatus::Deleted }))
    }
}

fn endpoint_role(prop: &PropertyDescriptor) -> &'static str {
    if prop.is_start_node { "start" } else { "end" }
}
