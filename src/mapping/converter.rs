//! # Cascading Converter
//!
//! Read path, per element:
//!
//! ```text
//! discriminate type -> check identity cache -> hit: done
//!                                           -> instantiate + cache -> copy scalars -> cascade associations
//! ```
//!
//! The new object is cached before anything is copied into it, so a cycle
//! back to it during the cascade finds the same instance.
//!
//! Write path: resolve or create the element, copy scalars, then write each
//! loaded association target before linking it. Relationships of the
//! association's type that no longer point at a target are removed.

use std::sync::Arc;

use hashbrown::HashSet;
use tracing::debug;

use crate::model::{Direction, ElementId, GraphElement, NodeId, RelId};
use crate::storage::GraphStore;
use crate::{Error, Result};
use super::cache::ConversionContext;
use super::descriptor::{EntityDescriptor, EntityKind, PropertyDescriptor};
use super::discriminator::TypeResolver;
use super::identity::IdentityResolver;
use super::object::{Association, EntityRef, FieldValue};
use super::policy::MappingPolicy;
use super::registry::MetamodelRegistry;
use super::transmitter::{self, PendingAssociation};

pub struct Converter<'a, S: GraphStore> {
    store: &'a S,
    registry: &'a MetamodelRegistry,
    types: &'a TypeResolver,
    identity: IdentityResolver<'a, S>,
}

impl<'a, S: GraphStore> Converter<'a, S> {
    pub fn new(
        store: &'a S,
        registry: &'a MetamodelRegistry,
        types: &'a TypeResolver,
        identity: IdentityResolver<'a, S>,
    ) -> Self {
        Self { store, registry, types, identity }
    }

    pub fn identity(&self) -> &IdentityResolver<'a, S> {
        &self.identity
    }

    // ========================================================================
    // Read path
    // ========================================================================

    /// Convert `element` to an object of `requested` (or a subtype).
    /// `None` when the type-safety policy rejects the stored type.
    pub fn read(
        &self,
        ctx: &mut ConversionContext,
        element: &GraphElement,
        requested: &Arc<EntityDescriptor>,
        policy: MappingPolicy,
    ) -> Result<Option<EntityRef>> {
        ctx.enter();
        let result = self.read_element(ctx, element, requested, policy);
        ctx.exit();
        result
    }

    fn read_element(
        &self,
        ctx: &mut ConversionContext,
        element: &GraphElement,
        requested: &Arc<EntityDescriptor>,
        policy: MappingPolicy,
    ) -> Result<Option<EntityRef>> {
        match self.types.target_type(self.registry, element, requested)? {
            Some(target) => self.read_as(ctx, element, &target, policy).map(Some),
            None => {
                debug!(element = %element.element_id(), requested = %requested.name, "stored type rejected");
                Ok(None)
            }
        }
    }

    /// Materialize `element` as exactly `target`, skipping discrimination.
    fn read_as(
        &self,
        ctx: &mut ConversionContext,
        element: &GraphElement,
        target: &EntityDescriptor,
        policy: MappingPolicy,
    ) -> Result<EntityRef> {
        let key = (element.element_id(), policy);
        if let Some(hit) = ctx.cache.get(&key) {
            return Ok(hit);
        }

        let object = target.instantiate()?;
        ctx.cache.insert(key, object.clone());

        let raw = transmitter::copy_from(self.store, element, &object, target, policy)?;
        for association in raw {
            let prop = &target.properties[association.property];
            let Some(rel) = &prop.relationship else { continue };
            let target_type = self.registry.describe(&rel.target)?;

            let mut loaded = Vec::with_capacity(association.elements.len());
            for connected in &association.elements {
                if let Some(child) = self.read(ctx, connected, &target_type, association.policy)? {
                    loaded.push(child);
                }
            }
            prop.set(&object, FieldValue::Association(Association::Loaded(loaded)), policy)?;
        }
        Ok(object)
    }

    /// Re-read the element `object` is linked to as `target`, regardless of
    /// its stored type.
    pub fn project_to(
        &self,
        ctx: &mut ConversionContext,
        object: &EntityRef,
        target: &Arc<EntityDescriptor>,
        policy: MappingPolicy,
    ) -> Result<EntityRef> {
        let element = self.identity.resolve(object)?.ok_or_else(|| {
            Error::NotFound(format!("{} is not linked to a stored element", object.entity_name()))
        })?;
        if element.is_node() != target.is_node_entity() {
            return Err(Error::TypeMismatch {
                requested: target.name.clone(),
                stored: object.entity_name(),
            });
        }
        ctx.enter();
        let result = self.read_as(ctx, &element, target, policy);
        ctx.exit();
        result
    }

    // ========================================================================
    // Write path
    // ========================================================================

    /// Write `object` and every loaded association reachable from it.
    /// Returns the object's element as stored after the write.
    pub fn write(
        &self,
        ctx: &mut ConversionContext,
        object: &EntityRef,
        policy: MappingPolicy,
        rel_type_hint: Option<&str>,
    ) -> Result<GraphElement> {
        ctx.enter();
        let result = self.write_object(ctx, object, policy, rel_type_hint);
        ctx.exit();
        result
    }

    fn write_object(
        &self,
        ctx: &mut ConversionContext,
        object: &EntityRef,
        policy: MappingPolicy,
        rel_type_hint: Option<&str>,
    ) -> Result<GraphElement> {
        let descriptor = self.identity.descriptor_of(object)?;

        if descriptor.kind == EntityKind::RelationshipEntity {
            for endpoint in [descriptor.start_property(), descriptor.end_property()].into_iter().flatten() {
                if let Some(node) = Association::try_from(endpoint.get(object, policy)?)
                    .ok()
                    .and_then(|a| a.single().cloned())
                {
                    self.write(ctx, &node, policy, None)?;
                }
            }
        }

        let element = self.identity.resolve_or_create(object, rel_type_hint)?;
        let id = element.element_id();
        if !ctx.mark_written(id) {
            return Ok(element);
        }

        let pending = transmitter::copy_to(self.store, &element, object, &descriptor, policy)?;
        if let GraphElement::Node(node) = &element {
            for association in &pending {
                let prop = &descriptor.properties[association.property];
                self.write_association(ctx, node.id, prop, association)?;
            }
        }

        self.store.get_element(id)?.ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn write_association(
        &self,
        ctx: &mut ConversionContext,
        owner: NodeId,
        prop: &PropertyDescriptor,
        association: &PendingAssociation,
    ) -> Result<()> {
        let Some(rel) = &prop.relationship else {
            return Ok(());
        };
        let mut kept: HashSet<RelId> = HashSet::new();

        for target in &association.targets {
            let element = self.write(ctx, target, association.policy, Some(&rel.type_name))?;
            match (rel.target_kind, element) {
                (EntityKind::NodeEntity, GraphElement::Node(node)) => {
                    let linked = match rel.direction {
                        Direction::Outgoing => self.store.merge_relationship(owner, node.id, &rel.type_name)?,
                        Direction::Incoming => self.store.merge_relationship(node.id, owner, &rel.type_name)?,
                        Direction::Undirected => {
                            let existing = self
                                .store
                                .relationships_of(owner, Some(&rel.type_name), Direction::Undirected)?
                                .into_iter()
                                .find(|r| r.other_node(owner) == Some(node.id));
                            match existing {
                                Some(r) => r,
                                None => self.store.merge_relationship(owner, node.id, &rel.type_name)?,
                            }
                        }
                    };
                    kept.insert(linked.id);
                }
                (EntityKind::RelationshipEntity, GraphElement::Relationship(r)) => {
                    kept.insert(r.id);
                }
                (_, other) => {
                    return Err(Error::IllegalRelationshipEndpoints {
                        entity: prop.owner.clone(),
                        message: format!(
                            "association '{}' expects a {} but {} was written",
                            prop.name,
                            rel.target_kind,
                            other.element_id()
                        ),
                    });
                }
            }
        }

        for stale in self.store.relationships_of(owner, Some(&rel.type_name), rel.direction)? {
            if !kept.contains(&stale.id) {
                debug!(
                    entity = %prop.owner,
                    property = %prop.name,
                    relationship = %ElementId::Relationship(stale.id),
                    "removing stale relationship"
                );
                self.store.delete_relationship(stale.id)?;
            }
        }
        Ok(())
    }
}
