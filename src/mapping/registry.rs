//! # Metamodel Registry
//!
//! The single source of type metadata. Declarations are registered up
//! front; descriptors are built lazily on first `describe` (or all at
//! once by `initialize`) and are immutable afterwards.
//!
//! A build covers the whole reachable closure of a type: its supertypes
//! and every association target. The closure is assembled privately and
//! published under the write lock with insert-if-absent, so concurrent
//! first use of the same type yields one descriptor instance and a
//! closure that fails validation publishes nothing.

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::config::MappingConfig;
use crate::model::{Direction, Labels};
use crate::{Error, Result};
use super::declaration::{EntityDeclaration, FieldDeclaration, FieldRole};
use super::descriptor::{
    EntityDescriptor, EntityKind, IdStrategy, LoadPolicy, PropertyDescriptor,
    RelationshipDescriptor, RelationshipEndpoints, RelationshipNaming,
};
use super::object::{Entity, EntityRef};

type DescriptorMap = HashMap<String, Arc<EntityDescriptor>>;

pub struct MetamodelRegistry {
    naming: RelationshipNaming,
    declarations: RwLock<HashMap<String, EntityDeclaration>>,
    /// alias -> type name
    aliases: RwLock<HashMap<String, String>>,
    descriptors: RwLock<DescriptorMap>,
}

impl MetamodelRegistry {
    pub fn new(config: &MappingConfig) -> Self {
        Self {
            naming: config.relationship_naming,
            declarations: RwLock::new(HashMap::new()),
            aliases: RwLock::new(HashMap::new()),
            descriptors: RwLock::new(HashMap::new()),
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a typed entity; `T::default()` becomes its instantiator.
    pub fn register<T: Entity>(&self) -> Result<()> {
        let declaration = T::declaration();
        let declaration = if declaration.is_abstract {
            declaration
        } else {
            declaration.factory(|| EntityRef::new(T::default()))
        };
        self.register_declaration(declaration)
    }

    pub fn register_declaration(&self, declaration: EntityDeclaration) -> Result<()> {
        let mut declarations = self.declarations.write();
        let mut aliases = self.aliases.write();

        if declarations.contains_key(&declaration.name) {
            return Err(Error::Configuration {
                entity: declaration.name.clone(),
                message: "type is already registered".into(),
            });
        }
        let alias = declaration.alias_or_name().to_string();
        if let Some(owner) = aliases.get(&alias) {
            return Err(Error::Configuration {
                entity: declaration.name.clone(),
                message: format!("alias '{alias}' is already used by {owner}"),
            });
        }

        debug!(entity = %declaration.name, alias = %alias, kind = %declaration.kind, "registered declaration");
        aliases.insert(alias, declaration.name.clone());
        declarations.insert(declaration.name.clone(), declaration);
        Ok(())
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Descriptor for `name`, building its closure on first use.
    pub fn describe(&self, name: &str) -> Result<Arc<EntityDescriptor>> {
        if let Some(descriptor) = self.descriptors.read().get(name) {
            return Ok(descriptor.clone());
        }

        let built = {
            let declarations = self.declarations.read();
            self.build_closure(name, &declarations)?
        };

        let mut published = self.descriptors.write();
        for (type_name, descriptor) in built {
            published.entry(type_name).or_insert(descriptor);
        }
        published.get(name).cloned().ok_or_else(|| not_registered(name))
    }

    /// Descriptor of the type whose discriminator is `alias`.
    pub fn describe_alias(&self, alias: &str) -> Result<Option<Arc<EntityDescriptor>>> {
        let name = self.aliases.read().get(alias).cloned();
        name.map(|name| self.describe(&name)).transpose()
    }

    /// Most specific registered type whose alias is among `labels`.
    pub fn resolve_labels<'l>(
        &self,
        labels: impl IntoIterator<Item = &'l String>,
    ) -> Result<Option<Arc<EntityDescriptor>>> {
        let names: Vec<String> = {
            let aliases = self.aliases.read();
            labels.into_iter().filter_map(|label| aliases.get(label).cloned()).collect()
        };
        let mut best: Option<Arc<EntityDescriptor>> = None;
        for name in names {
            let candidate = self.describe(&name)?;
            let deeper = best.as_ref().is_none_or(|b| candidate.super_types.len() > b.super_types.len());
            if deeper {
                best = Some(candidate);
            }
        }
        Ok(best)
    }

    /// Build every registered type, surfacing configuration errors now.
    pub fn initialize(&self) -> Result<()> {
        let names = self.registered_names();
        for name in &names {
            self.describe(name)?;
        }
        info!(types = names.len(), "metamodel initialized");
        Ok(())
    }

    /// Registered type names, sorted.
    pub fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.declarations.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_node_entity(&self, name: &str) -> bool {
        self.kind_of(name) == Some(EntityKind::NodeEntity)
    }

    pub fn is_relationship_entity(&self, name: &str) -> bool {
        self.kind_of(name) == Some(EntityKind::RelationshipEntity)
    }

    fn kind_of(&self, name: &str) -> Option<EntityKind> {
        self.declarations.read().get(name).map(|d| d.kind)
    }

    // ========================================================================
    // Building
    // ========================================================================

    fn build_closure(
        &self,
        name: &str,
        declarations: &HashMap<String, EntityDeclaration>,
    ) -> Result<DescriptorMap> {
        let mut built = DescriptorMap::new();
        let mut pending = vec![name.to_string()];

        while let Some(next) = pending.pop() {
            if built.contains_key(&next) || self.descriptors.read().contains_key(&next) {
                continue;
            }
            let descriptor = self.build_one(&next, declarations, &mut built, &mut Vec::new())?;
            for association in descriptor.associations() {
                if let Some(rel) = &association.relationship {
                    pending.push(rel.target.clone());
                }
            }
        }
        Ok(built)
    }

    fn build_one(
        &self,
        name: &str,
        declarations: &HashMap<String, EntityDeclaration>,
        built: &mut DescriptorMap,
        lineage: &mut Vec<String>,
    ) -> Result<Arc<EntityDescriptor>> {
        if let Some(descriptor) = built.get(name) {
            return Ok(descriptor.clone());
        }
        if let Some(descriptor) = self.descriptors.read().get(name) {
            return Ok(descriptor.clone());
        }
        if lineage.iter().any(|n| n == name) {
            return Err(Error::Configuration {
                entity: name.to_string(),
                message: format!("cyclic inheritance through {}", lineage.join(" -> ")),
            });
        }
        let declaration = declarations.get(name).ok_or_else(|| not_registered(name))?;

        let parent = match &declaration.extends {
            Some(super_type) => {
                if !declarations.contains_key(super_type) {
                    return Err(Error::Configuration {
                        entity: name.to_string(),
                        message: format!("supertype '{super_type}' is not registered"),
                    });
                }
                lineage.push(name.to_string());
                let parent = self.build_one(super_type, declarations, built, lineage)?;
                lineage.pop();
                Some(parent)
            }
            None => None,
        };

        let descriptor = Arc::new(self.assemble(declaration, parent.as_deref(), declarations)?);
        debug!(
            entity = %descriptor.name,
            kind = %descriptor.kind,
            properties = descriptor.properties.len(),
            labels = ?descriptor.storage_labels,
            "built entity descriptor"
        );
        built.insert(name.to_string(), descriptor.clone());
        Ok(descriptor)
    }

    fn assemble(
        &self,
        declaration: &EntityDeclaration,
        parent: Option<&EntityDescriptor>,
        declarations: &HashMap<String, EntityDeclaration>,
    ) -> Result<EntityDescriptor> {
        let fail = |message: String| Error::Configuration { entity: declaration.name.clone(), message };

        if let Some(parent) = parent {
            if parent.kind != declaration.kind {
                return Err(fail(format!(
                    "declared as {} but supertype {} is a {}",
                    declaration.kind, parent.name, parent.kind
                )));
            }
        }

        let alias = declaration.alias_or_name().to_string();
        let mut super_types = Vec::new();
        let mut properties = Vec::new();
        if let Some(parent) = parent {
            super_types.push(parent.name.clone());
            super_types.extend(parent.super_types.iter().cloned());
            properties.extend(parent.properties.iter().cloned());
        }

        for field in &declaration.fields {
            if properties.iter().any(|p: &PropertyDescriptor| p.name == field.name) {
                return Err(fail(format!("field '{}' is declared twice", field.name)));
            }
            properties.push(self.property(declaration, &alias, field, declarations)?);
        }

        let indices = |pred: fn(&PropertyDescriptor) -> bool| -> Vec<usize> {
            properties.iter().enumerate().filter(|(_, p)| pred(p)).map(|(i, _)| i).collect()
        };
        let names_of = |idx: &[usize]| -> String {
            idx.iter().map(|&i| properties[i].name.as_str()).collect::<Vec<_>>().join(", ")
        };

        let ids = indices(|p| p.is_identity);
        if ids.len() > 1 {
            return Err(fail(format!("more than one id property: {}", names_of(&ids))));
        }
        if ids.is_empty() && !declaration.is_abstract {
            return Err(fail("concrete type declares no id property".into()));
        }
        let uniques = indices(|p| p.is_unique);
        if uniques.len() > 1 {
            return Err(fail(format!("at most one unique property is allowed, found {}", names_of(&uniques))));
        }
        let versions = indices(|p| p.is_version);
        if versions.len() > 1 {
            return Err(fail(format!("more than one version property: {}", names_of(&versions))));
        }

        let id_strategy = declaration
            .id_strategy
            .or(parent.map(|p| p.id_strategy))
            .unwrap_or_default();

        {
            let mut keys = HashSet::new();
            for p in &properties {
                let stored = p.is_scalar() && !(p.is_identity && id_strategy == IdStrategy::Internal);
                if stored && !keys.insert(p.storage_key.as_str()) {
                    return Err(fail(format!("storage key '{}' is used twice", p.storage_key)));
                }
            }
        }

        let endpoints = match declaration.kind {
            EntityKind::RelationshipEntity => {
                if id_strategy != IdStrategy::Internal {
                    return Err(fail("relationship entities only support internal ids".into()));
                }
                if let Some(p) = properties.iter().find(|p| p.is_association() && !p.is_endpoint()) {
                    return Err(fail(format!("relationship entities cannot declare association '{}'", p.name)));
                }
                let starts = indices(|p| p.is_start_node);
                let ends = indices(|p| p.is_end_node);
                let types = indices(|p| p.is_type_name);
                if starts.len() > 1 || ends.len() > 1 || types.len() > 1 {
                    return Err(fail("start node, end node and type name may each be declared once".into()));
                }
                match (starts.first(), ends.first()) {
                    (Some(&start), Some(&end)) => Some(RelationshipEndpoints {
                        start,
                        end,
                        type_property: types.first().copied(),
                    }),
                    _ if declaration.is_abstract => None,
                    _ => return Err(fail("relationship entity needs both a start node and an end node".into())),
                }
            }
            EntityKind::NodeEntity => {
                if let Some(p) = properties.iter().find(|p| p.is_endpoint() || p.is_type_name) {
                    return Err(fail(format!("'{}' is only valid on relationship entities", p.name)));
                }
                None
            }
        };

        let mut storage_labels = Labels::new();
        if declaration.kind == EntityKind::NodeEntity {
            let mut push = |label: &str| {
                if !storage_labels.iter().any(|l| l == label) {
                    storage_labels.push(label.to_string());
                }
            };
            if let Some(parent) = parent {
                parent.storage_labels.iter().for_each(|l| push(l.as_str()));
            }
            declaration.fields.iter().filter_map(|f| f.index_name.as_deref()).for_each(|l| push(l));
            declaration.labels.iter().for_each(|l| push(l.as_str()));
            push(&alias);
        }

        Ok(EntityDescriptor {
            name: declaration.name.clone(),
            alias,
            kind: declaration.kind,
            is_abstract: declaration.is_abstract,
            super_types,
            id_property: ids.first().copied(),
            version_property: versions.first().copied(),
            unique_property: uniques.first().copied(),
            properties,
            storage_labels,
            endpoints,
            relationship_type: declaration
                .relationship_type
                .clone()
                .or_else(|| parent.and_then(|p| p.relationship_type.clone())),
            id_strategy,
            use_short_names: declaration.short_names,
            instantiator: declaration.factory.clone(),
        })
    }

    fn property(
        &self,
        declaration: &EntityDeclaration,
        alias: &str,
        field: &FieldDeclaration,
        declarations: &HashMap<String, EntityDeclaration>,
    ) -> Result<PropertyDescriptor> {
        let fail = |message: String| Error::Configuration { entity: declaration.name.clone(), message };

        if field.transient
            && (field.role != FieldRole::Property || field.unique || field.indexed || field.eager)
        {
            return Err(fail(format!("transient field '{}' cannot carry another role", field.name)));
        }
        let is_identity = field.role == FieldRole::Id;
        if is_identity && field.unique {
            return Err(fail(format!("id property '{}' cannot also be unique", field.name)));
        }

        let relationship = match &field.role {
            FieldRole::RelatedTo(target)
            | FieldRole::RelatedVia(target)
            | FieldRole::StartNode(target)
            | FieldRole::EndNode(target) => {
                let expected = match field.role {
                    FieldRole::RelatedVia(_) => EntityKind::RelationshipEntity,
                    _ => EntityKind::NodeEntity,
                };
                let target_decl = declarations.get(target).ok_or_else(|| {
                    fail(format!("association '{}' targets unregistered type '{target}'", field.name))
                })?;
                if target_decl.kind != expected {
                    return Err(fail(format!(
                        "association '{}' targets {target} which is a {}, expected a {expected}",
                        field.name, target_decl.kind
                    )));
                }
                if field.unique || field.indexed {
                    return Err(fail(format!("association '{}' cannot be unique or indexed", field.name)));
                }
                let type_name = field
                    .rel_type
                    .clone()
                    .or_else(|| match field.role {
                        FieldRole::RelatedVia(_) => target_decl.relationship_type.clone(),
                        _ => None,
                    })
                    .unwrap_or_else(|| self.naming.apply(&field.name));
                Some(RelationshipDescriptor {
                    direction: field.direction,
                    type_name,
                    cardinality: field.cardinality,
                    target: target.clone(),
                    target_kind: expected,
                })
            }
            _ => None,
        };

        let is_start_node = matches!(field.role, FieldRole::StartNode(_));
        let is_end_node = matches!(field.role, FieldRole::EndNode(_));
        let load_policy = if relationship.is_some() && !field.eager && !is_start_node && !is_end_node {
            LoadPolicy::OnDemand
        } else {
            LoadPolicy::Direct
        };
        let storage_key = field.key.clone().unwrap_or_else(|| {
            if declaration.short_names {
                field.name.clone()
            } else {
                format!("{}.{}", declaration.name, field.name)
            }
        });
        let index_name = (field.unique || field.indexed || is_identity)
            .then(|| field.index_name.clone().unwrap_or_else(|| alias.to_string()));

        Ok(PropertyDescriptor {
            name: field.name.clone(),
            owner: declaration.name.clone(),
            storage_key,
            value_type: field.value_type,
            is_identity,
            is_version: field.role == FieldRole::Version,
            is_unique: field.unique,
            is_indexed: field.indexed,
            is_transient: field.transient,
            is_type_name: field.role == FieldRole::TypeName,
            is_start_node,
            is_end_node,
            is_eager: field.eager,
            nullable: field.nullable,
            default: field
                .default_value
                .clone()
                .unwrap_or_else(|| field.value_type.default_value(field.nullable)),
            index_name,
            load_policy,
            field_access: field.field_access,
            relationship: relationship.map(|mut r| {
                if is_start_node || is_end_node {
                    r.direction = if is_start_node { Direction::Incoming } else { Direction::Outgoing };
                }
                r
            }),
        })
    }
}

fn not_registered(name: &str) -> Error {
    Error::Configuration { entity: name.to_string(), message: "type is not registered".into() }
}
