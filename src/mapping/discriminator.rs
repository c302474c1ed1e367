//! # Type Discriminator
//!
//! How the concrete domain type of a stored element is recorded and
//! recovered.
//!
//! | Strategy | Nodes | Relationships |
//! |----------|-------|---------------|
//! | `LabelStrategy` | storage labels + `_Alias` marker label | n/a |
//! | `PropertyStrategy` | `__type__` property | `__type__` property |
//!
//! Relationships carry a single type name, so they always use the property
//! strategy.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::MappingConfig;
use crate::model::{ElementId, GraphElement};
use crate::storage::GraphStore;
use crate::{Error, Result};
use super::descriptor::EntityDescriptor;
use super::registry::MetamodelRegistry;

// ============================================================================
// Policies
// ============================================================================

/// What to do when the stored type is unrelated to the requested one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeSafetyPolicy {
    /// Return the stored type regardless of the request.
    #[default]
    Permissive,
    /// Return nothing.
    NullOnMismatch,
    /// Fail with [`Error::TypeMismatch`].
    ThrowOnMismatch,
}

/// Which strategy records the type of stored nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeTypeStrategy {
    #[default]
    Labels,
    Property,
}

// ============================================================================
// Strategies
// ============================================================================

pub trait TypeRepresentationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Record `descriptor` as the type of the stored element.
    fn write(&self, store: &dyn GraphStore, element: ElementId, descriptor: &EntityDescriptor) -> Result<()>;

    /// Alias recorded on the element, if any.
    fn read(&self, element: &GraphElement) -> Option<String>;
}

/// Labels for every type in the hierarchy plus one marker label naming the
/// concrete type.
#[derive(Debug, Clone)]
pub struct LabelStrategy {
    marker_prefix: String,
}

impl LabelStrategy {
    pub fn new(marker_prefix: impl Into<String>) -> Self {
        Self { marker_prefix: marker_prefix.into() }
    }

    pub fn marker(&self, alias: &str) -> String {
        format!("{}{}", self.marker_prefix, alias)
    }
}

impl TypeRepresentationStrategy for LabelStrategy {
    fn name(&self) -> &'static str {
        "labels"
    }

    fn write(&self, store: &dyn GraphStore, element: ElementId, descriptor: &EntityDescriptor) -> Result<()> {
        let ElementId::Node(id) = element else {
            return Err(Error::Configuration {
                entity: descriptor.name.clone(),
                message: "label type representation only applies to nodes".into(),
            });
        };
        for label in &descriptor.storage_labels {
            store.add_label(id, label)?;
        }
        store.add_label(id, &self.marker(&descriptor.alias))
    }

    fn read(&self, element: &GraphElement) -> Option<String> {
        element.as_node()?.labels.iter().find_map(|label| {
            label.strip_prefix(self.marker_prefix.as_str()).filter(|rest| !rest.is_empty()).map(str::to_string)
        })
    }
}

/// One property holding the alias.
#[derive(Debug, Clone)]
pub struct PropertyStrategy {
    key: String,
}

impl PropertyStrategy {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl TypeRepresentationStrategy for PropertyStrategy {
    fn name(&self) -> &'static str {
        "property"
    }

    fn write(&self, store: &dyn GraphStore, element: ElementId, descriptor: &EntityDescriptor) -> Result<()> {
        store.set_element_property(element, &self.key, descriptor.alias.as_str().into())
    }

    fn read(&self, element: &GraphElement) -> Option<String> {
        element.property(&self.key)?.as_str().map(str::to_string)
    }
}

// ============================================================================
// TypeResolver
// ============================================================================

/// Picks the strategy per element kind and applies the type-safety policy.
pub struct TypeResolver {
    nodes: Box<dyn TypeRepresentationStrategy>,
    relationships: PropertyStrategy,
    safety: TypeSafetyPolicy,
}

impl TypeResolver {
    pub fn new(config: &MappingConfig) -> Self {
        let nodes: Box<dyn TypeRepresentationStrategy> = match config.node_type_strategy {
            NodeTypeStrategy::Labels => Box::new(LabelStrategy::new(config.marker_prefix.clone())),
            NodeTypeStrategy::Property => Box::new(PropertyStrategy::new(config.type_property.clone())),
        };
        Self {
            nodes,
            relationships: PropertyStrategy::new(config.type_property.clone()),
            safety: config.type_safety,
        }
    }

    pub fn safety(&self) -> TypeSafetyPolicy {
        self.safety
    }

    fn strategy_for(&self, element: ElementId) -> &dyn TypeRepresentationStrategy {
        match element {
            ElementId::Node(_) => self.nodes.as_ref(),
            ElementId::Relationship(_) => &self.relationships,
        }
    }

    pub fn write(&self, store: &dyn GraphStore, element: ElementId, descriptor: &EntityDescriptor) -> Result<()> {
        self.strategy_for(element).write(store, element, descriptor)
    }

    pub fn read_alias(&self, element: &GraphElement) -> Option<String> {
        self.strategy_for(element.element_id()).read(element)
    }

    /// Stored type of `element`: the recorded alias, else the most specific
    /// registered type among the node's labels.
    pub fn stored_type(
        &self,
        registry: &MetamodelRegistry,
        element: &GraphElement,
    ) -> Result<Option<Arc<EntityDescriptor>>> {
        if let Some(alias) = self.read_alias(element) {
            if let Some(descriptor) = registry.describe_alias(&alias)? {
                return Ok(Some(descriptor));
            }
        }
        match element.as_node() {
            Some(node) => registry.resolve_labels(&node.labels),
            None => Ok(None),
        }
    }

    /// Type to materialize when `requested` is asked for. `None` means the
    /// policy rejected the element.
    pub fn target_type(
        &self,
        registry: &MetamodelRegistry,
        element: &GraphElement,
        requested: &Arc<EntityDescriptor>,
    ) -> Result<Option<Arc<EntityDescriptor>>> {
        let Some(stored) = self.stored_type(registry, element)? else {
            return Ok(Some(requested.clone()));
        };
        if stored.is_assignable_to(&requested.name) {
            return Ok(Some(stored));
        }
        match self.safety {
            TypeSafetyPolicy::Permissive => Ok(Some(stored)),
            TypeSafetyPolicy::NullOnMismatch => Ok(None),
            TypeSafetyPolicy::ThrowOnMismatch => Err(Error::TypeMismatch {
                requested: requested.name.clone(),
                stored: stored.name.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::declaration::{EntityDeclaration, FieldDeclaration};
    use crate::model::{Node, NodeId, PropertyMap};
    use crate::storage::MemoryStore;

    fn setup(config: &MappingConfig) -> MetamodelRegistry {
        let reg = MetamodelRegistry::new(config);
        reg.register_declaration(EntityDeclaration::node("Animal").abstract_type().field(FieldDeclaration::id("id")))
            .unwrap();
        reg.register_declaration(EntityDeclaration::node("Dog").extends("Animal")).unwrap();
        reg.register_declaration(EntityDeclaration::node("Car").field(FieldDeclaration::id("id"))).unwrap();
        reg
    }

    #[test]
    fn test_label_strategy_write_and_read() {
        let config = MappingConfig::default();
        let reg = setup(&config);
        let store = MemoryStore::new();
        let node = store.create_node(&[], PropertyMap::new()).unwrap();
        let dog = reg.describe("Dog").unwrap();

        let strategy = LabelStrategy::new("_");
        strategy.write(&store, ElementId::Node(node.id), &dog).unwrap();
        let stored = GraphElement::Node(store.get_node(node.id).unwrap().unwrap());
        assert!(stored.as_node().unwrap().has_label("Animal"));
        assert!(stored.as_node().unwrap().has_label("_Dog"));
        assert_eq!(strategy.read(&stored), Some("Dog".to_string()));
    }

    #[test]
    fn test_property_strategy_round_trip() {
        let store = MemoryStore::new();
        let node = store.create_node(&[], PropertyMap::new()).unwrap();
        let reg = setup(&MappingConfig::default());
        let strategy = PropertyStrategy::new("__type__");
        strategy.write(&store, ElementId::Node(node.id), &reg.describe("Car").unwrap()).unwrap();
        let stored = GraphElement::Node(store.get_node(node.id).unwrap().unwrap());
        assert_eq!(strategy.read(&stored), Some("Car".to_string()));
    }

    #[test]
    fn test_label_fallback_picks_most_specific() {
        let config = MappingConfig::default();
        let reg = setup(&config);
        let types = TypeResolver::new(&config);
        let element = GraphElement::Node(Node::new(NodeId(1)).with_labels(["Animal", "Dog"]));
        assert_eq!(types.stored_type(&reg, &element).unwrap().unwrap().name, "Dog");
    }

    #[test]
    fn test_policy_matrix() {
        let element = GraphElement::Node(Node::new(NodeId(1)).with_labels(["_Car"]));
        for (policy, expect) in [
            (TypeSafetyPolicy::Permissive, Some("Car")),
            (TypeSafetyPolicy::NullOnMismatch, None),
        ] {
            let config = MappingConfig::default().with_type_safety(policy);
            let reg = setup(&config);
            let types = TypeResolver::new(&config);
            let dog = reg.describe("Dog").unwrap();
            let target = types.target_type(&reg, &element, &dog).unwrap();
            assert_eq!(target.map(|t| t.name.clone()).as_deref(), expect);
        }

        let config = MappingConfig::default().with_type_safety(TypeSafetyPolicy::ThrowOnMismatch);
        let reg = setup(&config);
        let types = TypeResolver::new(&config);
        let dog = reg.describe("Dog").unwrap();
        let err = types.target_type(&reg, &element, &dog).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { ref requested, ref stored } if requested == "Dog" && stored == "Car"));
    }

    #[test]
    fn test_subtype_satisfies_supertype_request() {
        let config = MappingConfig::default().with_type_safety(TypeSafetyPolicy::ThrowOnMismatch);
        let reg = setup(&config);
        let types = TypeResolver::new(&config);
        let element = GraphElement::Node(Node::new(NodeId(1)).with_labels(["_Dog"]));
        let animal = reg.describe("Animal").unwrap();
        assert_eq!(types.target_type(&reg, &element, &animal).unwrap().unwrap().name, "Dog");
    }

    #[test]
    fn test_untyped_element_uses_requested_type() {
        let config = MappingConfig::default();
        let reg = setup(&config);
        let types = TypeResolver::new(&config);
        let car = reg.describe("Car").unwrap();
        let element = GraphElement::Node(Node::new(NodeId(9)));
        assert!(Arc::ptr_eq(&types.target_type(&reg, &element, &car).unwrap().unwrap(), &car));
    }
}
