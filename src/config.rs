//! Mapper configuration.

use serde::{Deserialize, Serialize};

use crate::mapping::{MappingPolicy, NodeTypeStrategy, RelationshipNaming, TypeSafetyPolicy};
use crate::Result;

/// Default property holding the type alias of relationships (and of nodes
/// under [`NodeTypeStrategy::Property`]).
pub const DEFAULT_TYPE_PROPERTY: &str = "__type__";

/// Default prefix of the marker label naming a node's concrete type.
pub const DEFAULT_MARKER_PREFIX: &str = "_";

/// Deployment-wide mapping settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Behavior when a stored type does not fit the requested one.
    pub type_safety: TypeSafetyPolicy,

    /// Relationship type derivation for associations without an explicit type.
    pub relationship_naming: RelationshipNaming,

    /// How node types are recorded.
    pub node_type_strategy: NodeTypeStrategy,

    /// Property name for type metadata (default: "__type__").
    pub type_property: String,

    /// Marker label prefix (default: "_").
    pub marker_prefix: String,

    /// Policy used by calls that take none.
    pub default_policy: MappingPolicy,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            type_safety: TypeSafetyPolicy::Permissive,
            relationship_naming: RelationshipNaming::FieldName,
            node_type_strategy: NodeTypeStrategy::Labels,
            type_property: DEFAULT_TYPE_PROPERTY.to_string(),
            marker_prefix: DEFAULT_MARKER_PREFIX.to_string(),
            default_policy: MappingPolicy::DEFAULT,
        }
    }
}

impl MappingConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_type_safety(mut self, policy: TypeSafetyPolicy) -> Self {
        self.type_safety = policy;
        self
    }

    pub fn with_relationship_naming(mut self, naming: RelationshipNaming) -> Self {
        self.relationship_naming = naming;
        self
    }

    pub fn with_node_type_strategy(mut self, strategy: NodeTypeStrategy) -> Self {
        self.node_type_strategy = strategy;
        self
    }

    pub fn with_type_property(mut self, key: impl Into<String>) -> Self {
        self.type_property = key.into();
        self
    }

    pub fn with_marker_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.marker_prefix = prefix.into();
        self
    }

    pub fn with_default_policy(mut self, policy: MappingPolicy) -> Self {
        self.default_policy = policy;
        self
    }
}
