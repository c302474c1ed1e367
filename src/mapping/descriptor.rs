//! # Metamodel
//!
//! Immutable per-type mapping metadata, built once by the
//! [`MetamodelRegistry`](super::MetamodelRegistry) from an
//! [`EntityDeclaration`](super::EntityDeclaration) and shared as
//! `Arc<EntityDescriptor>`.
//!
//! | Type | Describes |
//! |------|-----------|
//! | `EntityDescriptor` | One domain type: kind, labels, properties, endpoints |
//! | `PropertyDescriptor` | One mapped field: storage key, markers, load policy |
//! | `RelationshipDescriptor` | Association detail: direction, type, cardinality |

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::{Direction, Labels, Value};
use crate::{Error, Result};
use super::object::{AccessError, EntityRef, FieldValue};
use super::policy::MappingPolicy;

// ============================================================================
// Enumerations
// ============================================================================

/// Whether a domain type maps to a node or to a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    NodeEntity,
    RelationshipEntity,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::NodeEntity => write!(f, "node entity"),
            EntityKind::RelationshipEntity => write!(f, "relationship entity"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    Single,
    Collection,
}

/// Whether a cascading read must fetch the property eagerly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadPolicy {
    /// Always fetched.
    Direct,
    /// Fetched only when the mapping policy asks for it.
    OnDemand,
}

/// Where an identity value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IdStrategy {
    /// The store's element id is written back into the id field.
    #[default]
    Internal,
    /// Generated by an [`IdGenerator`](super::IdGenerator) on first write.
    External,
    /// Supplied by the application before the first write.
    Assigned,
}

/// How an association's relationship type is derived from its field name
/// when no explicit type is declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RelationshipNaming {
    /// Field name verbatim (`bestFriend` -> `bestFriend`).
    #[default]
    FieldName,
    /// Upper snake case (`bestFriend` -> `BEST_FRIEND`).
    UpperSnake,
}

impl RelationshipNaming {
    pub fn apply(self, field: &str) -> String {
        match self {
            RelationshipNaming::FieldName => field.to_string(),
            RelationshipNaming::UpperSnake => {
                let mut out = String::with_capacity(field.len() + 4);
                let mut prev_lower = false;
                for c in field.chars() {
                    if c == '_' || c == '-' || c == ' ' {
                        if !out.ends_with('_') {
                            out.push('_');
                        }
                        prev_lower = false;
                        continue;
                    }
                    if c.is_uppercase() && prev_lower {
                        out.push('_');
                    }
                    prev_lower = c.is_lowercase() || c.is_ascii_digit();
                    out.extend(c.to_uppercase());
                }
                out
            }
        }
    }
}

// ============================================================================
// Value types
// ============================================================================

/// Declared type of a scalar property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ValueType {
    /// No coercion; any stored value is passed through.
    #[default]
    Any,
    Bool,
    Int,
    Float,
    String,
    Bytes,
    List,
    Map,
    Temporal,
    Point,
}

impl ValueType {
    /// Primitive types have a non-null default.
    pub fn is_primitive(self) -> bool {
        matches!(self, ValueType::Bool | ValueType::Int | ValueType::Float)
    }

    /// Value a missing property reads as.
    pub fn default_value(self, nullable: bool) -> Value {
        if nullable {
            return Value::Null;
        }
        match self {
            ValueType::Bool => Value::Bool(false),
            ValueType::Int => Value::Int(0),
            ValueType::Float => Value::Float(0.0),
            _ => Value::Null,
        }
    }

    /// Coerce a value to this type. Null always passes; integers and
    /// floats convert into each other.
    pub fn coerce(self, value: Value) -> std::result::Result<Value, AccessError> {
        let ok = match (self, &value) {
            (_, Value::Null) | (ValueType::Any, _) => true,
            (ValueType::Int, Value::Float(f)) if f.fract() == 0.0 => return Ok(Value::Int(*f as i64)),
            (ValueType::Float, Value::Int(i)) => return Ok(Value::Float(*i as f64)),
            (ValueType::Bool, Value::Bool(_))
            | (ValueType::Int, Value::Int(_))
            | (ValueType::Float, Value::Float(_))
            | (ValueType::String, Value::String(_))
            | (ValueType::Bytes, Value::Bytes(_))
            | (ValueType::List, Value::List(_))
            | (ValueType::Map, Value::Map(_)) => true,
            (ValueType::Point, v) => v.is_point(),
            (ValueType::Temporal, v) => v.is_temporal(),
            _ => false,
        };
        if ok {
            Ok(value)
        } else {
            Err(AccessError::WrongShape { expected: self.name(), got: value.type_name().to_string() })
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueType::Any => "ANY",
            ValueType::Bool => "BOOLEAN",
            ValueType::Int => "INTEGER",
            ValueType::Float => "FLOAT",
            ValueType::String => "STRING",
            ValueType::Bytes => "BYTES",
            ValueType::List => "LIST",
            ValueType::Map => "MAP",
            ValueType::Temporal => "TEMPORAL",
            ValueType::Point => "POINT",
        }
    }
}

// ============================================================================
// Instantiator
// ============================================================================

/// Creates an empty instance of a concrete domain type.
#[derive(Clone)]
pub struct Instantiator(Arc<dyn Fn() -> EntityRef + Send + Sync>);

impl Instantiator {
    pub fn new(f: impl Fn() -> EntityRef + Send + Sync + 'static) -> Self {
        Instantiator(Arc::new(f))
    }

    pub fn create(&self) -> EntityRef {
        (self.0)()
    }
}

impl fmt::Debug for Instantiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Instantiator")
    }
}

// ============================================================================
// RelationshipDescriptor
// ============================================================================

/// Association detail of a relationship-shaped property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipDescriptor {
    pub direction: Direction,
    pub type_name: String,
    pub cardinality: Cardinality,
    /// Name of the target entity type.
    pub target: String,
    pub target_kind: EntityKind,
}

// ============================================================================
// PropertyDescriptor
// ============================================================================

/// Metadata for one mapped field.
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    /// Field name, as passed to [`DomainObject`](super::DomainObject) access.
    pub name: String,
    /// Name of the type that declared the field.
    pub owner: String,
    /// Property key on the stored element.
    pub storage_key: String,
    pub value_type: ValueType,
    pub is_identity: bool,
    pub is_version: bool,
    pub is_unique: bool,
    pub is_indexed: bool,
    pub is_transient: bool,
    /// Carries the relationship type of a relationship entity.
    pub is_type_name: bool,
    pub is_start_node: bool,
    pub is_end_node: bool,
    pub is_eager: bool,
    pub nullable: bool,
    pub default: Value,
    /// Index used for get-or-create and id lookups.
    pub index_name: Option<String>,
    pub load_policy: LoadPolicy,
    /// Always use direct field access.
    pub field_access: bool,
    pub relationship: Option<RelationshipDescriptor>,
}

impl PropertyDescriptor {
    pub fn is_association(&self) -> bool {
        self.relationship.is_some()
    }

    pub fn is_endpoint(&self) -> bool {
        self.is_start_node || self.is_end_node
    }

    /// Stored as a plain element property.
    pub fn is_scalar(&self) -> bool {
        !self.is_association() && !self.is_type_name && !self.is_transient
    }

    /// Policy derived from the eager-fetch marker.
    pub fn default_policy(&self) -> MappingPolicy {
        if self.is_eager { MappingPolicy::EAGER_LOAD } else { MappingPolicy::DEFAULT }
    }

    /// Policy a nested conversion of this property runs under.
    pub fn nested_policy(&self, policy: MappingPolicy) -> MappingPolicy {
        policy.combine_with(self.default_policy())
    }

    /// Whether `policy` lets this property be fetched on read.
    pub fn should_fetch(&self, policy: MappingPolicy) -> bool {
        !self.is_transient
            && (self.load_policy == LoadPolicy::Direct || self.nested_policy(policy).should_load())
    }

    fn access_field(&self, policy: MappingPolicy) -> bool {
        self.field_access || policy.access_field()
    }

    fn access_error(&self, source: AccessError) -> Error {
        Error::PropertyAccess { entity: self.owner.clone(), property: self.name.clone(), source }
    }

    /// Read this property from a domain object.
    pub fn get(&self, object: &EntityRef, policy: MappingPolicy) -> Result<FieldValue> {
        object.get(&self.name, self.access_field(policy)).map_err(|e| self.access_error(e))
    }

    /// Read a scalar value, coerced to the declared type.
    pub fn get_value(&self, object: &EntityRef, policy: MappingPolicy) -> Result<Value> {
        let value = Value::try_from(self.get(object, policy)?).map_err(|e| self.access_error(e))?;
        self.value_type.coerce(value).map_err(|e| self.access_error(e))
    }

    /// Write this property on a domain object.
    pub fn set(&self, object: &EntityRef, value: FieldValue, policy: MappingPolicy) -> Result<()> {
        object.set(&self.name, value, self.access_field(policy)).map_err(|e| self.access_error(e))
    }

    /// Write a scalar value, coerced to the declared type.
    pub fn set_value(&self, object: &EntityRef, value: Value, policy: MappingPolicy) -> Result<()> {
        let value = self.value_type.coerce(value).map_err(|e| self.access_error(e))?;
        self.set(object, FieldValue::Scalar(value), policy)
    }
}

// ============================================================================
// EntityDescriptor
// ============================================================================

/// Indices of the endpoint properties of a relationship entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationshipEndpoints {
    pub start: usize,
    pub end: usize,
    pub type_property: Option<usize>,
}

/// Mapping metadata for one domain type.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    pub name: String,
    /// Discriminator written to stored elements.
    pub alias: String,
    pub kind: EntityKind,
    pub is_abstract: bool,
    /// Transitive supertypes, nearest first.
    pub super_types: Vec<String>,
    /// Inherited properties first, in declaration order.
    pub properties: Vec<PropertyDescriptor>,
    pub id_property: Option<usize>,
    pub version_property: Option<usize>,
    pub unique_property: Option<usize>,
    /// Labels written to every stored node of this type.
    pub storage_labels: Labels,
    pub endpoints: Option<RelationshipEndpoints>,
    /// Static relationship type of a relationship entity.
    pub relationship_type: Option<String>,
    pub id_strategy: IdStrategy,
    pub use_short_names: bool,
    pub instantiator: Option<Instantiator>,
}

impl EntityDescriptor {
    pub fn is_node_entity(&self) -> bool {
        self.kind == EntityKind::NodeEntity
    }

    pub fn is_relationship_entity(&self) -> bool {
        self.kind == EntityKind::RelationshipEntity
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn property_by_key(&self, storage_key: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.is_scalar() && p.storage_key == storage_key)
    }

    pub fn id(&self) -> Option<&PropertyDescriptor> {
        self.id_property.map(|i| &self.properties[i])
    }

    pub fn version(&self) -> Option<&PropertyDescriptor> {
        self.version_property.map(|i| &self.properties[i])
    }

    pub fn unique(&self) -> Option<&PropertyDescriptor> {
        self.unique_property.map(|i| &self.properties[i])
    }

    pub fn associations(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.iter().filter(|p| p.is_association())
    }

    pub fn start_property(&self) -> Option<&PropertyDescriptor> {
        self.endpoints.map(|e| &self.properties[e.start])
    }

    pub fn end_property(&self) -> Option<&PropertyDescriptor> {
        self.endpoints.map(|e| &self.properties[e.end])
    }

    pub fn type_name_property(&self) -> Option<&PropertyDescriptor> {
        self.endpoints.and_then(|e| e.type_property).map(|i| &self.properties[i])
    }

    /// This type, or one of its supertypes, is `name`.
    pub fn is_assignable_to(&self, name: &str) -> bool {
        self.name == name || self.super_types.iter().any(|s| s == name)
    }

    /// Create an empty instance.
    pub fn instantiate(&self) -> Result<EntityRef> {
        if self.is_abstract {
            return Err(Error::Configuration {
                entity: self.name.clone(),
                message: "abstract types cannot be instantiated".into(),
            });
        }
        self.instantiator.as_ref().map(Instantiator::create).ok_or_else(|| Error::Configuration {
            entity: self.name.clone(),
            message: "no instantiator registered".into(),
        })
    }
}
