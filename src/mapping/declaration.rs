//! Declarative mapping metadata: what a domain type says about itself.
//!
//! Declarations are plain builders. Nothing is validated here; the
//! [`MetamodelRegistry`](super::MetamodelRegistry) checks them when
//! it builds descriptors.
//!
//! ```ignore
//! EntityDeclaration::node("Person")
//!     .field(FieldDeclaration::id("id"))
//!     .field(FieldDeclaration::property("name", ValueType::String).unique())
//!     .field(FieldDeclaration::related_to("friends", "Person").rel_type("KNOWS"))
//!     .field(FieldDeclaration::related_to("best_friend", "Person").single().eager())
//! ```

use crate::model::{Direction, Value};
use super::descriptor::{
    Cardinality, EntityKind, IdStrategy, Instantiator, ValueType,
};
use super::object::EntityRef;

/// What a field is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FieldRole {
    Id,
    Version,
    Property,
    /// Association to node entities.
    RelatedTo(String),
    /// Association through relationship entities.
    RelatedVia(String),
    StartNode(String),
    EndNode(String),
    TypeName,
}

/// One field of an [`EntityDeclaration`].
#[derive(Debug, Clone)]
pub struct FieldDeclaration {
    pub(crate) name: String,
    pub(crate) role: FieldRole,
    pub(crate) value_type: ValueType,
    pub(crate) unique: bool,
    pub(crate) indexed: bool,
    pub(crate) index_name: Option<String>,
    pub(crate) eager: bool,
    pub(crate) transient: bool,
    pub(crate) direction: Direction,
    pub(crate) rel_type: Option<String>,
    pub(crate) cardinality: Cardinality,
    pub(crate) nullable: bool,
    pub(crate) default_value: Option<Value>,
    pub(crate) key: Option<String>,
    pub(crate) field_access: bool,
}

impl FieldDeclaration {
    fn with_role(name: impl Into<String>, role: FieldRole, value_type: ValueType) -> Self {
        let cardinality = match role {
            FieldRole::RelatedTo(_) | FieldRole::RelatedVia(_) => Cardinality::Collection,
            _ => Cardinality::Single,
        };
        let nullable = matches!(role, FieldRole::Id | FieldRole::Version | FieldRole::TypeName);
        Self {
            name: name.into(),
            role,
            value_type,
            unique: false,
            indexed: false,
            index_name: None,
            eager: false,
            transient: false,
            direction: Direction::Outgoing,
            rel_type: None,
            cardinality,
            nullable,
            default_value: None,
            key: None,
            field_access: false,
        }
    }

    /// Identity field.
    pub fn id(name: impl Into<String>) -> Self {
        Self::with_role(name, FieldRole::Id, ValueType::Int)
    }

    /// Optimistic-concurrency version counter.
    pub fn version(name: impl Into<String>) -> Self {
        Self::with_role(name, FieldRole::Version, ValueType::Int)
    }

    /// Scalar property.
    pub fn property(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::with_role(name, FieldRole::Property, value_type)
    }

    /// Association to one or more node entities of type `target`.
    pub fn related_to(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_role(name, FieldRole::RelatedTo(target.into()), ValueType::Any)
    }

    /// Association through relationship entities of type `target`.
    pub fn related_via(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_role(name, FieldRole::RelatedVia(target.into()), ValueType::Any)
    }

    /// Start node of a relationship entity.
    pub fn start_node(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_role(name, FieldRole::StartNode(target.into()), ValueType::Any)
    }

    /// End node of a relationship entity.
    pub fn end_node(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_role(name, FieldRole::EndNode(target.into()), ValueType::Any)
    }

    /// Relationship-type override of a relationship entity.
    pub fn type_name(name: impl Into<String>) -> Self {
        Self::with_role(name, FieldRole::TypeName, ValueType::String)
    }

    /// Field the mapper never reads or writes.
    pub fn transient(name: impl Into<String>) -> Self {
        Self::with_role(name, FieldRole::Property, ValueType::Any).mark_transient()
    }

    /// Declared value type, e.g. a string id.
    pub fn of_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Index the property; `Some(name)` adds that index label to stored nodes.
    pub fn indexed(mut self, index_name: Option<&str>) -> Self {
        self.indexed = true;
        self.index_name = index_name.map(str::to_string);
        self
    }

    pub fn eager(mut self) -> Self {
        self.eager = true;
        self
    }

    /// Exclude an already-declared field from mapping.
    pub fn mark_transient(mut self) -> Self {
        self.transient = true;
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn rel_type(mut self, rel_type: impl Into<String>) -> Self {
        self.rel_type = Some(rel_type.into());
        self
    }

    /// To-one association.
    pub fn single(mut self) -> Self {
        self.cardinality = Cardinality::Single;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Value a missing property reads as, instead of the type default.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Storage key override.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Always bypass the accessor path for this field.
    pub fn field_access(mut self) -> Self {
        self.field_access = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Per-type mapping declaration.
#[derive(Debug, Clone)]
pub struct EntityDeclaration {
    pub(crate) name: String,
    pub(crate) kind: EntityKind,
    pub(crate) alias: Option<String>,
    pub(crate) labels: Vec<String>,
    pub(crate) extends: Option<String>,
    pub(crate) short_names: bool,
    pub(crate) is_abstract: bool,
    pub(crate) relationship_type: Option<String>,
    pub(crate) id_strategy: Option<IdStrategy>,
    pub(crate) fields: Vec<FieldDeclaration>,
    pub(crate) factory: Option<Instantiator>,
}

impl EntityDeclaration {
    fn new(name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            name: name.into(),
            kind,
            alias: None,
            labels: Vec::new(),
            extends: None,
            short_names: true,
            is_abstract: false,
            relationship_type: None,
            id_strategy: None,
            fields: Vec::new(),
            factory: None,
        }
    }

    pub fn node(name: impl Into<String>) -> Self {
        Self::new(name, EntityKind::NodeEntity)
    }

    pub fn relationship(name: impl Into<String>) -> Self {
        Self::new(name, EntityKind::RelationshipEntity)
    }

    /// Discriminator written to stored elements (defaults to the name).
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Extra storage labels.
    pub fn labels<I, L>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        self.labels.extend(labels.into_iter().map(Into::into));
        self
    }

    pub fn extends(mut self, super_type: impl Into<String>) -> Self {
        self.extends = Some(super_type.into());
        self
    }

    /// `false` prefixes storage keys with the type name (`Person.name`).
    pub fn short_names(mut self, short_names: bool) -> Self {
        self.short_names = short_names;
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Static relationship type of a relationship entity.
    pub fn relationship_type(mut self, rel_type: impl Into<String>) -> Self {
        self.relationship_type = Some(rel_type.into());
        self
    }

    pub fn id_strategy(mut self, strategy: IdStrategy) -> Self {
        self.id_strategy = Some(strategy);
        self
    }

    pub fn field(mut self, field: FieldDeclaration) -> Self {
        self.fields.push(field);
        self
    }

    pub fn factory(mut self, factory: impl Fn() -> EntityRef + Send + Sync + 'static) -> Self {
        self.factory = Some(Instantiator::new(factory));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn alias_or_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}
