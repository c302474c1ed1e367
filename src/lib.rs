//! # graph-ogm: Object-Graph Mapping for Property Graphs
//!
//! Maps typed domain objects to nodes and relationships and back.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `GraphStore` is the contract between mapper and storage
//! 2. **Clean DTOs**: `Node`, `Relationship`, `Value` cross all boundaries
//! 3. **Declared, not reflected**: each type states its mapping once; the
//!    registry validates it before any conversion runs
//! 4. **Explicit call context**: identity caches are threaded through each
//!    conversion, never shared between calls
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use graph_ogm::{Mapper, MappingPolicy};
//!
//! let mapper = Mapper::open_memory();
//! mapper.register::<Person>()?;
//! mapper.initialize()?;
//!
//! let ada = EntityRef::new(Person::named("Ada"));
//! let node = mapper.convert_to_graph(&ada, MappingPolicy::DEFAULT)?;
//! let back = mapper.convert_to_object(&node, "Person", MappingPolicy::EAGER_LOAD)?;
//! ```
//!
//! ## Storage Backends
//!
//! | Store | Description |
//! |-------|-------------|
//! | `MemoryStore` | In-memory graph for testing/embedding |

use std::sync::Arc;

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod storage;
pub mod mapping;
pub mod config;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Direction, ElementId, GraphElement, Node, NodeId, PropertyMap, RelId, Relationship, Value,
};

// ============================================================================
// Re-exports: Storage
// ============================================================================

pub use storage::{GraphStore, MemoryStore};

// ============================================================================
// Re-exports: Mapping
// ============================================================================

pub use config::MappingConfig;
pub use mapping::{
    AccessError, Association, ConversionContext, Converter, DomainObject, Entity,
    EntityDeclaration, EntityDescriptor, EntityRef, FieldDeclaration, FieldValue, IdStrategy,
    IdentityResolver, MappingPolicy, MetamodelRegistry, NodeTypeStrategy, TypeSafetyPolicy,
    ValueType,
};

use mapping::{IdGenerator, SequenceIdGenerator, TypeResolver};

// ============================================================================
// Top-level Mapper handle
// ============================================================================

/// The primary entry point. A `Mapper` wraps a graph store and the
/// metamodel, and converts whole object graphs in both directions.
pub struct Mapper<S: GraphStore> {
    store: S,
    config: MappingConfig,
    registry: MetamodelRegistry,
    types: TypeResolver,
    ids: Arc<dyn IdGenerator>,
}

impl<S: GraphStore> Mapper<S> {
    pub fn new(store: S, config: MappingConfig) -> Self {
        Self {
            registry: MetamodelRegistry::new(&config),
            types: TypeResolver::new(&config),
            ids: Arc::new(SequenceIdGenerator::default()),
            store,
            config,
        }
    }

    /// Replace the generator used for externally generated ids.
    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    // ========================================================================
    // Metamodel
    // ========================================================================

    pub fn register<T: Entity>(&self) -> Result<()> {
        self.registry.register::<T>()
    }

    pub fn register_declaration(&self, declaration: EntityDeclaration) -> Result<()> {
        self.registry.register_declaration(declaration)
    }

    /// Build and validate every registered type.
    pub fn initialize(&self) -> Result<()> {
        self.registry.initialize()
    }

    pub fn describe(&self, type_name: &str) -> Result<Arc<EntityDescriptor>> {
        self.registry.describe(type_name)
    }

    // ========================================================================
    // Conversion
    // ========================================================================

    /// Convert a stored element to an object of `type_name` (or the stored
    /// subtype). `None` when the type-safety policy rejects it.
    ///
    /// Within one call each element maps to one instance per policy. Eager
    /// associations read their targets under `policy` plus `EAGER_LOAD`, so
    /// under `DEFAULT` a node reached again through an eager association
    /// (e.g. a `best_friend` pointing back at the root) is a second
    /// instance. Pass `MappingPolicy::EAGER_LOAD` when every occurrence
    /// must be the same instance.
    pub fn convert_to_object(
        &self,
        element: &GraphElement,
        type_name: &str,
        policy: MappingPolicy,
    ) -> Result<Option<EntityRef>> {
        let requested = self.registry.describe(type_name)?;
        self.converter().read(&mut ConversionContext::new(), element, &requested, policy)
    }

    /// Convert a stored element to whatever type it records.
    pub fn convert_to_object_stored(&self, element: &GraphElement, policy: MappingPolicy) -> Result<EntityRef> {
        let stored = self.types.stored_type(&self.registry, element)?.ok_or_else(|| {
            Error::NotFound(format!("no registered type recorded on {}", element.element_id()))
        })?;
        self.converter()
            .read(&mut ConversionContext::new(), element, &stored, policy)?
            .ok_or_else(|| Error::NotFound(element.element_id().to_string()))
    }

    /// Upsert `object` and its loaded associations. Returns its element.
    pub fn convert_to_graph(&self, object: &EntityRef, policy: MappingPolicy) -> Result<GraphElement> {
        self.converter().write(&mut ConversionContext::new(), object, policy, None)
    }

    /// Re-read the element of `object` as `type_name`.
    pub fn project_to(&self, object: &EntityRef, type_name: &str, policy: MappingPolicy) -> Result<EntityRef> {
        let target = self.registry.describe(type_name)?;
        self.converter().project_to(&mut ConversionContext::new(), object, &target, policy)
    }

    /// Fetch and convert an element by id with the configured default policy.
    ///
    /// Instance identity follows [`Mapper::convert_to_object`]: with a
    /// `DEFAULT` policy, cycles through eager associations yield one extra
    /// instance per element.
    pub fn load(&self, id: ElementId, type_name: &str) -> Result<Option<EntityRef>> {
        match self.store.get_element(id)? {
            Some(element) => self.convert_to_object(&element, type_name, self.config.default_policy),
            None => Ok(None),
        }
    }

    // ========================================================================
    // Access
    // ========================================================================

    pub fn identity(&self) -> IdentityResolver<'_, S> {
        IdentityResolver::new(&self.store, &self.registry, &self.types, &self.ids)
    }

    pub fn converter(&self) -> Converter<'_, S> {
        Converter::new(&self.store, &self.registry, &self.types, self.identity())
    }

    pub fn registry(&self) -> &MetamodelRegistry {
        &self.registry
    }

    pub fn config(&self) -> &MappingConfig {
        &self.config
    }

    /// Access the underlying store (for advanced use).
    pub fn store(&self) -> &S {
        &self.store
    }
}

/// In-memory mapper for testing and embedding.
impl Mapper<MemoryStore> {
    pub fn open_memory() -> Self {
        Self::new(MemoryStore::new(), MappingConfig::default())
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error in {entity}: {message}")]
    Configuration { entity: String, message: String },

    #[error("Type mismatch: requested {requested}, stored {stored}")]
    TypeMismatch { requested: String, stored: String },

    #[error("Missing unique value: {entity}.{property} is null")]
    MissingUniqueValue { entity: String, property: String },

    #[error("Illegal relationship endpoints for {entity}: {message}")]
    IllegalRelationshipEndpoints { entity: String, message: String },

    #[error("Property access error on {entity}.{property}: {source}")]
    PropertyAccess {
        entity: String,
        property: String,
        #[source]
        source: AccessError,
    },

    #[error("Concurrent modification of {entity}: expected version {expected}, found {actual}")]
    ConcurrentModification { entity: String, expected: String, actual: String },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
